//! Expansion of multi-valued relation fields into child records.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::destination::IndexSpec;
use crate::error::{ErrorKind, MigrationResult};
use crate::migration_error;
use crate::types::document::ID_FIELD;
use crate::types::{CanonicalId, Document};

/// Rule for fanning one relation field out into a companion destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FanOutRule {
    /// Multi-valued relation field on the source record.
    pub field: String,
    /// Companion destination receiving the child records.
    pub companion: String,
    /// Summary count field emitted on the parent.
    pub count_field: String,
    /// Composite-key component naming the related entity.
    pub element_key: String,
    /// Composite-key component naming the owning entity.
    pub parent_key: String,
    /// Flag payload field set on every child.
    pub flag_field: String,
    /// Indexes provisioned on the companion destination.
    pub indexes: Vec<IndexSpec>,
}

/// Result of expanding one parent's relation list.
///
/// All children come from a single pass over the element list; the count is
/// `None` when the relation field is absent and `Some(0)` when it is an
/// empty list.
#[derive(Debug, Clone, PartialEq)]
pub struct FanOut {
    pub count: Option<u64>,
    pub children: Vec<Document>,
}

/// Derives the child records for one parent.
///
/// Each child carries a composite key of {related id, owning id} plus the
/// flag payload, e.g. `{_id: {user: "9", comment: "1"}, like: true}`. The
/// children's persistence is independent of the parent's own outcome.
pub fn expand(
    rule: &FanOutRule,
    source_record: &Document,
    parent: &CanonicalId,
) -> MigrationResult<FanOut> {
    let Some(value) = source_record.get(&rule.field) else {
        return Ok(FanOut {
            count: None,
            children: Vec::new(),
        });
    };

    let Value::Array(elements) = value else {
        return Err(migration_error!(
            ErrorKind::ConversionError,
            "Relation field is not a list",
            format!("field '{}', value {value}", rule.field)
        ));
    };

    let mut children = Vec::with_capacity(elements.len());
    for element in elements {
        let related = match element {
            Value::Number(number) => number.as_i64().map(CanonicalId::from),
            Value::String(id) => Some(CanonicalId::from(id.as_str())),
            _ => None,
        }
        .ok_or_else(|| {
            migration_error!(
                ErrorKind::ConversionError,
                "Relation element is not an identifier",
                format!("field '{}', element {element}", rule.field)
            )
        })?;

        let mut key = Map::new();
        key.insert(rule.element_key.clone(), related.to_value());
        key.insert(rule.parent_key.clone(), parent.to_value());

        let mut child = Document::new();
        child.insert(ID_FIELD, Value::Object(key));
        child.insert(rule.flag_field.clone(), Value::Bool(true));
        children.push(child);
    }

    Ok(FanOut {
        count: Some(elements.len() as u64),
        children,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use serde_json::json;

    fn likers_rule() -> FanOutRule {
        FanOutRule {
            field: "likers".to_owned(),
            companion: "usercomments".to_owned(),
            count_field: "likeCount".to_owned(),
            element_key: "user".to_owned(),
            parent_key: "comment".to_owned(),
            flag_field: "like".to_owned(),
            indexes: Vec::new(),
        }
    }

    fn doc(value: Value) -> Document {
        Document::try_from(value).unwrap()
    }

    #[test]
    fn emits_one_child_per_element_with_unique_composite_keys() {
        let record = doc(json!({ "_id": 1, "likers": [9, 11, 15] }));
        let fan_out = expand(&likers_rule(), &record, &CanonicalId::from(1)).unwrap();

        assert_eq!(fan_out.count, Some(3));
        assert_eq!(fan_out.children.len(), 3);

        let keys: HashSet<String> = fan_out
            .children
            .iter()
            .map(|child| child.get(ID_FIELD).unwrap().to_string())
            .collect();
        assert_eq!(keys.len(), 3);

        assert_eq!(
            Value::from(fan_out.children[0].clone()),
            json!({ "_id": { "user": "9", "comment": "1" }, "like": true })
        );
    }

    #[test]
    fn absent_relation_field_yields_no_summary() {
        let record = doc(json!({ "_id": 1 }));
        let fan_out = expand(&likers_rule(), &record, &CanonicalId::from(1)).unwrap();

        assert_eq!(fan_out.count, None);
        assert!(fan_out.children.is_empty());
    }

    #[test]
    fn empty_relation_list_yields_a_zero_summary() {
        let record = doc(json!({ "_id": 1, "likers": [] }));
        let fan_out = expand(&likers_rule(), &record, &CanonicalId::from(1)).unwrap();

        assert_eq!(fan_out.count, Some(0));
        assert!(fan_out.children.is_empty());
    }

    #[test]
    fn non_list_relation_field_is_a_conversion_error() {
        let record = doc(json!({ "_id": 1, "likers": "nope" }));
        let err = expand(&likers_rule(), &record, &CanonicalId::from(1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConversionError);
    }
}

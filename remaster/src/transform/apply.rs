//! The generic rule-set interpreter.

use std::collections::HashSet;

use chrono::{TimeZone, Utc};
use serde_json::Value;

use crate::error::{ErrorKind, MigrationResult};
use crate::migration_error;
use crate::transform::rules::{Coercion, FieldRule, Passthrough, RuleSet};
use crate::types::{CanonicalId, Document, is_truthy};

/// Maps one source record into the canonical destination shape.
///
/// Pure: the output is a function of the record and the rule set alone.
/// Derived aggregates and fan-out are separate steps layered on top by the
/// owning job. Missing required fields and failed coercions are record-level
/// errors for the caller's conflict policy to handle.
pub fn transform(document: &Document, rules: &RuleSet) -> MigrationResult<Document> {
    let mut output = Document::new();
    let mut consumed: HashSet<&str> = HashSet::new();

    for rule in rules.rules() {
        match rule {
            FieldRule::Required {
                field,
                rename,
                coerce,
            } => {
                consumed.insert(field);

                let Some(value) = document.get(field) else {
                    return Err(migration_error!(
                        ErrorKind::InvalidData,
                        "Required field is missing",
                        format!("field '{field}'")
                    ));
                };
                output.insert(target_name(field, rename), coerce_value(field, value, *coerce)?);
            }
            FieldRule::Optional {
                field,
                rename,
                coerce,
            } => {
                consumed.insert(field);

                if let Some(value) = document.get(field)
                    && is_truthy(value)
                {
                    output
                        .insert(target_name(field, rename), coerce_value(field, value, *coerce)?);
                }
            }
            FieldRule::Nested { field, rules } => {
                consumed.insert(field);

                let Some(value) = document.get(field) else {
                    continue;
                };
                let nested = Document::try_from(value.clone()).map_err(|value| {
                    migration_error!(
                        ErrorKind::ConversionError,
                        "Nested rewrite target is not an object",
                        format!("field '{field}', value {value}")
                    )
                })?;

                output.insert(field.clone(), transform(&nested, rules)?.into());
            }
            FieldRule::Drop { field } => {
                consumed.insert(field);
            }
        }
    }

    if rules.passthrough() == Passthrough::Allow {
        for (field, value) in document.fields() {
            if !consumed.contains(field.as_str()) {
                output.insert(field.clone(), value.clone());
            }
        }
    }

    Ok(output)
}

fn target_name(field: &str, rename: &Option<String>) -> String {
    rename.clone().unwrap_or_else(|| field.to_owned())
}

/// Applies one coercion to a field value.
fn coerce_value(field: &str, value: &Value, coerce: Coercion) -> MigrationResult<Value> {
    match coerce {
        Coercion::None => Ok(value.clone()),
        Coercion::CanonicalId => canonical(value).ok_or_else(|| conversion_error(field, value)),
        Coercion::CanonicalIdList => {
            let Value::Array(elements) = value else {
                return Err(conversion_error(field, value));
            };
            elements
                .iter()
                .map(|element| canonical(element).ok_or_else(|| conversion_error(field, element)))
                .collect::<MigrationResult<Vec<Value>>>()
                .map(Value::Array)
        }
        Coercion::Text => match value {
            Value::String(_) => Ok(value.clone()),
            Value::Number(number) => Ok(Value::String(number.to_string())),
            Value::Bool(flag) => Ok(Value::String(flag.to_string())),
            _ => Err(conversion_error(field, value)),
        },
        Coercion::TimestampMs => {
            let timestamp = value
                .as_i64()
                .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
                .ok_or_else(|| conversion_error(field, value))?;
            Ok(Value::String(timestamp.to_rfc3339()))
        }
    }
}

/// Rewrites one identifier value into canonical string form.
///
/// Already-canonical strings pass through unchanged so transforms stay
/// idempotent over partially migrated data.
fn canonical(value: &Value) -> Option<Value> {
    match value {
        Value::Number(number) => number.as_i64().map(|id| CanonicalId::from(id).to_value()),
        Value::String(_) => Some(value.clone()),
        _ => None,
    }
}

fn conversion_error(field: &str, value: &Value) -> crate::error::MigrationError {
    migration_error!(
        ErrorKind::ConversionError,
        "Field value cannot be coerced",
        format!("field '{field}', value {value}")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        Document::try_from(value).unwrap()
    }

    #[test]
    fn ruled_fields_are_renamed_and_coerced() {
        let rules = RuleSet::new()
            .required("_id", Coercion::CanonicalId)
            .required("artist", Coercion::CanonicalId)
            .required_as("uploader", "user", Coercion::CanonicalId)
            .optional_as("tags", "hashtags", Coercion::None);

        let record = doc(json!({
            "_id": 1,
            "artist": 42,
            "uploader": 7,
            "tags": ["x"],
            "unruled": "gone"
        }));
        let transformed = transform(&record, &rules).unwrap();

        assert_eq!(transformed.get("_id"), Some(&json!("1")));
        assert_eq!(transformed.get("artist"), Some(&json!("42")));
        assert_eq!(transformed.get("user"), Some(&json!("7")));
        assert_eq!(transformed.get("hashtags"), Some(&json!(["x"])));
        assert!(!transformed.contains("uploader"));
        assert!(!transformed.contains("tags"));
        assert!(!transformed.contains("unruled"));
    }

    #[test]
    fn passthrough_copies_unruled_fields_and_honors_drops() {
        let rules = RuleSet::new()
            .allow_passthrough()
            .required("_id", Coercion::CanonicalId)
            .drop_field("recentlyPlayed");

        let record = doc(json!({
            "_id": 5,
            "name": "maria",
            "recentlyPlayed": [1, 2, 3]
        }));
        let transformed = transform(&record, &rules).unwrap();

        assert_eq!(transformed.get("_id"), Some(&json!("5")));
        assert_eq!(transformed.get("name"), Some(&json!("maria")));
        assert!(!transformed.contains("recentlyPlayed"));
    }

    #[test]
    fn falsy_optional_fields_are_omitted_not_nulled() {
        let rules = RuleSet::new()
            .optional("lyrics", Coercion::Text)
            .optional("parent", Coercion::CanonicalId)
            .optional("tags", Coercion::None);

        let record = doc(json!({ "lyrics": "", "parent": null, "tags": [] }));
        let transformed = transform(&record, &rules).unwrap();

        assert!(transformed.is_empty());
    }

    #[test]
    fn nested_rewrite_strips_unruled_subfields() {
        let rules = RuleSet::new().nested(
            "reference",
            RuleSet::new()
                .required("collection", Coercion::None)
                .required("id", Coercion::CanonicalId),
        );

        let record = doc(json!({
            "reference": { "collection": "songs", "id": 7, "joinKey": 991 }
        }));
        let transformed = transform(&record, &rules).unwrap();

        assert_eq!(
            transformed.get("reference"),
            Some(&json!({ "collection": "songs", "id": "7" }))
        );
    }

    #[test]
    fn id_list_coercion_rewrites_every_element() {
        let rules = RuleSet::new().optional_as("images", "imagesList", Coercion::CanonicalIdList);

        let record = doc(json!({ "images": [3, 9, 12] }));
        let transformed = transform(&record, &rules).unwrap();

        assert_eq!(transformed.get("imagesList"), Some(&json!(["3", "9", "12"])));
    }

    #[test]
    fn missing_required_field_is_invalid_data() {
        let rules = RuleSet::new().required("_id", Coercion::CanonicalId);
        let err = transform(&doc(json!({ "title": "x" })), &rules).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn epoch_milliseconds_become_timestamps() {
        let rules = RuleSet::new().optional("date", Coercion::TimestampMs);
        let transformed =
            transform(&doc(json!({ "date": 1_000_i64 })), &rules).unwrap();
        assert_eq!(
            transformed.get("date"),
            Some(&json!("1970-01-01T00:00:01+00:00"))
        );
    }
}

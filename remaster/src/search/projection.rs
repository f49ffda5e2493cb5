//! Derivation of search projections from transformed records.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::destination::Destination;
use crate::error::{ErrorKind, MigrationResult};
use crate::migration_error;
use crate::search::base::{IndexSchema, SearchDocument};
use crate::types::document::ID_FIELD;
use crate::types::{CanonicalId, Document, is_truthy};

/// Declarative search projection for one entity.
///
/// Like the transform rules, the projection is data interpreted by
/// [`project`]: a reduced, denormalized view of the transformed record plus
/// fields joined from related entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    /// Search index receiving the projections.
    pub index: String,
    /// Field-analysis schema the index is recreated with.
    pub schema: IndexSchema,
    /// Derived fields of the projection body.
    pub fields: Vec<ProjectionField>,
}

/// One derived field of a search projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProjectionField {
    /// Display title concatenating the record's own title with the name of
    /// a related record: `<title> - <related name>`. Falls back to the bare
    /// title when the related record cannot be read.
    JoinedTitle {
        title_field: String,
        related_field: String,
        collection: String,
        name_field: String,
        target: String,
    },
    /// Name of a related record, read back from its destination collection.
    RelatedName {
        field: String,
        collection: String,
        name_field: String,
        target: String,
    },
    /// Duration in milliseconds, formatted `m:ss` / `h:mm:ss`.
    Duration { field: String, target: String },
    /// Long text with markup stripped.
    SanitizedText { field: String, target: String },
    /// Verbatim copy of a field.
    Copy { field: String, target: String },
}

/// Derives one search projection.
///
/// Joined fields are read back from the primary destination, which holds the
/// related entities' records once their owning jobs have completed. A failed
/// or empty join degrades the affected field and is logged; only a missing
/// canonical identifier fails the projection itself.
pub async fn project<D: Destination>(
    projection: &Projection,
    record: &Document,
    destination: &D,
) -> MigrationResult<SearchDocument> {
    let id = record
        .get(ID_FIELD)
        .and_then(Value::as_str)
        .map(CanonicalId::from)
        .ok_or_else(|| {
            migration_error!(
                ErrorKind::InvalidData,
                "Record has no canonical identifier to key the projection by"
            )
        })?;

    let mut body = Document::new();
    body.insert(ID_FIELD, id.to_value());

    for field in &projection.fields {
        match field {
            ProjectionField::JoinedTitle {
                title_field,
                related_field,
                collection,
                name_field,
                target,
            } => {
                let Some(title) = record.get(title_field).and_then(Value::as_str) else {
                    continue;
                };

                let joined = match related_name(record, related_field, collection, name_field, destination).await
                {
                    Some(name) => format!("{title} - {name}"),
                    None => title.to_owned(),
                };
                body.insert(target.clone(), Value::String(joined));
            }
            ProjectionField::RelatedName {
                field,
                collection,
                name_field,
                target,
            } => {
                if let Some(name) =
                    related_name(record, field, collection, name_field, destination).await
                {
                    body.insert(target.clone(), Value::String(name));
                }
            }
            ProjectionField::Duration { field, target } => {
                if let Some(milliseconds) = record.get(field).and_then(Value::as_i64) {
                    body.insert(target.clone(), Value::String(format_duration(milliseconds)));
                }
            }
            ProjectionField::SanitizedText { field, target } => {
                if let Some(text) = record.get(field).and_then(Value::as_str) {
                    body.insert(target.clone(), Value::String(strip_markup(text)));
                }
            }
            ProjectionField::Copy { field, target } => {
                if let Some(value) = record.get(field)
                    && is_truthy(value)
                {
                    body.insert(target.clone(), value.clone());
                }
            }
        }
    }

    Ok(SearchDocument { id, body })
}

/// Reads the name of a related record through the destination.
///
/// Any failure along the way (missing reference, failed read-back, missing
/// related record or name) is reported as `None` after a warning, so the
/// projection degrades instead of failing.
async fn related_name<D: Destination>(
    record: &Document,
    field: &str,
    collection: &str,
    name_field: &str,
    destination: &D,
) -> Option<String> {
    let id = CanonicalId::from(record.get(field)?.as_str()?);

    let related = match destination.find_by_id(collection, &id).await {
        Ok(related) => related,
        Err(error) => {
            warn!(collection, id = %id, error = %error, "join read-back failed");
            None
        }
    };

    let Some(related) = related else {
        warn!(collection, id = %id, "related record missing, degrading projection field");
        return None;
    };

    related
        .get(name_field)
        .and_then(Value::as_str)
        .map(str::to_owned)
}

/// Formats a millisecond duration as `m:ss`, or `h:mm:ss` from one hour up.
///
/// The hour component is omitted when zero; minutes are padded to two digits
/// only under an hour component; seconds are always two digits.
pub fn format_duration(milliseconds: i64) -> String {
    let total_seconds = milliseconds.max(0) / 1000;
    let seconds = total_seconds % 60;
    let minutes = (total_seconds / 60) % 60;
    let hours = total_seconds / 3600;

    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes}:{seconds:02}")
    }
}

/// Strips markup tags from long-text fields.
///
/// Tags are replaced with spaces so adjacent words stay separated, then
/// whitespace runs are collapsed.
pub fn strip_markup(text: &str) -> String {
    let mut stripped = String::with_capacity(text.len());
    let mut in_tag = false;

    for ch in text.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                stripped.push(' ');
            }
            _ if in_tag => {}
            _ => stripped.push(ch),
        }
    }

    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_format_without_leading_zero_components() {
        assert_eq!(format_duration(45_000), "0:45");
        assert_eq!(format_duration(65_000), "1:05");
        assert_eq!(format_duration(3_665_000), "1:01:05");
    }

    #[test]
    fn duration_edges() {
        assert_eq!(format_duration(0), "0:00");
        assert_eq!(format_duration(999), "0:00");
        assert_eq!(format_duration(3_600_000), "1:00:00");
        assert_eq!(format_duration(36_065_000), "10:01:05");
    }

    #[test]
    fn markup_is_stripped_and_whitespace_collapsed() {
        assert_eq!(
            strip_markup("<p>Sitting on a <b>park bench</b></p><br>eyeing little girls"),
            "Sitting on a park bench eyeing little girls"
        );
        assert_eq!(strip_markup("plain text"), "plain text");
        assert_eq!(strip_markup("<br/><br/>"), "");
    }
}

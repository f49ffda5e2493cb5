use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::info;

use crate::destination::base::{Destination, IndexSpec};
use crate::error::{ErrorKind, MigrationResult};
use crate::migration_error;
use crate::types::document::ID_FIELD;
use crate::types::{CanonicalId, Document};

#[derive(Debug, Default)]
struct Inner {
    collections: HashMap<String, Vec<Document>>,
    /// Index definitions survive a reset, like they do on a real store where
    /// reset clears records rather than dropping the namespace.
    indexes: HashMap<String, Vec<IndexSpec>>,
}

/// In-memory destination for testing and development purposes.
///
/// [`MemoryDestination`] stores all reloaded records in memory and enforces
/// the identifier and unique-index constraints a real target store would, so
/// conflict handling can be exercised without external infrastructure.
#[derive(Debug, Clone, Default)]
pub struct MemoryDestination {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryDestination {
    /// Creates a new empty destination.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of all records in a collection, in insertion order.
    ///
    /// Useful for verification in tests; an absent collection reads as empty.
    pub async fn documents(&self, collection: &str) -> Vec<Document> {
        let inner = self.inner.lock().await;
        inner.collections.get(collection).cloned().unwrap_or_default()
    }

    /// Returns the index definitions of a collection.
    pub async fn indexes(&self, collection: &str) -> Vec<IndexSpec> {
        let inner = self.inner.lock().await;
        inner.indexes.get(collection).cloned().unwrap_or_default()
    }
}

impl Destination for MemoryDestination {
    fn name() -> &'static str {
        "memory"
    }

    async fn reset(&self, collection: &str) -> MigrationResult<()> {
        let mut inner = self.inner.lock().await;

        match inner.collections.remove(collection) {
            Some(records) => info!(collection, records = records.len(), "reset collection"),
            None => info!(collection, "reset absent collection"),
        }

        Ok(())
    }

    async fn create_index(&self, collection: &str, index: &IndexSpec) -> MigrationResult<()> {
        let mut inner = self.inner.lock().await;

        let indexes = inner.indexes.entry(collection.to_owned()).or_default();
        if indexes.iter().any(|existing| existing.name == index.name) {
            return Err(migration_error!(
                ErrorKind::IndexAlreadyExists,
                "Index already exists",
                format!("index '{}' on collection '{collection}'", index.name)
            ));
        }

        indexes.push(index.clone());

        Ok(())
    }

    async fn insert(&self, collection: &str, document: Document) -> MigrationResult<()> {
        let mut inner = self.inner.lock().await;
        let inner = &mut *inner;

        let unique_fields: Vec<Vec<String>> = inner
            .indexes
            .get(collection)
            .map(|indexes| {
                indexes
                    .iter()
                    .filter(|index| index.unique)
                    .map(|index| index.fields.clone())
                    .collect()
            })
            .unwrap_or_default();

        let records = inner.collections.entry(collection.to_owned()).or_default();

        for existing in records.iter() {
            if let (Some(a), Some(b)) = (existing.get(ID_FIELD), document.get(ID_FIELD))
                && a == b
            {
                return Err(migration_error!(
                    ErrorKind::DestinationConflict,
                    "Duplicate record identifier",
                    format!("collection '{collection}', {ID_FIELD} {b}")
                ));
            }

            for fields in &unique_fields {
                if let (Some(a), Some(b)) = (key_of(existing, fields), key_of(&document, fields))
                    && a == b
                {
                    return Err(migration_error!(
                        ErrorKind::DestinationConflict,
                        "Duplicate natural key",
                        format!("collection '{collection}', key {a:?}")
                    ));
                }
            }
        }

        records.push(document);

        Ok(())
    }

    async fn find_by_id(
        &self,
        collection: &str,
        id: &CanonicalId,
    ) -> MigrationResult<Option<Document>> {
        let inner = self.inner.lock().await;

        let wanted = id.to_value();
        let found = inner.collections.get(collection).and_then(|records| {
            records
                .iter()
                .find(|record| record.get(ID_FIELD) == Some(&wanted))
                .cloned()
        });

        Ok(found)
    }
}

/// Extracts the value tuple of an index key from a record.
///
/// Returns `None` when any field path is absent, in which case the record
/// does not participate in the uniqueness check.
fn key_of(document: &Document, fields: &[String]) -> Option<Vec<Value>> {
    fields
        .iter()
        .map(|path| lookup_path(document, path).cloned())
        .collect()
}

/// Walks a dotted field path through nested objects.
fn lookup_path<'a>(document: &'a Document, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;

    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }

    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        Document::try_from(value).unwrap()
    }

    #[tokio::test]
    async fn duplicate_identifier_is_a_conflict() {
        let destination = MemoryDestination::new();

        destination
            .insert("songs", doc(json!({ "_id": "1", "title": "a" })))
            .await
            .unwrap();
        let err = destination
            .insert("songs", doc(json!({ "_id": "1", "title": "b" })))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::DestinationConflict);
        assert_eq!(destination.documents("songs").await.len(), 1);
    }

    #[tokio::test]
    async fn unique_compound_index_is_enforced() {
        let destination = MemoryDestination::new();
        destination
            .create_index(
                "usercomments",
                &IndexSpec::unique("user_comment", ["_id.user", "_id.comment"]),
            )
            .await
            .unwrap();

        destination
            .insert(
                "usercomments",
                doc(json!({ "_id": { "user": "7", "comment": "1" }, "like": true })),
            )
            .await
            .unwrap();
        let err = destination
            .insert(
                "usercomments",
                doc(json!({ "_id": { "user": "7", "comment": "1" }, "like": true })),
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::DestinationConflict);
    }

    #[tokio::test]
    async fn reset_is_idempotent_and_tolerates_absence() {
        let destination = MemoryDestination::new();

        destination.reset("songs").await.unwrap();

        destination
            .insert("songs", doc(json!({ "_id": "1" })))
            .await
            .unwrap();
        destination.reset("songs").await.unwrap();
        destination.reset("songs").await.unwrap();

        assert!(destination.documents("songs").await.is_empty());
    }

    #[tokio::test]
    async fn recreating_an_index_reports_already_exists() {
        let destination = MemoryDestination::new();
        let index = IndexSpec::non_unique("by_artist", ["artist"]);

        destination.create_index("songs", &index).await.unwrap();
        let err = destination.create_index("songs", &index).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::IndexAlreadyExists);
    }

    #[tokio::test]
    async fn find_by_id_reads_back_canonical_records() {
        let destination = MemoryDestination::new();
        destination
            .insert("artists", doc(json!({ "_id": "42", "name": "Jethro Tull" })))
            .await
            .unwrap();

        let found = destination
            .find_by_id("artists", &CanonicalId::from(42))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.get("name"), Some(&json!("Jethro Tull")));

        let missing = destination
            .find_by_id("artists", &CanonicalId::from(1))
            .await
            .unwrap();
        assert!(missing.is_none());
    }
}

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use futures::StreamExt;
use futures::stream;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::error::MigrationResult;
use crate::source::base::{DocumentStream, IdPredicate, ReferenceFilter, SourceStore};
use crate::types::{Document, NativeId};

#[derive(Debug, Default)]
struct Inner {
    /// Collections keyed by name; records ordered by native id.
    collections: HashMap<String, BTreeMap<NativeId, Document>>,
}

/// In-memory source store for testing and development purposes.
///
/// Seeded with documents up front, then read by the pipeline exactly like a
/// real source: cursors stream records in ascending native-id order and
/// count queries scan reference fields.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    inner: Arc<Mutex<Inner>>,
}

impl MemorySource {
    /// Creates a new empty source store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds one record, keyed by its native id.
    pub async fn insert(&self, collection: &str, document: Document) -> MigrationResult<()> {
        let id = document.native_id()?;

        let mut inner = self.inner.lock().await;
        inner
            .collections
            .entry(collection.to_owned())
            .or_default()
            .insert(id, document);

        Ok(())
    }

    /// Seeds a batch of records.
    pub async fn extend<I>(&self, collection: &str, documents: I) -> MigrationResult<()>
    where
        I: IntoIterator<Item = Document>,
    {
        for document in documents {
            self.insert(collection, document).await?;
        }

        Ok(())
    }
}

impl SourceStore for MemorySource {
    async fn stream_documents(
        &self,
        collection: &str,
        predicate: IdPredicate,
    ) -> MigrationResult<DocumentStream> {
        let inner = self.inner.lock().await;

        // BTreeMap iteration gives the cursor's natural ascending-id order.
        let matching: Vec<Document> = inner
            .collections
            .get(collection)
            .map(|records| {
                records
                    .iter()
                    .filter(|(id, _)| predicate.matches(**id))
                    .map(|(_, document)| document.clone())
                    .collect()
            })
            .unwrap_or_default();

        Ok(stream::iter(matching.into_iter().map(Ok)).boxed())
    }

    async fn count_documents(
        &self,
        collection: &str,
        filter: ReferenceFilter,
    ) -> MigrationResult<u64> {
        let inner = self.inner.lock().await;

        let Some(records) = inner.collections.get(collection) else {
            return Ok(0);
        };

        let count = records
            .values()
            .filter(|document| reference_matches(document, &filter))
            .count();

        Ok(count as u64)
    }
}

/// Returns whether a record's `reference` field matches the filter.
fn reference_matches(document: &Document, filter: &ReferenceFilter) -> bool {
    let Some(Value::Object(reference)) = document.get("reference") else {
        return false;
    };

    let collection_matches = reference
        .get("collection")
        .and_then(Value::as_str)
        .is_some_and(|collection| collection == filter.collection);
    let id_matches = reference
        .get("id")
        .and_then(Value::as_i64)
        .is_some_and(|id| id == filter.id);

    collection_matches && id_matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        Document::try_from(value).unwrap()
    }

    #[tokio::test]
    async fn cursor_streams_matching_records_in_id_order() {
        let source = MemorySource::new();
        source
            .extend(
                "songs",
                [
                    doc(json!({ "_id": 150_000, "title": "late" })),
                    doc(json!({ "_id": 2, "title": "early" })),
                    doc(json!({ "_id": 9, "title": "excluded" })),
                ],
            )
            .await
            .unwrap();

        let stream = source
            .stream_documents("songs", IdPredicate::ranges([(1, 5), (150_000, 150_005)]))
            .await
            .unwrap();
        let records: Vec<Document> = stream.try_collect().await.unwrap();

        let ids: Vec<NativeId> = records.iter().map(|r| r.native_id().unwrap()).collect();
        assert_eq!(ids, vec![2, 150_000]);
    }

    #[tokio::test]
    async fn absent_collection_yields_an_empty_cursor() {
        let source = MemorySource::new();
        let stream = source
            .stream_documents("missing", IdPredicate::All)
            .await
            .unwrap();
        let records: Vec<Document> = stream.try_collect().await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn count_filters_on_reference_collection_and_id() {
        let source = MemorySource::new();
        source
            .extend(
                "comments",
                [
                    doc(json!({ "_id": 1, "reference": { "collection": "songs", "id": 7 } })),
                    doc(json!({ "_id": 2, "reference": { "collection": "songs", "id": 7 } })),
                    doc(json!({ "_id": 3, "reference": { "collection": "songs", "id": 8 } })),
                    doc(json!({ "_id": 4, "reference": { "collection": "artists", "id": 7 } })),
                    doc(json!({ "_id": 5 })),
                ],
            )
            .await
            .unwrap();

        let count = source
            .count_documents(
                "comments",
                ReferenceFilter {
                    collection: "songs".to_owned(),
                    id: 7,
                },
            )
            .await
            .unwrap();

        assert_eq!(count, 2);
    }
}

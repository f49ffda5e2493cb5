use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use crate::error::{ErrorKind, MigrationResult};
use crate::migration_error;
use crate::search::base::{IndexSchema, SearchDocument, SearchSink};
use crate::types::Document;

#[derive(Debug)]
struct Index {
    schema: IndexSchema,
    documents: BTreeMap<String, Document>,
}

#[derive(Debug, Default)]
struct Inner {
    indexes: HashMap<String, Index>,
}

/// In-memory search sink for testing and development purposes.
///
/// Indexes keep their declared schema and the latest projection per
/// canonical identifier, so tests can verify both the analysis declaration
/// and the upserted bodies.
#[derive(Debug, Clone, Default)]
pub struct MemorySearchSink {
    inner: Arc<Mutex<Inner>>,
}

impl MemorySearchSink {
    /// Creates a new sink with no indexes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the schema an index was created with.
    pub async fn schema(&self, index: &str) -> Option<IndexSchema> {
        let inner = self.inner.lock().await;
        inner.indexes.get(index).map(|index| index.schema.clone())
    }

    /// Returns all projections of an index, keyed by canonical id.
    pub async fn documents(&self, index: &str) -> BTreeMap<String, Document> {
        let inner = self.inner.lock().await;
        inner
            .indexes
            .get(index)
            .map(|index| index.documents.clone())
            .unwrap_or_default()
    }
}

impl SearchSink for MemorySearchSink {
    fn name() -> &'static str {
        "memory"
    }

    async fn delete_index(&self, index: &str) -> MigrationResult<()> {
        let mut inner = self.inner.lock().await;

        match inner.indexes.remove(index) {
            Some(dropped) => info!(index, documents = dropped.documents.len(), "deleted index"),
            None => info!(index, "deleted absent index"),
        }

        Ok(())
    }

    async fn create_index(&self, index: &str, schema: &IndexSchema) -> MigrationResult<()> {
        let mut inner = self.inner.lock().await;

        if inner.indexes.contains_key(index) {
            return Err(migration_error!(
                ErrorKind::SearchIndexFailed,
                "Search index already exists",
                format!("index '{index}'")
            ));
        }

        inner.indexes.insert(
            index.to_owned(),
            Index {
                schema: schema.clone(),
                documents: BTreeMap::new(),
            },
        );

        Ok(())
    }

    async fn upsert(&self, index: &str, document: SearchDocument) -> MigrationResult<()> {
        let mut inner = self.inner.lock().await;

        let Some(entry) = inner.indexes.get_mut(index) else {
            return Err(migration_error!(
                ErrorKind::SearchIndexFailed,
                "Search index does not exist",
                format!("index '{index}'")
            ));
        };

        entry
            .documents
            .insert(document.id.as_str().to_owned(), document.body);

        Ok(())
    }
}

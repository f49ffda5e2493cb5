use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::MigrationResult;
use crate::types::{CanonicalId, Document};

/// Specification of one supporting index on a destination collection.
///
/// Fields are dotted paths into the record, so compound keys over nested
/// objects (`_id.user`, `_id.comment`) can be expressed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub name: String,
    pub fields: Vec<String>,
    pub unique: bool,
}

impl IndexSpec {
    /// Builds a uniqueness constraint over the given field paths.
    pub fn unique<I, F>(name: &str, fields: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<String>,
    {
        Self {
            name: name.to_owned(),
            fields: fields.into_iter().map(Into::into).collect(),
            unique: true,
        }
    }

    /// Builds a plain (non-unique) index over the given field paths.
    pub fn non_unique<I, F>(name: &str, fields: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<String>,
    {
        Self {
            unique: false,
            ..Self::unique(name, fields)
        }
    }
}

/// Trait for the target store that receives the reloaded records.
///
/// Destinations are partitioned by collection name: each collection is reset
/// and then exclusively populated by exactly one job, so implementations do
/// not need a locking discipline across jobs. Handles are pre-established by
/// the embedding process and injected into the pipeline.
pub trait Destination {
    /// Returns the name of the destination, for logging.
    fn name() -> &'static str;

    /// Idempotently clears prior contents of a collection.
    ///
    /// The absence of the collection is not an error; a job must be safely
    /// re-runnable against a destination in any prior state.
    fn reset(&self, collection: &str) -> impl Future<Output = MigrationResult<()>> + Send;

    /// Establishes one supporting index on a collection.
    ///
    /// May fail with [`crate::error::ErrorKind::IndexAlreadyExists`] when the
    /// index survived an earlier run; callers treat that as an expected,
    /// non-fatal condition.
    fn create_index(
        &self,
        collection: &str,
        index: &IndexSpec,
    ) -> impl Future<Output = MigrationResult<()>> + Send;

    /// Persists one transformed or child record.
    ///
    /// A uniqueness violation (duplicate canonical identifier or duplicate
    /// natural key) fails with [`crate::error::ErrorKind::DestinationConflict`],
    /// scoped to the offending record.
    fn insert(
        &self,
        collection: &str,
        document: Document,
    ) -> impl Future<Output = MigrationResult<()>> + Send;

    /// Reads back one record by canonical identifier.
    ///
    /// Serves cross-entity joins for the search projection; jobs only read
    /// collections owned by entities they declared a dependency on.
    fn find_by_id(
        &self,
        collection: &str,
        id: &CanonicalId,
    ) -> impl Future<Output = MigrationResult<Option<Document>>> + Send;
}

use std::future::Future;

use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::error::MigrationResult;
use crate::types::{Document, NativeId};

/// Lazy, forward-only, single-pass sequence of source records.
///
/// The stream is finite (bounded by the predicate's match count) and not
/// restartable once exhausted. Implementations must not buffer the whole
/// result set eagerly on behalf of the caller.
pub type DocumentStream = BoxStream<'static, MigrationResult<Document>>;

/// Closed, inclusive range over native identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdRange {
    pub start: NativeId,
    pub end: NativeId,
}

impl IdRange {
    pub fn new(start: NativeId, end: NativeId) -> Self {
        Self { start, end }
    }

    /// Returns whether the id falls within the range, bounds included.
    pub fn contains(&self, id: NativeId) -> bool {
        self.start <= id && id <= self.end
    }
}

/// Selection predicate over the native identifier.
///
/// Predicates are set-valued (a union of closed ranges) rather than free-form
/// queries: a bounded reload selects identifier ranges, it does not filter
/// continuously.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdPredicate {
    /// Matches every record of the collection.
    All,
    /// Matches any record whose id falls in one of the ranges.
    Ranges(Vec<IdRange>),
}

impl IdPredicate {
    /// Builds a union-of-ranges predicate from `(start, end)` pairs.
    pub fn ranges<I>(ranges: I) -> Self
    where
        I: IntoIterator<Item = (NativeId, NativeId)>,
    {
        Self::Ranges(
            ranges
                .into_iter()
                .map(|(start, end)| IdRange::new(start, end))
                .collect(),
        )
    }

    /// Returns whether the predicate selects the given id.
    pub fn matches(&self, id: NativeId) -> bool {
        match self {
            IdPredicate::All => true,
            IdPredicate::Ranges(ranges) => ranges.iter().any(|range| range.contains(id)),
        }
    }
}

/// Equality filter for the source count operation.
///
/// Selects records whose `reference.collection` and `reference.id` fields
/// equal the given values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceFilter {
    pub collection: String,
    pub id: NativeId,
}

/// Trait for the read-only legacy store the pipeline reloads from.
///
/// The source is shared by all jobs without coordination; no operation
/// writes. Handles are pre-established by the embedding process and injected
/// into the pipeline.
pub trait SourceStore {
    /// Opens a cursor over one collection.
    ///
    /// Records are yielded in ascending native-id order. A collection that
    /// does not exist yields an empty stream, matching the behavior of a
    /// query against an absent collection in the legacy store.
    fn stream_documents(
        &self,
        collection: &str,
        predicate: IdPredicate,
    ) -> impl Future<Output = MigrationResult<DocumentStream>> + Send;

    /// Counts records matching a reference filter.
    ///
    /// Serves derived-aggregate resolution during transforms.
    fn count_documents(
        &self,
        collection: &str,
        filter: ReferenceFilter,
    ) -> impl Future<Output = MigrationResult<u64>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_bounds_are_inclusive() {
        let range = IdRange::new(1, 50);
        assert!(range.contains(1));
        assert!(range.contains(50));
        assert!(!range.contains(0));
        assert!(!range.contains(51));
    }

    #[test]
    fn predicate_matches_the_union_of_ranges() {
        let predicate = IdPredicate::ranges([(1, 5), (150_000, 150_005)]);
        assert!(predicate.matches(3));
        assert!(predicate.matches(150_000));
        assert!(!predicate.matches(6));
        assert!(!predicate.matches(149_999));

        assert!(IdPredicate::All.matches(NativeId::MIN));
    }
}

//! Derived-aggregate resolution against the source store.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::source::{ReferenceFilter, SourceStore};
use crate::types::NativeId;

/// Rule for a scalar derived by counting related source records.
///
/// The count is resolved per record, at transform time, with a live query —
/// the source never pre-stores it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateRule {
    /// Source collection whose records are counted.
    pub count_collection: String,
    /// Value the counted records' `reference.collection` must carry, i.e.
    /// the owning entity's source collection.
    pub reference_collection: String,
    /// Field receiving the count on the transformed record.
    pub target_field: String,
}

impl AggregateRule {
    /// Builds the usual comment-count rule for an entity.
    pub fn comment_count(reference_collection: &str, target_field: &str) -> Self {
        Self {
            count_collection: "comments".to_owned(),
            reference_collection: reference_collection.to_owned(),
            target_field: target_field.to_owned(),
        }
    }
}

/// Resolves one aggregate for one owning record.
///
/// Returns `None` when the count is zero, so the field is omitted rather
/// than written as 0, and also on query failure: a resolution failure is
/// logged and never aborts the record's transform.
pub async fn resolve_aggregate<S: SourceStore>(
    source: &S,
    rule: &AggregateRule,
    owner: NativeId,
) -> Option<u64> {
    let filter = ReferenceFilter {
        collection: rule.reference_collection.clone(),
        id: owner,
    };

    match source.count_documents(&rule.count_collection, filter).await {
        Ok(0) => None,
        Ok(count) => Some(count),
        Err(error) => {
            warn!(
                owner,
                collection = %rule.count_collection,
                error = %error,
                "aggregate resolution failed, treating as absent"
            );
            None
        }
    }
}

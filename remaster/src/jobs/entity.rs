use futures::StreamExt;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::destination::{Destination, IndexSpec};
use crate::error::{ErrorKind, MigrationError, MigrationResult};
use crate::jobs::spec::{ConflictPolicy, JobSpec};
use crate::search::{SearchSink, project};
use crate::source::SourceStore;
use crate::transform::{expand, resolve_aggregate, transform};
use crate::types::{CanonicalId, Document};

/// Counters accumulated over one job run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobStats {
    /// Records read from the source cursor.
    pub records_read: u64,
    /// Parent records persisted to the primary destination.
    pub records_written: u64,
    /// Records whose processing was abandoned after a record-scoped error
    /// under [`ConflictPolicy::SkipAndLog`].
    pub records_skipped: u64,
    /// Child records persisted to the companion destination.
    pub children_written: u64,
    /// Projections upserted into the search index.
    pub projections_written: u64,
    /// Projections dropped after a secondary-sink failure.
    pub projections_failed: u64,
}

/// One migration job, scoped to a single entity and its destination(s).
///
/// The job streams matching source records, transforms each, resolves
/// aggregates, fans relation lists out into child records, persists to the
/// primary destination, and best-effort projects into the search sink.
#[derive(Debug)]
pub struct EntityJob<S, D, X> {
    spec: JobSpec,
    source: S,
    destination: D,
    search: X,
}

impl<S, D, X> EntityJob<S, D, X>
where
    S: SourceStore + Send + Sync + 'static,
    D: Destination + Send + Sync + 'static,
    X: SearchSink + Send + Sync + 'static,
{
    pub fn new(spec: JobSpec, source: S, destination: D, search: X) -> Self {
        Self {
            spec,
            source,
            destination,
            search,
        }
    }

    /// Runs the job to completion.
    ///
    /// Record-scoped failures are handled per the descriptor's conflict
    /// policy; anything else fails the job. Secondary-sink failures never
    /// do.
    pub async fn run(self) -> MigrationResult<JobStats> {
        let Self {
            spec,
            source,
            destination,
            search,
        } = self;

        info!(entity = %spec.entity, destination = %spec.destination, "starting job");

        destination.reset(&spec.destination).await?;
        for index in &spec.indexes {
            provision_index(&destination, &spec.destination, index).await?;
        }

        if let Some(fan_out) = &spec.fan_out {
            destination.reset(&fan_out.companion).await?;
            for index in &fan_out.indexes {
                provision_index(&destination, &fan_out.companion, index).await?;
            }
        }

        // The search index is reset up front; when that fails the job keeps
        // going without projections, since the secondary sink must never
        // block the primary one.
        let mut search_ready = false;
        if let Some(projection) = &spec.projection {
            let reset = match search.delete_index(&projection.index).await {
                Ok(()) => search.create_index(&projection.index, &projection.schema).await,
                Err(error) => Err(error),
            };

            match reset {
                Ok(()) => search_ready = true,
                Err(error) => {
                    warn!(
                        entity = %spec.entity,
                        index = %projection.index,
                        error = %error,
                        "search index reset failed, continuing without projections"
                    );
                }
            }
        }

        let mut stats = JobStats::default();
        let mut cursor = source
            .stream_documents(&spec.source_collection, spec.predicate.clone())
            .await?;

        while let Some(record) = cursor.next().await {
            let record = record?;
            stats.records_read += 1;

            let result = process_record(
                &spec,
                &source,
                &destination,
                &search,
                search_ready,
                &record,
                &mut stats,
            )
            .await;

            if let Err(error) = result {
                if !is_record_scoped(&error) {
                    return Err(error);
                }

                match spec.conflict_policy {
                    ConflictPolicy::SkipAndLog => {
                        warn!(entity = %spec.entity, error = %error, "skipping record");
                        stats.records_skipped += 1;
                    }
                    ConflictPolicy::FailJob => return Err(error),
                }
            }
        }

        info!(
            entity = %spec.entity,
            records_read = stats.records_read,
            records_written = stats.records_written,
            records_skipped = stats.records_skipped,
            children_written = stats.children_written,
            projections_written = stats.projections_written,
            "completed job"
        );

        Ok(stats)
    }
}

/// Moves one source record through transform, fan-out, and both sinks.
async fn process_record<S, D, X>(
    spec: &JobSpec,
    source: &S,
    destination: &D,
    search: &X,
    search_ready: bool,
    record: &Document,
    stats: &mut JobStats,
) -> MigrationResult<()>
where
    S: SourceStore + Send + Sync,
    D: Destination + Send + Sync,
    X: SearchSink + Send + Sync,
{
    let native = record.native_id()?;
    let canonical = CanonicalId::from(native);

    let mut transformed = transform(record, &spec.rules)?;

    if let Some(rule) = &spec.aggregate
        && let Some(count) = resolve_aggregate(source, rule, native).await
    {
        transformed.insert(rule.target_field.clone(), Value::from(count));
    }

    let mut children = Vec::new();
    if let Some(rule) = &spec.fan_out {
        let fan_out = expand(rule, record, &canonical)?;
        if let Some(count) = fan_out.count {
            transformed.insert(rule.count_field.clone(), Value::from(count));
        }
        children = fan_out.children;
    }

    destination
        .insert(&spec.destination, transformed.clone())
        .await?;
    stats.records_written += 1;

    if let Some(rule) = &spec.fan_out {
        for child in children {
            destination.insert(&rule.companion, child).await?;
            stats.children_written += 1;
        }
    }

    if search_ready && let Some(projection) = &spec.projection {
        match project(projection, &transformed, destination).await {
            Ok(document) => match search.upsert(&projection.index, document).await {
                Ok(()) => stats.projections_written += 1,
                Err(error) => {
                    warn!(
                        entity = %spec.entity,
                        id = %canonical,
                        error = %error,
                        "projection upsert failed, skipping"
                    );
                    stats.projections_failed += 1;
                }
            },
            Err(error) => {
                warn!(
                    entity = %spec.entity,
                    id = %canonical,
                    error = %error,
                    "projection derivation failed, skipping"
                );
                stats.projections_failed += 1;
            }
        }
    }

    Ok(())
}

/// Establishes one index, treating prior existence as already done.
async fn provision_index<D: Destination>(
    destination: &D,
    collection: &str,
    index: &IndexSpec,
) -> MigrationResult<()> {
    match destination.create_index(collection, index).await {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == ErrorKind::IndexAlreadyExists => {
            debug!(collection, index = %index.name, "index already exists, continuing");
            Ok(())
        }
        Err(error) => Err(error),
    }
}

/// Returns whether an error is scoped to a single record rather than to the
/// whole job.
fn is_record_scoped(error: &MigrationError) -> bool {
    matches!(
        error.kind(),
        ErrorKind::DestinationConflict | ErrorKind::InvalidData | ErrorKind::ConversionError
    )
}

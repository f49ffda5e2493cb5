//! The reload run orchestrator.
//!
//! Jobs form a directed acyclic graph by declared data dependency: every job
//! is started as soon as all entities it `depends_on` are terminal, and runs
//! concurrently with everything else that is eligible. One job's failure is
//! recorded and never cancels siblings; the run report carries every job's
//! outcome and timing.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::bail;
use crate::destination::Destination;
use crate::error::{ErrorKind, MigrationError, MigrationResult};
use crate::jobs::{EntityJob, JobPool, JobSpec, JobStats};
use crate::search::SearchSink;
use crate::source::SourceStore;
use crate::types::RunId;

/// Terminal record of one job.
#[derive(Debug)]
pub struct JobReport {
    pub entity: String,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    pub outcome: MigrationResult<JobStats>,
}

impl JobReport {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Aggregate record of one reload run.
///
/// The run itself completes even when jobs fail; failures stay observable
/// here and can be collapsed into a single aggregated error with
/// [`RunReport::into_result`].
#[derive(Debug)]
pub struct RunReport {
    pub id: RunId,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    pub jobs: Vec<JobReport>,
}

impl RunReport {
    /// Returns the report of one entity's job.
    pub fn job(&self, entity: &str) -> Option<&JobReport> {
        self.jobs.iter().find(|job| job.entity == entity)
    }

    /// Returns the reports of all failed jobs.
    pub fn failures(&self) -> Vec<&JobReport> {
        self.jobs.iter().filter(|job| !job.is_success()).collect()
    }

    /// Collapses per-job failures into one aggregated error.
    pub fn into_result(self) -> MigrationResult<RunReport> {
        let errors: Vec<MigrationError> = self
            .jobs
            .iter()
            .filter_map(|job| job.outcome.as_ref().err().cloned())
            .collect();

        if errors.is_empty() {
            Ok(self)
        } else {
            Err(errors.into())
        }
    }
}

/// One reload run over a fixed list of job descriptors.
#[derive(Debug)]
pub struct Pipeline<S, D, X> {
    id: RunId,
    jobs: Vec<JobSpec>,
    source: S,
    destination: D,
    search: X,
}

impl<S, D, X> Pipeline<S, D, X>
where
    S: SourceStore + Clone + Send + Sync + 'static,
    D: Destination + Clone + Send + Sync + 'static,
    X: SearchSink + Clone + Send + Sync + 'static,
{
    /// Creates a run over pre-established collaborator handles.
    pub fn new(id: RunId, jobs: Vec<JobSpec>, source: S, destination: D, search: X) -> Self {
        Self {
            id,
            jobs,
            source,
            destination,
            search,
        }
    }

    pub fn id(&self) -> RunId {
        self.id
    }

    /// Runs every job to a terminal state and returns the run report.
    ///
    /// Fails up front on an invalid job graph; after that point only the
    /// report records failures, never an early return.
    pub async fn run(self) -> MigrationResult<RunReport> {
        let Self {
            id,
            jobs,
            source,
            destination,
            search,
        } = self;

        let started_at = Utc::now();
        let clock = Instant::now();
        info!(run_id = id, jobs = jobs.len(), "starting reload run");

        validate_graph(&jobs)?;

        let mut pending = jobs;
        let mut terminal: HashSet<String> = HashSet::new();
        let mut failed: HashSet<String> = HashSet::new();
        let mut starts: HashMap<String, (DateTime<Utc>, Instant)> = HashMap::new();
        let mut pool = JobPool::new();
        let mut reports = Vec::new();

        loop {
            // Start everything whose dependencies are terminal.
            let mut index = 0;
            while index < pending.len() {
                let eligible = pending[index]
                    .depends_on
                    .iter()
                    .all(|dep| terminal.contains(dep));
                if !eligible {
                    index += 1;
                    continue;
                }

                let spec = pending.swap_remove(index);
                for dep in &spec.depends_on {
                    if failed.contains(dep) {
                        warn!(
                            entity = %spec.entity,
                            dependency = %dep,
                            "starting job whose dependency failed, joins may degrade"
                        );
                    }
                }

                let entity = spec.entity.clone();
                starts.insert(entity.clone(), (Utc::now(), Instant::now()));

                let job = EntityJob::new(
                    spec,
                    source.clone(),
                    destination.clone(),
                    search.clone(),
                );
                pool.spawn(entity, job.run());
            }

            let Some((entity, outcome)) = pool.join_next().await else {
                break;
            };

            let (job_started_at, job_clock) = starts
                .remove(&entity)
                .expect("job terminated without being started");
            let elapsed = job_clock.elapsed();

            match &outcome {
                Ok(stats) => info!(
                    entity = %entity,
                    elapsed_ms = elapsed.as_millis() as u64,
                    records_written = stats.records_written,
                    "job completed"
                ),
                Err(job_error) => error!(
                    entity = %entity,
                    elapsed_ms = elapsed.as_millis() as u64,
                    error = %job_error,
                    "job failed"
                ),
            }

            if outcome.is_err() {
                failed.insert(entity.clone());
            }
            terminal.insert(entity.clone());
            reports.push(JobReport {
                entity,
                started_at: job_started_at,
                elapsed,
                outcome,
            });
        }

        if !pending.is_empty() {
            // Cycle validation makes this unreachable; failing loudly beats
            // silently dropping jobs if it ever regresses.
            bail!(
                ErrorKind::InvalidState,
                "Jobs left unscheduled after the run",
                format!("{} job(s) never became eligible", pending.len())
            );
        }

        let elapsed = clock.elapsed();
        info!(
            run_id = id,
            elapsed_ms = elapsed.as_millis() as u64,
            jobs = reports.len(),
            failures = reports.iter().filter(|job| !job.is_success()).count(),
            "completed reload run"
        );

        Ok(RunReport {
            id,
            started_at,
            elapsed,
            jobs: reports,
        })
    }
}

/// Validates the declared job graph before anything is started.
fn validate_graph(jobs: &[JobSpec]) -> MigrationResult<()> {
    let mut entities: HashSet<&str> = HashSet::new();
    for job in jobs {
        if !entities.insert(job.entity.as_str()) {
            bail!(
                ErrorKind::ConfigError,
                "Duplicate job entity",
                format!("entity '{}' is declared twice", job.entity)
            );
        }
    }

    for job in jobs {
        for dep in &job.depends_on {
            if dep == &job.entity {
                bail!(
                    ErrorKind::ConfigError,
                    "Job depends on itself",
                    format!("entity '{}'", job.entity)
                );
            }
            if !entities.contains(dep.as_str()) {
                bail!(
                    ErrorKind::ConfigError,
                    "Unknown job dependency",
                    format!("entity '{}' depends on undeclared '{dep}'", job.entity)
                );
            }
        }
    }

    // Kahn's algorithm over the declared edges; anything left unscheduled
    // sits on a cycle.
    let mut dependencies: HashMap<&str, HashSet<&str>> = HashMap::new();
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
    for job in jobs {
        let deps: HashSet<&str> = job.depends_on.iter().map(String::as_str).collect();
        for &dep in &deps {
            dependents.entry(dep).or_default().push(job.entity.as_str());
        }
        dependencies.insert(job.entity.as_str(), deps);
    }

    let mut ready: Vec<&str> = dependencies
        .iter()
        .filter(|(_, deps)| deps.is_empty())
        .map(|(entity, _)| *entity)
        .collect();
    let mut scheduled = 0usize;

    while let Some(entity) = ready.pop() {
        scheduled += 1;
        for &dependent in dependents.get(entity).into_iter().flatten() {
            let deps = dependencies
                .get_mut(dependent)
                .expect("dependent is a declared job");
            deps.remove(entity);
            if deps.is_empty() {
                ready.push(dependent);
            }
        }
    }

    if scheduled != jobs.len() {
        bail!(
            ErrorKind::ConfigError,
            "Dependency cycle between jobs",
            format!("{} job(s) sit on a cycle", jobs.len() - scheduled)
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(entity: &str, deps: &[&str]) -> JobSpec {
        let mut spec = JobSpec::new(entity, entity, entity);
        for dep in deps {
            spec = spec.depends_on(dep);
        }
        spec
    }

    #[test]
    fn valid_graphs_pass() {
        let jobs = vec![
            spec("artists", &[]),
            spec("users", &[]),
            spec("songs", &["artists", "users"]),
        ];
        assert!(validate_graph(&jobs).is_ok());
    }

    #[test]
    fn unknown_dependency_is_a_config_error() {
        let jobs = vec![spec("songs", &["artists"])];
        let err = validate_graph(&jobs).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigError);
    }

    #[test]
    fn cycles_are_a_config_error() {
        let jobs = vec![spec("a", &["b"]), spec("b", &["a"])];
        let err = validate_graph(&jobs).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigError);
    }

    #[test]
    fn self_dependency_is_a_config_error() {
        let jobs = vec![spec("a", &["a"])];
        let err = validate_graph(&jobs).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigError);
    }

    #[test]
    fn duplicate_entities_are_a_config_error() {
        let jobs = vec![spec("a", &[]), spec("a", &[])];
        let err = validate_graph(&jobs).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigError);
    }
}

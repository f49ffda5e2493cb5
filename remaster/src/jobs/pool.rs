use std::collections::HashMap;
use std::future::Future;

use tokio::task::{Id, JoinSet};
use tracing::debug;

use crate::error::{ErrorKind, MigrationResult};
use crate::jobs::entity::JobStats;
use crate::migration_error;

/// Pool owning the spawned job tasks.
///
/// Jobs are spawned as they become eligible and joined one at a time as they
/// reach a terminal state. A panicking job surfaces as that job's failure;
/// it never poisons the pool or hangs the run.
#[derive(Debug, Default)]
pub struct JobPool {
    join_set: JoinSet<(String, MigrationResult<JobStats>)>,
    /// Entity names by task id, so a panicked task can still be attributed.
    entities: HashMap<Id, String>,
}

impl JobPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns one job task.
    pub fn spawn<F>(&mut self, entity: String, future: F)
    where
        F: Future<Output = MigrationResult<JobStats>> + Send + 'static,
    {
        let task_entity = entity.clone();
        let handle = self
            .join_set
            .spawn(async move { (task_entity, future.await) });
        self.entities.insert(handle.id(), entity);

        debug!(tasks = self.join_set.len(), "spawned job in pool");
    }

    /// Returns the number of jobs still running.
    pub fn len(&self) -> usize {
        self.join_set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.join_set.is_empty()
    }

    /// Waits for the next job to reach a terminal state.
    ///
    /// Returns `None` once the pool is drained.
    pub async fn join_next(&mut self) -> Option<(String, MigrationResult<JobStats>)> {
        match self.join_set.join_next_with_id().await? {
            Ok((id, (entity, result))) => {
                self.entities.remove(&id);
                Some((entity, result))
            }
            Err(join_error) => {
                let entity = self
                    .entities
                    .remove(&join_error.id())
                    .unwrap_or_else(|| "unknown".to_owned());

                let error = if join_error.is_cancelled() {
                    migration_error!(
                        ErrorKind::InvalidState,
                        "Job task was cancelled",
                        join_error
                    )
                } else {
                    migration_error!(ErrorKind::JobPanic, "Job task panicked", join_error)
                };

                Some((entity, Err(error)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn joins_results_with_their_entity() {
        let mut pool = JobPool::new();
        pool.spawn("artists".to_owned(), async { Ok(JobStats::default()) });

        let (entity, result) = pool.join_next().await.unwrap();
        assert_eq!(entity, "artists");
        assert!(result.is_ok());
        assert!(pool.join_next().await.is_none());
    }

    #[tokio::test]
    async fn a_panicking_job_is_attributed_and_reported() {
        let mut pool = JobPool::new();
        pool.spawn("songs".to_owned(), async { panic!("boom") });
        pool.spawn("artists".to_owned(), async { Ok(JobStats::default()) });

        let mut outcomes = HashMap::new();
        while let Some((entity, result)) = pool.join_next().await {
            outcomes.insert(entity, result);
        }

        assert_eq!(
            outcomes["songs"].as_ref().unwrap_err().kind(),
            ErrorKind::JobPanic
        );
        assert!(outcomes["artists"].is_ok());
    }
}

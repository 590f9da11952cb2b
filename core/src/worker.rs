//! Worker agent
//!
//! A worker repeatedly pulls the oldest pending task, waits the task's
//! suggested operation time, computes the result and pushes it back. The
//! task source is a trait so the same loop can drive an in-process
//! [`CalcService`] or a remote transport.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::config::WorkerConfig;
use crate::error::{CalcError, TaskError};
use crate::interpreter::parse_number;
use crate::services::CalcService;
use crate::types::*;

/// Where a worker gets its tasks from and reports results to
pub trait TaskSource: Send + Sync + 'static {
    fn pull(&self) -> Option<ClaimedTask>;
    fn push(&self, result: TaskResult) -> Result<CompletionOutcome, TaskError>;
}

impl TaskSource for CalcService {
    fn pull(&self) -> Option<ClaimedTask> {
        CalcService::pull(self)
    }

    fn push(&self, result: TaskResult) -> Result<CompletionOutcome, TaskError> {
        CalcService::push(self, result)
    }
}

/// Compute a claimed task's value from its operands
pub fn compute(task: &ClaimedTask) -> Result<f64, CalcError> {
    let left = parse_number(&task.arg1)?;
    let right = parse_number(&task.arg2)?;
    task.operation.apply(left, right)
}

pub struct Worker<S: TaskSource> {
    id: usize,
    source: Arc<S>,
    poll_interval: Duration,
}

impl<S: TaskSource> Worker<S> {
    pub fn new(id: usize, source: Arc<S>, poll_interval: Duration) -> Self {
        Self {
            id,
            source,
            poll_interval,
        }
    }

    /// Pull and process at most one task
    ///
    /// Returns `false` if nothing was pending.
    pub async fn run_once(&self) -> bool {
        match self.source.pull() {
            Some(task) => {
                self.process(task).await;
                true
            }
            None => false,
        }
    }

    async fn process(&self, task: ClaimedTask) {
        tracing::debug!(worker = self.id, task_id = task.id, "processing task");
        tokio::time::sleep(Duration::from_millis(task.operation_time)).await;

        let result = match compute(&task) {
            Ok(result) => result,
            Err(err) => {
                // Left to lease recovery; the registry has no task failure state
                tracing::warn!(worker = self.id, task_id = task.id, error = %err, "task not computable");
                return;
            }
        };

        let push = TaskResult {
            id: task.id,
            result,
            token: Some(task.token),
        };
        match self.source.push(push) {
            Ok(outcome) => tracing::debug!(
                worker = self.id,
                task_id = task.id,
                expression_id = %outcome.expression_id,
                "result accepted"
            ),
            Err(err) => {
                tracing::warn!(worker = self.id, task_id = task.id, error = %err, "result rejected")
            }
        }
    }

    /// Run until `shutdown` fires
    pub async fn run(self, shutdown: CancellationToken) {
        tracing::info!(worker = self.id, "worker started");

        while !shutdown.is_cancelled() {
            match self.source.pull() {
                Some(task) => {
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = self.process(task) => {}
                    }
                }
                None => {
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(self.poll_interval) => {}
                    }
                }
            }
        }

        tracing::info!(worker = self.id, "worker stopped");
    }
}

/// Spawn `computing_power` workers sharing one task source
///
/// Close and wait on the returned tracker after cancelling `shutdown`.
pub fn spawn_pool<S: TaskSource>(
    source: Arc<S>,
    config: &WorkerConfig,
    shutdown: CancellationToken,
) -> TaskTracker {
    let tracker = TaskTracker::new();
    for id in 0..config.computing_power {
        let worker = Worker::new(id, Arc::clone(&source), config.poll_interval());
        tracker.spawn(worker.run(shutdown.clone()));
    }
    tracker.close();
    tracker
}

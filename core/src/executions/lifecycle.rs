use chrono::{DateTime, Utc};

use crate::error::{CalcError, TaskError};
use crate::registry::Registry;
use crate::types::*;

/// Complete a claimed task with the worker's result
///
/// Rejected without any mutation when:
/// - no task has this id (`NotFound`)
/// - the task is not processing under a worker lease (`InvalidState`); this
///   also makes the first of two duplicate completions win
/// - a token is given and does not match the current lease (`StaleToken`)
/// - the result is NaN or infinite (`InvalidResult`)
///
/// On success the owning expression is checked in the same critical
/// section; if every task is now completed the expression becomes
/// `completed` with the result of its final task.
pub fn complete_task(
    registry: &Registry,
    completion: TaskResult,
) -> Result<CompletionOutcome, TaskError> {
    let task_id = completion.id;

    let outcome = registry.with_state(|state| {
        let (expression, index) = state
            .find_task_mut(task_id)
            .ok_or(TaskError::NotFound { task_id })?;

        let task = &mut expression.tasks[index];
        let lease = match (task.status, task.lease) {
            (TaskStatus::Processing, Some(lease)) => lease,
            (status, _) => return Err(TaskError::InvalidState { task_id, status }),
        };

        if let Some(token) = completion.token {
            if token != lease.token {
                return Err(TaskError::StaleToken { task_id, token });
            }
        }

        if !completion.result.is_finite() {
            return Err(TaskError::InvalidResult {
                task_id,
                result: completion.result,
            });
        }

        task.status = TaskStatus::Completed;
        task.result = Some(completion.result);
        task.lease = None;

        if expression
            .tasks
            .iter()
            .all(|t| t.status == TaskStatus::Completed)
        {
            expression.status = ExpressionStatus::Completed;
            expression.result = expression.tasks.last().and_then(|t| t.result);
            expression.finished_at = Some(Utc::now());
        }

        Ok(CompletionOutcome {
            expression_id: expression.id.clone(),
            expression_status: expression.status,
            expression_result: expression.result,
        })
    })?;

    tracing::debug!(task_id, result = completion.result, "task completed");
    if outcome.expression_status == ExpressionStatus::Completed {
        tracing::info!(
            id = %outcome.expression_id,
            result = outcome.expression_result,
            "expression completed"
        );
    }

    Ok(outcome)
}

/// Commit the outcome of an in-process evaluation
///
/// Returns `false` if the expression is unknown or already terminal.
pub fn finish_expression(
    registry: &Registry,
    expression_id: &str,
    outcome: Result<f64, CalcError>,
) -> bool {
    let committed = registry.with_state(|state| {
        let Some(expression) = state.get_mut(expression_id) else {
            return false;
        };
        if expression.status.is_terminal() {
            return false;
        }

        match outcome {
            Ok(value) => {
                for task in expression.tasks.iter_mut() {
                    if task.status != TaskStatus::Completed {
                        task.status = TaskStatus::Completed;
                        task.result = Some(value);
                        task.lease = None;
                    }
                }
                expression.status = ExpressionStatus::Completed;
                expression.result = Some(value);
            }
            Err(err) => {
                expression.status = ExpressionStatus::Error;
                expression.error = Some(err.to_string());
            }
        }
        expression.finished_at = Some(Utc::now());
        true
    });

    match outcome {
        Ok(value) if committed => {
            tracing::info!(id = %expression_id, result = value, "expression completed")
        }
        Err(err) if committed => {
            tracing::warn!(id = %expression_id, error = %err, "expression failed")
        }
        _ => {}
    }

    committed
}

/// Return tasks whose lease expired at or before `now` to the pending pool
///
/// An expression whose tasks are all pending again reverts to `pending`.
/// Returns the number of recovered tasks.
pub fn recover_expired_claims(registry: &Registry, now: DateTime<Utc>) -> usize {
    let recovered = registry.with_state(|state| {
        let mut recovered = Vec::new();

        for expression in state.iter_mut() {
            for task in expression.tasks.iter_mut() {
                let expired = task.status == TaskStatus::Processing
                    && task.lease.is_some_and(|lease| lease.expires_at <= now);
                if expired {
                    task.status = TaskStatus::Pending;
                    task.lease = None;
                    recovered.push(task.id);
                }
            }

            if expression.status == ExpressionStatus::Processing
                && expression
                    .tasks
                    .iter()
                    .all(|t| t.status == TaskStatus::Pending)
            {
                expression.status = ExpressionStatus::Pending;
            }
        }

        for task_id in &recovered {
            state.offer(*task_id);
        }
        recovered
    });

    if !recovered.is_empty() {
        tracing::warn!(tasks = ?recovered, "recovered tasks with expired leases");
    }
    recovered.len()
}

/// Remove terminal expressions that finished at or before `cutoff`
///
/// Returns the number of evicted expressions.
pub fn evict_finished(registry: &Registry, cutoff: DateTime<Utc>) -> usize {
    let evicted = registry.with_state(|state| {
        let stale: Vec<String> = state
            .iter()
            .filter(|e| e.status.is_terminal())
            .filter(|e| e.finished_at.is_some_and(|at| at <= cutoff))
            .map(|e| e.id.clone())
            .collect();

        for id in &stale {
            state.remove(id);
        }
        stale.len()
    });

    if evicted > 0 {
        tracing::info!(evicted, "evicted finished expressions");
    }
    evicted
}

use chrono::{Duration, Utc};

use crate::registry::Registry;
use crate::types::*;

/// Claim the oldest pending task for a worker
///
/// The task moves to `processing` under a fresh lease with a new fencing
/// token, and its expression moves from `pending` to `processing`. Both
/// happen in the same critical section as the selection, so two concurrent
/// claims can never receive the same task. Returns `None` when nothing is
/// pending.
pub fn claim_task(registry: &Registry, lease: Duration) -> Option<ClaimedTask> {
    let claimed = registry.with_state(|state| {
        while let Some(task_id) = state.take_oldest_pending() {
            let token = state.allocate_token();
            let Some((expression, index)) = state.find_task_mut(task_id) else {
                continue;
            };

            let task = &mut expression.tasks[index];
            if task.status != TaskStatus::Pending {
                continue;
            }

            task.status = TaskStatus::Processing;
            task.lease = Some(Lease {
                token,
                expires_at: Utc::now() + lease,
            });

            let claimed = ClaimedTask {
                id: task.id,
                arg1: task.arg1.clone(),
                arg2: task.arg2.clone(),
                operation: task.operation,
                operation_time: task.operation_time,
                token,
            };

            if expression.status == ExpressionStatus::Pending {
                expression.status = ExpressionStatus::Processing;
            }

            return Some((claimed, expression.id.clone()));
        }
        None
    });

    let (task, expression_id) = claimed?;
    tracing::debug!(
        task_id = task.id,
        expression_id = %expression_id,
        token = task.token,
        "task claimed"
    );
    Some(task)
}

/// Claim every pending task of one expression for in-process evaluation
///
/// The tasks get no lease, so lease recovery never hands them to a worker.
/// Returns `None` if the expression is unknown or no longer pending.
pub fn claim_expression(registry: &Registry, expression_id: &str) -> Option<Vec<Task>> {
    registry.with_state(|state| {
        let pending: Vec<TaskId> = state
            .get(expression_id)
            .filter(|e| e.status == ExpressionStatus::Pending)?
            .tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Pending)
            .map(|t| t.id)
            .collect();

        for task_id in &pending {
            state.withdraw(*task_id);
        }

        let expression = state.get_mut(expression_id)?;
        for task in expression.tasks.iter_mut() {
            if pending.contains(&task.id) {
                task.status = TaskStatus::Processing;
                task.lease = None;
            }
        }
        expression.status = ExpressionStatus::Processing;
        Some(expression.tasks.clone())
    })
}

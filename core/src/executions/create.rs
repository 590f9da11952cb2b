use chrono::Utc;
use uuid::Uuid;

use crate::error::CalcError;
use crate::registry::Registry;
use crate::types::*;

#[derive(Debug, Clone)]
pub struct CreateExpressionParams {
    /// Original expression text
    pub source: String,
    /// Decomposition outcome. An error is recorded on the expression instead
    /// of being returned to the submitter.
    pub plan: Result<Vec<TaskSpec>, CalcError>,
    /// Offer the tasks to workers. When unset the tasks are reserved for
    /// in-process evaluation.
    pub offer_to_workers: bool,
}

/// Create a new expression and register it
///
/// The id is a fresh UUID; the expression starts out `pending`, or `error`
/// if decomposition failed. Only the insert itself happens under the
/// registry lock.
pub fn create_expression(registry: &Registry, params: CreateExpressionParams) -> Expression {
    let now = Utc::now();

    let expression = registry.with_state(|state| {
        let mut id = Uuid::new_v4().to_string();
        while state.contains(&id) {
            id = Uuid::new_v4().to_string();
        }

        let expression = match params.plan {
            Ok(specs) => Expression {
                id,
                expression: params.source,
                status: ExpressionStatus::Pending,
                result: None,
                error: None,
                created_at: now,
                finished_at: None,
                tasks: specs
                    .into_iter()
                    .map(|spec| Task {
                        id: state.allocate_task_id(),
                        arg1: spec.arg1,
                        arg2: spec.arg2,
                        operation: spec.operation,
                        operation_time: spec.operation_time,
                        status: TaskStatus::Pending,
                        result: None,
                        lease: None,
                    })
                    .collect(),
            },
            Err(err) => Expression {
                id,
                expression: params.source,
                status: ExpressionStatus::Error,
                result: None,
                error: Some(err.to_string()),
                created_at: now,
                finished_at: Some(now),
                tasks: Vec::new(),
            },
        };

        state.insert(expression.clone(), params.offer_to_workers);
        expression
    });

    match expression.status {
        ExpressionStatus::Error => tracing::info!(
            id = %expression.id,
            error = expression.error.as_deref().unwrap_or_default(),
            "expression registered as failed"
        ),
        _ => tracing::info!(
            id = %expression.id,
            tasks = expression.tasks.len(),
            "expression registered"
        ),
    }

    expression
}

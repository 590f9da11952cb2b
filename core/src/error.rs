use thiserror::Error;

use crate::types::TaskStatus;

/// Errors produced while parsing or evaluating an arithmetic expression.
///
/// The display strings are part of the wire contract: they are what callers
/// see in `ErrorResponse.error` and in an expression's `error` field.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum CalcError {
    /// Malformed syntax: missing operand, unmatched parenthesis, illegal
    /// character, dangling operator, empty input.
    #[error("Expression is not valid")]
    ExpressionNotValid,

    /// A numeral token could not be read as a number.
    #[error("Not correct input")]
    NotCorrectInput,

    /// Right operand of `/` is exactly zero.
    #[error("Division by zero")]
    DivisionByZero,
}

/// Errors produced by the registry-facing protocol (lookup, claim, completion).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TaskError {
    #[error("task not found: {task_id}")]
    NotFound { task_id: u64 },

    #[error("task {task_id} is not processing (status: {status})")]
    InvalidState { task_id: u64, status: TaskStatus },

    #[error("task {task_id} lease token {token} is stale")]
    StaleToken { task_id: u64, token: u64 },

    #[error("invalid result for task {task_id}: {result}")]
    InvalidResult { task_id: u64, result: f64 },

    #[error("expression not found: {id}")]
    ExpressionNotFound { id: String },
}

impl TaskError {
    /// `true` for errors meaning "no such record" as opposed to a rejected
    /// transition.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            TaskError::NotFound { .. } | TaskError::ExpressionNotFound { .. }
        )
    }
}

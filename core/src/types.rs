use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CalcError;

pub type TaskId = u64;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Operator {
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Sub,
    #[serde(rename = "*")]
    Mul,
    #[serde(rename = "/")]
    Div,
}

impl Operator {
    pub fn symbol(&self) -> char {
        match self {
            Operator::Add => '+',
            Operator::Sub => '-',
            Operator::Mul => '*',
            Operator::Div => '/',
        }
    }

    /// Apply the operator.
    ///
    /// Division by exactly zero is rejected, and so is any non-finite
    /// operand or result (`NotCorrectInput`), so every value that leaves
    /// here can be rendered as a decimal numeral.
    pub fn apply(&self, left: f64, right: f64) -> Result<f64, CalcError> {
        if !left.is_finite() || !right.is_finite() {
            return Err(CalcError::NotCorrectInput);
        }

        let value = match self {
            Operator::Add => left + right,
            Operator::Sub => left - right,
            Operator::Mul => left * right,
            Operator::Div => {
                if right == 0.0 {
                    return Err(CalcError::DivisionByZero);
                }
                left / right
            }
        };

        if value.is_finite() {
            Ok(value)
        } else {
            Err(CalcError::NotCorrectInput)
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExpressionStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

impl ExpressionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExpressionStatus::Completed | ExpressionStatus::Error)
    }
}

impl fmt::Display for ExpressionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExpressionStatus::Pending => "pending",
            ExpressionStatus::Processing => "processing",
            ExpressionStatus::Completed => "completed",
            ExpressionStatus::Error => "error",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
        };
        f.write_str(s)
    }
}

/// A worker's hold on a processing task.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Lease {
    /// Fencing token, unique per claim.
    pub token: u64,
    pub expires_at: DateTime<Utc>,
}

/// One atomic binary operation derived from an expression.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: TaskId,
    pub arg1: String,
    pub arg2: String,
    pub operation: Operator,
    /// Suggested execution time in milliseconds
    pub operation_time: u64,
    pub status: TaskStatus,
    pub result: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub lease: Option<Lease>,
}

/// Task shape produced by the decomposer, before the registry assigns an id.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSpec {
    pub arg1: String,
    pub arg2: String,
    pub operation: Operator,
    pub operation_time: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Expression {
    pub id: String,
    pub expression: String,
    pub status: ExpressionStatus,
    pub result: Option<f64>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub tasks: Vec<Task>,
}

impl Expression {
    pub fn summary(&self) -> ExpressionSummary {
        ExpressionSummary {
            id: self.id.clone(),
            status: self.status,
            result: self.result,
        }
    }
}

/* ===================== Wire records ===================== */

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub expression: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubmitResponse {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExpressionSummary {
    pub id: String,
    pub status: ExpressionStatus,
    pub result: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExpressionList {
    pub expressions: Vec<ExpressionSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExpressionEnvelope {
    pub expression: Expression,
}

/// Task details handed to a worker on claim
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClaimedTask {
    pub id: TaskId,
    pub arg1: String,
    pub arg2: String,
    pub operation: Operator,
    pub operation_time: u64,
    pub token: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskEnvelope {
    pub task: ClaimedTask,
}

/// Result reported by a worker.
///
/// `token` is optional so that workers unaware of leases can still report;
/// when present it must match the current claim.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskResult {
    pub id: TaskId,
    pub result: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl fmt::Display) -> Self {
        Self {
            error: error.to_string(),
        }
    }
}

/// What a successful completion did to the owning expression
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionOutcome {
    pub expression_id: String,
    pub expression_status: ExpressionStatus,
    pub expression_result: Option<f64>,
}

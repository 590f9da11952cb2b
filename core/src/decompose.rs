//! Splits a parsed expression into tasks.
//!
//! Every expression yields exactly one task: the root operation of the tree
//! (the operator applied last). Both subtrees are folded to decimal strings
//! first, so the task operands are always plain numerals and the task's value
//! is the expression's value.

use crate::config::OperationTimes;
use crate::error::CalcError;
use crate::interpreter::{eval_expr, format_number};
use crate::parser::Expr;
use crate::types::{Operator, TaskSpec};

/// Decompose an expression tree into its task list.
///
/// Returns `ExpressionNotValid` for a bare or negated numeral (nothing to
/// compute). Folding runs the interpreter over the subtrees, so
/// `DivisionByZero` and `NotCorrectInput` (including overflow to infinity)
/// can surface here too; the root operation is checked the same way so a
/// worker is never handed a task that cannot be computed.
pub fn decompose(expr: &Expr, times: &OperationTimes) -> Result<Vec<TaskSpec>, CalcError> {
    if !expr.has_operator() {
        return Err(CalcError::ExpressionNotValid);
    }

    let (operation, left, right) = match expr {
        Expr::Number { .. } => return Err(CalcError::ExpressionNotValid),
        Expr::Negate { operand } => (Operator::Sub, 0.0, eval_expr(operand)?),
        Expr::Binary { op, left, right } => (*op, eval_expr(left)?, eval_expr(right)?),
    };

    operation.apply(left, right)?;

    Ok(vec![TaskSpec {
        arg1: format_number(left),
        arg2: format_number(right),
        operation,
        operation_time: times.for_operator(operation),
    }])
}

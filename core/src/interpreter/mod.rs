//! Expression evaluation
//!
//! Evaluates a parsed [`Expr`] tree to an `f64`. All arithmetic is plain
//! double precision with no rounding.

use crate::error::CalcError;
use crate::parser::{self, Expr};
use crate::types::Operator;


/// Parse and evaluate an expression in one call.
///
/// ```
/// use calc_core::interpreter::calc;
///
/// assert_eq!(calc("(2+2)*2").unwrap(), 8.0);
/// assert_eq!(calc("-3*(2+4)/2").unwrap(), -9.0);
/// ```
pub fn calc(source: &str) -> Result<f64, CalcError> {
    let expr = parser::parse(source)?;
    eval_expr(&expr)
}

/// Evaluate an expression tree.
///
/// Operands are evaluated left before right, so with several faults the
/// leftmost one is reported.
pub fn eval_expr(expr: &Expr) -> Result<f64, CalcError> {
    match expr {
        Expr::Number { literal } => parse_number(literal),

        Expr::Negate { operand } => {
            let value = eval_expr(operand)?;
            Operator::Sub.apply(0.0, value)
        }

        Expr::Binary { op, left, right } => {
            let left = eval_expr(left)?;
            let right = eval_expr(right)?;
            op.apply(left, right)
        }
    }
}

/// Read a decimal numeral
///
/// A numeral too large for `f64` (it would read as infinity) is
/// `NotCorrectInput`, as is anything that spells `inf` or `NaN`.
pub fn parse_number(literal: &str) -> Result<f64, CalcError> {
    match literal.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(CalcError::NotCorrectInput),
    }
}

/// Render a value in the shortest form that parses back to the same `f64`.
///
/// Used wherever an intermediate result is folded back into text, such as
/// task operands.
pub fn format_number(value: f64) -> String {
    value.to_string()
}

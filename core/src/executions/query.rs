use crate::error::TaskError;
use crate::registry::Registry;
use crate::types::*;

/// Get an expression by id, tasks included
pub fn get_expression(registry: &Registry, id: &str) -> Result<Expression, TaskError> {
    registry
        .get(id)
        .ok_or_else(|| TaskError::ExpressionNotFound { id: id.to_string() })
}

/// List all expressions (id, status, result) in submission order
pub fn list_expressions(registry: &Registry) -> ExpressionList {
    ExpressionList {
        expressions: registry.list(),
    }
}

// Expression and task lifecycle
//
// This module implements the distribution protocol on top of the registry:
// - Creating expressions (with their decomposed tasks)
// - Claiming tasks for workers, and whole expressions for in-process evaluation
// - Completing tasks, finishing expressions, recovering expired claims, eviction
// - Querying expressions

mod claim;
mod create;
mod lifecycle;
mod query;


// Re-export public API
pub use claim::{claim_expression, claim_task};
pub use create::{create_expression, CreateExpressionParams};
pub use lifecycle::{complete_task, evict_finished, finish_expression, recover_expired_claims};
pub use query::{get_expression, list_expressions};

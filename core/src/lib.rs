pub mod cli;
pub mod config;
pub mod decompose;
pub mod error;
pub mod executions;
pub mod interpreter;
pub mod parser;
pub mod registry;
pub mod services;
pub mod types;
pub mod worker;

// Re-export main types
pub use types::*;

pub use config::Config;
pub use error::{CalcError, TaskError};
pub use interpreter::calc;
pub use services::CalcService;

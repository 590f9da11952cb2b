use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::{Config, ExecutionMode};
use crate::decompose::decompose;
use crate::error::{CalcError, TaskError};
use crate::executions::{self, CreateExpressionParams};
use crate::interpreter::calc;
use crate::parser;
use crate::registry::Registry;
use crate::types::*;

/// Entry point for submitting, inspecting and distributing expressions
///
/// Cheap to clone; clones share the same registry.
#[derive(Debug, Clone)]
pub struct CalcService {
    registry: Arc<Registry>,
    config: Arc<Config>,
}

impl CalcService {
    pub fn new(config: Config) -> Self {
        Self {
            registry: Arc::new(Registry::new()),
            config: Arc::new(config),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Submit an expression and return its id immediately
    ///
    /// Syntax errors and operator-less input are returned here. Semantic
    /// errors are recorded on the expression and observed by polling it.
    /// In in-process mode evaluation is started in the background, so this
    /// must be called inside a tokio runtime.
    pub fn submit(&self, source: &str) -> Result<SubmitResponse, CalcError> {
        let expr = parser::parse(source)?;
        if !expr.has_operator() {
            return Err(CalcError::ExpressionNotValid);
        }

        let in_process = self.config.engine.mode == ExecutionMode::InProcess;
        let expression = executions::create_expression(
            &self.registry,
            CreateExpressionParams {
                source: source.to_string(),
                plan: decompose(&expr, &self.config.operations),
                offer_to_workers: !in_process,
            },
        );

        if in_process && expression.status == ExpressionStatus::Pending {
            self.spawn_evaluation(expression.id.clone());
        }

        Ok(SubmitResponse { id: expression.id })
    }

    fn spawn_evaluation(&self, id: String) {
        let registry = Arc::clone(&self.registry);
        tokio::spawn(async move {
            let Some(tasks) = executions::claim_expression(&registry, &id) else {
                return;
            };
            let source = match registry.get(&id) {
                Some(expression) => expression.expression,
                None => return,
            };

            let delay: u64 = tasks.iter().map(|t| t.operation_time).sum();
            tokio::time::sleep(Duration::from_millis(delay)).await;

            executions::finish_expression(&registry, &id, calc(&source));
        });
    }

    pub fn list(&self) -> ExpressionList {
        executions::list_expressions(&self.registry)
    }

    pub fn get(&self, id: &str) -> Result<Expression, TaskError> {
        executions::get_expression(&self.registry, id)
    }

    /// Claim the oldest pending task, if any
    pub fn pull(&self) -> Option<ClaimedTask> {
        executions::claim_task(&self.registry, self.config.registry.lease())
    }

    /// Report a task result
    pub fn push(&self, result: TaskResult) -> Result<CompletionOutcome, TaskError> {
        executions::complete_task(&self.registry, result)
    }

    /// Evaluate an expression synchronously without registering it
    pub fn evaluate(&self, source: &str) -> Result<f64, CalcError> {
        calc(source)
    }

    /// Poll an expression until it reaches a terminal status
    pub async fn wait_for(&self, id: &str, poll: Duration) -> Result<Expression, TaskError> {
        loop {
            let expression = self.get(id)?;
            if expression.status.is_terminal() {
                return Ok(expression);
            }
            tokio::time::sleep(poll).await;
        }
    }

    /// Recover expired claims and evict old finished expressions
    ///
    /// Returns `(recovered_tasks, evicted_expressions)`.
    pub fn run_maintenance_once(&self) -> (usize, usize) {
        let now = Utc::now();
        let recovered = executions::recover_expired_claims(&self.registry, now);
        let evicted =
            executions::evict_finished(&self.registry, now - self.config.registry.retention());
        (recovered, evicted)
    }

    /// Run maintenance on the configured interval until `shutdown` fires
    pub fn spawn_maintenance(&self, shutdown: CancellationToken) -> JoinHandle<()> {
        let service = self.clone();
        let interval = self.config.registry.sweep_interval();

        tokio::spawn(async move {
            tracing::debug!(interval_ms = interval.as_millis() as u64, "maintenance started");
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {
                        service.run_maintenance_once();
                    }
                }
            }
            tracing::debug!("maintenance stopped");
        })
    }
}

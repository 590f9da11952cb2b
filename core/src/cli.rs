use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use crate::config::{Config, ExecutionMode};
use crate::interpreter::calc;
use crate::parser::tokenize;
use crate::services::CalcService;
use crate::types::ErrorResponse;
use crate::worker;

#[derive(Parser)]
#[command(name = "calc")]
#[command(about = "Calc - distributed arithmetic expression calculator", long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default search)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Evaluate an expression and print its value
    Eval {
        /// Arithmetic expression, e.g. "(2+2)*2"
        expression: String,
    },

    /// Print the tokens of an expression as JSON
    Tokens {
        expression: String,
    },

    /// Submit expressions, evaluate them and print the registry as JSON
    Run {
        /// Expressions to submit
        #[arg(required = true)]
        expressions: Vec<String>,

        /// Number of local workers (overrides worker.computing_power)
        #[arg(short = 'w', long = "workers")]
        workers: Option<usize>,

        /// Evaluate in-process instead of through workers
        #[arg(long)]
        in_process: bool,

        /// Give up waiting after this many seconds
        /// (default: twice the lease per expression)
        #[arg(long)]
        timeout_secs: Option<u64>,
    },

    /// Print the effective configuration as TOML
    Config,
}

/// Run the CLI by parsing process arguments
pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    run_cli_with_args(cli).await
}

/// Run the CLI with provided arguments
pub async fn run_cli_from_args(args: Vec<String>) -> Result<()> {
    let cli = Cli::parse_from(args);
    run_cli_with_args(cli).await
}

async fn run_cli_with_args(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Eval { expression } => {
            let value = calc(&expression)?;
            println!("{}", value);
        }

        Commands::Tokens { expression } => {
            let tokens = tokenize(&expression)?;
            println!("{}", serde_json::to_string_pretty(&tokens)?);
        }

        Commands::Run {
            expressions,
            workers,
            in_process,
            timeout_secs,
        } => {
            let config = Config::builder()
                .config_path(cli.config)
                .mode(in_process.then_some(ExecutionMode::InProcess))
                .computing_power(workers)
                .build()?;

            let deadline = run_deadline(timeout_secs, &config, expressions.len());
            tokio::time::timeout(deadline, run_expressions(config, expressions))
                .await
                .context("Timed out waiting for expressions")??;
        }

        Commands::Config => {
            let config = Config::builder().config_path(cli.config).build()?;
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}

/// Overall deadline for `calc run`
///
/// Without an explicit timeout each expression gets two leases, enough for
/// one abandoned claim to be recovered and retried.
fn run_deadline(timeout_secs: Option<u64>, config: &Config, expressions: usize) -> Duration {
    let secs = timeout_secs.unwrap_or_else(|| {
        config
            .registry
            .lease_secs
            .saturating_mul(2)
            .saturating_mul(expressions.max(1) as u64)
    });
    Duration::from_secs(secs)
}

async fn run_expressions(config: Config, expressions: Vec<String>) -> Result<()> {
    let poll = config.worker.poll_interval();
    let distributed = config.engine.mode == ExecutionMode::Distributed;
    let service = Arc::new(CalcService::new(config));

    let shutdown = CancellationToken::new();
    let maintenance = service.spawn_maintenance(shutdown.clone());
    let pool = distributed.then(|| {
        worker::spawn_pool(
            Arc::clone(&service),
            &service.config().worker,
            shutdown.clone(),
        )
    });

    let mut ids = Vec::new();
    for expression in &expressions {
        match service.submit(expression) {
            Ok(response) => ids.push(response.id),
            Err(err) => {
                tracing::warn!(expression = %expression, error = %err, "submission rejected");
                eprintln!("{}", serde_json::to_string(&ErrorResponse::new(err))?);
            }
        }
    }

    for id in &ids {
        service.wait_for(id, poll).await?;
    }

    shutdown.cancel();
    maintenance.await?;
    if let Some(pool) = pool {
        pool.wait().await;
    }

    println!("{}", serde_json::to_string_pretty(&service.list())?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_command() {
        let cli = Cli::try_parse_from([
            "calc",
            "--config",
            "calc.toml",
            "run",
            "-w",
            "4",
            "--in-process",
            "1+1",
            "2*3",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("calc.toml")));
        match cli.command {
            Commands::Run {
                expressions,
                workers,
                in_process,
                timeout_secs,
            } => {
                assert_eq!(expressions, vec!["1+1", "2*3"]);
                assert_eq!(workers, Some(4));
                assert!(in_process);
                assert_eq!(timeout_secs, None);
            }
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn test_run_deadline() {
        let mut config = Config::default();
        config.registry.lease_secs = 30;

        assert_eq!(run_deadline(Some(5), &config, 10), Duration::from_secs(5));
        assert_eq!(run_deadline(None, &config, 3), Duration::from_secs(180));
        assert_eq!(run_deadline(None, &config, 0), Duration::from_secs(60));

        config.registry.lease_secs = u64::MAX;
        assert_eq!(run_deadline(None, &config, 2), Duration::from_secs(u64::MAX));
    }

    #[tokio::test]
    async fn test_run_gives_up_on_stuck_expression() {
        let service = CalcService::new(Config::default());
        let id = service.submit("1+1").unwrap().id;

        // Nobody pulls the task
        let wait = service.wait_for(&id, Duration::from_millis(5));
        let result = tokio::time::timeout(Duration::from_millis(50), wait).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_run_requires_expressions() {
        assert!(Cli::try_parse_from(["calc", "run"]).is_err());
    }
}

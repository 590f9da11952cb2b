//! Configuration loading
//!
//! Layers, lowest precedence first:
//! 1. built-in defaults
//! 2. a TOML file (`--config`, `CALC_CONFIG_PATH`, or `./calc.toml` if present)
//! 3. environment variables `CALC__<SECTION>__<KEY>`, e.g. `CALC__REGISTRY__LEASE_SECS=30`
//! 4. explicit builder overrides (CLI flags)

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::types::Operator;

/// Upper bound for any configured duration in seconds (ten years)
const MAX_SECS: u64 = 10 * 365 * 24 * 60 * 60;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub engine: EngineConfig,
    pub registry: RegistryConfig,
    pub operations: OperationTimes,
    pub worker: WorkerConfig,
}

/// How submitted expressions get evaluated
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Tasks wait in the registry until a worker claims them
    #[default]
    Distributed,
    /// The service evaluates each expression itself in a background task
    InProcess,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub mode: ExecutionMode,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RegistryConfig {
    /// How long a finished expression is kept before eviction
    pub retention_secs: u64,
    /// How long a worker may hold a claimed task before it is offered again
    pub lease_secs: u64,
    /// Interval of the lease recovery / eviction sweep
    pub sweep_interval_ms: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            retention_secs: 3600,
            lease_secs: 60,
            sweep_interval_ms: 1000,
        }
    }
}

impl RegistryConfig {
    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.retention_secs.min(MAX_SECS) as i64)
    }

    pub fn lease(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.lease_secs.min(MAX_SECS) as i64)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}

/// Suggested execution time per operator, in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OperationTimes {
    pub addition_ms: u64,
    pub subtraction_ms: u64,
    pub multiplication_ms: u64,
    pub division_ms: u64,
}

impl Default for OperationTimes {
    fn default() -> Self {
        Self {
            addition_ms: 5000,
            subtraction_ms: 5000,
            multiplication_ms: 5000,
            division_ms: 5000,
        }
    }
}

impl OperationTimes {
    /// Same delay for every operator
    pub fn uniform(ms: u64) -> Self {
        Self {
            addition_ms: ms,
            subtraction_ms: ms,
            multiplication_ms: ms,
            division_ms: ms,
        }
    }

    pub fn for_operator(&self, op: Operator) -> u64 {
        match op {
            Operator::Add => self.addition_ms,
            Operator::Sub => self.subtraction_ms,
            Operator::Mul => self.multiplication_ms,
            Operator::Div => self.division_ms,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorkerConfig {
    /// Number of concurrent workers in a local pool
    pub computing_power: usize,
    /// Delay between pulls when nothing is pending
    pub poll_interval_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            computing_power: 2,
            poll_interval_ms: 500,
        }
    }
}

impl WorkerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Load with default search rules and no overrides
    pub fn load() -> Result<Self> {
        Self::builder().build()
    }

    pub fn validate(&self) -> Result<()> {
        if self.registry.lease_secs == 0 {
            bail!("registry.lease_secs must be greater than zero");
        }
        if self.registry.lease_secs > MAX_SECS || self.registry.retention_secs > MAX_SECS {
            bail!("registry durations must not exceed {} seconds", MAX_SECS);
        }
        if self.registry.sweep_interval_ms == 0 {
            bail!("registry.sweep_interval_ms must be greater than zero");
        }
        if self.worker.computing_power == 0 {
            bail!("worker.computing_power must be greater than zero");
        }
        if self.worker.poll_interval_ms == 0 {
            bail!("worker.poll_interval_ms must be greater than zero");
        }
        Ok(())
    }

    /// Render the effective configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to render configuration")
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    config_path: Option<PathBuf>,
    mode: Option<ExecutionMode>,
    computing_power: Option<usize>,
}

impl ConfigBuilder {
    /// Config file path (overrides `CALC_CONFIG_PATH` and the default search)
    pub fn config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    pub fn mode(mut self, mode: Option<ExecutionMode>) -> Self {
        self.mode = mode;
        self
    }

    pub fn computing_power(mut self, workers: Option<usize>) -> Self {
        self.computing_power = workers;
        self
    }

    pub fn build(self) -> Result<Config> {
        let defaults = ::config::Config::try_from(&Config::default())
            .context("Failed to encode default configuration")?;

        let mut builder = ::config::Config::builder().add_source(defaults);

        let path = self
            .config_path
            .or_else(|| std::env::var("CALC_CONFIG_PATH").ok().map(PathBuf::from));

        builder = match path {
            Some(path) => builder.add_source(::config::File::from(path).required(true)),
            None => builder.add_source(::config::File::with_name("calc").required(false)),
        };

        builder = builder.add_source(
            ::config::Environment::with_prefix("CALC")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        if let Some(mode) = self.mode {
            let value = match mode {
                ExecutionMode::Distributed => "distributed",
                ExecutionMode::InProcess => "in_process",
            };
            builder = builder.set_override("engine.mode", value)?;
        }
        if let Some(workers) = self.computing_power {
            builder = builder.set_override("worker.computing_power", workers as i64)?;
        }

        let config: Config = builder
            .build()
            .context("Failed to load configuration")?
            .try_deserialize()
            .context("Failed to parse configuration")?;

        config.validate()?;
        Ok(config)
    }
}

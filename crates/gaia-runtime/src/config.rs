//! Engine configuration
//!
//! Defaults, `GAIA_*` environment overrides and validation.

use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

use gaia_adversarial::{CategoryWeights, DebateConfig};
use gaia_core::ConfidenceModel;

use crate::engine::RunOptions;

/// Error types for configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value:?}")]
    InvalidEnvVar { var: String, value: String },
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Full engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Default per-worker timeout (env: GAIA_WORKER_TIMEOUT_MS)
    pub per_worker_timeout_ms: u64,
    /// Default wall-clock budget for a whole run (env: GAIA_TOTAL_DEADLINE_MS)
    pub total_deadline_ms: u64,
    /// Process-wide cap on concurrently running workers (env: GAIA_MAX_CONCURRENT_WORKERS)
    pub max_concurrent_workers: usize,
    /// Per-subscriber progress buffer
    pub subscriber_buffer: usize,
    /// Rounds and thresholds
    /// (env: GAIA_DEBATE_ROUNDS, GAIA_CHALLENGE_THRESHOLD, GAIA_REJECTION_THRESHOLD)
    pub debate: DebateConfig,
    pub confidence: ConfidenceModel,
    pub category_weights: CategoryWeights,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            per_worker_timeout_ms: 20_000,
            total_deadline_ms: 45_000,
            max_concurrent_workers: 10,
            subscriber_buffer: 64,
            debate: DebateConfig::default(),
            confidence: ConfidenceModel::default(),
            category_weights: CategoryWeights::default(),
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by any `GAIA_*` variables that are set
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(v) = parse_var("GAIA_DEBATE_ROUNDS")? {
            config.debate.rounds = v;
        }
        if let Some(v) = parse_var("GAIA_WORKER_TIMEOUT_MS")? {
            config.per_worker_timeout_ms = v;
        }
        if let Some(v) = parse_var("GAIA_TOTAL_DEADLINE_MS")? {
            config.total_deadline_ms = v;
        }
        if let Some(v) = parse_var("GAIA_MAX_CONCURRENT_WORKERS")? {
            config.max_concurrent_workers = v;
        }
        if let Some(v) = parse_var("GAIA_CHALLENGE_THRESHOLD")? {
            config.debate.challenge_threshold = v;
        }
        if let Some(v) = parse_var("GAIA_REJECTION_THRESHOLD")? {
            config.debate.rejection_threshold = v;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.per_worker_timeout_ms == 0 {
            return Err(ConfigError::Invalid("per-worker timeout must be > 0".into()));
        }
        if self.total_deadline_ms == 0 {
            return Err(ConfigError::Invalid("total deadline must be > 0".into()));
        }
        if self.max_concurrent_workers == 0 {
            return Err(ConfigError::Invalid("max concurrent workers must be > 0".into()));
        }
        if self.subscriber_buffer == 0 {
            return Err(ConfigError::Invalid("subscriber buffer must be > 0".into()));
        }
        let unit = 0.0..=1.0;
        if !unit.contains(&self.debate.challenge_threshold) {
            return Err(ConfigError::Invalid(format!(
                "challenge threshold {} outside [0, 1]",
                self.debate.challenge_threshold
            )));
        }
        if !unit.contains(&self.debate.rejection_threshold) {
            return Err(ConfigError::Invalid(format!(
                "rejection threshold {} outside [0, 1]",
                self.debate.rejection_threshold
            )));
        }
        if self.debate.contradiction_slack_days < 0 {
            return Err(ConfigError::Invalid("contradiction slack must be >= 0".into()));
        }
        Ok(())
    }

    pub fn per_worker_timeout(&self) -> Duration {
        Duration::from_millis(self.per_worker_timeout_ms)
    }

    pub fn total_deadline(&self) -> Duration {
        Duration::from_millis(self.total_deadline_ms)
    }

    /// Run options matching these defaults
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            debate_rounds: self.debate.rounds,
            per_worker_timeout: self.per_worker_timeout(),
            total_deadline: self.total_deadline(),
            context: Default::default(),
        }
    }
}

fn parse_var<T: FromStr>(var: &str) -> Result<Option<T>, ConfigError> {
    match env::var(var) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                value,
            }),
        Err(_) => Ok(None),
    }
}

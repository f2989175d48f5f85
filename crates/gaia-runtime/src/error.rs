//! Runtime error types

use thiserror::Error;

use crate::config::ConfigError;
use crate::engine::RunId;

/// Errors surfaced by the engine API
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("worker registered twice: {0}")]
    DuplicateWorker(String),
    #[error("unknown run: {0}")]
    UnknownRun(RunId),
    #[error("invalid run options: {0}")]
    InvalidOptions(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

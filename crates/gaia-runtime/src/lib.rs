//! # GAIA Runtime
//!
//! Tokio-based worker dispatch, debate orchestration and progress streaming.

pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod progress;
pub mod registry;
pub mod worker;

pub use config::{ConfigError, EngineConfig};
pub use dispatcher::{DispatchLimits, DispatchReport, Dispatcher, WorkerOutcome, WorkerReport};
pub use engine::{Engine, EngineBuilder, FailureReason, RunId, RunOptions, RunStatus};
pub use error::EngineError;
pub use progress::{
    ProgressEvent, ProgressNotifier, ProgressSink, ProgressStream, ProgressUpdate, TracingSink,
};
pub use registry::WorkerRegistry;
pub use worker::{
    AnalysisContext, AnalysisWorker, BackoffStrategy, FindingSink, RetryPolicy, WorkerError,
    MAX_ATTEMPTS,
};

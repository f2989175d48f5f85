//! Analysis worker contract
//!
//! A worker collects evidence about a target in its own domain and pushes
//! [`FindingDraft`]s into a [`FindingSink`] as it goes. Anything pushed
//! before a timeout survives; a failed attempt that is retried starts from
//! an empty sink.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;

use gaia_core::FindingDraft;

/// Why a worker attempt failed
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum WorkerError {
    #[error("transient failure: {0}")]
    Transient(String),
    #[error("network failure: {0}")]
    Network(String),
    #[error("logic failure: {0}")]
    Logic(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl WorkerError {
    /// Only transient and network failures are worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Network(_))
    }
}

/// Exponential retry backoff, capped at `max_millis`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BackoffStrategy {
    pub initial_millis: u64,
    /// Clamped to at least 1.0 so delays never shrink
    pub multiplier: f64,
    pub max_millis: u64,
}

impl BackoffStrategy {
    /// Delay before retry number `attempt` (0-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        let millis = (self.initial_millis as f64 * self.multiplier.max(1.0).powi(attempt as i32))
            .min(self.max_millis as f64);
        Duration::from_millis(millis as u64)
    }
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        Self {
            initial_millis: 200,
            multiplier: 2.0,
            max_millis: 2_000,
        }
    }
}

/// Hard ceiling on attempts per worker, whatever its policy asks for
pub const MAX_ATTEMPTS: u32 = 3;

/// Bounded retry policy for a worker
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first; capped at [`MAX_ATTEMPTS`]
    pub max_attempts: u32,
    pub backoff: BackoffStrategy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            backoff: BackoffStrategy::default(),
        }
    }
}

impl RetryPolicy {
    /// A single attempt
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Should a failure on attempt `attempt` (1-based) be retried?
    pub fn should_retry(&self, error: &WorkerError, attempt: u32) -> bool {
        error.is_retryable() && attempt < self.max_attempts.min(MAX_ATTEMPTS)
    }
}

/// Optional per-run context handed to every worker
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisContext {
    pub attributes: BTreeMap<String, String>,
}

impl AnalysisContext {
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

/// Collects the drafts a worker emits during one attempt
#[derive(Debug, Clone, Default)]
pub struct FindingSink {
    drafts: Arc<Mutex<Vec<FindingDraft>>>,
}

impl FindingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, draft: FindingDraft) {
        self.lock().push(draft);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drop everything emitted so far
    pub(crate) fn reset(&self) {
        self.lock().clear();
    }

    /// Take everything emitted so far
    pub(crate) fn take(&self) -> Vec<FindingDraft> {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, Vec<FindingDraft>> {
        // A worker that panicked mid-push leaves a usable vector behind.
        self.drafts.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// An independent analysis worker
#[async_trait]
pub trait AnalysisWorker: Send + Sync {
    /// Unique worker id within a registry
    fn id(&self) -> &str;

    /// Analysis domain, used to weigh cross-domain challenges
    fn domain(&self) -> &str;

    /// Worker-specific timeout; the run option still caps it
    fn timeout(&self) -> Option<Duration> {
        None
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default()
    }

    /// Collect evidence about `target` and push drafts into `sink`
    async fn collect(
        &self,
        target: &str,
        context: &AnalysisContext,
        sink: &FindingSink,
    ) -> Result<(), WorkerError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use gaia_core::{Category, Polarity, Severity};

    #[test]
    fn test_only_transient_errors_retry() {
        let policy = RetryPolicy::default();
        assert!(policy.should_retry(&WorkerError::Network("reset".into()), 1));
        assert!(policy.should_retry(&WorkerError::Transient("busy".into()), 2));
        assert!(!policy.should_retry(&WorkerError::Transient("busy".into()), 3));
        assert!(!policy.should_retry(&WorkerError::Logic("bad".into()), 1));
        assert!(!policy.should_retry(&WorkerError::InvalidInput("?".into()), 1));
    }

    #[test]
    fn test_exponential_backoff_is_capped() {
        let backoff = RetryPolicy::default().backoff;
        assert_eq!(backoff.delay(0), Duration::from_millis(200));
        assert_eq!(backoff.delay(1), Duration::from_millis(400));
        assert_eq!(backoff.delay(10), Duration::from_millis(2_000));
    }

    #[test]
    fn test_attempts_never_exceed_ceiling() {
        let policy = RetryPolicy {
            max_attempts: 8,
            ..Default::default()
        };
        let busy = WorkerError::Transient("busy".into());
        assert!(policy.should_retry(&busy, 2));
        assert!(!policy.should_retry(&busy, MAX_ATTEMPTS));
        assert!(!policy.should_retry(&busy, 7));
    }

    #[test]
    fn test_backoff_never_shrinks() {
        let backoff = BackoffStrategy {
            initial_millis: 100,
            multiplier: 0.5,
            max_millis: 1_000,
        };
        assert_eq!(backoff.delay(0), Duration::from_millis(100));
        assert_eq!(backoff.delay(3), Duration::from_millis(100));
    }

    #[test]
    fn test_sink_take_and_reset() {
        let sink = FindingSink::new();
        let draft = FindingDraft::new(Category::Social, Polarity::Risk, Severity::Low, "x");
        sink.push(draft.clone());
        sink.push(draft);
        assert_eq!(sink.len(), 2);

        sink.reset();
        assert!(sink.is_empty());

        sink.push(FindingDraft::new(Category::Social, Polarity::Risk, Severity::Low, "y"));
        let taken = sink.take();
        assert_eq!(taken.len(), 1);
        assert!(sink.is_empty());
    }
}

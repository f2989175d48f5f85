//! Analysis engine
//!
//! The engine's whole surface is four operations:
//! [`Engine::start_run`], [`Engine::subscribe`], [`Engine::result`] and
//! [`Engine::cancel`]. Each run is executed on its own Tokio task and owns
//! its findings, debate and result; only the worker registry and the worker
//! permits are shared between runs.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock, Semaphore};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use gaia_adversarial::{
    ChallengeSource, ConflictChallenger, ConsensusBuilder, DebateConfig, DebateCoordinator,
};
use gaia_core::{ConsensusResult, FindingStatus};

use crate::config::EngineConfig;
use crate::dispatcher::{DispatchLimits, Dispatcher};
use crate::error::EngineError;
use crate::progress::{ProgressEvent, ProgressNotifier, ProgressSink, ProgressStream};
use crate::registry::WorkerRegistry;
use crate::worker::AnalysisContext;

/// Run identifier
pub type RunId = Uuid;

/// Per-run options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOptions {
    pub debate_rounds: u32,
    pub per_worker_timeout: Duration,
    pub total_deadline: Duration,
    #[serde(default)]
    pub context: AnalysisContext,
}

impl Default for RunOptions {
    fn default() -> Self {
        EngineConfig::default().run_options()
    }
}

impl RunOptions {
    pub fn with_rounds(mut self, rounds: u32) -> Self {
        self.debate_rounds = rounds;
        self
    }

    pub fn with_worker_timeout(mut self, timeout: Duration) -> Self {
        self.per_worker_timeout = timeout;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.total_deadline = deadline;
        self
    }

    pub fn with_context(mut self, context: AnalysisContext) -> Self {
        self.context = context;
        self
    }

    fn validate(&self) -> Result<(), EngineError> {
        if self.per_worker_timeout.is_zero() {
            return Err(EngineError::InvalidOptions(
                "per-worker timeout must be > 0".into(),
            ));
        }
        if self.total_deadline.is_zero() {
            return Err(EngineError::InvalidOptions("total deadline must be > 0".into()));
        }
        Ok(())
    }
}

/// Why a run did not complete
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    Cancelled,
    DeadlineExceeded,
    /// Every worker failed or returned nothing usable
    NoFindings,
    /// Debate or consensus could not be computed
    Internal(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => f.write_str("cancelled"),
            Self::DeadlineExceeded => f.write_str("deadline_exceeded"),
            Self::NoFindings => f.write_str("no_findings"),
            Self::Internal(msg) => write!(f, "internal: {}", msg),
        }
    }
}

/// Current state of a run
#[derive(Debug, Clone)]
pub enum RunStatus {
    Pending,
    Completed(Arc<ConsensusResult>),
    Failed {
        reason: FailureReason,
        /// Best-effort result built before the failure
        partial: Option<Arc<ConsensusResult>>,
    },
}

impl RunStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    /// The full or partial result, if any
    pub fn result(&self) -> Option<&Arc<ConsensusResult>> {
        match self {
            Self::Completed(result) => Some(result),
            Self::Failed { partial, .. } => partial.as_ref(),
            Self::Pending => None,
        }
    }
}

struct RunHandle {
    notifier: Arc<ProgressNotifier>,
    cancel: CancellationToken,
    status: watch::Receiver<RunStatus>,
}

struct EngineInner {
    config: EngineConfig,
    registry: Arc<WorkerRegistry>,
    permits: Arc<Semaphore>,
    sinks: Vec<Arc<dyn ProgressSink>>,
    challenger: Arc<dyn ChallengeSource>,
    consensus: ConsensusBuilder,
    runs: RwLock<HashMap<RunId, RunHandle>>,
}

/// Multi-agent analysis engine
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

/// Builder for [`Engine`]
pub struct EngineBuilder {
    config: EngineConfig,
    registry: WorkerRegistry,
    sinks: Vec<Arc<dyn ProgressSink>>,
    challenger: Option<Arc<dyn ChallengeSource>>,
}

impl EngineBuilder {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn registry(mut self, registry: WorkerRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Attach a sink that sees every run's events
    pub fn sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Replace the default conflict-driven challenge source
    pub fn challenger(mut self, challenger: Arc<dyn ChallengeSource>) -> Self {
        self.challenger = Some(challenger);
        self
    }

    pub fn build(self) -> Result<Engine, EngineError> {
        self.config.validate()?;
        let challenger: Arc<dyn ChallengeSource> = match self.challenger {
            Some(challenger) => challenger,
            None => Arc::new(ConflictChallenger::new(self.config.debate.min_challenge_severity)),
        };

        Ok(Engine {
            inner: Arc::new(EngineInner {
                permits: Arc::new(Semaphore::new(self.config.max_concurrent_workers)),
                consensus: ConsensusBuilder::new(self.config.category_weights.clone()),
                config: self.config,
                registry: Arc::new(self.registry),
                sinks: self.sinks,
                challenger,
                runs: RwLock::new(HashMap::new()),
            }),
        })
    }
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder {
            config: EngineConfig::default(),
            registry: WorkerRegistry::new(),
            sinks: Vec::new(),
            challenger: None,
        }
    }

    /// Engine with the given workers and default settings
    pub fn new(config: EngineConfig, registry: WorkerRegistry) -> Result<Self, EngineError> {
        Self::builder().config(config).registry(registry).build()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &WorkerRegistry {
        &self.inner.registry
    }

    /// Start analysing `target`; returns immediately
    pub async fn start_run(&self, target: &str, options: RunOptions) -> Result<RunId, EngineError> {
        options.validate()?;

        let run_id = Uuid::new_v4();
        let notifier = Arc::new(ProgressNotifier::new(
            run_id,
            self.inner.config.subscriber_buffer,
            self.inner.sinks.clone(),
        ));
        let cancel = CancellationToken::new();
        let (status_tx, status_rx) = watch::channel(RunStatus::Pending);

        notifier.publish(ProgressEvent::RunStarted {
            target: target.to_string(),
            workers: self.inner.registry.ids(),
        });

        self.inner.runs.write().await.insert(
            run_id,
            RunHandle {
                notifier: Arc::clone(&notifier),
                cancel: cancel.clone(),
                status: status_rx,
            },
        );

        info!(run = %run_id, entity = target, workers = self.inner.registry.len(), "Run started");

        let inner = Arc::clone(&self.inner);
        let target = target.to_string();
        let span = info_span!("run", run = %run_id);
        tokio::spawn(
            async move {
                let status = execute(&inner, &target, options, &notifier, &cancel).await;
                match &status {
                    RunStatus::Completed(result) => {
                        metrics::counter!("gaia_runs_completed_total").increment(1);
                        notifier.publish(ProgressEvent::RunCompleted {
                            result: Arc::clone(result),
                        });
                    }
                    RunStatus::Failed { reason, .. } => {
                        metrics::counter!("gaia_runs_failed_total").increment(1);
                        notifier.publish(ProgressEvent::RunFailed {
                            reason: reason.clone(),
                        });
                    }
                    RunStatus::Pending => {}
                }
                let _ = status_tx.send(status);
            }
            .instrument(span),
        );

        Ok(run_id)
    }

    /// Progress events of a run, starting from its first event
    pub async fn subscribe(&self, run_id: RunId) -> Result<ProgressStream, EngineError> {
        let runs = self.inner.runs.read().await;
        let handle = runs.get(&run_id).ok_or(EngineError::UnknownRun(run_id))?;
        Ok(handle.notifier.subscribe())
    }

    /// Current status without waiting
    pub async fn result(&self, run_id: RunId) -> Result<RunStatus, EngineError> {
        let runs = self.inner.runs.read().await;
        let handle = runs.get(&run_id).ok_or(EngineError::UnknownRun(run_id))?;
        let status = handle.status.borrow().clone();
        Ok(status)
    }

    /// Wait until the run leaves `Pending`
    pub async fn wait(&self, run_id: RunId) -> Result<RunStatus, EngineError> {
        let mut status = {
            let runs = self.inner.runs.read().await;
            let handle = runs.get(&run_id).ok_or(EngineError::UnknownRun(run_id))?;
            handle.status.clone()
        };
        let waited = status.wait_for(|s| !s.is_pending()).await.map(|s| s.clone());
        let settled = match waited {
            Ok(s) => s,
            // The run task is gone without reporting; nothing more will come.
            Err(_) => status.borrow().clone(),
        };
        Ok(settled)
    }

    /// Abort a run; a no-op once the run has finished
    pub async fn cancel(&self, run_id: RunId) -> Result<(), EngineError> {
        let runs = self.inner.runs.read().await;
        let handle = runs.get(&run_id).ok_or(EngineError::UnknownRun(run_id))?;
        if handle.status.borrow().is_pending() {
            info!(run = %run_id, "Cancelling run");
        }
        handle.cancel.cancel();
        Ok(())
    }

    /// Forget a finished run; returns its final status
    pub async fn release(&self, run_id: RunId) -> Result<Option<RunStatus>, EngineError> {
        let mut runs = self.inner.runs.write().await;
        let pending = runs
            .get(&run_id)
            .ok_or(EngineError::UnknownRun(run_id))?
            .status
            .borrow()
            .is_pending();
        if pending {
            return Ok(None);
        }
        Ok(runs.remove(&run_id).map(|handle| {
            let status = handle.status.borrow().clone();
            status
        }))
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.inner.config)
            .field("registry", &self.inner.registry)
            .finish()
    }
}

/// Dispatch, debate and build consensus for one run
async fn execute(
    inner: &EngineInner,
    target: &str,
    options: RunOptions,
    notifier: &ProgressNotifier,
    cancel: &CancellationToken,
) -> RunStatus {
    let started = Instant::now();
    let deadline = started + options.total_deadline;

    let dispatcher = Dispatcher::new(
        Arc::clone(&inner.registry),
        Arc::clone(&inner.permits),
        inner.config.confidence.clone(),
    );
    let report = dispatcher
        .dispatch(
            target,
            &options.context,
            DispatchLimits {
                per_worker_timeout: options.per_worker_timeout,
                deadline,
            },
            cancel,
            notifier,
        )
        .await;

    if report.cancelled {
        return RunStatus::Failed {
            reason: FailureReason::Cancelled,
            partial: None,
        };
    }
    let mut deadline_exceeded = report.deadline_exceeded;

    if report.findings.is_empty() {
        warn!(entity = target, "No findings collected");
        let reason = if deadline_exceeded {
            FailureReason::DeadlineExceeded
        } else {
            FailureReason::NoFindings
        };
        return RunStatus::Failed {
            reason,
            partial: None,
        };
    }

    let coordinator = DebateCoordinator::new(
        DebateConfig {
            rounds: options.debate_rounds,
            ..inner.config.debate.clone()
        },
        inner.config.confidence.clone(),
    );
    let mut debate = match coordinator.begin(report.findings) {
        Ok(debate) => debate,
        Err(e) => return internal(e),
    };
    for worker in inner.registry.iter() {
        debate.register_domain(worker.id(), worker.domain());
    }

    while !debate.is_finished() {
        if cancel.is_cancelled() {
            return RunStatus::Failed {
                reason: FailureReason::Cancelled,
                partial: None,
            };
        }
        if Instant::now() >= deadline {
            warn!(rounds = debate.rounds_played(), "Run deadline reached during debate");
            deadline_exceeded = true;
            break;
        }

        let number = debate.rounds_played() + 1;
        notifier.publish(ProgressEvent::DebateRoundStarted { round: number });
        let accepted = match debate.play_round(inner.challenger.as_ref()) {
            Ok(round) => round.challenges_accepted(),
            Err(e) => return internal(e),
        };
        notifier.publish(ProgressEvent::DebateRoundCompleted {
            round: number,
            challenges_accepted: accepted,
        });
        tokio::task::yield_now().await;
    }

    let outcome = match debate.conclude() {
        Ok(outcome) => outcome,
        Err(e) => return internal(e),
    };
    let validated = outcome.validated().count();
    let result = match inner.consensus.build(target, outcome) {
        Ok(result) => Arc::new(result),
        Err(e) => return internal(e),
    };

    info!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        validated,
        rejected = result.count_with_status(FindingStatus::Rejected),
        "Run finished"
    );

    if deadline_exceeded {
        return RunStatus::Failed {
            reason: FailureReason::DeadlineExceeded,
            partial: (validated > 0).then_some(result),
        };
    }
    RunStatus::Completed(result)
}

fn internal(error: impl fmt::Display) -> RunStatus {
    warn!(%error, "Run aborted");
    RunStatus::Failed {
        reason: FailureReason::Internal(error.to_string()),
        partial: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_reason_labels() {
        assert_eq!(FailureReason::Cancelled.to_string(), "cancelled");
        assert_eq!(FailureReason::DeadlineExceeded.to_string(), "deadline_exceeded");
        let json = serde_json::to_string(&FailureReason::NoFindings).unwrap();
        assert_eq!(json, "\"no_findings\"");
    }

    #[test]
    fn test_zero_timeouts_rejected() {
        let options = RunOptions::default().with_worker_timeout(Duration::ZERO);
        assert!(matches!(
            options.validate(),
            Err(EngineError::InvalidOptions(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_run() {
        let engine = Engine::new(EngineConfig::default(), WorkerRegistry::new()).unwrap();
        let id = Uuid::new_v4();
        assert!(matches!(engine.result(id).await, Err(EngineError::UnknownRun(_))));
        assert!(engine.cancel(id).await.is_err());
    }

    #[tokio::test]
    async fn test_empty_registry_fails_with_no_findings() {
        let engine = Engine::new(EngineConfig::default(), WorkerRegistry::new()).unwrap();
        let run = engine.start_run("acme", RunOptions::default()).await.unwrap();
        match engine.wait(run).await.unwrap() {
            RunStatus::Failed { reason, partial } => {
                assert_eq!(reason, FailureReason::NoFindings);
                assert!(partial.is_none());
            }
            other => panic!("unexpected status {other:?}"),
        }
    }
}

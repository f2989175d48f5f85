//! Progress notification
//!
//! Each run owns a [`ProgressNotifier`]. Publishing never waits: every
//! subscriber has its own bounded channel and an event that does not fit is
//! dropped for that subscriber only. The notifier keeps the run's history so
//! a late subscriber still sees every event, in emission order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

use gaia_core::{ConsensusResult, WorkerId};

use crate::engine::{FailureReason, RunId};

/// Stream of progress updates for one run; ends after the terminal event
pub type ProgressStream = ReceiverStream<ProgressUpdate>;

/// Discrete run events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    RunStarted {
        target: String,
        workers: Vec<WorkerId>,
    },
    WorkerCompleted {
        worker_id: WorkerId,
        findings: usize,
        attempts: u32,
    },
    WorkerTimeout {
        worker_id: WorkerId,
        partial_findings: usize,
    },
    WorkerError {
        worker_id: WorkerId,
        error: String,
        attempts: u32,
    },
    DebateRoundStarted {
        round: u32,
    },
    DebateRoundCompleted {
        round: u32,
        challenges_accepted: usize,
    },
    RunCompleted {
        result: Arc<ConsensusResult>,
    },
    RunFailed {
        reason: FailureReason,
    },
}

impl ProgressEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::RunStarted { .. } => "run_started",
            Self::WorkerCompleted { .. } => "worker_completed",
            Self::WorkerTimeout { .. } => "worker_timeout",
            Self::WorkerError { .. } => "worker_error",
            Self::DebateRoundStarted { .. } => "debate_round_started",
            Self::DebateRoundCompleted { .. } => "debate_round_completed",
            Self::RunCompleted { .. } => "run_completed",
            Self::RunFailed { .. } => "run_failed",
        }
    }

    /// No events follow a terminal event
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::RunCompleted { .. } | Self::RunFailed { .. })
    }
}

/// An event stamped with its run and position
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub run_id: RunId,
    /// 1-based, gapless per run
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: ProgressEvent,
}

/// Receives every update of every run.
///
/// Called on the run's own task, after the update is queued for subscribers
/// and with no lock held. Implementations must return promptly; hand slow
/// work off to a channel or a spawned task.
pub trait ProgressSink: Send + Sync {
    fn publish(&self, update: &ProgressUpdate);
}

/// Mirrors progress into the log
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn publish(&self, update: &ProgressUpdate) {
        let run = update.run_id;
        match &update.event {
            ProgressEvent::WorkerTimeout { worker_id, .. } => {
                warn!(%run, worker = %worker_id, "Worker timed out")
            }
            ProgressEvent::WorkerError {
                worker_id, error, ..
            } => warn!(%run, worker = %worker_id, %error, "Worker failed"),
            ProgressEvent::RunFailed { reason } => warn!(%run, %reason, "Run failed"),
            ProgressEvent::RunCompleted { result } => info!(
                %run,
                overall = result.overall_score,
                risk = result.risk_level.as_str(),
                "Run completed"
            ),
            event => debug!(%run, sequence = update.sequence, event = event.name(), "Progress"),
        }
    }
}

#[derive(Debug, Default)]
struct NotifierState {
    sequence: u64,
    history: Vec<ProgressUpdate>,
    subscribers: Vec<mpsc::Sender<ProgressUpdate>>,
    closed: bool,
}

/// Per-run fan-out of progress events
pub struct ProgressNotifier {
    run_id: RunId,
    buffer: usize,
    sinks: Vec<Arc<dyn ProgressSink>>,
    state: Mutex<NotifierState>,
}

impl ProgressNotifier {
    pub fn new(run_id: RunId, buffer: usize, sinks: Vec<Arc<dyn ProgressSink>>) -> Self {
        Self {
            run_id,
            buffer: buffer.max(1),
            sinks,
            state: Mutex::new(NotifierState::default()),
        }
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Publish an event; events after the terminal one are ignored
    pub fn publish(&self, event: ProgressEvent) {
        let mut state = self.lock();
        if state.closed {
            debug!(run = %self.run_id, event = event.name(), "Event after run end ignored");
            return;
        }

        state.sequence += 1;
        let terminal = event.is_terminal();
        let update = ProgressUpdate {
            run_id: self.run_id,
            sequence: state.sequence,
            timestamp: Utc::now(),
            event,
        };

        state.subscribers.retain(|tx| match tx.try_send(update.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                metrics::counter!("gaia_progress_events_dropped_total").increment(1);
                true
            }
            Err(TrySendError::Closed(_)) => false,
        });
        state.history.push(update.clone());

        if terminal {
            state.closed = true;
            // Dropping the senders ends every stream.
            state.subscribers.clear();
        }
        drop(state);

        // Subscribers and late subscribers never wait on a host sink.
        for sink in &self.sinks {
            sink.publish(&update);
        }
    }

    /// Stream of this run's events, starting with everything already emitted
    pub fn subscribe(&self) -> ProgressStream {
        let mut state = self.lock();
        let (tx, rx) = mpsc::channel(self.buffer + state.history.len());
        for update in &state.history {
            // Capacity covers the whole history.
            let _ = tx.try_send(update.clone());
        }
        if !state.closed {
            state.subscribers.push(tx);
        }
        ReceiverStream::new(rx)
    }

    /// Events emitted so far
    pub fn history(&self) -> Vec<ProgressUpdate> {
        self.lock().history.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn lock(&self) -> MutexGuard<'_, NotifierState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for ProgressNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressNotifier")
            .field("run_id", &self.run_id)
            .field("buffer", &self.buffer)
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

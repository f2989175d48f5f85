//! Parallel dispatcher
//!
//! Runs every registered worker concurrently under one shared deadline.
//! Each worker gets its own timeout and retry loop; the dispatcher waits on
//! whichever comes first of the next completion, the run deadline and the
//! run's cancellation token.

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use gaia_core::{ConfidenceModel, Finding, FindingDraft, FindingId, WorkerId};

use crate::progress::{ProgressEvent, ProgressNotifier};
use crate::registry::WorkerRegistry;
use crate::worker::{AnalysisContext, AnalysisWorker, FindingSink, WorkerError};

/// How a worker's participation ended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WorkerOutcome {
    Completed,
    /// Partial findings kept
    TimedOut,
    /// No findings kept
    Failed { error: WorkerError },
}

/// Per-worker summary of a dispatch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerReport {
    pub worker_id: WorkerId,
    pub outcome: WorkerOutcome,
    /// Findings kept from this worker
    pub findings: usize,
    pub attempts: u32,
}

/// Everything gathered before debate
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Kept findings, ordered by (worker id, finding id)
    pub findings: Vec<Finding>,
    pub workers: Vec<WorkerReport>,
    /// The run deadline fired before every worker returned
    pub deadline_exceeded: bool,
    /// The run was cancelled; `findings` is empty
    pub cancelled: bool,
}

/// Limits for one dispatch
#[derive(Debug, Clone)]
pub struct DispatchLimits {
    pub per_worker_timeout: Duration,
    pub deadline: Instant,
}

struct AttemptResult {
    worker_id: WorkerId,
    outcome: WorkerOutcome,
    attempts: u32,
}

/// Fans a target out to every worker of a registry
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<WorkerRegistry>,
    permits: Arc<Semaphore>,
    model: ConfidenceModel,
}

impl Dispatcher {
    /// `permits` is shared by every run of the process
    pub fn new(
        registry: Arc<WorkerRegistry>,
        permits: Arc<Semaphore>,
        model: ConfidenceModel,
    ) -> Self {
        Self {
            registry,
            permits,
            model,
        }
    }

    pub async fn dispatch(
        &self,
        target: &str,
        context: &AnalysisContext,
        limits: DispatchLimits,
        cancel: &CancellationToken,
        notifier: &ProgressNotifier,
    ) -> DispatchReport {
        let mut tasks = JoinSet::new();
        // Sinks of workers still running, so a deadline can keep their partial output.
        let mut pending: BTreeMap<WorkerId, (Arc<dyn AnalysisWorker>, FindingSink)> =
            BTreeMap::new();

        for worker in self.registry.iter() {
            let sink = FindingSink::new();
            let timeout = worker
                .timeout()
                .map_or(limits.per_worker_timeout, |t| t.min(limits.per_worker_timeout));
            pending.insert(worker.id().to_string(), (Arc::clone(worker), sink.clone()));

            let worker = Arc::clone(worker);
            let permits = Arc::clone(&self.permits);
            let target = target.to_string();
            let context = context.clone();
            tasks.spawn(async move {
                let worker_id = worker.id().to_string();
                let run = AssertUnwindSafe(async {
                    // Time spent waiting for a permit does not count against the worker.
                    let _permit = match permits.acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => {
                            return (
                                WorkerOutcome::Failed {
                                    error: WorkerError::Logic("worker pool closed".into()),
                                },
                                0,
                            )
                        }
                    };
                    run_worker(worker.as_ref(), &target, &context, &sink, timeout).await
                })
                .catch_unwind()
                .await;

                let (outcome, attempts) = run.unwrap_or_else(|_| {
                    (
                        WorkerOutcome::Failed {
                            error: WorkerError::Logic("worker panicked".into()),
                        },
                        1,
                    )
                });
                AttemptResult {
                    worker_id,
                    outcome,
                    attempts,
                }
            });
        }

        let mut report = DispatchReport::default();
        let deadline = tokio::time::sleep_until(limits.deadline);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    tasks.abort_all();
                    info!(pending = pending.len(), "Dispatch cancelled, discarding findings");
                    return DispatchReport {
                        cancelled: true,
                        ..Default::default()
                    };
                }

                _ = &mut deadline => {
                    tasks.abort_all();
                    report.deadline_exceeded = true;
                    warn!(pending = pending.len(), "Run deadline reached, aborting workers");
                    for (worker_id, (worker, sink)) in std::mem::take(&mut pending) {
                        let drafts = sink.take();
                        self.timed_out(&mut report, worker.as_ref(), drafts, 0, notifier);
                        debug!(worker = %worker_id, "Aborted at run deadline");
                    }
                    break;
                }

                joined = tasks.join_next() => {
                    let Some(joined) = joined else { break };
                    let Ok(result) = joined else {
                        // Only aborts produce join errors; panics are caught inside the task.
                        continue;
                    };
                    let Some((worker, sink)) = pending.remove(&result.worker_id) else {
                        continue;
                    };
                    match result.outcome {
                        WorkerOutcome::Completed => {
                            let findings = self.propose_all(worker.as_ref(), sink.take());
                            info!(
                                worker = %result.worker_id,
                                findings = findings.len(),
                                attempts = result.attempts,
                                "Worker completed"
                            );
                            notifier.publish(ProgressEvent::WorkerCompleted {
                                worker_id: result.worker_id.clone(),
                                findings: findings.len(),
                                attempts: result.attempts,
                            });
                            report.workers.push(WorkerReport {
                                worker_id: result.worker_id,
                                outcome: WorkerOutcome::Completed,
                                findings: findings.len(),
                                attempts: result.attempts,
                            });
                            report.findings.extend(findings);
                        }
                        WorkerOutcome::TimedOut => {
                            self.timed_out(
                                &mut report,
                                worker.as_ref(),
                                sink.take(),
                                result.attempts,
                                notifier,
                            );
                        }
                        WorkerOutcome::Failed { error } => {
                            warn!(
                                worker = %result.worker_id,
                                %error,
                                attempts = result.attempts,
                                "Worker failed"
                            );
                            metrics::counter!("gaia_worker_errors_total").increment(1);
                            notifier.publish(ProgressEvent::WorkerError {
                                worker_id: result.worker_id.clone(),
                                error: error.to_string(),
                                attempts: result.attempts,
                            });
                            report.workers.push(WorkerReport {
                                worker_id: result.worker_id,
                                outcome: WorkerOutcome::Failed { error },
                                findings: 0,
                                attempts: result.attempts,
                            });
                        }
                    }
                }
            }
        }

        report
            .findings
            .sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        report
    }

    fn timed_out(
        &self,
        report: &mut DispatchReport,
        worker: &dyn AnalysisWorker,
        drafts: Vec<FindingDraft>,
        attempts: u32,
        notifier: &ProgressNotifier,
    ) {
        let findings = self.propose_all(worker, drafts);
        warn!(
            worker = worker.id(),
            partial_findings = findings.len(),
            "Worker timed out"
        );
        metrics::counter!("gaia_worker_timeouts_total").increment(1);
        notifier.publish(ProgressEvent::WorkerTimeout {
            worker_id: worker.id().to_string(),
            partial_findings: findings.len(),
        });
        report.workers.push(WorkerReport {
            worker_id: worker.id().to_string(),
            outcome: WorkerOutcome::TimedOut,
            findings: findings.len(),
            attempts,
        });
        report.findings.extend(findings);
    }

    /// Turn drafts into proposed findings; ids follow emission order
    fn propose_all(&self, worker: &dyn AnalysisWorker, drafts: Vec<FindingDraft>) -> Vec<Finding> {
        drafts
            .into_iter()
            .enumerate()
            .filter_map(|(i, draft)| {
                let id = FindingId::new(worker.id(), i as u32 + 1);
                match Finding::propose(id, worker.id(), worker.domain(), draft, &self.model) {
                    Ok(finding) => Some(finding),
                    Err(e) => {
                        warn!(worker = worker.id(), error = %e, "Draft discarded");
                        None
                    }
                }
            })
            .collect()
    }
}

/// Attempt loop under a single timeout covering every attempt and backoff
async fn run_worker(
    worker: &dyn AnalysisWorker,
    target: &str,
    context: &AnalysisContext,
    sink: &FindingSink,
    timeout: Duration,
) -> (WorkerOutcome, u32) {
    let policy = worker.retry_policy();
    let mut attempts = 0u32;

    let result = tokio::time::timeout(timeout, async {
        loop {
            attempts += 1;
            sink.reset();
            match worker.collect(target, context, sink).await {
                Ok(()) => return Ok(()),
                Err(e) if policy.should_retry(&e, attempts) => {
                    let delay = policy.backoff.delay(attempts - 1);
                    info!(
                        worker = worker.id(),
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Worker attempt failed, retrying with backoff"
                    );
                    // A failed attempt's drafts never count as partial output.
                    sink.reset();
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    })
    .await;

    match result {
        Ok(Ok(())) => (WorkerOutcome::Completed, attempts),
        Ok(Err(error)) => {
            sink.reset();
            (WorkerOutcome::Failed { error }, attempts)
        }
        Err(_) => (WorkerOutcome::TimedOut, attempts),
    }
}

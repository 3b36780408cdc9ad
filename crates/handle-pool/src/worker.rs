//! Per-credential worker loop
//!
//! One worker runs per enabled credential and owns that credential's state
//! for the whole run. Each iteration:
//!
//! 1. Fetch a task with a bounded wait
//! 2. Requeue it and back off if the credential is cooling down
//! 3. Take a slot from the global gate
//! 4. Probe, bounded by the probe timeout
//! 5. Release the slot
//! 6. Settle: emit a terminal result and mark the task done, or requeue it on
//!    a rate limit and start the credential's cooldown
//! 7. Sleep a randomized pacing interval
//!
//! An empty fetch does not end the worker while other tasks are still in
//! flight or requeued elsewhere; it only exits once the queue is drained or
//! the run is cancelled.

use std::sync::Arc;
use std::time::Duration;

use probe::{AvailabilityProbe, Outcome};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::credential::CredentialState;
use crate::gate::ConcurrencyGate;
use crate::metrics;
use crate::queue::{Task, TaskQueue};
use crate::report::{CheckResult, Verdict};
use crate::settings::Settings;

/// Everything a worker shares with the rest of its run.
///
/// One context exists per run; workers hold it through an `Arc`. The result
/// sender lives here, so the collector's channel closes once the distributor
/// and every worker have dropped their handle.
pub struct RunContext {
    pub queue: Arc<TaskQueue>,
    pub gate: Arc<ConcurrencyGate>,
    pub probe: Arc<dyn AvailabilityProbe>,
    pub settings: Settings,
    pub results: mpsc::UnboundedSender<CheckResult>,
    pub cancel: CancellationToken,
}

pub struct Worker {
    credential: CredentialState,
    ctx: Arc<RunContext>,
}

impl Worker {
    pub fn new(credential: CredentialState, ctx: Arc<RunContext>) -> Self {
        Self { credential, ctx }
    }

    /// Run until the queue drains or the run is cancelled, then hand the
    /// credential back for reporting.
    pub async fn run(mut self) -> CredentialState {
        let ctx = self.ctx.clone();
        debug!(account_id = self.credential.id(), "worker started");

        loop {
            let popped = tokio::select! {
                biased;
                _ = ctx.cancel.cancelled() => break,
                popped = ctx.queue.pop(ctx.settings.fetch_timeout) => popped,
            };

            let Some(task) = popped else {
                if ctx.queue.is_drained() {
                    break;
                }
                // Idle: tasks are still in flight or cooling elsewhere
                continue;
            };

            if !self.credential.is_available() {
                debug!(
                    account_id = self.credential.id(),
                    handle = %task.handle,
                    cooldown_remaining_secs = self.credential.cooldown_remaining().as_secs(),
                    "credential cooling down, requeueing"
                );
                ctx.queue.requeue(task);
                metrics::record_requeue();
                if !self.pause(ctx.settings.requeue_delay).await {
                    break;
                }
                continue;
            }

            let permit = tokio::select! {
                biased;
                _ = ctx.cancel.cancelled() => {
                    ctx.queue.requeue(task);
                    break;
                }
                permit = ctx.gate.acquire() => permit,
            };
            let Some(permit) = permit else {
                error!(account_id = self.credential.id(), "concurrency gate closed, worker exiting");
                ctx.queue.requeue(task);
                break;
            };

            let (outcome, latency) = self.probe(&task.handle).await;
            drop(permit);
            self.settle(task, outcome, latency);

            if ctx.queue.is_drained() {
                break;
            }
            if !self.pause(ctx.settings.pacing.sample()).await {
                break;
            }
        }

        debug!(
            account_id = self.credential.id(),
            attempts = self.credential.total_attempts(),
            "worker finished"
        );
        self.credential
    }

    /// Sleep unless cancelled first. Returns false on cancellation.
    async fn pause(&self, delay: Duration) -> bool {
        tokio::select! {
            biased;
            _ = self.ctx.cancel.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }

    async fn probe(&self, handle: &str) -> (Outcome, Duration) {
        let timeout = self.ctx.settings.probe_timeout;
        let started = Instant::now();
        let check = self
            .ctx
            .probe
            .check(self.credential.credential(), handle, timeout);
        let outcome = match tokio::time::timeout(timeout, check).await {
            Ok(outcome) => outcome,
            Err(_) => Outcome::TransientError {
                detail: format!("probe timed out after {}ms", timeout.as_millis()),
            },
        };
        let latency = started.elapsed();
        metrics::record_probe_duration(outcome.label(), latency.as_secs_f64());
        (outcome, latency)
    }

    fn settle(&mut self, task: Task, outcome: Outcome, latency: Duration) {
        let account_id = self.credential.id().to_string();
        let Some(verdict) = Verdict::from_outcome(&outcome) else {
            if let Outcome::RateLimited { retry_after } = outcome {
                self.back_off(task, retry_after, latency);
            }
            return;
        };

        let detail = match outcome {
            Outcome::TransientError { detail } => Some(detail),
            _ => None,
        };
        match verdict {
            Verdict::Available => info!(account_id, handle = %task.handle, "handle available"),
            Verdict::Taken => info!(account_id, handle = %task.handle, "handle taken"),
            Verdict::Invalid => {
                info!(account_id, handle = %task.handle, "handle rejected as invalid")
            }
            Verdict::Error => warn!(
                account_id,
                handle = %task.handle,
                error = detail.as_deref().unwrap_or_default(),
                "probe failed"
            ),
        }
        self.credential.record_outcome(verdict != Verdict::Error, latency);
        self.emit(task, verdict, latency, detail);
    }

    /// Rate limited: cool the credential down and hand the task back.
    fn back_off(&mut self, task: Task, retry_after: Duration, latency: Duration) {
        let account_id = self.credential.id().to_string();
        warn!(
            account_id,
            handle = %task.handle,
            retry_after_secs = retry_after.as_secs(),
            requeues = task.requeues,
            "rate limited, requeueing handle"
        );
        self.credential.record_outcome(false, latency);
        self.credential.enter_cooldown(retry_after);
        metrics::record_rate_limit(&account_id);
        metrics::record_requeue();
        self.ctx.queue.requeue(task);
    }

    /// Send a terminal result, then mark the task done.
    ///
    /// Sending first guarantees every result is in the channel by the time
    /// `join` observes the drain.
    fn emit(&self, task: Task, verdict: Verdict, latency: Duration, detail: Option<String>) {
        let result = CheckResult {
            handle: task.handle,
            verdict,
            credential_id: self.credential.id().to_string(),
            latency,
            detail,
        };
        if let Err(e) = self.ctx.results.send(result) {
            error!(handle = %e.0.handle, "result collector gone, dropping result");
        }
        self.ctx.queue.mark_done();
    }
}

//! Run orchestration
//!
//! The distributor filters the input, starts one worker per enabled
//! credential and a single result collector, then waits for the queue to
//! drain. The collector is the only writer to the sink.
//!
//! Completion is decided by the queue's outstanding count, not by an empty
//! fetch, so a worker seeing an empty queue while a handle is cooling on
//! another credential never ends the run early.

use std::sync::Arc;

use probe::AvailabilityProbe;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, info_span, warn};

use crate::credential::CredentialState;
use crate::error::{Error, Result};
use crate::gate::ConcurrencyGate;
use crate::handles::partition_handles;
use crate::metrics;
use crate::queue::{Task, TaskQueue};
use crate::report::{CheckResult, OutcomeCounts, RunReport, Verdict};
use crate::settings::Settings;
use crate::sink::HandleSink;
use crate::worker::{RunContext, Worker};

pub struct Distributor {
    settings: Settings,
    probe: Arc<dyn AvailabilityProbe>,
    sink: Box<dyn HandleSink>,
}

struct Collected {
    results: Vec<CheckResult>,
    counts: OutcomeCounts,
    sink_errors: usize,
}

impl Distributor {
    pub fn new(
        settings: Settings,
        probe: Arc<dyn AvailabilityProbe>,
        sink: Box<dyn HandleSink>,
    ) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            settings,
            probe,
            sink,
        })
    }

    /// Check every valid handle and return once each has a terminal result
    /// or the run is cancelled.
    ///
    /// Handles failing the format rule are dropped before queueing. Disabled
    /// credentials are excluded; with none left the run fails with
    /// `NoEligibleCredentials` before anything is probed.
    ///
    /// On cancellation no new probe calls start, calls already in flight
    /// finish and have their results recorded, and every handle without a
    /// terminal result is counted in `RunReport::pending`.
    pub async fn run<I, S>(
        self,
        handles: I,
        credentials: Vec<CredentialState>,
        cancel: CancellationToken,
    ) -> Result<RunReport>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let (handles, invalid_dropped) = partition_handles(handles);
        if invalid_dropped > 0 {
            info!(
                dropped = invalid_dropped,
                "skipped handles failing the format rule"
            );
        }

        let configured = credentials.len();
        let (enabled, disabled): (Vec<_>, Vec<_>) =
            credentials.into_iter().partition(|c| c.is_enabled());
        for credential in &disabled {
            info!(account_id = credential.id(), "credential disabled, excluded from run");
        }
        if enabled.is_empty() {
            return Err(Error::NoEligibleCredentials { configured });
        }

        let total_valid = handles.len();
        let queue = Arc::new(TaskQueue::new());
        for handle in handles {
            queue.push(Task::new(handle));
        }
        let gate = Arc::new(ConcurrencyGate::new(self.settings.max_concurrency));
        let run_token = cancel.child_token();

        let (tx, rx) = mpsc::unbounded_channel();
        let collector = tokio::spawn(collect(rx, self.sink).in_current_span());

        info!(
            handles = total_valid,
            credentials = enabled.len(),
            disabled = disabled.len(),
            max_concurrency = self.settings.max_concurrency,
            "starting run"
        );

        let jitter = self.settings.cooldown_jitter;
        let max_cooldown = self.settings.max_cooldown;
        let ctx = Arc::new(RunContext {
            queue: queue.clone(),
            gate,
            probe: self.probe,
            settings: self.settings,
            results: tx,
            cancel: run_token.clone(),
        });

        let mut workers = JoinSet::new();
        for (index, credential) in enabled.into_iter().enumerate() {
            let credential = credential
                .with_cooldown_jitter(jitter)
                .with_max_cooldown(max_cooldown);
            let span = info_span!("worker", account_id = %credential.id());
            let worker = Worker::new(credential, ctx.clone());
            workers.spawn(async move { (index, worker.run().await) }.instrument(span));
        }
        // Workers now hold the only references to the result sender
        drop(ctx);

        let wait_workers = async {
            let mut finished = Vec::new();
            while let Some(joined) = workers.join_next().await {
                match joined {
                    Ok(entry) => finished.push(entry),
                    Err(e) => {
                        error!(error = %e, "worker task failed, stopping run");
                        run_token.cancel();
                    }
                }
            }
            finished
        };
        let wait_drained = async {
            tokio::select! {
                _ = queue.join() => {
                    // Nothing left to probe; release workers still pacing
                    run_token.cancel();
                }
                _ = run_token.cancelled() => {}
            }
        };
        let (mut finished, ()) = tokio::join!(wait_workers, wait_drained);
        finished.sort_by_key(|(index, _)| *index);

        let collected = collector
            .await
            .map_err(|e| Error::Internal(format!("result collector failed: {e}")))?;

        let pending = queue.outstanding();
        let cancelled = cancel.is_cancelled();
        if pending > 0 && !cancelled {
            warn!(pending, "run ended with unresolved handles");
        }

        let report = RunReport {
            total_valid,
            invalid_dropped,
            disabled_credentials: disabled.len(),
            counts: collected.counts,
            results: collected.results,
            credentials: finished.iter().map(|(_, c)| c.snapshot()).collect(),
            cancelled,
            pending,
            sink_errors: collected.sink_errors,
        };

        info!(
            available = report.counts.available,
            taken = report.counts.taken,
            invalid = report.counts.invalid,
            errors = report.counts.error,
            rate_limits = report.rate_limits(),
            pending,
            cancelled,
            "run finished"
        );
        Ok(report)
    }
}

/// Drain the result channel until every sender is gone.
async fn collect(
    mut rx: mpsc::UnboundedReceiver<CheckResult>,
    mut sink: Box<dyn HandleSink>,
) -> Collected {
    let mut results = Vec::new();
    let mut counts = OutcomeCounts::default();
    let mut sink_errors = 0;

    while let Some(result) = rx.recv().await {
        counts.record(result.verdict);
        metrics::record_result(result.verdict);
        if result.verdict == Verdict::Available {
            if let Err(e) = sink.append(&result.handle).await {
                error!(handle = %result.handle, error = %e, "failed to record available handle");
                sink_errors += 1;
            }
        }
        results.push(result);
    }

    if let Err(e) = sink.flush().await {
        error!(error = %e, "failed to flush handle sink");
    }

    Collected {
        results,
        counts,
        sink_errors,
    }
}

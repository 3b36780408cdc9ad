//! Engine metrics
//!
//! Emitted through the `metrics` facade; the binary decides whether a
//! recorder is installed. Without one these calls are no-ops.
//!
//! - `checker_results_total` (counter): label `verdict`
//! - `checker_rate_limits_total` (counter): label `account_id`
//! - `checker_requeues_total` (counter)
//! - `checker_probe_duration_seconds` (histogram): label `outcome`
//! - `checker_probes_in_flight` (gauge), maintained by the gate

use crate::report::Verdict;

pub const PROBE_DURATION_METRIC: &str = "checker_probe_duration_seconds";

pub fn record_result(verdict: Verdict) {
    metrics::counter!("checker_results_total", "verdict" => verdict.label()).increment(1);
}

pub fn record_rate_limit(account_id: &str) {
    metrics::counter!("checker_rate_limits_total", "account_id" => account_id.to_string())
        .increment(1);
}

pub fn record_requeue() {
    metrics::counter!("checker_requeues_total").increment(1);
}

pub fn record_probe_duration(outcome: &'static str, duration_secs: f64) {
    metrics::histogram!(PROBE_DURATION_METRIC, "outcome" => outcome).record(duration_secs);
}

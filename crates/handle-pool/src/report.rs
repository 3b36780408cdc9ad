//! Terminal results and the end-of-run summary

use std::time::Duration;

use probe::Outcome;

use crate::credential::CredentialStats;

/// Terminal verdict for one handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    Available,
    Taken,
    Invalid,
    Error,
}

impl Verdict {
    /// Terminal verdict for a probe outcome; `None` for a rate limit,
    /// which sends the handle back to the queue instead.
    pub fn from_outcome(outcome: &Outcome) -> Option<Verdict> {
        match outcome {
            Outcome::Available => Some(Verdict::Available),
            Outcome::Taken => Some(Verdict::Taken),
            Outcome::Invalid => Some(Verdict::Invalid),
            Outcome::TransientError { .. } => Some(Verdict::Error),
            Outcome::RateLimited { .. } => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Available => "available",
            Verdict::Taken => "taken",
            Verdict::Invalid => "invalid",
            Verdict::Error => "error",
        }
    }
}

/// One terminal result. Produced exactly once per handle.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckResult {
    pub handle: String,
    pub verdict: Verdict,
    pub credential_id: String,
    pub latency: Duration,
    /// Error detail for `Verdict::Error`
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomeCounts {
    pub available: usize,
    pub taken: usize,
    pub invalid: usize,
    pub error: usize,
}

impl OutcomeCounts {
    pub fn record(&mut self, verdict: Verdict) {
        match verdict {
            Verdict::Available => self.available += 1,
            Verdict::Taken => self.taken += 1,
            Verdict::Invalid => self.invalid += 1,
            Verdict::Error => self.error += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.available + self.taken + self.invalid + self.error
    }
}

/// Structured summary handed back to the caller.
///
/// `results` is in completion order, not input order.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Handles that passed the format rule and were queued
    pub total_valid: usize,
    /// Candidates dropped by the format rule
    pub invalid_dropped: usize,
    /// Credentials excluded because they were disabled at start
    pub disabled_credentials: usize,
    pub counts: OutcomeCounts,
    pub results: Vec<CheckResult>,
    pub credentials: Vec<CredentialStats>,
    /// True when the run was stopped by external cancellation
    pub cancelled: bool,
    /// Queued handles that never reached a terminal result
    pub pending: usize,
    /// Accepted handles the sink failed to write
    pub sink_errors: usize,
}

impl RunReport {
    pub fn available_handles(&self) -> impl Iterator<Item = &str> {
        self.results
            .iter()
            .filter(|r| r.verdict == Verdict::Available)
            .map(|r| r.handle.as_str())
    }

    /// Total rate-limit signals across all reported credentials.
    pub fn rate_limits(&self) -> u64 {
        self.credentials.iter().map(|c| c.rate_limited).sum()
    }

    pub fn to_json(&self) -> serde_json::Value {
        let status = if self.cancelled {
            "cancelled"
        } else if self.pending > 0 {
            "incomplete"
        } else {
            "completed"
        };
        serde_json::json!({
            "status": status,
            "handles_valid": self.total_valid,
            "handles_invalid": self.invalid_dropped,
            "handles_pending": self.pending,
            "outcomes": {
                "available": self.counts.available,
                "taken": self.counts.taken,
                "invalid": self.counts.invalid,
                "error": self.counts.error,
            },
            "rate_limits": self.rate_limits(),
            "sink_errors": self.sink_errors,
            "credentials_disabled": self.disabled_credentials,
            "credentials": self.credentials.iter().map(CredentialStats::to_json).collect::<Vec<_>>(),
            "available": self.available_handles().collect::<Vec<_>>(),
        })
    }
}

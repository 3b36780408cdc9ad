//! Per-credential runtime state
//!
//! Each worker exclusively owns one `CredentialState`; nothing else mutates
//! it during a run. The distributor only sees it again when the worker hands
//! it back on exit, and reports from a `CredentialStats` snapshot.
//!
//! Cooldown expiry is checked lazily against the clock, so a credential whose
//! window has elapsed is eligible again without any explicit transition.

use std::time::Duration;

use probe::Credential;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::settings::{DelayRange, Settings};

const MIN_COOLDOWN: Duration = Duration::from_millis(1);

/// Runtime status of a credential.
///
/// Transitions:
/// - Available → CoolingDown (rate-limit signal)
/// - CoolingDown → Available (window elapsed)
/// - Disabled is fixed at startup and never changes during a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialStatus {
    Available,
    CoolingDown { until: Instant },
    Disabled,
}

impl CredentialStatus {
    /// Status label for reports and logging.
    pub fn label(&self) -> &'static str {
        match self {
            CredentialStatus::Available => "available",
            CredentialStatus::CoolingDown { .. } => "cooling_down",
            CredentialStatus::Disabled => "disabled",
        }
    }
}

pub struct CredentialState {
    credential: Credential,
    enabled: bool,
    cooldown_until: Option<Instant>,
    cooldown_jitter: DelayRange,
    max_cooldown: Duration,
    total_attempts: u64,
    successes: u64,
    failures: u64,
    rate_limited: u64,
    /// Cumulative mean latency in seconds over every completed probe call.
    avg_latency: f64,
}

impl CredentialState {
    pub fn new(credential: Credential, enabled: bool) -> Self {
        let defaults = Settings::default();
        Self {
            credential,
            enabled,
            cooldown_until: None,
            cooldown_jitter: defaults.cooldown_jitter,
            max_cooldown: defaults.max_cooldown,
            total_attempts: 0,
            successes: 0,
            failures: 0,
            rate_limited: 0,
            avg_latency: 0.0,
        }
    }

    pub fn with_cooldown_jitter(mut self, jitter: DelayRange) -> Self {
        self.cooldown_jitter = jitter;
        self
    }

    /// Upper bound on the base window taken from a rate-limit signal.
    pub fn with_max_cooldown(mut self, max: Duration) -> Self {
        self.max_cooldown = max;
        self
    }

    pub fn id(&self) -> &str {
        &self.credential.id
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// `enabled && (no cooldown || now >= cooldown_until)`
    pub fn is_available(&self) -> bool {
        self.enabled && self.cooldown_until.is_none_or(|until| Instant::now() >= until)
    }

    pub fn status(&self) -> CredentialStatus {
        if !self.enabled {
            return CredentialStatus::Disabled;
        }
        match self.cooldown_until {
            Some(until) if Instant::now() < until => CredentialStatus::CoolingDown { until },
            _ => CredentialStatus::Available,
        }
    }

    /// Time left in the current cooldown window, zero when none is active.
    pub fn cooldown_remaining(&self) -> Duration {
        self.cooldown_until
            .map(|until| until.saturating_duration_since(Instant::now()))
            .unwrap_or_default()
    }

    /// Start a cooldown of `base` plus a random jitter buffer.
    ///
    /// `base` comes from the remote service and is capped at the configured
    /// maximum. Overwrites any current window rather than extending it. The
    /// expiry is always strictly in the future, even for a zero base and zero
    /// jitter, and computing it never overflows.
    pub fn enter_cooldown(&mut self, base: Duration) -> Instant {
        if base > self.max_cooldown {
            warn!(
                account_id = %self.credential.id,
                requested_secs = base.as_secs(),
                max_secs = self.max_cooldown.as_secs(),
                "rate-limit window exceeds maximum, capping"
            );
        }
        let base = base.min(self.max_cooldown);
        let window = base
            .saturating_add(self.cooldown_jitter.sample())
            .max(MIN_COOLDOWN);
        let now = Instant::now();
        let until = now
            .checked_add(window)
            .or_else(|| now.checked_add(self.max_cooldown))
            .unwrap_or(now + MIN_COOLDOWN);
        self.cooldown_until = Some(until);
        self.rate_limited += 1;
        info!(
            account_id = %self.credential.id,
            base_secs = base.as_secs(),
            cooldown_ms = until.saturating_duration_since(now).as_millis() as u64,
            "credential entering cooldown (rate limited)"
        );
        until
    }

    /// Count a completed probe call and fold its latency into the mean.
    pub fn record_outcome(&mut self, success: bool, latency: Duration) {
        self.total_attempts += 1;
        if success {
            self.successes += 1;
        } else {
            self.failures += 1;
        }
        let sample = latency.as_secs_f64();
        self.avg_latency += (sample - self.avg_latency) / self.total_attempts as f64;
    }

    pub fn total_attempts(&self) -> u64 {
        self.total_attempts
    }

    pub fn successes(&self) -> u64 {
        self.successes
    }

    pub fn failures(&self) -> u64 {
        self.failures
    }

    /// Rate-limit signals received, one cooldown each.
    pub fn rate_limited(&self) -> u64 {
        self.rate_limited
    }

    pub fn avg_latency(&self) -> Duration {
        Duration::from_secs_f64(self.avg_latency)
    }

    pub fn snapshot(&self) -> CredentialStats {
        CredentialStats {
            id: self.credential.id.clone(),
            status: self.status().label(),
            cooldown_remaining_secs: self.cooldown_remaining().as_secs(),
            total_attempts: self.total_attempts,
            successes: self.successes,
            failures: self.failures,
            rate_limited: self.rate_limited,
            avg_latency_ms: self.avg_latency * 1000.0,
        }
    }
}

/// Point-in-time copy of a credential's counters for reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct CredentialStats {
    pub id: String,
    pub status: &'static str,
    pub cooldown_remaining_secs: u64,
    pub total_attempts: u64,
    pub successes: u64,
    pub failures: u64,
    pub rate_limited: u64,
    pub avg_latency_ms: f64,
}

impl CredentialStats {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.id,
            "status": self.status,
            "cooldown_remaining_secs": self.cooldown_remaining_secs,
            "total_attempts": self.total_attempts,
            "successes": self.successes,
            "failures": self.failures,
            "rate_limited": self.rate_limited,
            "avg_latency_ms": self.avg_latency_ms,
        })
    }
}

//! Run tunables
//!
//! Every delay the engine uses is configurable. Defaults follow the values
//! the checker has always shipped with: 6 concurrent probes, 1s fetch window,
//! 5s back-off when a credential is cooling down, 3-6s pacing between probes
//! and a 5-15s buffer on top of every rate-limit window. Rate-limit windows
//! longer than an hour are capped.

use std::time::Duration;

use rand::RngExt;

use crate::error::{Error, Result};

/// Inclusive range of durations sampled uniformly at millisecond resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayRange {
    pub min: Duration,
    pub max: Duration,
}

impl DelayRange {
    pub const fn new(min: Duration, max: Duration) -> Self {
        Self { min, max }
    }

    /// A range that always yields `value`.
    pub const fn fixed(value: Duration) -> Self {
        Self {
            min: value,
            max: value,
        }
    }

    /// Draw a random duration in `[min, max]`.
    pub fn sample(&self) -> Duration {
        let min = self.min.as_millis() as u64;
        let max = self.max.as_millis() as u64;
        if max <= min {
            return self.min;
        }
        Duration::from_millis(rand::rng().random_range(min..=max))
    }
}

/// Tunables for one distributor run.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Global cap on in-flight probe calls across all credentials
    pub max_concurrency: usize,
    /// Bounded wait for a task before a worker re-checks for drain
    pub fetch_timeout: Duration,
    /// Sleep after requeueing a task because the credential is cooling down
    pub requeue_delay: Duration,
    /// Randomized delay after every probe call
    pub pacing: DelayRange,
    /// Random buffer added on top of a rate-limit window
    pub cooldown_jitter: DelayRange,
    /// Upper bound on a single probe call
    pub probe_timeout: Duration,
    /// Cap on the rate-limit window a service may impose, before jitter
    pub max_cooldown: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_concurrency: 6,
            fetch_timeout: Duration::from_secs(1),
            requeue_delay: Duration::from_secs(5),
            pacing: DelayRange::new(Duration::from_secs(3), Duration::from_secs(6)),
            cooldown_jitter: DelayRange::new(Duration::from_secs(5), Duration::from_secs(15)),
            probe_timeout: Duration::from_secs(30),
            max_cooldown: Duration::from_secs(3600),
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrency == 0 {
            return Err(Error::InvalidSettings(
                "max_concurrency must be greater than 0".into(),
            ));
        }
        if self.fetch_timeout.is_zero() {
            return Err(Error::InvalidSettings(
                "fetch_timeout must be greater than 0".into(),
            ));
        }
        if self.probe_timeout.is_zero() {
            return Err(Error::InvalidSettings(
                "probe_timeout must be greater than 0".into(),
            ));
        }
        if self.max_cooldown.is_zero() {
            return Err(Error::InvalidSettings(
                "max_cooldown must be greater than 0".into(),
            ));
        }
        if self.pacing.min > self.pacing.max {
            return Err(Error::InvalidSettings(format!(
                "pacing range is inverted: {:?} > {:?}",
                self.pacing.min, self.pacing.max
            )));
        }
        if self.cooldown_jitter.min > self.cooldown_jitter.max {
            return Err(Error::InvalidSettings(format!(
                "cooldown jitter range is inverted: {:?} > {:?}",
                self.cooldown_jitter.min, self.cooldown_jitter.max
            )));
        }
        Ok(())
    }
}

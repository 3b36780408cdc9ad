//! Availability probe abstraction
//!
//! Defines the `AvailabilityProbe` trait that decouples the work-distribution
//! engine from the remote service's wire protocol. The engine only ever sees a
//! closed `Outcome`; transport failures, timeouts and unexpected responses are
//! folded into `TransientError` by the probe, while rate-limit signals stay
//! distinct because they drive credential cooldown.

pub mod classify;
pub mod http;

pub use classify::{DEFAULT_RETRY_AFTER, classify_status, parse_retry_after};
pub use http::HttpProbe;

use common::Secret;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Access rights used to issue probe calls.
///
/// `id` is stable for the lifetime of a run and is what results and stats
/// are keyed on. The token is optional so that probes against open endpoints
/// (and test stubs) don't need one.
#[derive(Debug, Clone)]
pub struct Credential {
    pub id: String,
    pub token: Option<Secret<String>>,
}

impl Credential {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(Secret::new(token.into()));
        self
    }
}

/// Result of a single availability check.
///
/// - `Available`, `Taken`, `Invalid`: the call completed normally
/// - `RateLimited`: the credential must cool down; the handle is retried later
/// - `TransientError`: the call failed; terminal for the handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Available,
    Taken,
    Invalid,
    RateLimited { retry_after: Duration },
    TransientError { detail: String },
}

impl Outcome {
    /// Outcome label for logging and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Available => "available",
            Outcome::Taken => "taken",
            Outcome::Invalid => "invalid",
            Outcome::RateLimited { .. } => "rate_limited",
            Outcome::TransientError { .. } => "error",
        }
    }
}

/// One availability check for one handle using one credential.
///
/// Implementations are stateless from the engine's point of view and shared
/// read-only by every worker (`Arc<dyn AvailabilityProbe>`), so `check` takes
/// `&self`. `timeout` bounds the remote call; the engine enforces the same
/// bound from the outside as well.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility.
pub trait AvailabilityProbe: Send + Sync {
    /// Identifier for logging (e.g. "http")
    fn id(&self) -> &str;

    fn check<'a>(
        &'a self,
        credential: &'a Credential,
        handle: &'a str,
        timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Outcome> + Send + 'a>>;
}

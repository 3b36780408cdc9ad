//! Outcome classification for HTTP availability responses
//!
//! Maps a response status (plus the `Retry-After` header for 429s) onto the
//! closed `Outcome` set. Only 429 produces `RateLimited`; credential rejection
//! is reported as a transient error so the handle gets a terminal result
//! instead of bouncing between accounts.

use std::time::Duration;

use crate::Outcome;

/// Retry window assumed when a 429 carries no usable `Retry-After`.
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Parse a `Retry-After` value given in delta-seconds.
///
/// HTTP-date values are not supported and yield `None`.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

/// Classify a response by HTTP status.
///
/// - 404 → Available (nothing registered under the handle)
/// - other 2xx → Taken
/// - 400/422 → Invalid (the service refused the handle format)
/// - 429 → RateLimited, using `Retry-After` or `DEFAULT_RETRY_AFTER`
/// - 401/403 → TransientError (credential rejected)
/// - everything else → TransientError
pub fn classify_status(status: u16, retry_after: Option<&str>) -> Outcome {
    match status {
        404 => Outcome::Available,
        200..=299 => Outcome::Taken,
        400 | 422 => Outcome::Invalid,
        429 => Outcome::RateLimited {
            retry_after: retry_after
                .and_then(parse_retry_after)
                .unwrap_or(DEFAULT_RETRY_AFTER),
        },
        401 | 403 => Outcome::TransientError {
            detail: format!("credential rejected (status {status})"),
        },
        _ => Outcome::TransientError {
            detail: format!("unexpected status {status}"),
        },
    }
}

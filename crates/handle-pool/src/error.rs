//! Error types for distributor runs

/// Errors from a distributor run.
///
/// Rate limits, transient probe failures and malformed handles are never
/// errors here: they are reflected in the `RunReport` counters.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no eligible credentials: {configured} configured, none enabled")]
    NoEligibleCredentials { configured: usize },

    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Result alias for pool operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_eligible_credentials_names_configured_count() {
        let err = Error::NoEligibleCredentials { configured: 3 };
        assert_eq!(
            err.to_string(),
            "no eligible credentials: 3 configured, none enabled"
        );
    }
}

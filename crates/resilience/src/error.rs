//! Error types for guarded calls and resilience configuration.

use std::time::Duration;

use thiserror::Error;

/// Outcome of a single failed attempt against a dependency.
///
/// Transient variants count as breaker failures and may be retried.
/// `NotFound` and `Rejected` are business answers from a healthy
/// dependency: they are recorded as successes and never retried.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CallError {
    /// The attempt did not complete within the per-call timeout.
    #[error("call timed out after {0:?}")]
    Timeout(Duration),

    /// The dependency could not be reached.
    #[error("connection failed: {0}")]
    Connect(String),

    /// The dependency answered with a 5xx status.
    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },

    /// The dependency answered but the body could not be understood.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The requested resource does not exist (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// The request was refused as invalid (4xx other than 404).
    #[error("rejected with {status}: {message}")]
    Rejected { status: u16, message: String },
}

impl CallError {
    /// Returns true if the failure says something about dependency health.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CallError::Timeout(_)
                | CallError::Connect(_)
                | CallError::Server { .. }
                | CallError::InvalidResponse(_)
        )
    }

    /// Classifies an HTTP status code that is not a success.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            404 => CallError::NotFound(message),
            400..=499 => CallError::Rejected { status, message },
            _ => CallError::Server { status, message },
        }
    }
}

/// Invalid breaker or retry settings.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be at least 1")]
    Zero { field: &'static str },

    #[error("failure_rate_threshold must be in (0, 100], got {0}")]
    FailureRate(f64),

    #[error("jitter must be in [0, 1], got {0}")]
    Jitter(f64),

    #[error("multiplier must be at least 1.0, got {0}")]
    Multiplier(f64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert_eq!(
            CallError::from_status(404, "product 9"),
            CallError::NotFound("product 9".to_string())
        );
        assert!(!CallError::from_status(400, "bad").is_transient());
        assert!(!CallError::from_status(409, "conflict").is_transient());
        assert!(CallError::from_status(500, "boom").is_transient());
        assert!(CallError::from_status(503, "down").is_transient());
    }

    #[test]
    fn timeouts_and_connection_errors_are_transient() {
        assert!(CallError::Timeout(Duration::from_secs(3)).is_transient());
        assert!(CallError::Connect("refused".into()).is_transient());
        assert!(!CallError::NotFound("user 1".into()).is_transient());
    }
}

use resilience::{CallError, CircuitOpen};
use thiserror::Error;

/// Why a dependency could not serve a call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UnavailableCause {
    /// The breaker refused the call without touching the transport.
    #[error("{0}")]
    CircuitOpen(CircuitOpen),

    /// Every allowed attempt failed transiently.
    #[error("gave up after {attempts} attempt(s): {last}")]
    RetriesExhausted { attempts: u32, last: CallError },
}

/// Errors returned by guarded clients.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    #[error("{dependency} is unavailable: {cause}")]
    DependencyUnavailable {
        dependency: String,
        cause: UnavailableCause,
    },

    #[error("{dependency}: {resource} not found")]
    NotFound { dependency: String, resource: String },

    #[error("{dependency} rejected the request: {message}")]
    InvalidInput { dependency: String, message: String },
}

impl ClientError {
    /// Maps a business answer from a healthy dependency.
    ///
    /// Transient errors never reach this function.
    pub(crate) fn from_business(dependency: &str, error: CallError) -> Self {
        match error {
            CallError::NotFound(resource) => ClientError::NotFound {
                dependency: dependency.to_string(),
                resource,
            },
            other => ClientError::InvalidInput {
                dependency: dependency.to_string(),
                message: other.to_string(),
            },
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, ClientError::DependencyUnavailable { .. })
    }

    pub fn dependency(&self) -> &str {
        match self {
            ClientError::DependencyUnavailable { dependency, .. }
            | ClientError::NotFound { dependency, .. }
            | ClientError::InvalidInput { dependency, .. } => dependency,
        }
    }
}

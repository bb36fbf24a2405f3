//! Orchestrator error types.

use clients::ClientError;
use common::OrderId;
use domain::{OrderError, OrderStatus, RepositoryError};
use event_log::EventLogError;
use thiserror::Error;

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The request is invalid or refers to a user or product that cannot serve it.
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// A dependency could not answer; nothing was persisted.
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(ClientError),

    /// The order's current status does not allow the requested move.
    #[error("Invalid state transition for order {order_id}: cannot move from {current} to {target}")]
    InvalidStateTransition {
        order_id: OrderId,
        current: OrderStatus,
        target: OrderStatus,
    },

    /// Order not found.
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// Order persistence failed.
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

impl OrchestratorError {
    /// Maps a failed guarded call made while validating or pricing.
    pub(crate) fn from_client(error: ClientError) -> Self {
        match error {
            ClientError::DependencyUnavailable { .. } => OrchestratorError::ServiceUnavailable(error),
            ClientError::NotFound { resource, .. } => OrchestratorError::ValidationFailed(resource),
            ClientError::InvalidInput { message, .. } => {
                OrchestratorError::ValidationFailed(message)
            }
        }
    }

    pub(crate) fn from_order(order_id: OrderId, error: OrderError) -> Self {
        match error {
            OrderError::InvalidStateTransition { current, target } => {
                OrchestratorError::InvalidStateTransition {
                    order_id,
                    current,
                    target,
                }
            }
            other => OrchestratorError::ValidationFailed(other.to_string()),
        }
    }

    /// Maps a failed conditional update, turning a lost race into a state error.
    pub(crate) fn from_update(error: RepositoryError, target: OrderStatus) -> Self {
        match error {
            RepositoryError::StatusConflict {
                order_id, actual, ..
            } => OrchestratorError::InvalidStateTransition {
                order_id,
                current: actual,
                target,
            },
            other => OrchestratorError::Repository(other),
        }
    }
}

/// Convenience type alias for orchestrator results.
pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// Errors raised when an event cannot be handed to the log.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The log refused the append; the event stays in the outbox.
    #[error("Event log unavailable, {pending} event(s) pending: {source}")]
    Deferred {
        pending: usize,
        #[source]
        source: EventLogError,
    },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

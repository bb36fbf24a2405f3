//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::RepositoryError;
use orders::OrchestratorError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Malformed path or query input.
    BadRequest(String),
    /// Order operation error.
    Orchestrator(OrchestratorError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Orchestrator(err) => orchestrator_error_to_response(err),
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn orchestrator_error_to_response(err: OrchestratorError) -> (StatusCode, String) {
    let status = match &err {
        OrchestratorError::ValidationFailed(_) => StatusCode::BAD_REQUEST,
        OrchestratorError::OrderNotFound(_)
        | OrchestratorError::Repository(RepositoryError::NotFound(_)) => StatusCode::NOT_FOUND,
        OrchestratorError::InvalidStateTransition { .. } => StatusCode::CONFLICT,
        OrchestratorError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        OrchestratorError::Repository(_) => {
            tracing::error!(error = %err, "internal server error");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, err.to_string())
}

impl From<OrchestratorError> for ApiError {
    fn from(err: OrchestratorError) -> Self {
        ApiError::Orchestrator(err)
    }
}

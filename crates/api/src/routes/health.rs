//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use resilience::{CircuitState, HealthSnapshot};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub dependencies: Vec<HealthSnapshot>,
    pub pending_events: usize,
}

/// GET /health — `"degraded"` while any breaker is not closed.
pub async fn check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let dependencies = state.dependency_health();
    let status = if dependencies.iter().all(|d| d.state == CircuitState::Closed) {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status,
        dependencies,
        pending_events: state.publisher.pending_count().await,
    })
}

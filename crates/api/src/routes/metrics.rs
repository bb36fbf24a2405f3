//! Prometheus metrics endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::PrometheusHandle;

use crate::state::AppState;

#[derive(Clone)]
pub struct MetricsState {
    pub handle: PrometheusHandle,
    pub app: Arc<AppState>,
}

/// GET /metrics — returns Prometheus-formatted metrics.
///
/// The outbox gauge is refreshed first so an idle server still reports it.
pub async fn get(State(state): State<MetricsState>) -> impl IntoResponse {
    let pending = state.app.publisher.pending_count().await;
    metrics::gauge!("order_events_pending").set(pending as f64);

    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.handle.render(),
    )
}

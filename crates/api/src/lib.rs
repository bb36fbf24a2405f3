//! HTTP API server for order creation.
//!
//! Provides REST endpoints for orders, a health endpoint exposing the
//! circuit breakers, and Prometheus metrics. The binary also runs the
//! inventory reconciler against the event log.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, patch, post};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::metrics::MetricsState;
pub use state::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(MetricsState {
            handle: metrics_handle,
            app: state.clone(),
        });

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/api/orders",
            post(routes::orders::create).get(routes::orders::list),
        )
        .route("/api/orders/{id}", get(routes::orders::get))
        .route(
            "/api/orders/number/{number}",
            get(routes::orders::get_by_number),
        )
        .route(
            "/api/orders/user/{user_id}",
            get(routes::orders::list_for_user),
        )
        .route(
            "/api/orders/{id}/status",
            patch(routes::orders::update_status),
        )
        .route("/api/orders/{id}/cancel", post(routes::orders::cancel))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

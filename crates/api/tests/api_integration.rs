//! Integration tests for the API server.

use std::sync::Arc;
use std::sync::OnceLock;
use std::time::Duration;

use api::config::Config;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use clients::{InMemoryProductService, InMemoryUserService};
use domain::{Money, ORDER_EVENTS_TOPIC};
use event_log::InMemoryEventLog;
use metrics_exporter_prometheus::PrometheusHandle;
use resilience::{Backoff, CircuitBreakerConfig, ResilienceConfig, RetryConfig};
use serde_json::{Value, json};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

struct TestApp {
    app: axum::Router,
    products: InMemoryProductService,
    log: InMemoryEventLog,
}

fn resilience() -> ResilienceConfig {
    ResilienceConfig {
        circuit_breaker: CircuitBreakerConfig {
            sliding_window_size: 2,
            minimum_calls: 2,
            failure_rate_threshold: 50.0,
            open_duration: Duration::from_secs(60),
            half_open_trials: 1,
        },
        retry: RetryConfig {
            max_attempts: 1,
            backoff: Backoff::Fixed {
                delay: Duration::from_millis(1),
            },
            jitter: 0.0,
        },
        call_timeout: Duration::from_millis(200),
    }
}

fn setup() -> TestApp {
    let users = InMemoryUserService::with_users([42]);
    let products = InMemoryProductService::new();
    products.add_product(1, "Widget A", Money::from_cents(1000), 10);
    products.add_product(2, "Widget B", Money::from_cents(500), 10);
    let log = InMemoryEventLog::new(2);

    let config = Config {
        user_service: resilience(),
        product_service: resilience(),
        ..Default::default()
    };
    let state = Arc::new(api::AppState::new(
        &config,
        Arc::new(users),
        Arc::new(products.clone()),
        Arc::new(log.clone()),
    ));

    TestApp {
        app: api::create_app(state, get_metrics_handle()),
        products,
        log,
    }
}

async fn send(
    app: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

fn order_body(user_id: i64) -> Value {
    json!({
        "userId": user_id,
        "shippingAddress": "1 Main St",
        "items": [
            { "productId": 1, "quantity": 2 },
            { "productId": 2, "quantity": 1 }
        ]
    })
}

#[tokio::test]
async fn test_health_check() {
    let t = setup();

    let (status, json) = send(&t.app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["dependencies"].as_array().unwrap().len(), 2);
    assert_eq!(json["dependencies"][0]["dependency"], "user-service");
    assert_eq!(json["dependencies"][1]["state"], "CLOSED");
    assert_eq!(json["pendingEvents"], 0);
}

#[tokio::test]
async fn test_create_order() {
    let t = setup();

    let (status, json) = send(&t.app, "POST", "/api/orders", Some(order_body(42))).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["status"], "CONFIRMED");
    assert_eq!(json["totalAmount"], 25.0);
    assert_eq!(json["items"].as_array().unwrap().len(), 2);
    assert!(json["orderNumber"].as_str().unwrap().starts_with("ORD-"));
    assert_eq!(t.log.record_count(ORDER_EVENTS_TOPIC).await, 1);
}

#[tokio::test]
async fn test_create_and_get_order() {
    let t = setup();
    let (_, created) = send(&t.app, "POST", "/api/orders", Some(order_body(42))).await;
    let id = created["id"].as_str().unwrap();
    let number = created["orderNumber"].as_str().unwrap();

    let (status, by_id) = send(&t.app, "GET", &format!("/api/orders/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(by_id["orderNumber"], number);

    let (status, by_number) =
        send(&t.app, "GET", &format!("/api/orders/number/{number}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(by_number["id"], id);

    let (_, for_user) = send(&t.app, "GET", "/api/orders/user/42", None).await;
    assert_eq!(for_user.as_array().unwrap().len(), 1);

    let (_, all) = send(&t.app, "GET", "/api/orders", None).await;
    assert_eq!(all.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_unknown_user_is_bad_request() {
    let t = setup();

    let (status, json) = send(&t.app, "POST", "/api/orders", Some(order_body(7))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("User not found"));
    let (_, all) = send(&t.app, "GET", "/api/orders", None).await;
    assert!(all.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_get_nonexistent_order() {
    let t = setup();
    let id = common::OrderId::new();

    let (status, _) = send(&t.app, "GET", &format!("/api/orders/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&t.app, "GET", "/api/orders/number/ORD-00000000", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_order_id_format() {
    let t = setup();

    let (status, json) = send(&t.app, "GET", "/api/orders/not-a-uuid", None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("Invalid order id"));
}

#[tokio::test]
async fn test_status_updates_and_cancel_conflict() {
    let t = setup();
    let (_, created) = send(&t.app, "POST", "/api/orders", Some(order_body(42))).await;
    let id = created["id"].as_str().unwrap();

    let (status, shipped) = send(
        &t.app,
        "PATCH",
        &format!("/api/orders/{id}/status?status=SHIPPED"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(shipped["status"], "SHIPPED");

    let (status, _) = send(&t.app, "POST", &format!("/api/orders/{id}/cancel"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &t.app,
        "PATCH",
        &format!("/api/orders/{id}/status?status=LOST"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_cancel_confirmed_order() {
    let t = setup();
    let (_, created) = send(&t.app, "POST", "/api/orders", Some(order_body(42))).await;
    let id = created["id"].as_str().unwrap();

    let (status, cancelled) =
        send(&t.app, "POST", &format!("/api/orders/{id}/cancel"), None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "CANCELLED");
    assert_eq!(t.log.record_count(ORDER_EVENTS_TOPIC).await, 2);
}

#[tokio::test]
async fn test_product_outage_is_service_unavailable() {
    let t = setup();
    t.products.fail_next(10);

    let (status, _) = send(&t.app, "POST", "/api/orders", Some(order_body(42))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (status, _) = send(&t.app, "POST", "/api/orders", Some(order_body(42))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (_, health) = send(&t.app, "GET", "/health", None).await;
    assert_eq!(health["status"], "degraded");
    assert_eq!(health["dependencies"][1]["state"], "OPEN");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let t = setup();
    send(&t.app, "POST", "/api/orders", Some(order_body(42))).await;

    let response = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("orders_created_total"));
}

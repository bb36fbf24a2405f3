//! Order endpoints under `/api/orders`.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{OrderId, ProductId, UserId};
use domain::{Money, Order, OrderItem, OrderNumber, OrderStatus};
use orders::CreateOrderRequest;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub status: String,
}

// -- Response types --

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub id: OrderId,
    pub order_number: String,
    pub user_id: UserId,
    pub items: Vec<OrderItemResponse>,
    pub total_amount: Money,
    pub status: OrderStatus,
    pub shipping_address: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemResponse {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub subtotal: Money,
}

impl From<&OrderItem> for OrderItemResponse {
    fn from(item: &OrderItem) -> Self {
        Self {
            product_id: item.product_id,
            product_name: item.product_name.clone(),
            quantity: item.quantity,
            unit_price: item.unit_price,
            subtotal: item.subtotal,
        }
    }
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id(),
            order_number: order.order_number().to_string(),
            user_id: order.user_id(),
            items: order.items().iter().map(OrderItemResponse::from).collect(),
            total_amount: order.total_amount(),
            status: order.status(),
            shipping_address: order.shipping_address().to_string(),
            created_at: order.created_at(),
        }
    }
}

fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    id.parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid order id: {e}")))
}

fn to_responses(orders: &[Order]) -> Json<Vec<OrderResponse>> {
    Json(orders.iter().map(OrderResponse::from).collect())
}

// -- Handlers --

/// POST /api/orders — validate, price, persist and confirm an order.
#[tracing::instrument(skip(state, req), fields(user_id = %req.user_id))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let order = state.orchestrator.create_order(req).await?;
    Ok((StatusCode::CREATED, Json(OrderResponse::from(&order))))
}

/// GET /api/orders — list all orders.
pub async fn list(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let orders = state.orchestrator.all_orders().await?;
    Ok(to_responses(&orders))
}

/// GET /api/orders/{id}
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let order = state.orchestrator.get_order(order_id).await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// GET /api/orders/number/{number}
pub async fn get_by_number(
    State(state): State<Arc<AppState>>,
    Path(number): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state
        .orchestrator
        .get_order_by_number(&OrderNumber::new(number))
        .await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// GET /api/orders/user/{user_id}
pub async fn list_for_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let orders = state
        .orchestrator
        .orders_for_user(UserId::new(user_id))
        .await?;
    Ok(to_responses(&orders))
}

/// PATCH /api/orders/{id}/status?status=SHIPPED
#[tracing::instrument(skip(state))]
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let status: OrderStatus = query.status.parse().map_err(ApiError::BadRequest)?;
    let order = state.orchestrator.update_status(order_id, status).await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// POST /api/orders/{id}/cancel
#[tracing::instrument(skip(state))]
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let order = state.orchestrator.cancel_order(order_id).await?;
    Ok(Json(OrderResponse::from(&order)))
}

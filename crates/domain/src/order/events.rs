//! Order lifecycle events published for other services.

use chrono::{DateTime, Utc};
use common::{OrderId, ProductId, UserId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{Money, Order, OrderNumber, OrderStatus};

/// Topic carrying [`LifecycleEvent`]s, keyed by order ID.
pub const ORDER_EVENTS_TOPIC: &str = "order-events";

/// Kind of lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    OrderCreated,
    OrderCancelled,
    OrderShipped,
    OrderDelivered,
    /// Any type this build does not know about.
    #[serde(other)]
    Unknown,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::OrderCreated => "ORDER_CREATED",
            EventType::OrderCancelled => "ORDER_CANCELLED",
            EventType::OrderShipped => "ORDER_SHIPPED",
            EventType::OrderDelivered => "ORDER_DELIVERED",
            EventType::Unknown => "UNKNOWN",
        }
    }

    /// Returns true if consumers must find at least one item in the event.
    pub fn requires_items(&self) -> bool {
        matches!(self, EventType::OrderCreated | EventType::OrderCancelled)
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One order line inside an event.
///
/// Cancellation events carry only the product and quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventItem {
    pub product_id: ProductId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtotal: Option<Money>,
}

/// Immutable fact about an order state change.
///
/// Produced once per transition by the order service and consumed
/// at-least-once by the inventory side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleEvent {
    pub event_type: EventType,
    pub order_id: OrderId,
    pub order_number: OrderNumber,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_amount: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipping_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub items: Vec<EventItem>,
    #[serde(default)]
    pub message: String,
    pub event_timestamp: DateTime<Utc>,
}

/// A structurally valid payload that breaks an event rule.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("{0} event carries no items")]
    MissingItems(EventType),

    #[error("item for product {product_id} has zero quantity")]
    ZeroQuantity { product_id: ProductId },

    #[error("product {product_id} appears more than once")]
    DuplicateProduct { product_id: ProductId },
}

impl LifecycleEvent {
    /// ORDER_CREATED with full item snapshots.
    pub fn order_created(order: &Order) -> Self {
        let items = order
            .items()
            .iter()
            .map(|item| EventItem {
                product_id: item.product_id,
                product_name: Some(item.product_name.clone()),
                quantity: item.quantity,
                unit_price: Some(item.unit_price),
                subtotal: Some(item.subtotal),
            })
            .collect();

        Self {
            event_type: EventType::OrderCreated,
            order_id: order.id(),
            order_number: order.order_number().clone(),
            user_id: Some(order.user_id()),
            total_amount: Some(order.total_amount()),
            status: Some(order.status()),
            shipping_address: Some(order.shipping_address().to_string()),
            created_at: Some(order.created_at()),
            items,
            message: format!("New order created with number: {}", order.order_number()),
            event_timestamp: Utc::now(),
        }
    }

    /// ORDER_CANCELLED with product and quantity only.
    pub fn order_cancelled(order: &Order) -> Self {
        let items = order
            .items()
            .iter()
            .map(|item| EventItem {
                product_id: item.product_id,
                product_name: None,
                quantity: item.quantity,
                unit_price: None,
                subtotal: None,
            })
            .collect();

        Self {
            event_type: EventType::OrderCancelled,
            order_id: order.id(),
            order_number: order.order_number().clone(),
            user_id: None,
            total_amount: None,
            status: None,
            shipping_address: None,
            created_at: None,
            items,
            message: format!("Order cancelled with order number: {}", order.order_number()),
            event_timestamp: Utc::now(),
        }
    }

    /// ORDER_SHIPPED or ORDER_DELIVERED, without items.
    pub fn status_changed(order: &Order, event_type: EventType) -> Self {
        Self {
            event_type,
            order_id: order.id(),
            order_number: order.order_number().clone(),
            user_id: Some(order.user_id()),
            total_amount: Some(order.total_amount()),
            status: Some(order.status()),
            shipping_address: Some(order.shipping_address().to_string()),
            created_at: Some(order.created_at()),
            items: Vec::new(),
            message: format!("Order {} is now {}", order.order_number(), order.status()),
            event_timestamp: Utc::now(),
        }
    }

    /// Partition key on the lifecycle topic.
    pub fn key(&self) -> String {
        self.order_id.to_string()
    }

    /// Checks the rules serde cannot express.
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.event_type.requires_items() && self.items.is_empty() {
            return Err(SchemaError::MissingItems(self.event_type));
        }
        let mut seen = std::collections::HashSet::new();
        for item in &self.items {
            if item.quantity == 0 {
                return Err(SchemaError::ZeroQuantity {
                    product_id: item.product_id,
                });
            }
            if !seen.insert(item.product_id) {
                return Err(SchemaError::DuplicateProduct {
                    product_id: item.product_id,
                });
            }
        }
        Ok(())
    }
}

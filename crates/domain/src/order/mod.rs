//! Order entity and related types.

mod aggregate;
mod events;
mod repository;
mod state;
mod value_objects;

pub use aggregate::Order;
pub use events::{EventItem, EventType, LifecycleEvent, ORDER_EVENTS_TOPIC, SchemaError};
pub use repository::{InMemoryOrderRepository, OrderRepository};
pub use state::OrderStatus;
pub use value_objects::{Money, OrderItem, OrderNumber};

use common::ProductId;
use thiserror::Error;

/// Errors that can occur during order operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrderError {
    /// The order is not in a state that allows the requested move.
    #[error("Invalid state transition: cannot move from {current} to {target}")]
    InvalidStateTransition {
        current: OrderStatus,
        target: OrderStatus,
    },

    /// Invalid quantity.
    #[error("Invalid quantity for product {product_id}: {quantity} (must be greater than 0)")]
    InvalidQuantity { product_id: ProductId, quantity: u32 },

    /// Order has no items.
    #[error("Order has no items")]
    NoItems,

    /// A unit price below zero.
    #[error("Invalid price for product {product_id}: {price}")]
    NegativePrice { product_id: ProductId, price: Money },

    /// A subtotal or the order total does not fit the cent range.
    #[error("Order amount overflows for product {product_id}")]
    AmountOverflow { product_id: ProductId },
}

//! Domain layer for order creation and inventory reconciliation.
//!
//! This crate provides:
//! - [`Order`] with its status machine and priced item snapshots
//! - [`LifecycleEvent`], the typed schema published on the order topic
//! - [`OrderRepository`] with an in-memory implementation

pub mod error;
pub mod order;

pub use common::{OrderId, ProductId, UserId};
pub use error::RepositoryError;
pub use order::{
    EventItem, EventType, InMemoryOrderRepository, LifecycleEvent, Money, Order, OrderError,
    OrderItem, OrderNumber, OrderRepository, OrderStatus, SchemaError, ORDER_EVENTS_TOPIC,
};

//! Repository error types.

use common::OrderId;
use thiserror::Error;

use crate::order::{OrderNumber, OrderStatus};

/// Errors raised by order persistence.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// An order with this number is already stored.
    #[error("Duplicate order number: {0}")]
    DuplicateOrderNumber(OrderNumber),

    /// The order to update does not exist.
    #[error("Order not found: {0}")]
    NotFound(OrderId),

    /// The stored status changed since the order was loaded.
    #[error("Status conflict for order {order_id}: expected {expected}, found {actual}")]
    StatusConflict {
        order_id: OrderId,
        expected: OrderStatus,
        actual: OrderStatus,
    },

    /// The backing store failed.
    #[error("Storage error: {0}")]
    Storage(String),
}

//! Inventory error types.

use common::ProductId;
use event_log::EventLogError;
use thiserror::Error;

/// Errors raised by inventory stores.
#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    #[error("Stock quantity out of range for product {0}")]
    QuantityOutOfRange(ProductId),

    /// The store could not be reached; the adjustment may be retried.
    #[error("Inventory store unavailable: {0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl InventoryError {
    /// Returns true if retrying the same adjustment may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, InventoryError::Unavailable(_) | InventoryError::Database(_))
    }
}

/// Errors raised while reconciling a log record.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The payload does not match the lifecycle event schema.
    #[error("Malformed event: {0}")]
    Malformed(String),

    /// The store stayed unavailable; the record must be redelivered.
    #[error("Store unavailable, record will be redelivered: {0}")]
    Store(InventoryError),

    /// Event log error.
    #[error("Event log error: {0}")]
    Log(#[from] EventLogError),
}

/// Result type for inventory store operations.
pub type Result<T> = std::result::Result<T, InventoryError>;

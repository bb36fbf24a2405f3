//! Inventory side of the order lifecycle.
//!
//! This crate provides:
//! - [`InventoryStore`] with in-memory and PostgreSQL implementations, where
//!   every stock adjustment is applied together with its dedupe marker
//! - [`InventoryReconciler`] turning lifecycle events into stock adjustments
//! - [`PartitionConsumer`] feeding records from the event log to the
//!   reconciler, one task per partition

pub mod adjustment;
pub mod consumer;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod product;
pub mod reconciler;
pub mod store;

pub use adjustment::{AdjustmentKey, AdjustmentOutcome, InventoryAdjustment};
pub use consumer::{ConsumerConfig, PartitionConsumer, spawn_consumers};
pub use error::{InventoryError, ReconcileError, Result};
pub use memory::InMemoryInventoryStore;
pub use postgres::PostgresInventoryStore;
pub use product::{Product, ProductStatus};
pub use reconciler::{InventoryReconciler, ItemFailure, ReconcileReport};
pub use store::InventoryStore;

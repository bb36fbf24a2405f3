//! Inventory persistence.

use std::sync::Arc;

use async_trait::async_trait;
use common::ProductId;

use crate::adjustment::{AdjustmentOutcome, InventoryAdjustment};
use crate::error::Result;
use crate::product::Product;

/// Storage for product stock.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Applies an adjustment at most once per key.
    ///
    /// The dedupe marker and the stock change are stored together: either
    /// both are recorded or neither is.
    async fn apply(&self, adjustment: &InventoryAdjustment) -> Result<AdjustmentOutcome>;

    async fn product(&self, product_id: ProductId) -> Result<Option<Product>>;

    /// Inserts or replaces a product.
    async fn upsert_product(&self, product: &Product) -> Result<()>;
}

#[async_trait]
impl<T: InventoryStore + ?Sized> InventoryStore for Arc<T> {
    async fn apply(&self, adjustment: &InventoryAdjustment) -> Result<AdjustmentOutcome> {
        (**self).apply(adjustment).await
    }

    async fn product(&self, product_id: ProductId) -> Result<Option<Product>> {
        (**self).product(product_id).await
    }

    async fn upsert_product(&self, product: &Product) -> Result<()> {
        (**self).upsert_product(product).await
    }
}

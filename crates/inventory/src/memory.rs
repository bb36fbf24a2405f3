use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use common::ProductId;
use tokio::sync::RwLock;

use crate::adjustment::{AdjustmentKey, AdjustmentOutcome, InventoryAdjustment};
use crate::error::{InventoryError, Result};
use crate::product::Product;
use crate::store::InventoryStore;

#[derive(Default)]
struct StoreState {
    products: HashMap<ProductId, Product>,
    applied: HashSet<AdjustmentKey>,
}

/// In-memory inventory store for testing.
///
/// The marker set and the stock live under one lock, so an adjustment is
/// either fully applied or not at all.
#[derive(Clone, Default)]
pub struct InMemoryInventoryStore {
    state: Arc<RwLock<StoreState>>,
    fail_next: Arc<AtomicU32>,
}

impl InMemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding `products`.
    pub fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        let state = StoreState {
            products: products.into_iter().map(|p| (p.id, p)).collect(),
            applied: HashSet::new(),
        };
        Self {
            state: Arc::new(RwLock::new(state)),
            fail_next: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Makes the next `n` calls to [`InventoryStore::apply`] fail with `Unavailable`.
    pub fn fail_next(&self, n: u32) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// Number of adjustments recorded so far.
    pub async fn adjustment_count(&self) -> usize {
        self.state.read().await.applied.len()
    }

    /// Current stock of a product, if it exists.
    pub async fn stock(&self, product_id: ProductId) -> Option<u32> {
        self.state
            .read()
            .await
            .products
            .get(&product_id)
            .map(|p| p.stock_quantity)
    }
}

#[async_trait]
impl InventoryStore for InMemoryInventoryStore {
    async fn apply(&self, adjustment: &InventoryAdjustment) -> Result<AdjustmentOutcome> {
        let failing = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(InventoryError::Unavailable("store is offline".to_string()));
        }

        let mut state = self.state.write().await;
        if state.applied.contains(&adjustment.key) {
            return Ok(AdjustmentOutcome::Duplicate);
        }

        let product_id = adjustment.product_id();
        if !state.products.contains_key(&product_id) {
            return Err(InventoryError::ProductNotFound(product_id));
        }

        let counterpart_recorded = adjustment
            .key
            .counterpart()
            .is_some_and(|key| state.applied.contains(&key));
        if let Some(outcome) = adjustment.skipped_outcome(counterpart_recorded) {
            state.applied.insert(adjustment.key);
            return Ok(outcome);
        }

        let product = state
            .products
            .get_mut(&product_id)
            .ok_or(InventoryError::ProductNotFound(product_id))?;
        product.apply_delta(adjustment.delta)?;
        let outcome = AdjustmentOutcome::Applied {
            new_quantity: product.stock_quantity,
            status: product.status,
        };

        state.applied.insert(adjustment.key);
        Ok(outcome)
    }

    async fn product(&self, product_id: ProductId) -> Result<Option<Product>> {
        Ok(self.state.read().await.products.get(&product_id).cloned())
    }

    async fn upsert_product(&self, product: &Product) -> Result<()> {
        self.state
            .write()
            .await
            .products
            .insert(product.id, product.clone());
        Ok(())
    }
}

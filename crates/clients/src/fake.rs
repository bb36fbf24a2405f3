//! Scriptable in-process stand-ins for the remote services.
//!
//! Used by tests.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use common::{ProductId, UserId};
use domain::Money;
use parking_lot::Mutex;
use resilience::CallError;

use crate::transport::{ProductDetails, ProductTransport, UserTransport};

/// Failure script shared by both fakes.
#[derive(Debug, Default)]
struct Faults {
    fail_next: AtomicU32,
    latency: Mutex<Option<Duration>>,
    calls: AtomicUsize,
}

impl Faults {
    /// Counts the call, waits out any latency, then fails if scripted to.
    async fn enter(&self) -> Result<(), CallError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let failing = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(CallError::Server {
                status: 503,
                message: "Service Unavailable".to_string(),
            });
        }
        Ok(())
    }
}

/// In-memory user service.
#[derive(Debug, Clone, Default)]
pub struct InMemoryUserService {
    users: Arc<Mutex<HashSet<UserId>>>,
    faults: Arc<Faults>,
}

impl InMemoryUserService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a service that knows `users`.
    pub fn with_users(users: impl IntoIterator<Item = i64>) -> Self {
        let service = Self::new();
        for id in users {
            service.add_user(UserId::new(id));
        }
        service
    }

    pub fn add_user(&self, user_id: UserId) {
        self.users.lock().insert(user_id);
    }

    /// Makes the next `n` calls fail with 503.
    pub fn fail_next(&self, n: u32) {
        self.faults.fail_next.store(n, Ordering::SeqCst);
    }

    /// Delays every call by `latency`; `None` removes the delay.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.faults.latency.lock() = latency;
    }

    /// Number of calls that reached the service.
    pub fn call_count(&self) -> usize {
        self.faults.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UserTransport for InMemoryUserService {
    async fn user_exists(&self, user_id: UserId) -> Result<bool, CallError> {
        self.faults.enter().await?;
        Ok(self.users.lock().contains(&user_id))
    }
}

/// In-memory product service.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProductService {
    products: Arc<Mutex<HashMap<ProductId, ProductDetails>>>,
    faults: Arc<Faults>,
}

impl InMemoryProductService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_product(&self, id: i64, name: &str, price: Money, stock_quantity: u32) {
        let id = ProductId::new(id);
        self.products.lock().insert(
            id,
            ProductDetails {
                id,
                name: name.to_string(),
                price,
                stock_quantity,
            },
        );
    }

    pub fn product(&self, id: ProductId) -> Option<ProductDetails> {
        self.products.lock().get(&id).cloned()
    }

    /// Makes the next `n` calls fail with 503.
    pub fn fail_next(&self, n: u32) {
        self.faults.fail_next.store(n, Ordering::SeqCst);
    }

    /// Delays every call by `latency`; `None` removes the delay.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.faults.latency.lock() = latency;
    }

    /// Number of calls that reached the service.
    pub fn call_count(&self) -> usize {
        self.faults.calls.load(Ordering::SeqCst)
    }

    fn not_found(id: ProductId) -> CallError {
        CallError::NotFound(format!("Product not found with id: {id}"))
    }
}

#[async_trait]
impl ProductTransport for InMemoryProductService {
    async fn get_product(&self, product_id: ProductId) -> Result<ProductDetails, CallError> {
        self.faults.enter().await?;
        self.product(product_id)
            .ok_or_else(|| Self::not_found(product_id))
    }

    async fn is_in_stock(&self, product_id: ProductId, quantity: u32) -> Result<bool, CallError> {
        self.faults.enter().await?;
        self.product(product_id)
            .map(|p| p.stock_quantity >= quantity)
            .ok_or_else(|| Self::not_found(product_id))
    }

    async fn reduce_stock(
        &self,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<ProductDetails, CallError> {
        self.faults.enter().await?;
        let mut products = self.products.lock();
        let product = products
            .get_mut(&product_id)
            .ok_or_else(|| Self::not_found(product_id))?;
        if product.stock_quantity < quantity {
            return Err(CallError::Rejected {
                status: 400,
                message: format!("Insufficient stock for product: {}", product.name),
            });
        }
        product.stock_quantity -= quantity;
        Ok(product.clone())
    }
}

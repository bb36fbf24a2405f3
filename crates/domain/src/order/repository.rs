//! Order persistence.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{OrderId, UserId};
use tokio::sync::RwLock;

use super::{Order, OrderNumber, OrderStatus};
use crate::error::RepositoryError;

/// Storage for orders and their items.
///
/// Every write covers the order and all of its items at once.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Stores a new order.
    async fn insert(&self, order: &Order) -> Result<(), RepositoryError>;

    /// Replaces a stored order if its stored status is still `expected_status`.
    ///
    /// Fails with `StatusConflict` otherwise, leaving the stored order untouched.
    async fn update(&self, order: &Order, expected_status: OrderStatus)
    -> Result<(), RepositoryError>;

    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError>;

    async fn find_by_number(&self, number: &OrderNumber)
    -> Result<Option<Order>, RepositoryError>;

    /// Orders of one user, oldest first.
    async fn find_by_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError>;

    /// All orders, oldest first.
    async fn find_all(&self) -> Result<Vec<Order>, RepositoryError>;
}

#[async_trait]
impl<T: OrderRepository + ?Sized> OrderRepository for Arc<T> {
    async fn insert(&self, order: &Order) -> Result<(), RepositoryError> {
        (**self).insert(order).await
    }

    async fn update(
        &self,
        order: &Order,
        expected_status: OrderStatus,
    ) -> Result<(), RepositoryError> {
        (**self).update(order, expected_status).await
    }

    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        (**self).find_by_id(id).await
    }

    async fn find_by_number(
        &self,
        number: &OrderNumber,
    ) -> Result<Option<Order>, RepositoryError> {
        (**self).find_by_number(number).await
    }

    async fn find_by_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        (**self).find_by_user(user_id).await
    }

    async fn find_all(&self) -> Result<Vec<Order>, RepositoryError> {
        (**self).find_all().await
    }
}

#[derive(Debug, Default)]
struct InMemoryOrderState {
    orders: HashMap<OrderId, Order>,
    fail_writes: bool,
}

/// In-memory order repository.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderRepository {
    state: Arc<RwLock<InMemoryOrderState>>,
}

impl InMemoryOrderRepository {
    /// Creates a new empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent write fail with a storage error.
    pub async fn set_fail_writes(&self, fail: bool) {
        self.state.write().await.fail_writes = fail;
    }

    /// Returns the number of stored orders.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }

    /// Returns the number of stored orders belonging to `user_id`.
    pub async fn count_for_user(&self, user_id: UserId) -> usize {
        self.state
            .read()
            .await
            .orders
            .values()
            .filter(|o| o.user_id() == user_id)
            .count()
    }
}

fn sorted(mut orders: Vec<Order>) -> Vec<Order> {
    orders.sort_by_key(|o| o.created_at());
    orders
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn insert(&self, order: &Order) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        if state.fail_writes {
            return Err(RepositoryError::Storage("writes disabled".to_string()));
        }
        if state
            .orders
            .values()
            .any(|o| o.order_number() == order.order_number())
        {
            return Err(RepositoryError::DuplicateOrderNumber(
                order.order_number().clone(),
            ));
        }
        state.orders.insert(order.id(), order.clone());
        Ok(())
    }

    async fn update(
        &self,
        order: &Order,
        expected_status: OrderStatus,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        if state.fail_writes {
            return Err(RepositoryError::Storage("writes disabled".to_string()));
        }
        let stored = state
            .orders
            .get_mut(&order.id())
            .ok_or(RepositoryError::NotFound(order.id()))?;
        if stored.status() != expected_status {
            return Err(RepositoryError::StatusConflict {
                order_id: order.id(),
                expected: expected_status,
                actual: stored.status(),
            });
        }
        *stored = order.clone();
        Ok(())
    }

    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        Ok(self.state.read().await.orders.get(&id).cloned())
    }

    async fn find_by_number(
        &self,
        number: &OrderNumber,
    ) -> Result<Option<Order>, RepositoryError> {
        Ok(self
            .state
            .read()
            .await
            .orders
            .values()
            .find(|o| o.order_number() == number)
            .cloned())
    }

    async fn find_by_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let state = self.state.read().await;
        Ok(sorted(
            state
                .orders
                .values()
                .filter(|o| o.user_id() == user_id)
                .cloned()
                .collect(),
        ))
    }

    async fn find_all(&self) -> Result<Vec<Order>, RepositoryError> {
        let state = self.state.read().await;
        Ok(sorted(state.orders.values().cloned().collect()))
    }
}

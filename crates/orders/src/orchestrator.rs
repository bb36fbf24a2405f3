//! Order orchestrator.

use std::time::Instant;

use clients::{ProductClient, ProductTransport, UserClient, UserTransport};
use common::{OrderId, ProductId, UserId};
use domain::{
    EventType, LifecycleEvent, Order, OrderItem, OrderNumber, OrderRepository, OrderStatus,
};

use crate::error::{OrchestratorError, Result};
use crate::publisher::EventPublisher;
use crate::request::CreateOrderRequest;
use crate::stage::CreationStage;

/// Creates orders and drives their status afterwards.
///
/// Each dependency has its own guarded client, so an outage of the
/// product service never trips the user service's breaker.
pub struct OrderOrchestrator<R, U, P, E>
where
    R: OrderRepository,
    U: UserTransport,
    P: ProductTransport,
    E: EventPublisher,
{
    repository: R,
    users: UserClient<U>,
    products: ProductClient<P>,
    publisher: E,
}

impl<R, U, P, E> OrderOrchestrator<R, U, P, E>
where
    R: OrderRepository,
    U: UserTransport,
    P: ProductTransport,
    E: EventPublisher,
{
    /// Creates a new orchestrator.
    pub fn new(
        repository: R,
        users: UserClient<U>,
        products: ProductClient<P>,
        publisher: E,
    ) -> Self {
        Self {
            repository,
            users,
            products,
            publisher,
        }
    }

    pub fn users(&self) -> &UserClient<U> {
        &self.users
    }

    pub fn products(&self) -> &ProductClient<P> {
        &self.products
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// Validates, prices, persists and confirms a new order.
    ///
    /// Either the order is stored with its items and confirmed, or nothing
    /// is stored and nothing is published. A failed publish does not undo
    /// a stored order.
    #[tracing::instrument(skip(self, request), fields(user_id = %request.user_id))]
    pub async fn create_order(&self, request: CreateOrderRequest) -> Result<Order> {
        let start = Instant::now();
        let mut stage = CreationStage::Validating;

        let result = self.run_creation(&request, &mut stage).await;

        let outcome = match &result {
            Ok(_) => CreationStage::Confirmed,
            Err(OrchestratorError::ValidationFailed(_)) => CreationStage::Rejected,
            Err(_) => CreationStage::Failed,
        };
        match &result {
            Ok(order) => tracing::info!(
                order_id = %order.id(),
                order_number = %order.order_number(),
                total = %order.total_amount(),
                "Order confirmed"
            ),
            Err(error) => tracing::warn!(%stage, %outcome, %error, "Order creation aborted"),
        }
        metrics::counter!("orders_created_total", "outcome" => outcome.as_str()).increment(1);
        metrics::histogram!("order_creation_duration_seconds")
            .record(start.elapsed().as_secs_f64());

        result
    }

    async fn run_creation(
        &self,
        request: &CreateOrderRequest,
        stage: &mut CreationStage,
    ) -> Result<Order> {
        let lines = request.normalized_lines()?;

        let user_exists = self
            .users
            .check_user_exists(request.user_id)
            .await
            .map_err(OrchestratorError::from_client)?;
        if !user_exists {
            return Err(OrchestratorError::ValidationFailed(format!(
                "User not found: {}",
                request.user_id
            )));
        }

        for line in &lines {
            let in_stock = self
                .products
                .check_stock(line.product_id, line.quantity)
                .await
                .map_err(OrchestratorError::from_client)?;
            if !in_stock {
                return Err(OrchestratorError::ValidationFailed(format!(
                    "Product not in stock: {}",
                    line.product_id
                )));
            }
        }

        *stage = CreationStage::Pricing;
        let mut items = Vec::with_capacity(lines.len());
        for line in &lines {
            let product = self
                .products
                .get_product(line.product_id)
                .await
                .map_err(OrchestratorError::from_client)?;
            items.push(OrderItem::new(
                line.product_id,
                product.name,
                line.quantity,
                product.price,
            ));
        }

        let mut order = Order::new_pending(request.user_id, &request.shipping_address, items)
            .map_err(|e| OrchestratorError::ValidationFailed(e.to_string()))?;

        self.repository.insert(&order).await?;
        *stage = CreationStage::Persisted;
        tracing::info!(order_id = %order.id(), order_number = %order.order_number(), "Order persisted");

        self.publish(LifecycleEvent::order_created(&order)).await;

        order
            .confirm()
            .map_err(|e| OrchestratorError::from_order(order.id(), e))?;
        self.repository
            .update(&order, OrderStatus::Pending)
            .await
            .map_err(|e| OrchestratorError::from_update(e, OrderStatus::Confirmed))?;
        *stage = CreationStage::Confirmed;

        Ok(order)
    }

    /// Cancels an order that has not shipped yet and announces it.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_order(&self, order_id: OrderId) -> Result<Order> {
        let mut order = self.load(order_id).await?;
        let previous = order.status();

        order
            .cancel()
            .map_err(|e| OrchestratorError::from_order(order_id, e))?;
        self.repository
            .update(&order, previous)
            .await
            .map_err(|e| OrchestratorError::from_update(e, OrderStatus::Cancelled))?;

        tracing::info!(%order_id, from = %previous, "Order cancelled");
        metrics::counter!("orders_cancelled_total").increment(1);

        self.publish(LifecycleEvent::order_cancelled(&order)).await;
        Ok(order)
    }

    /// Moves an order forward; SHIPPED and DELIVERED are announced.
    ///
    /// Cancellation goes through [`cancel_order`](Self::cancel_order).
    #[tracing::instrument(skip(self))]
    pub async fn update_status(&self, order_id: OrderId, status: OrderStatus) -> Result<Order> {
        let mut order = self.load(order_id).await?;
        let previous = order.status();

        if status == OrderStatus::Cancelled {
            return Err(OrchestratorError::InvalidStateTransition {
                order_id,
                current: previous,
                target: status,
            });
        }

        order
            .advance_to(status)
            .map_err(|e| OrchestratorError::from_order(order_id, e))?;
        self.repository
            .update(&order, previous)
            .await
            .map_err(|e| OrchestratorError::from_update(e, status))?;

        tracing::info!(%order_id, from = %previous, to = %status, "Order status updated");

        let event_type = match status {
            OrderStatus::Shipped => Some(EventType::OrderShipped),
            OrderStatus::Delivered => Some(EventType::OrderDelivered),
            _ => None,
        };
        if let Some(event_type) = event_type {
            self.publish(LifecycleEvent::status_changed(&order, event_type))
                .await;
        }

        Ok(order)
    }

    pub async fn get_order(&self, order_id: OrderId) -> Result<Order> {
        self.load(order_id).await
    }

    pub async fn get_order_by_number(&self, number: &OrderNumber) -> Result<Order> {
        self.repository
            .find_by_number(number)
            .await?
            .ok_or_else(|| {
                OrchestratorError::OrderNotFound(format!("Order not found with number: {number}"))
            })
    }

    pub async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        Ok(self.repository.find_by_user(user_id).await?)
    }

    pub async fn all_orders(&self) -> Result<Vec<Order>> {
        Ok(self.repository.find_all().await?)
    }

    /// Returns true if the user has an order that is neither delivered nor cancelled.
    pub async fn has_active_orders(&self, user_id: UserId) -> Result<bool> {
        Ok(self
            .repository
            .find_by_user(user_id)
            .await?
            .iter()
            .any(|o| o.status().is_active()))
    }

    /// Returns true if an order that is neither delivered nor cancelled contains the product.
    pub async fn has_active_orders_for_product(&self, product_id: ProductId) -> Result<bool> {
        Ok(self
            .repository
            .find_all()
            .await?
            .iter()
            .any(|o| o.status().is_active() && o.contains_product(product_id)))
    }

    async fn load(&self, order_id: OrderId) -> Result<Order> {
        self.repository
            .find_by_id(order_id)
            .await?
            .ok_or_else(|| OrchestratorError::OrderNotFound(format!("Order not found with id: {order_id}")))
    }

    /// Publishes without failing the caller; undelivered events stay with the publisher.
    async fn publish(&self, event: LifecycleEvent) {
        if let Err(error) = self.publisher.publish(&event).await {
            tracing::error!(
                order_id = %event.order_id,
                event_type = %event.event_type,
                %error,
                "Failed to publish lifecycle event"
            );
            metrics::counter!(
                "order_events_publish_failures_total",
                "event_type" => event.event_type.as_str()
            )
            .increment(1);
        }
    }
}

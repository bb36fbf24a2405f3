use common::ProductId;

use crate::error::ClientError;
use crate::guarded::GuardedClient;
use crate::transport::{ProductDetails, ProductTransport};

/// Guarded access to the product service.
#[derive(Debug, Clone)]
pub struct ProductClient<T> {
    guard: GuardedClient,
    transport: T,
}

impl<T: ProductTransport> ProductClient<T> {
    pub fn new(guard: GuardedClient, transport: T) -> Self {
        Self { guard, transport }
    }

    pub fn guard(&self) -> &GuardedClient {
        &self.guard
    }

    #[tracing::instrument(skip(self), fields(dependency = self.guard.dependency()))]
    pub async fn get_product(&self, product_id: ProductId) -> Result<ProductDetails, ClientError> {
        self.guard
            .execute("get_product", || self.transport.get_product(product_id))
            .await
    }

    #[tracing::instrument(skip(self), fields(dependency = self.guard.dependency()))]
    pub async fn check_stock(
        &self,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<bool, ClientError> {
        self.guard
            .execute("check_stock", || {
                self.transport.is_in_stock(product_id, quantity)
            })
            .await
    }

    /// Debits stock on the product service directly.
    ///
    /// Order creation does not use this; stock is debited by the inventory
    /// reconciler when it sees ORDER_CREATED. The debit is not idempotent, so
    /// it is attempted once: a timed-out call may still have landed.
    #[tracing::instrument(skip(self), fields(dependency = self.guard.dependency()))]
    pub async fn reduce_stock(
        &self,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<ProductDetails, ClientError> {
        self.guard
            .without_retry()
            .execute("reduce_stock", || {
                self.transport.reduce_stock(product_id, quantity)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use domain::Money;
    use resilience::{Backoff, ResilienceConfig, RetryConfig};

    use super::*;
    use crate::error::UnavailableCause;
    use crate::fake::InMemoryProductService;

    fn client(service: InMemoryProductService) -> ProductClient<InMemoryProductService> {
        let config = ResilienceConfig {
            retry: RetryConfig {
                max_attempts: 3,
                backoff: Backoff::Fixed {
                    delay: Duration::from_millis(5),
                },
                jitter: 0.0,
            },
            ..Default::default()
        };
        ProductClient::new(
            GuardedClient::from_config("product-service", &config),
            service,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn transient_blip_is_absorbed_by_retry() {
        let service = InMemoryProductService::new();
        service.add_product(1, "Widget", Money::from_cents(1000), 5);
        service.fail_next(2);
        let client = client(service.clone());

        let product = client.get_product(ProductId::new(1)).await.unwrap();
        assert_eq!(product.price, Money::from_cents(1000));
        assert_eq!(service.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_product_is_not_found() {
        let client = client(InMemoryProductService::new());
        let err = client.get_product(ProductId::new(9)).await.unwrap_err();
        assert!(matches!(err, ClientError::NotFound { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn check_stock_and_reduce() {
        let service = InMemoryProductService::new();
        service.add_product(1, "Widget", Money::from_cents(1000), 5);
        let client = client(service.clone());

        assert_eq!(client.check_stock(ProductId::new(1), 5).await, Ok(true));
        assert_eq!(client.check_stock(ProductId::new(1), 6).await, Ok(false));

        let updated = client.reduce_stock(ProductId::new(1), 2).await.unwrap();
        assert_eq!(updated.stock_quantity, 3);

        let err = client.reduce_stock(ProductId::new(1), 10).await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidInput { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn reduce_stock_is_attempted_once() {
        let service = InMemoryProductService::new();
        service.add_product(1, "Widget", Money::from_cents(1000), 5);
        service.fail_next(1);
        let client = client(service.clone());

        let err = client.reduce_stock(ProductId::new(1), 2).await.unwrap_err();

        assert!(matches!(
            err,
            ClientError::DependencyUnavailable {
                cause: UnavailableCause::RetriesExhausted { attempts: 1, .. },
                ..
            }
        ));
        assert_eq!(service.call_count(), 1);
        assert_eq!(service.product(ProductId::new(1)).unwrap().stock_quantity, 5);
        assert_eq!(client.guard().breaker().snapshot().failed_calls, 1);
    }
}

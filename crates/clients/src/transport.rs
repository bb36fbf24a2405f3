//! Wire-level seams for the remote services.

use std::sync::Arc;

use async_trait::async_trait;
use common::{ProductId, UserId};
use domain::Money;
use resilience::CallError;
use serde::{Deserialize, Serialize};

/// Product as returned by the product service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDetails {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    pub stock_quantity: u32,
}

/// One attempt against the user service.
#[async_trait]
pub trait UserTransport: Send + Sync {
    async fn user_exists(&self, user_id: UserId) -> Result<bool, CallError>;
}

/// One attempt against the product service.
#[async_trait]
pub trait ProductTransport: Send + Sync {
    async fn get_product(&self, product_id: ProductId) -> Result<ProductDetails, CallError>;

    async fn is_in_stock(&self, product_id: ProductId, quantity: u32) -> Result<bool, CallError>;

    async fn reduce_stock(
        &self,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<ProductDetails, CallError>;
}

#[async_trait]
impl<T: UserTransport + ?Sized> UserTransport for Arc<T> {
    async fn user_exists(&self, user_id: UserId) -> Result<bool, CallError> {
        (**self).user_exists(user_id).await
    }
}

#[async_trait]
impl<T: ProductTransport + ?Sized> ProductTransport for Arc<T> {
    async fn get_product(&self, product_id: ProductId) -> Result<ProductDetails, CallError> {
        (**self).get_product(product_id).await
    }

    async fn is_in_stock(&self, product_id: ProductId, quantity: u32) -> Result<bool, CallError> {
        (**self).is_in_stock(product_id, quantity).await
    }

    async fn reduce_stock(
        &self,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<ProductDetails, CallError> {
        (**self).reduce_stock(product_id, quantity).await
    }
}

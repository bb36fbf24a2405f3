//! reqwest transports for the user and product REST APIs.

use async_trait::async_trait;
use common::{ProductId, UserId};
use reqwest::{Client, RequestBuilder};
use resilience::CallError;
use serde::de::DeserializeOwned;

use crate::transport::{ProductDetails, ProductTransport, UserTransport};

/// Sends a request and decodes a JSON body, classifying every failure.
async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, CallError> {
    let response = request
        .send()
        .await
        .map_err(|e| CallError::Connect(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(CallError::from_status(status.as_u16(), body));
    }

    response
        .json::<T>()
        .await
        .map_err(|e| CallError::InvalidResponse(e.to_string()))
}

fn trim_base(base_url: impl Into<String>) -> String {
    base_url.into().trim_end_matches('/').to_string()
}

/// `GET /api/users/{id}/exists`.
#[derive(Debug, Clone)]
pub struct HttpUserTransport {
    client: Client,
    base_url: String,
}

impl HttpUserTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: trim_base(base_url),
        }
    }
}

#[async_trait]
impl UserTransport for HttpUserTransport {
    async fn user_exists(&self, user_id: UserId) -> Result<bool, CallError> {
        let url = format!("{}/api/users/{}/exists", self.base_url, user_id);
        send_json(self.client.get(url)).await
    }
}

/// Product catalogue and stock endpoints under `/api/products`.
#[derive(Debug, Clone)]
pub struct HttpProductTransport {
    client: Client,
    base_url: String,
}

impl HttpProductTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: trim_base(base_url),
        }
    }
}

#[async_trait]
impl ProductTransport for HttpProductTransport {
    async fn get_product(&self, product_id: ProductId) -> Result<ProductDetails, CallError> {
        let url = format!("{}/api/products/{}", self.base_url, product_id);
        send_json(self.client.get(url)).await
    }

    async fn is_in_stock(&self, product_id: ProductId, quantity: u32) -> Result<bool, CallError> {
        let url = format!("{}/api/products/{}/in-stock", self.base_url, product_id);
        send_json(self.client.get(url).query(&[("quantity", quantity)])).await
    }

    async fn reduce_stock(
        &self,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<ProductDetails, CallError> {
        let url = format!("{}/api/products/{}/reduce-stock", self.base_url, product_id);
        let body = serde_json::json!({ "quantity": quantity });
        send_json(self.client.put(url).json(&body)).await
    }
}

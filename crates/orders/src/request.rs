//! Order creation input.

use common::{ProductId, UserId};
use serde::{Deserialize, Serialize};

use crate::error::{OrchestratorError, Result};

/// One requested line: a product and how many units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

impl OrderLine {
    pub fn new(product_id: i64, quantity: u32) -> Self {
        Self {
            product_id: ProductId::new(product_id),
            quantity,
        }
    }
}

/// Request to create an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub user_id: UserId,
    pub shipping_address: String,
    pub items: Vec<OrderLine>,
}

impl CreateOrderRequest {
    pub fn new(user_id: i64, shipping_address: impl Into<String>, items: Vec<OrderLine>) -> Self {
        Self {
            user_id: UserId::new(user_id),
            shipping_address: shipping_address.into(),
            items,
        }
    }

    /// Checks the request shape and merges lines for the same product.
    ///
    /// Merged lines keep the position of the product's first occurrence.
    pub fn normalized_lines(&self) -> Result<Vec<OrderLine>> {
        if self.shipping_address.trim().is_empty() {
            return Err(OrchestratorError::ValidationFailed(
                "Shipping address is required".to_string(),
            ));
        }
        if self.items.is_empty() {
            return Err(OrchestratorError::ValidationFailed(
                "Order must contain at least one item".to_string(),
            ));
        }

        let mut lines: Vec<OrderLine> = Vec::with_capacity(self.items.len());
        for item in &self.items {
            if item.quantity == 0 {
                return Err(OrchestratorError::ValidationFailed(format!(
                    "Quantity for product {} must be at least 1",
                    item.product_id
                )));
            }
            match lines.iter_mut().find(|l| l.product_id == item.product_id) {
                Some(line) => {
                    line.quantity = line.quantity.checked_add(item.quantity).ok_or_else(|| {
                        OrchestratorError::ValidationFailed(format!(
                            "Quantity for product {} is too large",
                            item.product_id
                        ))
                    })?;
                }
                None => lines.push(*item),
            }
        }
        Ok(lines)
    }
}

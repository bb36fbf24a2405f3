//! Stocked products.

use std::str::FromStr;

use common::ProductId;
use domain::Money;
use serde::{Deserialize, Serialize};

use crate::error::{InventoryError, Result};

/// Sale status of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductStatus {
    #[default]
    Active,
    Inactive,
    OutOfStock,
}

impl ProductStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductStatus::Active => "ACTIVE",
            ProductStatus::Inactive => "INACTIVE",
            ProductStatus::OutOfStock => "OUT_OF_STOCK",
        }
    }
}

impl std::fmt::Display for ProductStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ProductStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(ProductStatus::Active),
            "INACTIVE" => Ok(ProductStatus::Inactive),
            "OUT_OF_STOCK" => Ok(ProductStatus::OutOfStock),
            other => Err(format!("unknown product status: {other}")),
        }
    }
}

/// A product with its current stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    pub stock_quantity: u32,
    pub status: ProductStatus,
}

impl Product {
    /// Creates an ACTIVE product, or OUT_OF_STOCK if `stock_quantity` is 0.
    pub fn new(id: i64, name: impl Into<String>, price: Money, stock_quantity: u32) -> Self {
        Self {
            id: ProductId::new(id),
            name: name.into(),
            price,
            stock_quantity,
            status: if stock_quantity == 0 {
                ProductStatus::OutOfStock
            } else {
                ProductStatus::Active
            },
        }
    }

    /// Adds `delta` (negative for a debit) to the stock.
    ///
    /// A product whose stock reaches 0 becomes OUT_OF_STOCK; an OUT_OF_STOCK
    /// product that gets stock back becomes ACTIVE. INACTIVE is kept unless
    /// the stock runs out. The product is left untouched on error.
    pub fn apply_delta(&mut self, delta: i64) -> Result<()> {
        let next = self.stock_quantity as i64 + delta;
        if next < 0 {
            return Err(InventoryError::InsufficientStock {
                product_id: self.id,
                requested: u32::try_from(-delta).unwrap_or(u32::MAX),
                available: self.stock_quantity,
            });
        }
        let next = u32::try_from(next).map_err(|_| InventoryError::QuantityOutOfRange(self.id))?;

        self.stock_quantity = next;
        if next == 0 {
            self.status = ProductStatus::OutOfStock;
        } else if self.status == ProductStatus::OutOfStock {
            self.status = ProductStatus::Active;
        }
        Ok(())
    }
}

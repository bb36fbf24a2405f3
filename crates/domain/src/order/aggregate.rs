//! Order aggregate root.

use chrono::{DateTime, Utc};
use common::{OrderId, ProductId, UserId};
use serde::{Deserialize, Serialize};

use super::{Money, OrderError, OrderItem, OrderNumber, OrderStatus};

/// Order aggregate root.
///
/// Owns its items. The total always equals the sum of item subtotals
/// computed at pricing time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    id: OrderId,
    order_number: OrderNumber,
    user_id: UserId,
    items: Vec<OrderItem>,
    total_amount: Money,
    status: OrderStatus,
    shipping_address: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Order {
    /// Builds a new PENDING order from priced items.
    pub fn new_pending(
        user_id: UserId,
        shipping_address: impl Into<String>,
        items: Vec<OrderItem>,
    ) -> Result<Self, OrderError> {
        if items.is_empty() {
            return Err(OrderError::NoItems);
        }
        if let Some(item) = items.iter().find(|i| i.quantity == 0) {
            return Err(OrderError::InvalidQuantity {
                product_id: item.product_id,
                quantity: item.quantity,
            });
        }

        let total_amount = Self::checked_total(&items)?;
        let now = Utc::now();
        Ok(Self {
            id: OrderId::new(),
            order_number: OrderNumber::generate(),
            user_id,
            items,
            total_amount,
            status: OrderStatus::Pending,
            shipping_address: shipping_address.into(),
            created_at: now,
            updated_at: now,
        })
    }

    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn order_number(&self) -> &OrderNumber {
        &self.order_number
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn shipping_address(&self) -> &str {
        &self.shipping_address
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns true if any line refers to `product_id`.
    pub fn contains_product(&self, product_id: ProductId) -> bool {
        self.items.iter().any(|i| i.product_id == product_id)
    }

    /// PENDING → CONFIRMED.
    pub fn confirm(&mut self) -> Result<(), OrderError> {
        if self.status != OrderStatus::Pending {
            return Err(self.invalid(OrderStatus::Confirmed));
        }
        self.set_status(OrderStatus::Confirmed);
        Ok(())
    }

    /// Cancels the order if it has not shipped yet.
    pub fn cancel(&mut self) -> Result<(), OrderError> {
        if !self.status.can_cancel() {
            return Err(self.invalid(OrderStatus::Cancelled));
        }
        self.set_status(OrderStatus::Cancelled);
        Ok(())
    }

    /// Moves the order forward to `next`.
    pub fn advance_to(&mut self, next: OrderStatus) -> Result<(), OrderError> {
        if !self.status.can_advance_to(next) {
            return Err(self.invalid(next));
        }
        self.set_status(next);
        Ok(())
    }

    /// Sums the items, rejecting negative prices and amounts that overflow.
    fn checked_total(items: &[OrderItem]) -> Result<Money, OrderError> {
        items.iter().try_fold(Money::zero(), |total, item| {
            if item.unit_price.is_negative() {
                return Err(OrderError::NegativePrice {
                    product_id: item.product_id,
                    price: item.unit_price,
                });
            }
            let overflow = || OrderError::AmountOverflow {
                product_id: item.product_id,
            };
            let subtotal = item
                .unit_price
                .checked_multiply(item.quantity)
                .ok_or_else(overflow)?;
            if subtotal != item.subtotal {
                return Err(overflow());
            }
            total.checked_add(subtotal).ok_or_else(overflow)
        })
    }

    fn set_status(&mut self, status: OrderStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }

    fn invalid(&self, target: OrderStatus) -> OrderError {
        OrderError::InvalidStateTransition {
            current: self.status,
            target,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items() -> Vec<OrderItem> {
        vec![
            OrderItem::new(ProductId::new(1), "Widget A", 2, Money::from_cents(1000)),
            OrderItem::new(ProductId::new(2), "Widget B", 1, Money::from_cents(500)),
        ]
    }

    fn pending() -> Order {
        Order::new_pending(UserId::new(42), "1 Main St", items()).unwrap()
    }

    #[test]
    fn new_order_is_pending_with_summed_total() {
        let order = pending();
        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.total_amount(), Money::from_cents(2500));
        assert_eq!(order.items().len(), 2);
        assert!(order.order_number().as_str().starts_with("ORD-"));
    }

    #[test]
    fn rejects_empty_orders() {
        let result = Order::new_pending(UserId::new(1), "addr", vec![]);
        assert_eq!(result.unwrap_err(), OrderError::NoItems);
    }

    #[test]
    fn rejects_zero_quantity() {
        let items = vec![OrderItem::new(
            ProductId::new(9),
            "Widget",
            0,
            Money::from_cents(100),
        )];
        let result = Order::new_pending(UserId::new(1), "addr", items);
        assert!(matches!(
            result,
            Err(OrderError::InvalidQuantity { quantity: 0, .. })
        ));
    }

    #[test]
    fn rejects_overflowing_amounts() {
        let price = Money::from_cents(i64::MAX / 2 + 1);
        let single = vec![OrderItem::new(ProductId::new(1), "Widget", 2, price)];
        assert_eq!(
            Order::new_pending(UserId::new(1), "addr", single).unwrap_err(),
            OrderError::AmountOverflow {
                product_id: ProductId::new(1)
            }
        );

        let summed = vec![
            OrderItem::new(ProductId::new(1), "Widget A", 1, price),
            OrderItem::new(ProductId::new(2), "Widget B", 1, price),
        ];
        assert_eq!(
            Order::new_pending(UserId::new(1), "addr", summed).unwrap_err(),
            OrderError::AmountOverflow {
                product_id: ProductId::new(2)
            }
        );
    }

    #[test]
    fn rejects_negative_prices() {
        let items = vec![OrderItem::new(
            ProductId::new(3),
            "Widget",
            1,
            Money::from_cents(-100),
        )];
        assert!(matches!(
            Order::new_pending(UserId::new(1), "addr", items),
            Err(OrderError::NegativePrice { .. })
        ));
    }

    #[test]
    fn confirm_only_from_pending() {
        let mut order = pending();
        order.confirm().unwrap();
        assert_eq!(order.status(), OrderStatus::Confirmed);
        assert!(order.confirm().is_err());
    }

    #[test]
    fn cancel_from_processing() {
        let mut order = pending();
        order.advance_to(OrderStatus::Processing).unwrap();
        order.cancel().unwrap();
        assert_eq!(order.status(), OrderStatus::Cancelled);
    }

    #[test]
    fn cancel_after_shipping_is_rejected_and_status_unchanged() {
        let mut order = pending();
        order.advance_to(OrderStatus::Shipped).unwrap();

        let err = order.cancel().unwrap_err();
        assert_eq!(
            err,
            OrderError::InvalidStateTransition {
                current: OrderStatus::Shipped,
                target: OrderStatus::Cancelled,
            }
        );
        assert_eq!(order.status(), OrderStatus::Shipped);
    }

    #[test]
    fn contains_product() {
        let order = pending();
        assert!(order.contains_product(ProductId::new(2)));
        assert!(!order.contains_product(ProductId::new(3)));
    }
}

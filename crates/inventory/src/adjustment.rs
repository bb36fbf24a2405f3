//! Stock adjustments derived from lifecycle events.

use common::{OrderId, ProductId};
use domain::EventType;

use crate::product::ProductStatus;

/// Identity of one adjustment: the same event line always has the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AdjustmentKey {
    pub order_id: OrderId,
    pub event_type: EventType,
    pub product_id: ProductId,
}

impl AdjustmentKey {
    /// Key of the debit a cancellation reverses, or of the cancellation that
    /// reverses a debit. `None` for events that never touch stock.
    pub fn counterpart(&self) -> Option<AdjustmentKey> {
        let event_type = match self.event_type {
            EventType::OrderCreated => EventType::OrderCancelled,
            EventType::OrderCancelled => EventType::OrderCreated,
            _ => return None,
        };
        Some(AdjustmentKey { event_type, ..*self })
    }
}

/// A signed change to one product's stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InventoryAdjustment {
    pub key: AdjustmentKey,
    /// Negative for a debit, positive for a credit.
    pub delta: i64,
}

impl InventoryAdjustment {
    pub fn product_id(&self) -> ProductId {
        self.key.product_id
    }

    /// Outcome to record in place of a stock change, given whether the
    /// counterpart adjustment is already recorded.
    ///
    /// A credit only reverses a debit that happened. A debit arriving after
    /// the order's cancellation was recorded is never applied.
    pub fn skipped_outcome(&self, counterpart_recorded: bool) -> Option<AdjustmentOutcome> {
        match (self.key.event_type, counterpart_recorded) {
            (EventType::OrderCancelled, false) => Some(AdjustmentOutcome::NothingToCompensate),
            (EventType::OrderCreated, true) => Some(AdjustmentOutcome::Superseded),
            _ => None,
        }
    }
}

/// Result of applying an adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdjustmentOutcome {
    /// The stock changed.
    Applied {
        new_quantity: u32,
        status: ProductStatus,
    },
    /// The adjustment was applied before; nothing changed.
    Duplicate,
    /// A credit whose debit never happened; recorded, stock unchanged.
    NothingToCompensate,
    /// A debit for an order already cancelled; recorded, stock unchanged.
    Superseded,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(event_type: EventType) -> AdjustmentKey {
        AdjustmentKey {
            order_id: OrderId::new(),
            event_type,
            product_id: ProductId::new(1),
        }
    }

    #[test]
    fn created_and_cancelled_are_counterparts() {
        let created = key(EventType::OrderCreated);
        let cancelled = created.counterpart().unwrap();

        assert_eq!(cancelled.event_type, EventType::OrderCancelled);
        assert_eq!(cancelled.order_id, created.order_id);
        assert_eq!(cancelled.counterpart(), Some(created));
        assert_eq!(key(EventType::OrderShipped).counterpart(), None);
    }

    #[test]
    fn skipped_outcomes() {
        let credit = InventoryAdjustment {
            key: key(EventType::OrderCancelled),
            delta: 3,
        };
        let debit = InventoryAdjustment {
            key: key(EventType::OrderCreated),
            delta: -3,
        };

        assert_eq!(
            credit.skipped_outcome(false),
            Some(AdjustmentOutcome::NothingToCompensate)
        );
        assert_eq!(credit.skipped_outcome(true), None);
        assert_eq!(debit.skipped_outcome(false), None);
        assert_eq!(debit.skipped_outcome(true), Some(AdjustmentOutcome::Superseded));
    }
}

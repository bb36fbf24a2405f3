//! Turning lifecycle events into stock adjustments.

use common::ProductId;
use domain::{EventType, LifecycleEvent};
use event_log::Record;
use resilience::RetryPolicy;

use crate::adjustment::{AdjustmentKey, AdjustmentOutcome, InventoryAdjustment};
use crate::error::{InventoryError, ReconcileError};
use crate::store::InventoryStore;

/// An item whose adjustment failed for a reason retrying cannot fix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    pub product_id: ProductId,
    pub quantity: u32,
    pub reason: String,
}

/// What happened to the items of one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub event_type: EventType,
    pub applied: usize,
    pub duplicates: usize,
    /// Items recorded without a stock change: credits with no debit to
    /// reverse, and debits for orders already cancelled.
    pub skipped: usize,
    pub failed: Vec<ItemFailure>,
}

impl ReconcileReport {
    fn new(event_type: EventType) -> Self {
        Self {
            event_type,
            applied: 0,
            duplicates: 0,
            skipped: 0,
            failed: Vec::new(),
        }
    }

    /// Returns true if no item failed.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Applies ORDER_CREATED and ORDER_CANCELLED events to an [`InventoryStore`].
///
/// Items are handled independently: one missing product or short stock is
/// logged and the remaining items are still applied. Redelivered events
/// are absorbed by the store's per-item dedupe. A cancellation only credits
/// the items its ORDER_CREATED actually debited.
pub struct InventoryReconciler<S> {
    store: S,
    retry: RetryPolicy,
}

impl<S: InventoryStore> InventoryReconciler<S> {
    /// `retry` bounds the attempts made when the store is unavailable.
    pub fn new(store: S, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Decodes and validates a record payload.
    pub fn decode(record: &Record) -> Result<LifecycleEvent, ReconcileError> {
        let event: LifecycleEvent = serde_json::from_value(record.payload.clone())
            .map_err(|e| ReconcileError::Malformed(e.to_string()))?;
        event
            .validate()
            .map_err(|e| ReconcileError::Malformed(e.to_string()))?;
        if event.key() != record.key {
            return Err(ReconcileError::Malformed(format!(
                "record key {} does not match order {}",
                record.key, event.order_id
            )));
        }
        Ok(event)
    }

    /// Decodes a record and reconciles its event.
    #[tracing::instrument(
        skip(self, record),
        fields(partition = record.partition, offset = record.offset)
    )]
    pub async fn handle_record(&self, record: &Record) -> Result<ReconcileReport, ReconcileError> {
        let event = Self::decode(record)?;
        self.reconcile(&event).await
    }

    /// Applies the stock changes an event implies.
    ///
    /// Returns `Err(ReconcileError::Store)` when at least one item could not
    /// be applied because the store stayed unavailable. The other items have
    /// been applied by then, so redelivering the whole event is safe.
    #[tracing::instrument(
        skip(self, event),
        fields(order_id = %event.order_id, event_type = %event.event_type)
    )]
    pub async fn reconcile(&self, event: &LifecycleEvent) -> Result<ReconcileReport, ReconcileError> {
        let sign = match event.event_type {
            EventType::OrderCreated => -1,
            EventType::OrderCancelled => 1,
            EventType::OrderShipped | EventType::OrderDelivered => {
                tracing::info!(order_number = %event.order_number, "No stock change for event");
                return Ok(ReconcileReport::new(event.event_type));
            }
            EventType::Unknown => {
                tracing::warn!(order_number = %event.order_number, "Skipping unknown event type");
                return Ok(ReconcileReport::new(event.event_type));
            }
        };

        let mut report = ReconcileReport::new(event.event_type);
        let mut unavailable = None;

        for item in &event.items {
            let adjustment = InventoryAdjustment {
                key: AdjustmentKey {
                    order_id: event.order_id,
                    event_type: event.event_type,
                    product_id: item.product_id,
                },
                delta: sign * i64::from(item.quantity),
            };

            match self.apply_with_retry(&adjustment).await {
                Ok(AdjustmentOutcome::Applied {
                    new_quantity,
                    status,
                }) => {
                    tracing::info!(
                        product_id = %item.product_id,
                        delta = adjustment.delta,
                        new_quantity,
                        %status,
                        "Stock adjusted"
                    );
                    report.applied += 1;
                    Self::count(event.event_type, "applied");
                }
                Ok(AdjustmentOutcome::Duplicate) => {
                    tracing::debug!(product_id = %item.product_id, "Adjustment already applied");
                    report.duplicates += 1;
                    Self::count(event.event_type, "duplicate");
                }
                Ok(outcome @ (AdjustmentOutcome::NothingToCompensate
                | AdjustmentOutcome::Superseded)) => {
                    tracing::info!(
                        product_id = %item.product_id,
                        quantity = item.quantity,
                        ?outcome,
                        "Stock left unchanged"
                    );
                    report.skipped += 1;
                    Self::count(event.event_type, "skipped");
                }
                Err(e) if e.is_transient() => {
                    tracing::error!(
                        product_id = %item.product_id,
                        quantity = item.quantity,
                        error = %e,
                        "EventProcessingFailed"
                    );
                    Self::count(event.event_type, "unavailable");
                    unavailable.get_or_insert(e);
                }
                Err(e) => {
                    tracing::error!(
                        product_id = %item.product_id,
                        quantity = item.quantity,
                        error = %e,
                        "EventProcessingFailed"
                    );
                    Self::count(event.event_type, "failed");
                    report.failed.push(ItemFailure {
                        product_id: item.product_id,
                        quantity: item.quantity,
                        reason: e.to_string(),
                    });
                }
            }
        }

        match unavailable {
            Some(e) => Err(ReconcileError::Store(e)),
            None => Ok(report),
        }
    }

    async fn apply_with_retry(
        &self,
        adjustment: &InventoryAdjustment,
    ) -> Result<AdjustmentOutcome, InventoryError> {
        let mut attempt = 1;
        loop {
            match self.store.apply(adjustment).await {
                Err(e) if e.is_transient() && attempt < self.retry.max_attempts() => {
                    let delay = self.retry.delay_for(attempt);
                    tracing::warn!(
                        product_id = %adjustment.product_id(),
                        attempt,
                        ?delay,
                        error = %e,
                        "Retrying stock adjustment"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    fn count(event_type: EventType, outcome: &'static str) {
        metrics::counter!(
            "inventory_adjustments_total",
            "event_type" => event_type.as_str(),
            "outcome" => outcome
        )
        .increment(1);
    }
}

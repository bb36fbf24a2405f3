//! Publishing lifecycle events to the order topic.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use domain::{LifecycleEvent, ORDER_EVENTS_TOPIC};
use event_log::{EventLog, EventLogExt};
use tokio::sync::Mutex;

use crate::error::PublishError;

/// Hands lifecycle events to the durable log.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publishes `event` keyed by its order ID.
    ///
    /// An `Err` does not mean the event is lost; implementations may keep
    /// it and deliver it later.
    async fn publish(&self, event: &LifecycleEvent) -> Result<(), PublishError>;
}

#[async_trait]
impl<T: EventPublisher + ?Sized> EventPublisher for Arc<T> {
    async fn publish(&self, event: &LifecycleEvent) -> Result<(), PublishError> {
        (**self).publish(event).await
    }
}

/// Publisher backed by an [`EventLog`] with a local outbox.
///
/// Events are queued in the outbox and appended in queue order, so events
/// for the same order reach the log in the order they were published. When
/// the log is down the queue keeps growing until [`flush_pending`] drains it.
///
/// [`flush_pending`]: LogEventPublisher::flush_pending
#[derive(Clone)]
pub struct LogEventPublisher<L> {
    log: L,
    topic: String,
    outbox: Arc<Mutex<VecDeque<LifecycleEvent>>>,
}

impl<L: EventLog> LogEventPublisher<L> {
    /// Creates a publisher for the order topic.
    pub fn new(log: L) -> Self {
        Self::with_topic(log, ORDER_EVENTS_TOPIC)
    }

    pub fn with_topic(log: L, topic: impl Into<String>) -> Self {
        Self {
            log,
            topic: topic.into(),
            outbox: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    pub fn log(&self) -> &L {
        &self.log
    }

    /// Number of events waiting for the log.
    pub async fn pending_count(&self) -> usize {
        self.outbox.lock().await.len()
    }

    /// Appends queued events until the queue is empty or the log fails.
    ///
    /// Returns the number of events delivered.
    pub async fn flush_pending(&self) -> Result<usize, PublishError> {
        let mut outbox = self.outbox.lock().await;
        self.drain(&mut outbox).await
    }

    async fn drain(&self, outbox: &mut VecDeque<LifecycleEvent>) -> Result<usize, PublishError> {
        let mut delivered = 0;
        while let Some(event) = outbox.front() {
            match self.log.append_json(&self.topic, &event.key(), event).await {
                Ok(position) => {
                    tracing::debug!(
                        order_id = %event.order_id,
                        event_type = %event.event_type,
                        partition = position.partition,
                        offset = position.offset,
                        "Lifecycle event published"
                    );
                    metrics::counter!(
                        "order_events_published_total",
                        "event_type" => event.event_type.as_str()
                    )
                    .increment(1);
                    outbox.pop_front();
                    delivered += 1;
                }
                Err(event_log::EventLogError::Serialization(e)) => {
                    // Unserializable events can never be delivered.
                    tracing::error!(order_id = %event.order_id, error = %e, "Dropping event");
                    outbox.pop_front();
                    return Err(PublishError::Serialization(e));
                }
                Err(source) => {
                    metrics::gauge!("order_events_pending").set(outbox.len() as f64);
                    return Err(PublishError::Deferred {
                        pending: outbox.len(),
                        source,
                    });
                }
            }
        }
        metrics::gauge!("order_events_pending").set(0.0);
        Ok(delivered)
    }
}

#[async_trait]
impl<L: EventLog> EventPublisher for LogEventPublisher<L> {
    async fn publish(&self, event: &LifecycleEvent) -> Result<(), PublishError> {
        let mut outbox = self.outbox.lock().await;
        outbox.push_back(event.clone());
        self.drain(&mut outbox).await.map(|_| ())
    }
}

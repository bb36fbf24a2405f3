//! Feeding log partitions to the reconciler.

use std::sync::Arc;
use std::time::Duration;

use domain::ORDER_EVENTS_TOPIC;
use event_log::EventLog;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::ReconcileError;
use crate::reconciler::InventoryReconciler;
use crate::store::InventoryStore;

/// Consumer group settings.
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    pub group: String,
    pub topic: String,
    /// Records read per poll.
    pub batch_size: usize,
    /// Pause between polls that found nothing to do.
    pub poll_interval: Duration,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            group: "inventory-reconciler".to_string(),
            topic: ORDER_EVENTS_TOPIC.to_string(),
            batch_size: 100,
            poll_interval: Duration::from_millis(200),
        }
    }
}

/// Consumes one partition for one consumer group.
///
/// Offsets are committed after the reconciler has handled a record, so a
/// crash between the two replays the record (at-least-once).
pub struct PartitionConsumer<L, S> {
    log: L,
    reconciler: Arc<InventoryReconciler<S>>,
    config: ConsumerConfig,
    partition: u32,
}

impl<L: EventLog, S: InventoryStore> PartitionConsumer<L, S> {
    pub fn new(
        log: L,
        reconciler: Arc<InventoryReconciler<S>>,
        config: ConsumerConfig,
        partition: u32,
    ) -> Self {
        Self {
            log,
            reconciler,
            config,
            partition,
        }
    }

    pub fn partition(&self) -> u32 {
        self.partition
    }

    /// Handles one batch from the committed offset and commits past it.
    ///
    /// Malformed records are dead-lettered and skipped. A record the store
    /// could not take, or one that could not be dead-lettered, stops the
    /// batch; everything before it is committed and the record is read
    /// again on the next poll.
    ///
    /// Returns the number of records consumed.
    pub async fn poll_once(&self) -> Result<usize, ReconcileError> {
        let ConsumerConfig {
            group,
            topic,
            batch_size,
            ..
        } = &self.config;

        let from = self
            .log
            .committed_offset(group, topic, self.partition)
            .await?;
        let records = self
            .log
            .read(topic, self.partition, from, *batch_size)
            .await?;

        let mut next = from;
        let mut failure = None;
        for record in &records {
            match self.reconciler.handle_record(record).await {
                Ok(_) => {}
                Err(ReconcileError::Malformed(reason)) => {
                    tracing::warn!(
                        partition = self.partition,
                        offset = record.offset,
                        %reason,
                        "Dead-lettering malformed record"
                    );
                    if let Err(e) = self.log.dead_letter(group, record, &reason).await {
                        failure = Some(ReconcileError::Log(e));
                        break;
                    }
                    metrics::counter!("inventory_dead_letters_total").increment(1);
                }
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
            next = record.offset + 1;
        }

        if next > from {
            self.log.commit(group, topic, self.partition, next).await?;
        }

        match failure {
            Some(e) => Err(e),
            None => Ok((next - from) as usize),
        }
    }

    /// Polls until `shutdown` turns true or its sender is dropped.
    #[tracing::instrument(
        skip(self, shutdown),
        fields(group = %self.config.group, partition = self.partition)
    )]
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!("Partition consumer started");

        while !*shutdown.borrow() {
            let idle = match self.poll_once().await {
                Ok(0) => true,
                Ok(consumed) => {
                    tracing::debug!(consumed, "Batch consumed");
                    false
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Poll failed, backing off");
                    true
                }
            };

            if idle {
                tokio::select! {
                    _ = tokio::time::sleep(self.config.poll_interval) => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
        }

        tracing::info!("Partition consumer stopped");
    }
}

/// Spawns one [`PartitionConsumer`] task per partition of the log.
pub fn spawn_consumers<L, S>(
    log: L,
    reconciler: Arc<InventoryReconciler<S>>,
    config: ConsumerConfig,
    shutdown: watch::Receiver<bool>,
) -> Vec<JoinHandle<()>>
where
    L: EventLog + Clone + 'static,
    S: InventoryStore + 'static,
{
    (0..log.partition_count())
        .map(|partition| {
            let consumer =
                PartitionConsumer::new(log.clone(), reconciler.clone(), config.clone(), partition);
            tokio::spawn(consumer.run(shutdown.clone()))
        })
        .collect()
}

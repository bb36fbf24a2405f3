use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::{DeadLetter, EventLogError, Record, RecordPosition, Result};

/// Core trait for partitioned log implementations.
///
/// Within a partition, offsets are dense and strictly increasing in append
/// order. Appends with the same key always land in the same partition.
#[async_trait]
pub trait EventLog: Send + Sync {
    /// Number of partitions per topic.
    fn partition_count(&self) -> u32;

    /// Appends a record and returns where it landed.
    ///
    /// The record is durable once this returns `Ok`.
    async fn append(
        &self,
        topic: &str,
        key: &str,
        payload: serde_json::Value,
    ) -> Result<RecordPosition>;

    /// Reads up to `max_records` records starting at `from_offset`, in offset order.
    async fn read(
        &self,
        topic: &str,
        partition: u32,
        from_offset: u64,
        max_records: usize,
    ) -> Result<Vec<Record>>;

    /// Offset the next appended record in this partition will get.
    async fn end_offset(&self, topic: &str, partition: u32) -> Result<u64>;

    /// Next offset the group still has to process, or 0 if it never committed.
    async fn committed_offset(&self, group: &str, topic: &str, partition: u32) -> Result<u64>;

    /// Records that the group has processed everything before `next_offset`.
    ///
    /// Commits never move a group's offset backwards.
    async fn commit(&self, group: &str, topic: &str, partition: u32, next_offset: u64)
    -> Result<()>;

    /// Parks a record the group cannot process.
    async fn dead_letter(&self, group: &str, record: &Record, reason: &str) -> Result<()>;

    /// Records parked by the group, oldest first.
    async fn dead_letters(&self, group: &str) -> Result<Vec<DeadLetter>>;
}

#[async_trait]
impl<T: EventLog + ?Sized> EventLog for Arc<T> {
    fn partition_count(&self) -> u32 {
        (**self).partition_count()
    }

    async fn append(
        &self,
        topic: &str,
        key: &str,
        payload: serde_json::Value,
    ) -> Result<RecordPosition> {
        (**self).append(topic, key, payload).await
    }

    async fn read(
        &self,
        topic: &str,
        partition: u32,
        from_offset: u64,
        max_records: usize,
    ) -> Result<Vec<Record>> {
        (**self).read(topic, partition, from_offset, max_records).await
    }

    async fn end_offset(&self, topic: &str, partition: u32) -> Result<u64> {
        (**self).end_offset(topic, partition).await
    }

    async fn committed_offset(&self, group: &str, topic: &str, partition: u32) -> Result<u64> {
        (**self).committed_offset(group, topic, partition).await
    }

    async fn commit(
        &self,
        group: &str,
        topic: &str,
        partition: u32,
        next_offset: u64,
    ) -> Result<()> {
        (**self).commit(group, topic, partition, next_offset).await
    }

    async fn dead_letter(&self, group: &str, record: &Record, reason: &str) -> Result<()> {
        (**self).dead_letter(group, record, reason).await
    }

    async fn dead_letters(&self, group: &str) -> Result<Vec<DeadLetter>> {
        (**self).dead_letters(group).await
    }
}

/// Extension trait for typed appends.
#[async_trait]
pub trait EventLogExt: EventLog {
    /// Serializes `value` and appends it under `key`.
    async fn append_json<T>(&self, topic: &str, key: &str, value: &T) -> Result<RecordPosition>
    where
        T: Serialize + Sync,
    {
        let payload = serde_json::to_value(value)?;
        self.append(topic, key, payload).await
    }

    /// Number of records the group has not committed yet in `partition`.
    async fn lag(&self, group: &str, topic: &str, partition: u32) -> Result<u64> {
        let end = self.end_offset(topic, partition).await?;
        let committed = self.committed_offset(group, topic, partition).await?;
        Ok(end.saturating_sub(committed))
    }
}

impl<T: EventLog + ?Sized> EventLogExt for T {}

/// Fails with `UnknownPartition` if `partition` is out of range.
pub(crate) fn check_partition(partition: u32, partition_count: u32) -> Result<()> {
    if partition >= partition_count {
        return Err(EventLogError::UnknownPartition {
            partition,
            partition_count,
        });
    }
    Ok(())
}

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::{
    DeadLetter, EventLogError, Record, RecordPosition, Result,
    log::{EventLog, check_partition},
    partition_for,
};

#[derive(Default)]
struct LogState {
    partitions: HashMap<(String, u32), Vec<Record>>,
    offsets: HashMap<(String, String, u32), u64>,
    dead_letters: Vec<DeadLetter>,
    unavailable: bool,
    dead_letters_unavailable: bool,
}

/// In-memory event log implementation for testing.
///
/// Behaves like the PostgreSQL implementation, and can be switched into an
/// unavailable mode where every call fails.
#[derive(Clone)]
pub struct InMemoryEventLog {
    partition_count: u32,
    state: Arc<RwLock<LogState>>,
}

impl Default for InMemoryEventLog {
    fn default() -> Self {
        Self::new(1)
    }
}

impl InMemoryEventLog {
    /// Creates an empty log with `partition_count` partitions per topic.
    pub fn new(partition_count: u32) -> Self {
        Self {
            partition_count: partition_count.max(1),
            state: Arc::new(RwLock::new(LogState::default())),
        }
    }

    /// While set, every operation fails with `Unavailable`.
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.state.write().await.unavailable = unavailable;
    }

    /// While set, only [`EventLog::dead_letter`] fails with `Unavailable`.
    pub async fn set_dead_letters_unavailable(&self, unavailable: bool) {
        self.state.write().await.dead_letters_unavailable = unavailable;
    }

    /// Returns the number of records stored in `topic` across all partitions.
    pub async fn record_count(&self, topic: &str) -> usize {
        self.state
            .read()
            .await
            .partitions
            .iter()
            .filter(|((t, _), _)| t == topic)
            .map(|(_, records)| records.len())
            .sum()
    }

    /// Returns every record of `topic`, partition by partition.
    pub async fn all_records(&self, topic: &str) -> Vec<Record> {
        let state = self.state.read().await;
        (0..self.partition_count)
            .filter_map(|p| state.partitions.get(&(topic.to_string(), p)))
            .flat_map(|records| records.iter().cloned())
            .collect()
    }

    fn ensure_available(state: &LogState) -> Result<()> {
        if state.unavailable {
            return Err(EventLogError::Unavailable("log is offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl EventLog for InMemoryEventLog {
    fn partition_count(&self) -> u32 {
        self.partition_count
    }

    async fn append(
        &self,
        topic: &str,
        key: &str,
        payload: serde_json::Value,
    ) -> Result<RecordPosition> {
        let mut state = self.state.write().await;
        Self::ensure_available(&state)?;

        let partition = partition_for(key, self.partition_count);
        let records = state
            .partitions
            .entry((topic.to_string(), partition))
            .or_default();
        let offset = records.len() as u64;
        records.push(Record {
            topic: topic.to_string(),
            partition,
            offset,
            key: key.to_string(),
            payload,
            appended_at: Utc::now(),
        });

        metrics::counter!("event_log_appends_total", "topic" => topic.to_string()).increment(1);
        Ok(RecordPosition { partition, offset })
    }

    async fn read(
        &self,
        topic: &str,
        partition: u32,
        from_offset: u64,
        max_records: usize,
    ) -> Result<Vec<Record>> {
        check_partition(partition, self.partition_count)?;
        let state = self.state.read().await;
        Self::ensure_available(&state)?;

        Ok(state
            .partitions
            .get(&(topic.to_string(), partition))
            .map(|records| {
                records
                    .iter()
                    .skip(from_offset as usize)
                    .take(max_records)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn end_offset(&self, topic: &str, partition: u32) -> Result<u64> {
        check_partition(partition, self.partition_count)?;
        let state = self.state.read().await;
        Self::ensure_available(&state)?;

        Ok(state
            .partitions
            .get(&(topic.to_string(), partition))
            .map_or(0, |records| records.len() as u64))
    }

    async fn committed_offset(&self, group: &str, topic: &str, partition: u32) -> Result<u64> {
        check_partition(partition, self.partition_count)?;
        let state = self.state.read().await;
        Self::ensure_available(&state)?;

        Ok(state
            .offsets
            .get(&(group.to_string(), topic.to_string(), partition))
            .copied()
            .unwrap_or(0))
    }

    async fn commit(
        &self,
        group: &str,
        topic: &str,
        partition: u32,
        next_offset: u64,
    ) -> Result<()> {
        check_partition(partition, self.partition_count)?;
        let mut state = self.state.write().await;
        Self::ensure_available(&state)?;

        let committed = state
            .offsets
            .entry((group.to_string(), topic.to_string(), partition))
            .or_insert(0);
        *committed = (*committed).max(next_offset);
        Ok(())
    }

    async fn dead_letter(&self, group: &str, record: &Record, reason: &str) -> Result<()> {
        let mut state = self.state.write().await;
        Self::ensure_available(&state)?;
        if state.dead_letters_unavailable {
            return Err(EventLogError::Unavailable(
                "dead letter store is offline".to_string(),
            ));
        }

        state.dead_letters.push(DeadLetter {
            group: group.to_string(),
            record: record.clone(),
            reason: reason.to_string(),
            recorded_at: Utc::now(),
        });
        Ok(())
    }

    async fn dead_letters(&self, group: &str) -> Result<Vec<DeadLetter>> {
        let state = self.state.read().await;
        Self::ensure_available(&state)?;

        Ok(state
            .dead_letters
            .iter()
            .filter(|d| d.group == group)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EventLogExt;
    use serde_json::json;

    const TOPIC: &str = "order-events";

    #[tokio::test]
    async fn offsets_are_dense_per_partition() {
        let log = InMemoryEventLog::new(1);

        for i in 0..3 {
            let pos = log.append(TOPIC, "k", json!({ "n": i })).await.unwrap();
            assert_eq!(pos, RecordPosition { partition: 0, offset: i });
        }

        let records = log.read(TOPIC, 0, 0, 10).await.unwrap();
        let offsets: Vec<u64> = records.iter().map(|r| r.offset).collect();
        assert_eq!(offsets, vec![0, 1, 2]);
        assert_eq!(records[2].payload["n"], 2);
    }

    #[tokio::test]
    async fn same_key_same_partition() {
        let log = InMemoryEventLog::new(4);
        let a = log.append(TOPIC, "order-1", json!(1)).await.unwrap();
        let b = log.append(TOPIC, "order-1", json!(2)).await.unwrap();

        assert_eq!(a.partition, b.partition);
        assert_eq!(b.offset, a.offset + 1);
    }

    #[tokio::test]
    async fn read_respects_bounds() {
        let log = InMemoryEventLog::new(1);
        for i in 0..5 {
            log.append(TOPIC, "k", json!(i)).await.unwrap();
        }

        let records = log.read(TOPIC, 0, 2, 2).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].offset, 2);

        assert!(log.read(TOPIC, 0, 10, 5).await.unwrap().is_empty());
        assert!(log.read("other-topic", 0, 0, 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_partition_is_an_error() {
        let log = InMemoryEventLog::new(2);
        let result = log.read(TOPIC, 2, 0, 1).await;
        assert!(matches!(
            result,
            Err(EventLogError::UnknownPartition { partition: 2, .. })
        ));
    }

    #[tokio::test]
    async fn commits_are_monotonic_and_per_group() {
        let log = InMemoryEventLog::new(1);
        assert_eq!(log.committed_offset("g1", TOPIC, 0).await.unwrap(), 0);

        log.commit("g1", TOPIC, 0, 5).await.unwrap();
        log.commit("g1", TOPIC, 0, 3).await.unwrap();

        assert_eq!(log.committed_offset("g1", TOPIC, 0).await.unwrap(), 5);
        assert_eq!(log.committed_offset("g2", TOPIC, 0).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn lag_counts_uncommitted_records() {
        let log = InMemoryEventLog::new(1);
        for i in 0..4 {
            log.append(TOPIC, "k", json!(i)).await.unwrap();
        }
        log.commit("g", TOPIC, 0, 1).await.unwrap();

        assert_eq!(log.lag("g", TOPIC, 0).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn unavailable_log_rejects_appends() {
        let log = InMemoryEventLog::new(1);
        log.set_unavailable(true).await;

        let result = log.append(TOPIC, "k", json!({})).await;
        assert!(matches!(result, Err(EventLogError::Unavailable(_))));

        log.set_unavailable(false).await;
        assert_eq!(log.record_count(TOPIC).await, 0);
        log.append(TOPIC, "k", json!({})).await.unwrap();
        assert_eq!(log.record_count(TOPIC).await, 1);
    }

    #[tokio::test]
    async fn dead_letters_are_kept_per_group() {
        let log = InMemoryEventLog::new(1);
        log.append(TOPIC, "k", json!("garbage")).await.unwrap();
        let record = log.read(TOPIC, 0, 0, 1).await.unwrap().remove(0);

        log.dead_letter("inventory", &record, "not an object")
            .await
            .unwrap();

        let parked = log.dead_letters("inventory").await.unwrap();
        assert_eq!(parked.len(), 1);
        assert_eq!(parked[0].record, record);
        assert_eq!(parked[0].reason, "not an object");
        assert!(log.dead_letters("other").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn append_json_serializes_value() {
        #[derive(serde::Serialize)]
        struct Payload {
            order_id: u32,
        }

        let log = InMemoryEventLog::new(1);
        log.append_json(TOPIC, "k", &Payload { order_id: 7 })
            .await
            .unwrap();

        let records = log.all_records(TOPIC).await;
        assert_eq!(records[0].payload, json!({ "order_id": 7 }));
    }
}

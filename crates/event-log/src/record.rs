use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A record stored in the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub topic: String,
    pub partition: u32,
    /// Position within the partition, starting at 0.
    pub offset: u64,
    pub key: String,
    pub payload: serde_json::Value,
    pub appended_at: DateTime<Utc>,
}

impl Record {
    /// Position of this record.
    pub fn position(&self) -> RecordPosition {
        RecordPosition {
            partition: self.partition,
            offset: self.offset,
        }
    }
}

/// Where an appended record landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordPosition {
    pub partition: u32,
    pub offset: u64,
}

/// A record a consumer group gave up on.
#[derive(Debug, Clone, PartialEq)]
pub struct DeadLetter {
    pub group: String,
    pub record: Record,
    pub reason: String,
    pub recorded_at: DateTime<Utc>,
}

/// Maps a key onto one of `partition_count` partitions.
///
/// Uses 32-bit FNV-1a so the mapping is stable across processes and builds.
pub fn partition_for(key: &str, partition_count: u32) -> u32 {
    const OFFSET_BASIS: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;

    let hash = key.bytes().fold(OFFSET_BASIS, |hash, byte| {
        (hash ^ byte as u32).wrapping_mul(PRIME)
    });
    hash % partition_count.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partitioning_is_stable() {
        let key = "3f2b9d0e-8a51-4c1e-9f0a-5b7c2d1e4a60";
        assert_eq!(partition_for(key, 8), partition_for(key, 8));
    }

    #[test]
    fn partition_is_in_range() {
        for i in 0..100 {
            assert!(partition_for(&format!("order-{i}"), 4) < 4);
        }
    }

    #[test]
    fn single_partition_takes_everything() {
        assert_eq!(partition_for("anything", 1), 0);
        assert_eq!(partition_for("anything", 0), 0);
    }

    #[test]
    fn fnv1a_reference_value() {
        // FNV-1a("a") = 0xe40c292c
        assert_eq!(partition_for("a", u32::MAX), 0xe40c_292c % u32::MAX);
    }
}

use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::{
    DeadLetter, Record, RecordPosition, Result,
    log::{EventLog, check_partition},
    partition_for,
};

/// PostgreSQL-backed event log implementation.
///
/// Appends to one partition are serialized with a transaction-scoped
/// advisory lock, so offsets stay dense under concurrent writers.
#[derive(Clone)]
pub struct PostgresEventLog {
    pool: PgPool,
    partition_count: u32,
}

impl PostgresEventLog {
    /// Creates a new PostgreSQL event log.
    pub fn new(pool: PgPool, partition_count: u32) -> Self {
        Self {
            pool,
            partition_count: partition_count.max(1),
        }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_record(row: &PgRow) -> Result<Record> {
        Ok(Record {
            topic: row.try_get("topic")?,
            partition: row.try_get::<i32, _>("partition_id")? as u32,
            offset: row.try_get::<i64, _>("log_offset")? as u64,
            key: row.try_get("record_key")?,
            payload: row.try_get("payload")?,
            appended_at: row.try_get("appended_at")?,
        })
    }
}

#[async_trait]
impl EventLog for PostgresEventLog {
    fn partition_count(&self) -> u32 {
        self.partition_count
    }

    async fn append(
        &self,
        topic: &str,
        key: &str,
        payload: serde_json::Value,
    ) -> Result<RecordPosition> {
        let partition = partition_for(key, self.partition_count);

        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1), $2)")
            .bind(topic)
            .bind(partition as i32)
            .execute(&mut *tx)
            .await?;

        let offset: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(log_offset) + 1, 0) FROM event_log WHERE topic = $1 AND partition_id = $2",
        )
        .bind(topic)
        .bind(partition as i32)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO event_log (topic, partition_id, log_offset, record_key, payload)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(topic)
        .bind(partition as i32)
        .bind(offset)
        .bind(key)
        .bind(&payload)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        metrics::counter!("event_log_appends_total", "topic" => topic.to_string()).increment(1);
        tracing::trace!(topic, partition, offset, "Record appended");

        Ok(RecordPosition {
            partition,
            offset: offset as u64,
        })
    }

    async fn read(
        &self,
        topic: &str,
        partition: u32,
        from_offset: u64,
        max_records: usize,
    ) -> Result<Vec<Record>> {
        check_partition(partition, self.partition_count)?;

        let rows = sqlx::query(
            r#"
            SELECT topic, partition_id, log_offset, record_key, payload, appended_at
            FROM event_log
            WHERE topic = $1 AND partition_id = $2 AND log_offset >= $3
            ORDER BY log_offset ASC
            LIMIT $4
            "#,
        )
        .bind(topic)
        .bind(partition as i32)
        .bind(from_offset as i64)
        .bind(max_records as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_record).collect()
    }

    async fn end_offset(&self, topic: &str, partition: u32) -> Result<u64> {
        check_partition(partition, self.partition_count)?;

        let end: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(log_offset) + 1, 0) FROM event_log WHERE topic = $1 AND partition_id = $2",
        )
        .bind(topic)
        .bind(partition as i32)
        .fetch_one(&self.pool)
        .await?;

        Ok(end as u64)
    }

    async fn committed_offset(&self, group: &str, topic: &str, partition: u32) -> Result<u64> {
        check_partition(partition, self.partition_count)?;

        let offset: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT next_offset FROM consumer_offsets
            WHERE group_id = $1 AND topic = $2 AND partition_id = $3
            "#,
        )
        .bind(group)
        .bind(topic)
        .bind(partition as i32)
        .fetch_optional(&self.pool)
        .await?;

        Ok(offset.map_or(0, |o| o as u64))
    }

    async fn commit(
        &self,
        group: &str,
        topic: &str,
        partition: u32,
        next_offset: u64,
    ) -> Result<()> {
        check_partition(partition, self.partition_count)?;

        sqlx::query(
            r#"
            INSERT INTO consumer_offsets (group_id, topic, partition_id, next_offset)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (group_id, topic, partition_id) DO UPDATE
            SET next_offset = GREATEST(consumer_offsets.next_offset, EXCLUDED.next_offset),
                updated_at = NOW()
            "#,
        )
        .bind(group)
        .bind(topic)
        .bind(partition as i32)
        .bind(next_offset as i64)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn dead_letter(&self, group: &str, record: &Record, reason: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO dead_letters
                (group_id, topic, partition_id, log_offset, record_key, payload, appended_at, reason)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(group)
        .bind(&record.topic)
        .bind(record.partition as i32)
        .bind(record.offset as i64)
        .bind(&record.key)
        .bind(&record.payload)
        .bind(record.appended_at)
        .bind(reason)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn dead_letters(&self, group: &str) -> Result<Vec<DeadLetter>> {
        let rows = sqlx::query(
            r#"
            SELECT group_id, topic, partition_id, log_offset, record_key, payload,
                   appended_at, reason, recorded_at
            FROM dead_letters
            WHERE group_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(group)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(DeadLetter {
                    group: row.try_get("group_id")?,
                    record: Self::row_to_record(row)?,
                    reason: row.try_get("reason")?,
                    recorded_at: row.try_get("recorded_at")?,
                })
            })
            .collect()
    }
}

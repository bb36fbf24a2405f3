//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p event-log --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use event_log::{EventLog, EventLogError, EventLogExt, PostgresEventLog};
use serde_json::json;
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

const TOPIC: &str = "order-events";

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();

            sqlx::raw_sql(include_str!("../../../migrations/001_create_event_log.sql"))
                .execute(&temp_pool)
                .await
                .unwrap();

            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh log with its own pool and cleared tables
async fn get_test_log(partitions: u32) -> PostgresEventLog {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE event_log, consumer_offsets, dead_letters")
        .execute(&pool)
        .await
        .unwrap();

    PostgresEventLog::new(pool, partitions)
}

#[tokio::test]
async fn test_append_and_read_in_order() {
    let log = get_test_log(1).await;

    for i in 0..3 {
        let pos = log.append(TOPIC, "order-1", json!({ "n": i })).await.unwrap();
        assert_eq!(pos.partition, 0);
        assert_eq!(pos.offset, i);
    }

    let records = log.read(TOPIC, 0, 0, 10).await.unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(records[1].payload, json!({ "n": 1 }));
    assert_eq!(records[1].key, "order-1");
    assert_eq!(log.end_offset(TOPIC, 0).await.unwrap(), 3);
}

#[tokio::test]
async fn test_read_from_offset_with_limit() {
    let log = get_test_log(1).await;
    for i in 0..5 {
        log.append(TOPIC, "k", json!(i)).await.unwrap();
    }

    let records = log.read(TOPIC, 0, 3, 10).await.unwrap();
    let offsets: Vec<u64> = records.iter().map(|r| r.offset).collect();
    assert_eq!(offsets, vec![3, 4]);

    let records = log.read(TOPIC, 0, 0, 2).await.unwrap();
    assert_eq!(records.len(), 2);
}

#[tokio::test]
async fn test_concurrent_appends_keep_offsets_dense() {
    let log = get_test_log(1).await;

    let mut handles = Vec::new();
    for i in 0..20 {
        let log = log.clone();
        handles.push(tokio::spawn(async move {
            log.append(TOPIC, "same-key", json!(i)).await.unwrap()
        }));
    }

    let mut offsets = Vec::new();
    for handle in handles {
        offsets.push(handle.await.unwrap().offset);
    }
    offsets.sort_unstable();
    assert_eq!(offsets, (0..20).collect::<Vec<u64>>());
}

#[tokio::test]
async fn test_same_key_lands_in_same_partition() {
    let log = get_test_log(4).await;

    let first = log.append(TOPIC, "order-42", json!(1)).await.unwrap();
    let second = log.append(TOPIC, "order-42", json!(2)).await.unwrap();

    assert_eq!(first.partition, second.partition);
    assert_eq!(second.offset, first.offset + 1);
}

#[tokio::test]
async fn test_committed_offsets_never_move_backwards() {
    let log = get_test_log(1).await;

    assert_eq!(log.committed_offset("inventory", TOPIC, 0).await.unwrap(), 0);

    log.commit("inventory", TOPIC, 0, 7).await.unwrap();
    log.commit("inventory", TOPIC, 0, 4).await.unwrap();

    assert_eq!(log.committed_offset("inventory", TOPIC, 0).await.unwrap(), 7);
    assert_eq!(log.committed_offset("audit", TOPIC, 0).await.unwrap(), 0);
}

#[tokio::test]
async fn test_lag() {
    let log = get_test_log(1).await;
    for i in 0..5 {
        log.append(TOPIC, "k", json!(i)).await.unwrap();
    }
    log.commit("inventory", TOPIC, 0, 2).await.unwrap();

    assert_eq!(log.lag("inventory", TOPIC, 0).await.unwrap(), 3);
}

#[tokio::test]
async fn test_dead_letters_round_trip() {
    let log = get_test_log(1).await;
    log.append(TOPIC, "k", json!("not an event")).await.unwrap();
    let record = log.read(TOPIC, 0, 0, 1).await.unwrap().remove(0);

    log.dead_letter("inventory", &record, "malformed payload")
        .await
        .unwrap();

    let parked = log.dead_letters("inventory").await.unwrap();
    assert_eq!(parked.len(), 1);
    assert_eq!(parked[0].group, "inventory");
    assert_eq!(parked[0].reason, "malformed payload");
    assert_eq!(parked[0].record.offset, record.offset);
    assert_eq!(parked[0].record.payload, record.payload);
}

#[tokio::test]
async fn test_unknown_partition() {
    let log = get_test_log(2).await;
    let result = log.read(TOPIC, 5, 0, 1).await;
    assert!(matches!(
        result,
        Err(EventLogError::UnknownPartition { partition: 5, .. })
    ));
}

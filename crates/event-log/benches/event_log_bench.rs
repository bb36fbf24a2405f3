use criterion::{Criterion, criterion_group, criterion_main};
use event_log::{EventLog, InMemoryEventLog, partition_for};

const TOPIC: &str = "order-events";

fn payload(i: u64) -> serde_json::Value {
    serde_json::json!({
        "eventType": "ORDER_CREATED",
        "orderId": format!("00000000-0000-0000-0000-{i:012}"),
        "items": [{ "productId": 1, "quantity": 2 }]
    })
}

fn bench_append(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let log = InMemoryEventLog::new(4);
    let mut i = 0u64;

    c.bench_function("event_log/append", |b| {
        b.iter(|| {
            i += 1;
            rt.block_on(async {
                log.append(TOPIC, &i.to_string(), payload(i)).await.unwrap();
            });
        });
    });
}

fn bench_read_batch(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let log = InMemoryEventLog::new(1);
    rt.block_on(async {
        for i in 0..1_000 {
            log.append(TOPIC, "key", payload(i)).await.unwrap();
        }
    });

    c.bench_function("event_log/read_100", |b| {
        b.iter(|| {
            rt.block_on(async {
                let records = log.read(TOPIC, 0, 500, 100).await.unwrap();
                assert_eq!(records.len(), 100);
            });
        });
    });
}

fn bench_partition_for(c: &mut Criterion) {
    c.bench_function("event_log/partition_for", |b| {
        b.iter(|| partition_for("3f2b9d0e-8a51-4c1e-9f0a-5b7c2d1e4a60", 16));
    });
}

criterion_group!(benches, bench_append, bench_read_batch, bench_partition_for);
criterion_main!(benches);

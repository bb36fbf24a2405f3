use criterion::{Criterion, criterion_group, criterion_main};
use domain::{
    InMemoryOrderRepository, LifecycleEvent, Money, Order, OrderItem, OrderRepository, ProductId,
    UserId,
};

fn items(count: i64) -> Vec<OrderItem> {
    (1..=count)
        .map(|i| OrderItem::new(ProductId::new(i), "Benchmark Widget", 2, Money::from_cents(999)))
        .collect()
}

fn bench_price_order(c: &mut Criterion) {
    c.bench_function("domain/new_pending_10_items", |b| {
        b.iter(|| Order::new_pending(UserId::new(1), "1 Bench Rd", items(10)).unwrap());
    });
}

fn bench_event_roundtrip(c: &mut Criterion) {
    let order = Order::new_pending(UserId::new(1), "1 Bench Rd", items(10)).unwrap();

    c.bench_function("domain/created_event_to_json_and_back", |b| {
        b.iter(|| {
            let json = serde_json::to_value(LifecycleEvent::order_created(&order)).unwrap();
            let event: LifecycleEvent = serde_json::from_value(json).unwrap();
            event.validate().unwrap();
        });
    });
}

fn bench_repository_insert(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let repo = InMemoryOrderRepository::new();

    c.bench_function("domain/repository_insert", |b| {
        b.iter(|| {
            rt.block_on(async {
                let order = Order::new_pending(UserId::new(1), "1 Bench Rd", items(3)).unwrap();
                repo.insert(&order).await.unwrap();
            });
        });
    });
}

criterion_group!(
    benches,
    bench_price_order,
    bench_event_roundtrip,
    bench_repository_insert
);
criterion_main!(benches);

use common::{ProductId, UserId};
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{LifecycleEvent, Money, Order, OrderItem};
use inventory::{InMemoryInventoryStore, InventoryReconciler, Product};
use resilience::RetryPolicy;

const PRODUCTS: i64 = 20;

fn events(n: usize) -> Vec<LifecycleEvent> {
    (0..n)
        .map(|i| {
            let items = (0..3)
                .map(|j| {
                    let id = (i as i64 * 3 + j) % PRODUCTS + 1;
                    OrderItem::new(ProductId::new(id), "Widget", 1, Money::from_cents(1000))
                })
                .collect();
            let order = Order::new_pending(UserId::new(1), "1 Main St", items).unwrap();
            LifecycleEvent::order_created(&order)
        })
        .collect()
}

fn store() -> InMemoryInventoryStore {
    InMemoryInventoryStore::with_products(
        (1..=PRODUCTS).map(|id| Product::new(id, "Widget", Money::from_cents(1000), 1_000_000)),
    )
}

fn bench_reconcile_100_events(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let events = events(100);

    c.bench_function("reconciler/reconcile_100_events", |b| {
        b.iter(|| {
            rt.block_on(async {
                let reconciler = InventoryReconciler::new(store(), RetryPolicy::no_retry());
                for event in &events {
                    reconciler.reconcile(event).await.unwrap();
                }
            })
        })
    });
}

fn bench_redelivery(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let events = events(100);
    let reconciler = InventoryReconciler::new(store(), RetryPolicy::no_retry());
    rt.block_on(async {
        for event in &events {
            reconciler.reconcile(event).await.unwrap();
        }
    });

    c.bench_function("reconciler/redeliver_100_events", |b| {
        b.iter(|| {
            rt.block_on(async {
                for event in &events {
                    reconciler.reconcile(event).await.unwrap();
                }
            })
        })
    });
}

criterion_group!(benches, bench_reconcile_100_events, bench_redelivery);
criterion_main!(benches);

use chrono::{TimeDelta, Utc};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use larder::model::timestamp::timestamp_value;
use larder::store::collections;
use larder::{
  LifecycleState, MemoryKv, MemoryStore, OrderTracker, PendingLedger, Settings, SystemClock, TrackerDeps, User,
};
use serde_json::json;
use std::sync::Arc;
use tokio::runtime::Runtime;

const STATUSES: &[&str] = &[
  "pending",
  "Awaiting Confirmation",
  "ACCEPTED",
  "in-progress",
  "done",
  "Cancelled_By_Shop",
  "shipped",
];

fn bench_classify(c: &mut Criterion) {
  let mut group = c.benchmark_group("classify");
  group.throughput(Throughput::Elements(STATUSES.len() as u64));
  group.bench_function("mixed_vocabulary", |b| {
    b.iter(|| {
      STATUSES
        .iter()
        .filter_map(|raw| LifecycleState::classify(std::hint::black_box(raw)))
        .count()
    })
  });
  group.finish();
}

fn seeded_store(orders: usize) -> MemoryStore {
  let store = MemoryStore::new();
  store.seed(collections::SHOPS, "shop-1", json!({ "name": "Bench Shop", "menu": [] }));
  let now = Utc::now();
  for i in 0..orders {
    let created = now - TimeDelta::seconds(i as i64);
    // A third of the orders are still awaiting, a third were accepted a while
    // ago, the rest are history.
    let status = match i % 3 {
      0 => "pending",
      1 => "accepted",
      _ => "completed",
    };
    store.seed(
      collections::ORDERS,
      &format!("order-{i:05}"),
      json!({
        "userId": "bench-user",
        "shopId": "shop-1",
        "items": { "item": 1 },
        "total": 1000,
        "status": status,
        "createdAt": timestamp_value(created),
        "timerStartedAt": timestamp_value(now),
      }),
    );
  }
  store
}

fn bench_reconcile_pass(c: &mut Criterion) {
  let rt = Runtime::new().unwrap();
  let mut group = c.benchmark_group("reconcile_pass");

  for orders in [10usize, 100, 1000] {
    let store = Arc::new(seeded_store(orders));
    let kv = Arc::new(MemoryKv::new());
    let deps = TrackerDeps {
      store: store.clone(),
      ledger: Arc::new(PendingLedger::new(kv, "pendingOrders")),
      clock: Arc::new(SystemClock),
      settings: Settings {
        countdown_seconds: 3600,
        ..Settings::default()
      },
    };
    let tracker = rt.block_on(OrderTracker::start(User::new("bench-user"), deps)).unwrap();
    let snapshot = store.documents(collections::ORDERS);

    group.throughput(Throughput::Elements(orders as u64));
    group.bench_with_input(BenchmarkId::from_parameter(orders), &orders, |b, _| {
      b.to_async(&rt).iter(|| {
        let snapshot = snapshot.clone();
        let tracker = &tracker;
        async move { tracker.reconcile(snapshot).await.unwrap() }
      })
    });
    rt.block_on(tracker.shutdown());
  }
  group.finish();
}

criterion_group!(benches, bench_classify, bench_reconcile_pass);
criterion_main!(benches);

// tests/common/mod.rs
#![allow(dead_code)] // Not every test binary uses every fixture

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use larder::model::timestamp::timestamp_value;
use larder::store::{collections, WriteRecord};
use larder::{
  Clock, DocumentSnapshot, KeyValueStore, LedgerEntry, MemoryKv, MemoryStore, PendingLedger, RemoteStore, Settings,
  TokioClock, TrackerDeps,
};
use once_cell::sync::Lazy;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::Level;

pub const LEDGER_KEY: &str = "pendingOrders";
pub const USER: &str = "user-1";
pub const SHOP: &str = "shop-1";

pub fn t0() -> DateTime<Utc> {
  Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

/// In-memory collaborators on tokio's clock. Build it inside the test runtime
/// so the clock follows paused time.
pub struct Harness {
  pub store: Arc<MemoryStore>,
  pub kv: Arc<MemoryKv>,
  pub ledger: Arc<PendingLedger>,
  pub clock: Arc<TokioClock>,
  pub settings: Settings,
}

impl Harness {
  pub fn new() -> Self {
    Self::with_store(MemoryStore::new())
  }

  pub fn with_store(store: MemoryStore) -> Self {
    let kv = Arc::new(MemoryKv::new());
    Self {
      store: Arc::new(store),
      ledger: Arc::new(PendingLedger::new(kv.clone(), LEDGER_KEY)),
      kv,
      clock: Arc::new(TokioClock::starting_at(t0())),
      settings: Settings::default(),
    }
  }

  /// Same remote store and device storage, fresh in-process state: what an
  /// app relaunch looks like.
  pub fn relaunch(&self) -> Self {
    Self {
      store: self.store.clone(),
      kv: self.kv.clone(),
      ledger: Arc::new(PendingLedger::new(self.kv.clone(), LEDGER_KEY)),
      clock: self.clock.clone(),
      settings: self.settings.clone(),
    }
  }

  pub fn deps(&self) -> TrackerDeps {
    TrackerDeps {
      store: self.store.clone(),
      ledger: self.ledger.clone(),
      clock: self.clock.clone(),
      settings: self.settings.clone(),
    }
  }

  pub fn now(&self) -> DateTime<Utc> {
    self.clock.now()
  }

  pub fn ago(&self, seconds: i64) -> DateTime<Utc> {
    self.now() - TimeDelta::seconds(seconds)
  }

  pub fn seed_user(&self, uid: &str, wallet: i64) {
    self.store.seed(collections::USERS, uid, json!({ "wallet": wallet, "email": format!("{uid}@example.com") }));
  }

  pub fn seed_shop(&self, shop_id: &str) {
    self.store.seed(
      collections::SHOPS,
      shop_id,
      json!({
        "name": "Noodle Bar",
        "logo": "https://cdn.example.com/noodle.png",
        "menu": [
          { "id": "pad-thai", "name": "Pad Thai", "price": 6000, "description": "Rice noodles" },
          { "id": "iced-tea", "name": "Iced Tea", "price": 2500 },
          { "id": "mango", "name": "Mango Sticky Rice", "price": 8000 }
        ]
      }),
    );
  }

  pub fn seed_order(&self, order_id: &str, status: &str, created_at: DateTime<Utc>) {
    self.store.seed(collections::ORDERS, order_id, order_doc(USER, status, created_at));
  }

  /// An external actor (the shop dashboard) changes an order.
  pub async fn shop_updates(&self, order_id: &str, fields: Value) {
    let Value::Object(fields) = fields else {
      panic!("fields must be an object");
    };
    self.store.set(collections::ORDERS, order_id, fields, true).await.unwrap();
  }

  pub async fn accept(&self, order_id: &str, at: DateTime<Utc>) {
    self
      .shop_updates(order_id, json!({ "status": "accepted", "timerStartedAt": timestamp_value(at) }))
      .await;
  }

  pub fn order_status(&self, order_id: &str) -> Option<String> {
    self
      .store
      .document(collections::ORDERS, order_id)
      .and_then(|doc| doc.get("status").and_then(Value::as_str).map(str::to_string))
  }

  /// Writes that set an order's status to completed.
  pub fn completion_writes(&self, order_id: &str) -> Vec<WriteRecord> {
    self
      .store
      .writes_to(collections::ORDERS, order_id)
      .into_iter()
      .filter(|w| w.fields.get("status") == Some(&json!("completed")))
      .collect()
  }

  pub async fn ledger_entries(&self) -> Vec<LedgerEntry> {
    self.ledger.load().await
  }

  pub async fn ledger_ids(&self) -> Vec<String> {
    self.ledger.load().await.into_iter().map(|e| e.order_id).collect()
  }

  pub async fn snapshot(&self) -> Vec<DocumentSnapshot> {
    self.store.query(collections::ORDERS, "userId", &json!(USER)).await.unwrap()
  }

  pub async fn write_ledger_raw(&self, raw: &str) {
    self.kv.set_string(LEDGER_KEY, raw).await.unwrap();
  }
}

pub fn order_doc(user_id: &str, status: &str, created_at: DateTime<Utc>) -> Value {
  json!({
    "userId": user_id,
    "shopId": SHOP,
    "items": { "pad-thai": 1 },
    "total": 6000,
    "status": status,
    "createdAt": timestamp_value(created_at),
  })
}

/// Lets spawned tasks that are ready run to their next suspension point.
pub async fn settle() {
  for _ in 0..20 {
    tokio::task::yield_now().await;
  }
}

// --- Helper for Tracing Setup (call once per test run if needed) ---
static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer() // Important for tests to capture output
    .try_init()
    .ok(); // Allow multiple initializations in tests (ok if fails)
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}

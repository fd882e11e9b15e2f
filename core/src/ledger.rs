// larder/src/ledger.rs

//! Durable local mirror of in-flight orders.
//!
//! The whole list lives under one key and is always replaced wholesale. Every
//! read-modify-write goes through [`PendingLedger::update`], which serialises
//! writers inside this process.

use crate::error::{LarderError, LarderResult};
use crate::model::Order;
use crate::store::KeyValueStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
  pub order_id: String,
  #[serde(default, with = "lenient_timestamp")]
  pub created_at: Option<DateTime<Utc>>,
  /// Countdown anchor. Fixed the first time the order is seen accepted and
  /// never overwritten while the order stays accepted.
  #[serde(default, with = "lenient_timestamp")]
  pub accepted_at: Option<DateTime<Utc>>,
  #[serde(default)]
  pub shop_id: Option<String>,
  #[serde(default)]
  pub order_number: Option<String>,
  #[serde(default)]
  pub shop_order_number: Option<u64>,
}

impl LedgerEntry {
  pub fn from_order(order: &Order) -> Self {
    Self {
      order_id: order.id.clone(),
      created_at: order.created_at,
      accepted_at: None,
      shop_id: order.shop_id.clone(),
      order_number: order.display_number(),
      shop_order_number: order.shop_order_number,
    }
  }

  /// Copies descriptive fields from a fresher remote copy. The anchor is left
  /// alone.
  pub fn refresh_from(&mut self, order: &Order) {
    if order.created_at.is_some() {
      self.created_at = order.created_at;
    }
    if order.shop_id.is_some() {
      self.shop_id = order.shop_id.clone();
    }
    if let Some(number) = order.display_number() {
      self.order_number = Some(number);
    }
    if order.shop_order_number.is_some() {
      self.shop_order_number = order.shop_order_number;
    }
  }
}

mod lenient_timestamp {
  use crate::model::timestamp::{parse_timestamp, timestamp_value};
  use chrono::{DateTime, Utc};
  use serde::{Deserialize, Deserializer, Serialize, Serializer};
  use serde_json::Value;

  pub fn serialize<S: Serializer>(at: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error> {
    match at {
      Some(at) => timestamp_value(*at).serialize(serializer),
      None => serializer.serialize_none(),
    }
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error> {
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(parse_timestamp))
  }
}

pub struct PendingLedger {
  kv: Arc<dyn KeyValueStore>,
  key: String,
  write_lock: Mutex<()>,
}

impl PendingLedger {
  pub fn new(kv: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
    Self {
      kv,
      key: key.into(),
      write_lock: Mutex::new(()),
    }
  }

  pub fn key(&self) -> &str {
    &self.key
  }

  /// Strict read: a missing value is an empty list, an undecodable one is
  /// [`LarderError::CorruptLocalLedger`].
  pub async fn try_load(&self) -> LarderResult<Vec<LedgerEntry>> {
    let Some(raw) = self.kv.get_string(&self.key).await? else {
      return Ok(Vec::new());
    };
    if raw.trim().is_empty() {
      return Ok(Vec::new());
    }
    serde_json::from_str(&raw).map_err(|source| LarderError::CorruptLocalLedger {
      key: self.key.clone(),
      source,
    })
  }

  /// Tolerant read used by the reconciler: any failure degrades to an empty
  /// ledger after a warning.
  pub async fn load(&self) -> Vec<LedgerEntry> {
    match self.try_load().await {
      Ok(entries) => entries,
      Err(e) => {
        warn!(key = %self.key, error = %e, "Pending-order ledger unreadable, treating as empty.");
        Vec::new()
      }
    }
  }

  /// Replaces the stored list.
  pub async fn save(&self, entries: &[LedgerEntry]) -> LarderResult<()> {
    let _guard = self.write_lock.lock().await;
    self.write(entries).await
  }

  async fn write(&self, entries: &[LedgerEntry]) -> LarderResult<()> {
    let encoded = serde_json::to_string(entries).map_err(|e| LarderError::Internal(format!("ledger encode: {e}")))?;
    self.kv.set_string(&self.key, &encoded).await?;
    debug!(key = %self.key, entries = entries.len(), "Pending-order ledger saved.");
    Ok(())
  }

  /// Read-modify-write. The list is only written back when `f` changed it.
  pub async fn update<R>(&self, f: impl FnOnce(&mut Vec<LedgerEntry>) -> R) -> LarderResult<R> {
    let _guard = self.write_lock.lock().await;
    let mut entries = self.load().await;
    let before = entries.clone();
    let result = f(&mut entries);
    if entries != before {
      self.write(&entries).await?;
    }
    Ok(result)
  }

  /// Inserts `entry` or replaces the entry with the same order id, keeping any
  /// anchor already recorded.
  pub async fn upsert(&self, entry: LedgerEntry) -> LarderResult<()> {
    self
      .update(|entries| match entries.iter_mut().find(|e| e.order_id == entry.order_id) {
        Some(existing) => {
          let anchor = existing.accepted_at.or(entry.accepted_at);
          *existing = entry;
          existing.accepted_at = anchor;
        }
        None => entries.push(entry),
      })
      .await
  }

  /// Returns whether an entry was removed.
  pub async fn remove(&self, order_id: &str) -> LarderResult<bool> {
    self
      .update(|entries| {
        let before = entries.len();
        entries.retain(|e| e.order_id != order_id);
        entries.len() != before
      })
      .await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::store::MemoryKv;

  fn entry(id: &str) -> LedgerEntry {
    LedgerEntry {
      order_id: id.to_string(),
      created_at: None,
      accepted_at: None,
      shop_id: Some("s1".to_string()),
      order_number: None,
      shop_order_number: None,
    }
  }

  #[tokio::test]
  async fn corrupt_value_reads_as_empty() {
    let kv = Arc::new(MemoryKv::new());
    kv.set_string("pendingOrders", "{not json").await.unwrap();
    let ledger = PendingLedger::new(kv, "pendingOrders");
    assert!(matches!(ledger.try_load().await, Err(LarderError::CorruptLocalLedger { .. })));
    assert!(ledger.load().await.is_empty());
  }

  #[tokio::test]
  async fn upsert_keeps_recorded_anchor() {
    let ledger = PendingLedger::new(Arc::new(MemoryKv::new()), "k");
    let anchored = LedgerEntry {
      accepted_at: DateTime::from_timestamp(1_700_000_000, 0),
      ..entry("o1")
    };
    ledger.upsert(anchored.clone()).await.unwrap();
    ledger.upsert(entry("o1")).await.unwrap();
    let entries = ledger.load().await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].accepted_at, anchored.accepted_at);
  }

  #[tokio::test]
  async fn accepts_millisecond_timestamps() {
    let kv = Arc::new(MemoryKv::new());
    kv.set_string("k", r#"[{"orderId":"o1","createdAt":1700000000000,"acceptedAt":null,"shopId":"s1"}]"#)
      .await
      .unwrap();
    let entries = PendingLedger::new(kv, "k").load().await;
    assert_eq!(entries[0].created_at, DateTime::from_timestamp(1_700_000_000, 0));
  }
}

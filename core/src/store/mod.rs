// larder/src/store/mod.rs

//! Collaborator seams: the hosted document store and the device-local
//! key-value store. Both are traits so the core never depends on a concrete
//! backend; in-process implementations live next to them.

pub mod kv;
pub mod memory;

pub use kv::{FileKv, KeyValueStore, MemoryKv};
pub use memory::{MemoryStore, WriteRecord};

use crate::core::context::BoxFuture;
use crate::error::LarderResult;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::mpsc;

/// A document body: field name to JSON value.
pub type Document = Map<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSnapshot {
  pub id: String,
  pub data: Document,
}

pub mod collections {
  pub const ORDERS: &str = "orders";
  pub const USERS: &str = "users";
  /// Shop profiles and menus.
  pub const SHOPS: &str = "info";
  pub const SHOP_ORDER_COUNTERS: &str = "shopOrderCounters";
  pub const TRANSACTIONS: &str = "transactions";
}

/// Read/write handles scoped to one atomic transaction.
///
/// Writes are buffered and only become visible if the whole transaction
/// commits. Reads should happen before writes.
#[async_trait]
pub trait TransactionOps: Send + Sync {
  async fn get(&self, collection: &str, id: &str) -> LarderResult<Option<Document>>;
  fn set(&self, collection: &str, id: &str, fields: Document, merge: bool);
}

/// Cloneable handle passed to a transaction body.
#[derive(Clone)]
pub struct Transaction {
  ops: Arc<dyn TransactionOps>,
}

impl Transaction {
  pub fn new(ops: Arc<dyn TransactionOps>) -> Self {
    Self { ops }
  }

  pub async fn get(&self, collection: &str, id: &str) -> LarderResult<Option<Document>> {
    self.ops.get(collection, id).await
  }

  pub fn set(&self, collection: &str, id: &str, fields: Document, merge: bool) {
    self.ops.set(collection, id, fields, merge)
  }
}

/// The body of an atomic transaction. It may run more than once when the
/// store detects a conflicting concurrent write, so it must not have side
/// effects outside the transaction handle.
pub type TransactionBody = Arc<dyn Fn(Transaction) -> BoxFuture<'static, LarderResult<Value>> + Send + Sync>;

/// A live query. Every item is the full set of matching documents.
pub struct Subscription {
  receiver: mpsc::UnboundedReceiver<Vec<DocumentSnapshot>>,
}

impl Subscription {
  pub fn new(receiver: mpsc::UnboundedReceiver<Vec<DocumentSnapshot>>) -> Self {
    Self { receiver }
  }

  /// Waits for the next snapshot. `None` once the store closed the query.
  pub async fn next(&mut self) -> Option<Vec<DocumentSnapshot>> {
    self.receiver.recv().await
  }

  /// Skips to the most recent snapshot already delivered, if any. Snapshots
  /// are full replacements so older ones carry no extra information.
  pub fn latest_ready(&mut self) -> Option<Vec<DocumentSnapshot>> {
    let mut latest = None;
    while let Ok(snapshot) = self.receiver.try_recv() {
      latest = Some(snapshot);
    }
    latest
  }
}

/// The hosted document database.
#[async_trait]
pub trait RemoteStore: Send + Sync {
  /// A fresh id for a document about to be created in `collection`.
  fn new_document_id(&self, _collection: &str) -> String {
    uuid::Uuid::new_v4().simple().to_string()
  }

  async fn get(&self, collection: &str, id: &str) -> LarderResult<Option<Document>>;

  /// Writes `fields`. With `merge` the fields are folded into an existing
  /// document; without it the document is replaced.
  async fn set(&self, collection: &str, id: &str, fields: Document, merge: bool) -> LarderResult<()>;

  /// All documents of `collection` whose `field` equals `value`.
  async fn query(&self, collection: &str, field: &str, value: &Value) -> LarderResult<Vec<DocumentSnapshot>>;

  /// Live version of [`RemoteStore::query`]. The first snapshot is delivered
  /// right away, then one per change to the collection.
  async fn subscribe(&self, collection: &str, field: &str, value: &Value) -> LarderResult<Subscription>;

  /// Runs `body` as one all-or-nothing unit and returns its output.
  async fn run_transaction(&self, body: TransactionBody) -> LarderResult<Value>;
}

/// Wraps an async closure into a [`TransactionBody`].
pub fn transaction_body<F, Fut>(body: F) -> TransactionBody
where
  F: Fn(Transaction) -> Fut + Send + Sync + 'static,
  Fut: std::future::Future<Output = LarderResult<Value>> + Send + 'static,
{
  Arc::new(move |tx| Box::pin(body(tx)))
}

// larder/src/store/memory.rs

use super::{Document, DocumentSnapshot, RemoteStore, Subscription, Transaction, TransactionBody, TransactionOps};
use crate::error::{LarderError, LarderResult};
use anyhow::anyhow;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// One committed write, kept for inspection.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteRecord {
  pub collection: String,
  pub id: String,
  pub fields: Document,
  pub merge: bool,
}

#[derive(Debug, Clone)]
struct VersionedDoc {
  version: u64,
  data: Document,
}

struct Subscriber {
  collection: String,
  field: String,
  value: Value,
  sender: mpsc::UnboundedSender<Vec<DocumentSnapshot>>,
}

#[derive(Default)]
struct StoreState {
  collections: HashMap<String, BTreeMap<String, VersionedDoc>>,
  subscribers: Vec<Subscriber>,
  writes: Vec<WriteRecord>,
  offline: bool,
}

impl StoreState {
  fn doc(&self, collection: &str, id: &str) -> Option<&VersionedDoc> {
    self.collections.get(collection).and_then(|docs| docs.get(id))
  }

  fn version_of(&self, collection: &str, id: &str) -> u64 {
    self.doc(collection, id).map_or(0, |d| d.version)
  }

  fn apply(&mut self, collection: &str, id: &str, fields: Document, merge: bool) {
    let docs = self.collections.entry(collection.to_string()).or_default();
    match docs.get_mut(id) {
      Some(existing) => {
        if merge {
          existing.data.extend(fields);
        } else {
          existing.data = fields;
        }
        existing.version += 1;
      }
      None => {
        docs.insert(id.to_string(), VersionedDoc { version: 1, data: fields });
      }
    }
  }

  fn matching(&self, collection: &str, field: &str, value: &Value) -> Vec<DocumentSnapshot> {
    self
      .collections
      .get(collection)
      .map(|docs| {
        docs
          .iter()
          .filter(|(_, doc)| doc.data.get(field) == Some(value))
          .map(|(id, doc)| DocumentSnapshot {
            id: id.clone(),
            data: doc.data.clone(),
          })
          .collect()
      })
      .unwrap_or_default()
  }

  fn notify(&mut self, collection: &str) {
    let mut pending = Vec::new();
    for (index, sub) in self.subscribers.iter().enumerate() {
      if sub.collection == collection {
        pending.push((index, self.matching(&sub.collection, &sub.field, &sub.value)));
      }
    }
    let mut closed = Vec::new();
    for (index, snapshot) in pending {
      if self.subscribers[index].sender.send(snapshot).is_err() {
        closed.push(index);
      }
    }
    for index in closed.into_iter().rev() {
      trace!(collection, "Dropping closed subscriber.");
      self.subscribers.swap_remove(index);
    }
  }

  fn ensure_online(&self, operation: &str) -> LarderResult<()> {
    if self.offline {
      Err(LarderError::remote(operation, anyhow!("store is offline")))
    } else {
      Ok(())
    }
  }
}

/// In-process document store with optimistic transactions and live queries.
///
/// Transactions record the version of every document they read. On commit
/// any read that moved underneath them aborts the attempt and the body is run
/// again, up to `max_attempts` times.
#[derive(Clone)]
pub struct MemoryStore {
  state: Arc<Mutex<StoreState>>,
  max_attempts: u32,
}

impl Default for MemoryStore {
  fn default() -> Self {
    Self::new()
  }
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::with_max_attempts(DEFAULT_MAX_ATTEMPTS)
  }

  pub fn with_max_attempts(max_attempts: u32) -> Self {
    Self {
      state: Arc::new(Mutex::new(StoreState::default())),
      max_attempts: max_attempts.max(1),
    }
  }

  /// Inserts or replaces a document without recording it in the write log.
  /// Live queries are still notified.
  pub fn seed(&self, collection: &str, id: &str, data: Value) {
    let fields = match data {
      Value::Object(map) => map,
      other => {
        warn!(collection, id, value = %other, "Seeding non-object document as empty.");
        Document::new()
      }
    };
    let mut state = self.state.lock();
    state.apply(collection, id, fields, false);
    state.notify(collection);
  }

  /// Simulates losing connectivity. While offline every call fails with
  /// [`LarderError::RemoteUnavailable`].
  pub fn set_offline(&self, offline: bool) {
    self.state.lock().offline = offline;
  }

  pub fn document(&self, collection: &str, id: &str) -> Option<Document> {
    self.state.lock().doc(collection, id).map(|d| d.data.clone())
  }

  pub fn documents(&self, collection: &str) -> Vec<DocumentSnapshot> {
    let state = self.state.lock();
    state
      .collections
      .get(collection)
      .map(|docs| {
        docs
          .iter()
          .map(|(id, doc)| DocumentSnapshot {
            id: id.clone(),
            data: doc.data.clone(),
          })
          .collect()
      })
      .unwrap_or_default()
  }

  pub fn writes(&self) -> Vec<WriteRecord> {
    self.state.lock().writes.clone()
  }

  pub fn writes_to(&self, collection: &str, id: &str) -> Vec<WriteRecord> {
    self
      .state
      .lock()
      .writes
      .iter()
      .filter(|w| w.collection == collection && w.id == id)
      .cloned()
      .collect()
  }

  pub fn subscriber_count(&self) -> usize {
    let mut state = self.state.lock();
    state.subscribers.retain(|s| !s.sender.is_closed());
    state.subscribers.len()
  }

  fn commit(&self, tx: &MemoryTransaction) -> LarderResult<bool> {
    let mut state = self.state.lock();
    state.ensure_online("transaction commit")?;
    let reads = tx.reads.lock();
    for ((collection, id), seen) in reads.iter() {
      if state.version_of(collection, id) != *seen {
        debug!(collection = %collection, id = %id, "Transaction read went stale.");
        return Ok(false);
      }
    }
    let writes = std::mem::take(&mut *tx.writes.lock());
    let mut touched: Vec<String> = Vec::new();
    for write in writes {
      state.apply(&write.collection, &write.id, write.fields.clone(), write.merge);
      if !touched.contains(&write.collection) {
        touched.push(write.collection.clone());
      }
      state.writes.push(write);
    }
    for collection in touched {
      state.notify(&collection);
    }
    Ok(true)
  }
}

struct MemoryTransaction {
  state: Arc<Mutex<StoreState>>,
  reads: Mutex<HashMap<(String, String), u64>>,
  writes: Mutex<Vec<WriteRecord>>,
}

#[async_trait]
impl TransactionOps for MemoryTransaction {
  async fn get(&self, collection: &str, id: &str) -> LarderResult<Option<Document>> {
    let state = self.state.lock();
    state.ensure_online("transaction read")?;
    let doc = state.doc(collection, id);
    self
      .reads
      .lock()
      .entry((collection.to_string(), id.to_string()))
      .or_insert_with(|| doc.map_or(0, |d| d.version));
    Ok(doc.map(|d| d.data.clone()))
  }

  fn set(&self, collection: &str, id: &str, fields: Document, merge: bool) {
    self.writes.lock().push(WriteRecord {
      collection: collection.to_string(),
      id: id.to_string(),
      fields,
      merge,
    });
  }
}

#[async_trait]
impl RemoteStore for MemoryStore {
  async fn get(&self, collection: &str, id: &str) -> LarderResult<Option<Document>> {
    let state = self.state.lock();
    state.ensure_online("get")?;
    Ok(state.doc(collection, id).map(|d| d.data.clone()))
  }

  async fn set(&self, collection: &str, id: &str, fields: Document, merge: bool) -> LarderResult<()> {
    let mut state = self.state.lock();
    state.ensure_online("set")?;
    state.apply(collection, id, fields.clone(), merge);
    state.writes.push(WriteRecord {
      collection: collection.to_string(),
      id: id.to_string(),
      fields,
      merge,
    });
    state.notify(collection);
    Ok(())
  }

  async fn query(&self, collection: &str, field: &str, value: &Value) -> LarderResult<Vec<DocumentSnapshot>> {
    let state = self.state.lock();
    state.ensure_online("query")?;
    Ok(state.matching(collection, field, value))
  }

  async fn subscribe(&self, collection: &str, field: &str, value: &Value) -> LarderResult<Subscription> {
    let mut state = self.state.lock();
    state.ensure_online("subscribe")?;
    let (sender, receiver) = mpsc::unbounded_channel();
    let initial = state.matching(collection, field, value);
    // The receiver is alive, so the initial send cannot fail.
    let _ = sender.send(initial);
    state.subscribers.push(Subscriber {
      collection: collection.to_string(),
      field: field.to_string(),
      value: value.clone(),
      sender,
    });
    debug!(collection, field, "Live query registered.");
    Ok(Subscription::new(receiver))
  }

  async fn run_transaction(&self, body: TransactionBody) -> LarderResult<Value> {
    for attempt in 1..=self.max_attempts {
      let tx = Arc::new(MemoryTransaction {
        state: self.state.clone(),
        reads: Mutex::new(HashMap::new()),
        writes: Mutex::new(Vec::new()),
      });
      let output = body(Transaction::new(tx.clone())).await?;
      // Give concurrently running transactions a chance to commit first so
      // stale reads are actually detected.
      tokio::task::yield_now().await;
      if self.commit(&tx)? {
        trace!(attempt, "Transaction committed.");
        return Ok(output);
      }
      debug!(attempt, max_attempts = self.max_attempts, "Transaction conflict, retrying.");
    }
    Err(LarderError::TransactionConflict {
      attempts: self.max_attempts,
    })
  }
}

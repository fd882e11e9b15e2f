// larder/src/scheduler.rs

//! Single-shot completion timers keyed by order id.

use crate::core::context::BoxFuture;
use chrono::TimeDelta;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Work run once when a timer fires.
pub type TimerAction = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

/// What [`TimerScheduler::arm`] did with the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Armed {
  /// A delayed task was spawned.
  Scheduled,
  /// The delay had already elapsed. The id was queued for
  /// [`TimerScheduler::drain_due`] and the action dropped.
  Due,
}

struct Slot {
  generation: u64,
  handle: JoinHandle<()>,
}

#[derive(Default)]
struct Table {
  slots: HashMap<String, Slot>,
  due: Vec<String>,
  next_generation: u64,
}

/// Id-to-handle table. At most one live timer exists per order id: arming an
/// id first aborts whatever was armed for it. Dropping the scheduler aborts
/// every outstanding timer.
pub struct TimerScheduler {
  table: Arc<Mutex<Table>>,
}

impl Default for TimerScheduler {
  fn default() -> Self {
    Self::new()
  }
}

impl TimerScheduler {
  pub fn new() -> Self {
    Self {
      table: Arc::new(Mutex::new(Table::default())),
    }
  }

  /// Schedules `action` to run once after `delay`.
  ///
  /// A zero or negative delay never runs anything in place; the id is queued
  /// so the caller can finish its current work and pick it up with
  /// [`TimerScheduler::drain_due`].
  pub fn arm(&self, order_id: &str, delay: TimeDelta, action: TimerAction) -> Armed {
    let mut table = self.table.lock();
    if let Some(previous) = table.slots.remove(order_id) {
      previous.handle.abort();
      trace!(order_id, "Replaced armed timer.");
    }

    let Some(wait) = delay.to_std().ok().filter(|d| !d.is_zero()) else {
      if !table.due.iter().any(|id| id == order_id) {
        table.due.push(order_id.to_string());
      }
      debug!(order_id, "Timer already due, deferred to the pass.");
      return Armed::Due;
    };

    table.next_generation += 1;
    let generation = table.next_generation;
    let weak_table: Weak<Mutex<Table>> = Arc::downgrade(&self.table);
    let id = order_id.to_string();
    let handle = tokio::spawn(async move {
      tokio::time::sleep(wait).await;
      // Leave the table before running so a concurrent re-arm cannot abort
      // the action half way through its remote write.
      if let Some(table) = weak_table.upgrade() {
        release(&table, &id, generation);
      }
      action().await;
    });
    table.slots.insert(order_id.to_string(), Slot { generation, handle });
    debug!(order_id, delay_ms = wait.as_millis() as u64, "Timer armed.");
    Armed::Scheduled
  }

  /// Aborts and forgets the timer for `order_id`. Also drops it from the due
  /// queue. No-op when nothing is armed.
  pub fn cancel(&self, order_id: &str) -> bool {
    let mut table = self.table.lock();
    table.due.retain(|id| id != order_id);
    match table.slots.remove(order_id) {
      Some(slot) => {
        slot.handle.abort();
        trace!(order_id, "Timer cancelled.");
        true
      }
      None => false,
    }
  }

  pub fn cancel_all(&self) {
    let mut table = self.table.lock();
    let count = table.slots.len();
    for (_, slot) in table.slots.drain() {
      slot.handle.abort();
    }
    table.due.clear();
    if count > 0 {
      debug!(count, "All timers cancelled.");
    }
  }

  /// Takes the ids whose deadline had already passed when they were armed.
  pub fn drain_due(&self) -> Vec<String> {
    std::mem::take(&mut self.table.lock().due)
  }

  pub fn is_armed(&self, order_id: &str) -> bool {
    self.table.lock().slots.contains_key(order_id)
  }

  pub fn armed_ids(&self) -> Vec<String> {
    self.table.lock().slots.keys().cloned().collect()
  }

  pub fn armed_count(&self) -> usize {
    self.table.lock().slots.len()
  }
}

fn release(table: &Mutex<Table>, order_id: &str, generation: u64) {
  let mut table = table.lock();
  if table.slots.get(order_id).is_some_and(|slot| slot.generation == generation) {
    table.slots.remove(order_id);
  }
}

impl Drop for TimerScheduler {
  fn drop(&mut self) {
    self.cancel_all();
  }
}

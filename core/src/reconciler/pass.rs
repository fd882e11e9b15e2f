// larder/src/reconciler/pass.rs

//! One reconciliation pass over a full order snapshot, as an ordered
//! workflow. Step order carries the pass's ordering guarantees: the ledger is
//! written before timers are armed, and timers are armed before any immediate
//! completion is issued.

use crate::core::{ContextData, StepControl};
use crate::error::LarderResult;
use crate::ledger::{LedgerEntry, PendingLedger};
use crate::model::{LifecycleState, Order, Shop};
use crate::reconciler::completion::{complete_order, CompletionOutcome};
use crate::reconciler::views::{OrderView, OrderViews};
use crate::scheduler::{Armed, TimerAction, TimerScheduler};
use crate::shops::ShopCache;
use crate::store::{DocumentSnapshot, RemoteStore};
use crate::workflow::Workflow;
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, trace, warn};

pub const PASS_STEPS: &[(&str, bool)] = &[
  ("classify", false),
  ("partition", false),
  ("sync_ledger", false),
  ("countdown", false),
  ("arm_timers", false),
  ("complete_due", false),
  ("resolve_shops", true),
  ("build_views", false),
];

/// Builds the timer action that completes one order.
pub(crate) type TimerFactory = Arc<dyn Fn(&str) -> TimerAction + Send + Sync>;

#[derive(Clone)]
pub(crate) struct PassEnv {
  pub store: Arc<dyn RemoteStore>,
  pub ledger: Arc<PendingLedger>,
  pub shops: Arc<ShopCache>,
  pub scheduler: Arc<TimerScheduler>,
  pub countdown: TimeDelta,
  pub timer_factory: TimerFactory,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedOrder {
  pub order: Order,
  pub state: Option<LifecycleState>,
}

impl ClassifiedOrder {
  fn is_active(&self) -> bool {
    self.state.is_some_and(LifecycleState::is_active)
  }
}

/// What one pass did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassReport {
  pub orders: usize,
  pub active: usize,
  pub history: usize,
  /// Ledger entries dropped because their order left the active set.
  pub ledger_removed: Vec<String>,
  /// Orders with a freshly armed timer.
  pub armed: Vec<String>,
  /// Immediate completions issued for orders already past their deadline.
  pub completions: Vec<(String, CompletionOutcome)>,
  /// Immediate completions that failed and stay in the ledger for the next
  /// pass.
  pub failed_completions: Vec<String>,
}

pub(crate) struct PassCtx {
  pub env: PassEnv,
  pub now: DateTime<Utc>,
  pub snapshot: Vec<DocumentSnapshot>,
  pub orders: Vec<ClassifiedOrder>,
  pub active: Vec<ClassifiedOrder>,
  pub history: Vec<ClassifiedOrder>,
  pub ledger: Vec<LedgerEntry>,
  pub remaining: BTreeMap<String, TimeDelta>,
  pub shops: HashMap<String, Arc<Shop>>,
  pub views: OrderViews,
  pub report: PassReport,
}

impl PassCtx {
  pub fn new(env: PassEnv, now: DateTime<Utc>, snapshot: Vec<DocumentSnapshot>) -> Self {
    Self {
      env,
      now,
      snapshot,
      orders: Vec::new(),
      active: Vec::new(),
      history: Vec::new(),
      ledger: Vec::new(),
      remaining: BTreeMap::new(),
      shops: HashMap::new(),
      views: OrderViews::default(),
      report: PassReport::default(),
    }
  }
}

/// Newest first; orders without a creation time sink to the bottom.
fn sort_newest_first(orders: &mut [ClassifiedOrder]) {
  orders.sort_by(|a, b| {
    b.order
      .created_at
      .cmp(&a.order.created_at)
      .then_with(|| a.order.id.cmp(&b.order.id))
  });
}

/// Brings `entries` in line with the active set and returns the ids that were
/// dropped.
pub(crate) fn reconcile_entries(
  entries: &mut Vec<LedgerEntry>,
  active: &[ClassifiedOrder],
  now: DateTime<Utc>,
) -> Vec<String> {
  let active_ids: HashSet<&str> = active.iter().map(|c| c.order.id.as_str()).collect();
  let mut seen = HashSet::new();
  let mut removed = Vec::new();
  entries.retain(|entry| {
    if !active_ids.contains(entry.order_id.as_str()) {
      removed.push(entry.order_id.clone());
      return false;
    }
    seen.insert(entry.order_id.clone())
  });

  for classified in active {
    let order = &classified.order;
    let index = match entries.iter().position(|e| e.order_id == order.id) {
      Some(index) => index,
      None => {
        entries.push(LedgerEntry::from_order(order));
        entries.len() - 1
      }
    };
    let entry = &mut entries[index];
    entry.refresh_from(order);
    if classified.state == Some(LifecycleState::Accepted) {
      if entry.accepted_at.is_none() {
        let anchor = order.timer_anchor().unwrap_or_else(|| {
          warn!(order_id = %order.id, "Accepted order has no timer anchor, starting the countdown now.");
          now
        });
        entry.accepted_at = Some(anchor);
      }
    } else {
      entry.accepted_at = None;
    }
  }
  removed
}

pub(crate) fn pass_workflow() -> LarderResult<Workflow<PassCtx>> {
  let mut workflow = Workflow::new("reconcile_pass", PASS_STEPS);

  workflow.on("classify", |ctx: ContextData<PassCtx>| async move {
    let mut guard = ctx.write();
    let orders: Vec<ClassifiedOrder> = guard
      .snapshot
      .iter()
      .map(|snapshot| {
        let order = Order::from_snapshot(snapshot);
        let state = order.state();
        if state.is_none() {
          trace!(order_id = %order.id, status = %order.status, "Unrecognised status, filed under history.");
        }
        ClassifiedOrder { order, state }
      })
      .collect();
    guard.report.orders = orders.len();
    guard.orders = orders;
    Ok(StepControl::Continue)
  })?;

  workflow.on("partition", |ctx: ContextData<PassCtx>| async move {
    let mut guard = ctx.write();
    let (mut active, mut history): (Vec<_>, Vec<_>) = guard.orders.iter().cloned().partition(|c| c.is_active());
    sort_newest_first(&mut active);
    sort_newest_first(&mut history);
    guard.report.active = active.len();
    guard.report.history = history.len();
    guard.active = active;
    guard.history = history;
    Ok(StepControl::Continue)
  })?;

  workflow.on("sync_ledger", |ctx: ContextData<PassCtx>| async move {
    let (env, active, now) = {
      let guard = ctx.read();
      (guard.env.clone(), guard.active.clone(), guard.now)
    };
    let (removed, entries) = match env
      .ledger
      .update(|entries| {
        let removed = reconcile_entries(entries, &active, now);
        (removed, entries.clone())
      })
      .await
    {
      Ok(result) => result,
      Err(e) => {
        warn!(error = %e, "Ledger write failed, continuing with in-memory copy.");
        let mut entries = env.ledger.load().await;
        let removed = reconcile_entries(&mut entries, &active, now);
        (removed, entries)
      }
    };
    for order_id in &removed {
      env.scheduler.cancel(order_id);
    }
    if !removed.is_empty() {
      debug!(removed = removed.len(), "Ledger entries dropped.");
    }
    let mut guard = ctx.write();
    guard.ledger = entries;
    guard.report.ledger_removed = removed;
    Ok(StepControl::Continue)
  })?;

  workflow.on("countdown", |ctx: ContextData<PassCtx>| async move {
    let mut guard = ctx.write();
    let now = guard.now;
    let countdown = guard.env.countdown;
    let remaining: BTreeMap<String, TimeDelta> = guard
      .active
      .iter()
      .filter(|c| c.state == Some(LifecycleState::Accepted))
      .map(|c| {
        let anchor = guard
          .ledger
          .iter()
          .find(|e| e.order_id == c.order.id)
          .and_then(|e| e.accepted_at)
          .or_else(|| c.order.timer_anchor())
          .unwrap_or(now);
        (c.order.id.clone(), countdown - (now - anchor))
      })
      .collect();
    guard.remaining = remaining;
    Ok(StepControl::Continue)
  })?;

  workflow.on("arm_timers", |ctx: ContextData<PassCtx>| async move {
    let mut guard = ctx.write();
    let scheduler = guard.env.scheduler.clone();
    for armed_id in scheduler.armed_ids() {
      if !guard.remaining.contains_key(&armed_id) {
        scheduler.cancel(&armed_id);
      }
    }
    let mut armed = Vec::new();
    for (order_id, remaining) in &guard.remaining {
      let action = (guard.env.timer_factory)(order_id);
      if scheduler.arm(order_id, *remaining, action) == Armed::Scheduled {
        armed.push(order_id.clone());
      }
    }
    guard.report.armed = armed;
    Ok(StepControl::Continue)
  })?;

  workflow.on("complete_due", |ctx: ContextData<PassCtx>| async move {
    let (env, now) = {
      let guard = ctx.read();
      (guard.env.clone(), guard.now)
    };
    let due = env.scheduler.drain_due();
    let mut completions = Vec::new();
    let mut failed = Vec::new();
    for order_id in due {
      match complete_order(env.store.as_ref(), &order_id, now).await {
        Ok(outcome) => {
          if outcome.clears_ledger() {
            if let Err(e) = env.ledger.remove(&order_id).await {
              warn!(order_id = %order_id, error = %e, "Could not drop ledger entry after completion.");
            }
          }
          completions.push((order_id, outcome));
        }
        Err(e) => {
          warn!(order_id = %order_id, error = %e, "Completion failed, will retry on next pass.");
          failed.push(order_id);
        }
      }
    }

    let mut guard = ctx.write();
    for (order_id, outcome) in &completions {
      guard.remaining.remove(order_id);
      guard.ledger.retain(|e| &e.order_id != order_id);
      if *outcome != CompletionOutcome::Applied {
        continue;
      }
      if let Some(index) = guard.active.iter().position(|c| &c.order.id == order_id) {
        let mut done = guard.active.remove(index);
        done.order.status = LifecycleState::Completed.canonical().to_string();
        done.state = Some(LifecycleState::Completed);
        guard.history.push(done);
      }
    }
    sort_newest_first(&mut guard.history);
    guard.report.completions = completions;
    guard.report.failed_completions = failed;
    Ok(StepControl::Continue)
  })?;

  workflow.skip_if("resolve_shops", |ctx: &ContextData<PassCtx>| ctx.read().orders.is_empty())?;
  workflow.on("resolve_shops", |ctx: ContextData<PassCtx>| async move {
    let (shops, shop_ids) = {
      let guard = ctx.read();
      let mut ids: Vec<String> = guard.orders.iter().filter_map(|c| c.order.shop_id.clone()).collect();
      ids.sort();
      ids.dedup();
      (guard.env.shops.clone(), ids)
    };
    let resolved = shops.resolve_many(shop_ids.iter().map(String::as_str)).await;
    ctx.write().shops = resolved;
    Ok(StepControl::Continue)
  })?;

  workflow.on("build_views", |ctx: ContextData<PassCtx>| async move {
    let mut guard = ctx.write();
    let to_view = |c: &ClassifiedOrder, remaining: &BTreeMap<String, TimeDelta>, shops: &HashMap<String, Arc<Shop>>| {
      OrderView {
        order: c.order.clone(),
        state: c.state,
        remaining: remaining.get(&c.order.id).map(|left| (*left).max(TimeDelta::zero())),
        shop: c.order.shop_id.as_ref().and_then(|id| shops.get(id).cloned()),
        display_number: c.order.display_number(),
      }
    };
    let active = guard.active.iter().map(|c| to_view(c, &guard.remaining, &guard.shops)).collect();
    let history = guard.history.iter().map(|c| to_view(c, &guard.remaining, &guard.shops)).collect();
    guard.report.active = guard.active.len();
    guard.report.history = guard.history.len();
    guard.views = OrderViews::new(active, history);
    Ok(StepControl::Continue)
  })?;

  Ok(workflow)
}

// larder/src/reconciler/tracker.rs

use crate::clock::Clock;
use crate::config::Settings;
use crate::core::{BoxFuture, ContextData};
use crate::error::LarderResult;
use crate::ledger::PendingLedger;
use crate::model::order::fields as order_fields;
use crate::model::User;
use crate::reconciler::completion::complete_order;
use crate::reconciler::pass::{pass_workflow, PassCtx, PassEnv, PassReport, TimerFactory};
use crate::reconciler::views::OrderViews;
use crate::scheduler::{TimerAction, TimerScheduler};
use crate::shops::ShopCache;
use crate::store::{collections, DocumentSnapshot, RemoteStore, Subscription};
use crate::workflow::Workflow;
use serde_json::Value;
use std::sync::{Arc, Weak};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// Collaborators shared by every tracker of one app instance.
#[derive(Clone)]
pub struct TrackerDeps {
  pub store: Arc<dyn RemoteStore>,
  pub ledger: Arc<PendingLedger>,
  pub clock: Arc<dyn Clock>,
  pub settings: Settings,
}

#[derive(Default)]
struct SessionState {
  last_snapshot: Option<Vec<DocumentSnapshot>>,
  last_report: PassReport,
  closed: bool,
}

struct TrackerInner {
  user: User,
  deps: TrackerDeps,
  shops: Arc<ShopCache>,
  scheduler: Arc<TimerScheduler>,
  workflow: Workflow<PassCtx>,
  /// Held for the whole of a pass and of a timer completion, so passes of
  /// one session never interleave.
  session: Mutex<SessionState>,
  views_tx: watch::Sender<OrderViews>,
}

impl TrackerInner {
  fn timer_factory(self: &Arc<Self>) -> TimerFactory {
    let weak: Weak<TrackerInner> = Arc::downgrade(self);
    Arc::new(move |order_id: &str| -> TimerAction {
      let weak = weak.clone();
      let order_id = order_id.to_string();
      Box::new(move || -> BoxFuture<'static, ()> {
        Box::pin(async move {
          if let Some(inner) = weak.upgrade() {
            inner.on_timer(order_id).await;
          }
        })
      })
    })
  }

  async fn reconcile(self: &Arc<Self>, snapshot: Vec<DocumentSnapshot>) -> LarderResult<PassReport> {
    let mut session = self.session.lock().await;
    if session.closed {
      return Ok(PassReport::default());
    }
    session.last_snapshot = Some(snapshot.clone());
    let report = self.run_pass(snapshot).await?;
    session.last_report = report.clone();
    Ok(report)
  }

  #[instrument(name = "reconcile_pass", skip_all, fields(user_id = %self.user.uid, orders = snapshot.len()))]
  async fn run_pass(self: &Arc<Self>, snapshot: Vec<DocumentSnapshot>) -> LarderResult<PassReport> {
    let env = PassEnv {
      store: self.deps.store.clone(),
      ledger: self.deps.ledger.clone(),
      shops: self.shops.clone(),
      scheduler: self.scheduler.clone(),
      countdown: self.deps.settings.countdown(),
      timer_factory: self.timer_factory(),
    };
    let ctx = ContextData::new(PassCtx::new(env, self.deps.clock.now(), snapshot));
    if let Err(e) = self.workflow.run(ctx.clone()).await {
      warn!(error = %e, "Reconciliation pass aborted.");
      return Err(e);
    }

    let (views, report) = {
      let mut guard = ctx.write();
      (std::mem::take(&mut guard.views), std::mem::take(&mut guard.report))
    };
    self.views_tx.send_replace(views);
    debug!(
      active = report.active,
      history = report.history,
      armed = report.armed.len(),
      completed = report.completions.len(),
      "Reconciliation pass finished."
    );
    Ok(report)
  }

  #[instrument(name = "timer_fired", skip_all, fields(order_id = %order_id))]
  async fn on_timer(self: Arc<Self>, order_id: String) {
    let session = self.session.lock().await;
    if session.closed {
      return;
    }
    match complete_order(self.deps.store.as_ref(), &order_id, self.deps.clock.now()).await {
      Ok(outcome) if outcome.clears_ledger() => {
        if let Err(e) = self.deps.ledger.remove(&order_id).await {
          warn!(error = %e, "Could not drop ledger entry after completion.");
        }
        self.scheduler.cancel(&order_id);
      }
      Ok(outcome) => debug!(?outcome, "Timer fired for an order that is not accepted."),
      Err(e) => warn!(error = %e, "Completion failed, will retry on next pass."),
    }
    drop(session);
  }
}

async fn follow_snapshots(tracker: Weak<TrackerInner>, mut subscription: Subscription) {
  while let Some(snapshot) = subscription.next().await {
    let snapshot = subscription.latest_ready().unwrap_or(snapshot);
    let Some(inner) = tracker.upgrade() else {
      break;
    };
    // Failures were already logged; the next snapshot retries.
    let _ = inner.reconcile(snapshot).await;
  }
  debug!("Order subscription ended.");
}

/// Keeps one signed-in user's orders reconciled.
///
/// Starting a tracker subscribes to the user's orders and runs the first pass
/// before returning. Every later snapshot triggers another pass in the
/// background. Dropping or shutting down the tracker unsubscribes and cancels
/// every outstanding timer.
pub struct OrderTracker {
  inner: Arc<TrackerInner>,
  listener: JoinHandle<()>,
}

impl OrderTracker {
  #[instrument(name = "OrderTracker::start", skip_all, fields(user_id = %user.uid))]
  pub async fn start(user: User, deps: TrackerDeps) -> LarderResult<Self> {
    deps.settings.validate()?;
    let workflow = pass_workflow()?;
    let mut subscription = deps
      .store
      .subscribe(collections::ORDERS, order_fields::USER_ID, &Value::String(user.uid.clone()))
      .await?;
    let (views_tx, _) = watch::channel(OrderViews::default());
    let inner = Arc::new(TrackerInner {
      user,
      shops: Arc::new(ShopCache::new(deps.store.clone())),
      deps,
      scheduler: Arc::new(TimerScheduler::new()),
      workflow,
      session: Mutex::new(SessionState::default()),
      views_tx,
    });

    if let Some(first) = subscription.next().await {
      let first = subscription.latest_ready().unwrap_or(first);
      let _ = inner.reconcile(first).await;
    }
    let listener = tokio::spawn(follow_snapshots(Arc::downgrade(&inner), subscription));
    info!("Order tracker started.");
    Ok(Self { inner, listener })
  }

  pub fn user(&self) -> &User {
    &self.inner.user
  }

  /// Follows the derived views. The receiver always holds the latest pass.
  pub fn views(&self) -> watch::Receiver<OrderViews> {
    self.inner.views_tx.subscribe()
  }

  pub fn current_views(&self) -> OrderViews {
    self.inner.views_tx.borrow().clone()
  }

  pub async fn last_report(&self) -> PassReport {
    self.inner.session.lock().await.last_report.clone()
  }

  /// Runs a pass over `snapshot` right away.
  pub async fn reconcile(&self, snapshot: Vec<DocumentSnapshot>) -> LarderResult<PassReport> {
    self.inner.reconcile(snapshot).await
  }

  /// Focus re-entry: re-reads the user's orders and reconciles them. When the
  /// store cannot be reached the last snapshot is reused so expired countdowns
  /// are still acted on.
  #[instrument(name = "OrderTracker::refresh", skip_all, fields(user_id = %self.inner.user.uid))]
  pub async fn refresh(&self) -> LarderResult<PassReport> {
    let uid = Value::String(self.inner.user.uid.clone());
    let snapshot = match self
      .inner
      .deps
      .store
      .query(collections::ORDERS, order_fields::USER_ID, &uid)
      .await
    {
      Ok(snapshot) => snapshot,
      Err(e) => {
        warn!(error = %e, "Order query failed, reusing last snapshot.");
        let last = self.inner.session.lock().await.last_snapshot.clone();
        match last {
          Some(snapshot) => snapshot,
          None => return Ok(PassReport::default()),
        }
      }
    };
    self.inner.reconcile(snapshot).await
  }

  pub fn is_armed(&self, order_id: &str) -> bool {
    self.inner.scheduler.is_armed(order_id)
  }

  pub fn armed_timers(&self) -> Vec<String> {
    let mut ids = self.inner.scheduler.armed_ids();
    ids.sort();
    ids
  }

  pub fn shop_cache(&self) -> &ShopCache {
    &self.inner.shops
  }

  /// Stops listening and cancels every timer of this session. Waits for a
  /// pass or completion already in progress to finish.
  #[instrument(name = "OrderTracker::shutdown", skip_all, fields(user_id = %self.inner.user.uid))]
  pub async fn shutdown(self) {
    self.listener.abort();
    let mut session = self.inner.session.lock().await;
    session.closed = true;
    self.inner.scheduler.cancel_all();
    info!("Order tracker shut down.");
  }
}

impl Drop for OrderTracker {
  fn drop(&mut self) {
    self.listener.abort();
    self.inner.scheduler.cancel_all();
  }
}

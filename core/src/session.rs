// larder/src/session.rs

use crate::error::{LarderError, LarderResult};
use crate::identity::IdentityProvider;
use crate::model::User;
use crate::reconciler::{OrderTracker, OrderViews, PassReport, TrackerDeps};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

/// Runs exactly one [`OrderTracker`] for whoever is signed in.
///
/// A user change shuts the previous tracker down (unsubscribe and cancel all
/// timers) before the next one starts. While signed out no tracker runs.
pub struct SessionManager {
  current: Arc<Mutex<Option<OrderTracker>>>,
  active_user: watch::Receiver<Option<String>>,
  follower: JoinHandle<()>,
}

impl SessionManager {
  pub fn start(identity: Arc<dyn IdentityProvider>, deps: TrackerDeps) -> Self {
    let current: Arc<Mutex<Option<OrderTracker>>> = Arc::new(Mutex::new(None));
    let (active_tx, active_user) = watch::channel(None);
    let mut changes = identity.subscribe();
    let slot = current.clone();
    let follower = tokio::spawn(async move {
      let mut user = changes.borrow_and_update().clone();
      loop {
        switch_to(&slot, user, &deps, &active_tx).await;
        if changes.changed().await.is_err() {
          break;
        }
        user = changes.borrow_and_update().clone();
      }
    });
    Self {
      current,
      active_user,
      follower,
    }
  }

  /// Uid of the user whose tracker is running, once it has started.
  pub fn active_user(&self) -> watch::Receiver<Option<String>> {
    self.active_user.clone()
  }

  pub async fn views(&self) -> Option<watch::Receiver<OrderViews>> {
    self.current.lock().await.as_ref().map(OrderTracker::views)
  }

  pub async fn armed_timers(&self) -> Vec<String> {
    match self.current.lock().await.as_ref() {
      Some(tracker) => tracker.armed_timers(),
      None => Vec::new(),
    }
  }

  /// Focus re-entry for whoever is signed in.
  pub async fn refresh(&self) -> LarderResult<PassReport> {
    let current = self.current.lock().await;
    match current.as_ref() {
      Some(tracker) => tracker.refresh().await,
      None => Err(LarderError::NotSignedIn),
    }
  }

  /// Runs `f` against the current tracker, if any.
  pub async fn with_tracker<R>(&self, f: impl FnOnce(&OrderTracker) -> R) -> Option<R> {
    self.current.lock().await.as_ref().map(f)
  }

  pub async fn shutdown(self) {
    self.follower.abort();
    if let Some(tracker) = self.current.lock().await.take() {
      tracker.shutdown().await;
    }
  }
}

#[instrument(name = "SessionManager::switch", skip_all, fields(user_id = user.as_ref().map(|u| u.uid.as_str())))]
async fn switch_to(
  slot: &Mutex<Option<OrderTracker>>,
  user: Option<User>,
  deps: &TrackerDeps,
  active_tx: &watch::Sender<Option<String>>,
) {
  let mut current = slot.lock().await;
  let same_user = match (current.as_ref(), user.as_ref()) {
    (Some(tracker), Some(user)) => tracker.user().uid == user.uid,
    (None, None) => true,
    _ => false,
  };
  if same_user {
    return;
  }

  if let Some(previous) = current.take() {
    previous.shutdown().await;
  }
  active_tx.send_replace(None);

  let Some(user) = user else {
    info!("Signed out, no order tracker running.");
    return;
  };
  let uid = user.uid.clone();
  match OrderTracker::start(user, deps.clone()).await {
    Ok(tracker) => {
      *current = Some(tracker);
      active_tx.send_replace(Some(uid));
    }
    Err(e) => warn!(error = %e, "Could not start order tracker."),
  }
}

impl Drop for SessionManager {
  fn drop(&mut self) {
    self.follower.abort();
  }
}

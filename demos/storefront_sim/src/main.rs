// demos/storefront_sim/src/main.rs

mod config;
mod errors;
mod shop_dashboard;

use crate::config::SimConfig;
use crate::errors::{Result as SimResult, SimError};

use larder::{
  Checkout, CheckoutRequest, Clock, FileKv, MemoryStore, OrderViews, PendingLedger, RemoteStore, SessionManager,
  Settings, StaticIdentity, SystemClock, TrackerDeps, User, Wallet,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_max_level(Level::INFO)
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env()) // Allow RUST_LOG override
    .with_span_events(FmtSpan::CLOSE)
    .init();

  tracing::info!("Starting storefront simulation...");

  let sim_config = SimConfig::from_env()?;
  let mut settings = Settings::from_env()?;
  settings.countdown_seconds = sim_config.countdown_seconds;
  settings.validate()?;

  run(sim_config, settings).await?;

  tracing::info!("Simulation finished.");
  Ok(())
}

async fn run(sim_config: SimConfig, settings: Settings) -> SimResult<()> {
  let memory_store = Arc::new(MemoryStore::with_max_attempts(settings.transaction_max_attempts));
  shop_dashboard::seed(&memory_store, &sim_config);

  let store: Arc<dyn RemoteStore> = memory_store.clone();
  let clock: Arc<dyn Clock> = Arc::new(SystemClock);
  let kv = Arc::new(FileKv::new(settings.data_dir.clone()));
  let ledger = Arc::new(PendingLedger::new(kv, settings.ledger_key.clone()));
  tracing::info!(data_dir = %settings.data_dir.display(), "Pending-order ledger is file backed.");

  let deps = TrackerDeps {
    store: store.clone(),
    ledger: ledger.clone(),
    clock: clock.clone(),
    settings: settings.clone(),
  };

  let identity = Arc::new(StaticIdentity::signed_out());
  let session = SessionManager::start(identity.clone(), deps);

  let user = User {
    uid: sim_config.user_id.clone(),
    email: Some(format!("{}@example.com", sim_config.user_id)),
  };
  identity.sign_in(user.clone());

  let mut active_user = session.active_user();
  active_user
    .wait_for(|uid| uid.as_deref() == Some(user.uid.as_str()))
    .await
    .map_err(|_| SimError::SessionClosed)?;
  let mut views = session.views().await.ok_or(SimError::SessionClosed)?;

  let wallet = Wallet::new(store.clone(), clock.clone());
  let balance = wallet.top_up(&user.uid, sim_config.top_up).await?;
  tracing::info!(balance, "Wallet topped up.");

  let checkout = Checkout::new(store.clone(), ledger.clone(), clock.clone())?;
  let request = CheckoutRequest::new(sim_config.shop_id.clone())
    .item("pad-thai", 1)
    .item("iced-tea", 2);
  let receipt = checkout.place_order(&user, request).await?;
  tracing::info!(
    order_id = %receipt.order_id,
    order_number = %receipt.order_number,
    total = receipt.total,
    balance_after = receipt.balance_after,
    "Order placed."
  );

  let accept = tokio::spawn(shop_dashboard::accept_after(
    store.clone(),
    clock.clone(),
    receipt.order_id.clone(),
    Duration::from_millis(sim_config.accept_after_ms),
  ));

  let waited_secs = sim_config.accept_after_ms / 1000 + sim_config.countdown_seconds as u64 + 5;
  let order_id = receipt.order_id.clone();
  let finished = tokio::time::timeout(Duration::from_secs(waited_secs), async {
    loop {
      print_views(&views.borrow_and_update());
      if views.borrow().history.iter().any(|view| view.order.id == order_id) {
        return Ok(());
      }
      if views.changed().await.is_err() {
        return Err(SimError::SessionClosed);
      }
    }
  })
  .await;

  match accept.await {
    Ok(result) => result?,
    Err(e) => tracing::error!(error = %e, "Shop dashboard task failed."),
  }
  match finished {
    Ok(result) => result?,
    Err(_) => {
      return Err(SimError::Timeout {
        order_id: receipt.order_id,
        waited_secs,
      })
    }
  }

  for entry in wallet.activity(&user.uid).await? {
    tracing::info!(id = %entry.id, kind = ?entry.kind, amount = entry.amount, "Wallet activity.");
  }

  identity.sign_out();
  active_user
    .wait_for(Option::is_none)
    .await
    .map_err(|_| SimError::SessionClosed)?;
  session.shutdown().await;
  Ok(())
}

fn print_views(views: &OrderViews) {
  for view in &views.active {
    tracing::info!(
      order_id = %view.order.id,
      number = view.display_number.as_deref().unwrap_or("-"),
      status = %view.order.status,
      remaining_secs = ?view.remaining_seconds(),
      "Active order."
    );
  }
  tracing::info!(
    active = views.summary.active_count,
    history = views.summary.history_count,
    total_spent = views.summary.total_spent,
    "Order views refreshed."
  );
}

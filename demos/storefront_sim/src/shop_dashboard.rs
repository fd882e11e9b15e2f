// demos/storefront_sim/src/shop_dashboard.rs

//! Stand-in for the seller side: seeds the catalog and accepts orders the
//! way the shop dashboard would.

use crate::config::SimConfig;
use crate::errors::Result;
use larder::model::order::fields;
use larder::model::timestamp::timestamp_value;
use larder::store::collections;
use larder::{Clock, MemoryStore, RemoteStore};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};

pub fn seed(store: &MemoryStore, config: &SimConfig) {
  store.seed(
    collections::USERS,
    &config.user_id,
    json!({ "wallet": config.starting_wallet, "email": format!("{}@example.com", config.user_id) }),
  );
  store.seed(
    collections::SHOPS,
    &config.shop_id,
    json!({
      "name": "Noodle Bar",
      "logo": "https://cdn.example.com/noodle-bar.png",
      "menu": [
        { "id": "pad-thai", "name": "Pad Thai", "price": 6000, "description": "Rice noodles, tamarind, peanuts" },
        { "id": "iced-tea", "name": "Thai Iced Tea", "price": 2500 },
        { "id": "mango", "name": "Mango Sticky Rice", "price": 8000 }
      ]
    }),
  );
  info!(user_id = %config.user_id, shop_id = %config.shop_id, "Seeded user and shop.");
}

/// Waits, then flips the order to accepted and stamps the countdown anchor.
#[instrument(name = "shop_dashboard::accept", skip(store, clock), fields(order_id = %order_id))]
pub async fn accept_after(
  store: Arc<dyn RemoteStore>,
  clock: Arc<dyn Clock>,
  order_id: String,
  delay: Duration,
) -> Result<()> {
  tokio::time::sleep(delay).await;

  let mut update = Map::new();
  update.insert(fields::STATUS.to_string(), Value::from("accepted"));
  update.insert(fields::TIMER_STARTED_AT.to_string(), timestamp_value(clock.now()));
  store.set(collections::ORDERS, &order_id, update, true).await?;

  info!("Shop accepted the order.");
  Ok(())
}

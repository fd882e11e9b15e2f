// demos/storefront_sim/src/config.rs

use crate::errors::{Result, SimError};
use dotenvy::dotenv;
use larder::Cents;
use std::env;

/// Scenario knobs layered on top of `larder::Settings`.
#[derive(Debug, Clone)]
pub struct SimConfig {
  pub user_id: String,
  pub starting_wallet: Cents,
  pub top_up: Cents,
  pub shop_id: String,
  /// Overrides the library countdown so a run finishes quickly.
  pub countdown_seconds: i64,
  /// How long the simulated shop waits before accepting.
  pub accept_after_ms: u64,
}

impl SimConfig {
  pub fn from_env() -> Result<Self> {
    dotenv().ok();

    let get_env = |var_name: &str| {
      env::var(var_name).map_err(|e| SimError::Config(format!("Missing environment variable '{}': {}", var_name, e)))
    };

    let user_id = get_env("SIM_USER_ID").unwrap_or_else(|_| "demo-user".to_string());
    let shop_id = get_env("SIM_SHOP_ID").unwrap_or_else(|_| "noodle-bar".to_string());
    let starting_wallet = get_env("SIM_STARTING_WALLET")
      .unwrap_or_else(|_| "10000".to_string())
      .parse::<Cents>()
      .map_err(|e| SimError::Config(format!("Invalid SIM_STARTING_WALLET: {}", e)))?;
    let top_up = get_env("SIM_TOP_UP")
      .unwrap_or_else(|_| "5000".to_string())
      .parse::<Cents>()
      .map_err(|e| SimError::Config(format!("Invalid SIM_TOP_UP: {}", e)))?;
    let countdown_seconds = get_env("SIM_COUNTDOWN_SECONDS")
      .unwrap_or_else(|_| "5".to_string())
      .parse::<i64>()
      .map_err(|e| SimError::Config(format!("Invalid SIM_COUNTDOWN_SECONDS: {}", e)))?;
    let accept_after_ms = get_env("SIM_ACCEPT_AFTER_MS")
      .unwrap_or_else(|_| "1500".to_string())
      .parse::<u64>()
      .map_err(|e| SimError::Config(format!("Invalid SIM_ACCEPT_AFTER_MS: {}", e)))?;

    if countdown_seconds <= 0 {
      return Err(SimError::Config("SIM_COUNTDOWN_SECONDS must be positive".to_string()));
    }

    tracing::info!("Simulation configuration loaded successfully.");

    Ok(Self {
      user_id,
      starting_wallet,
      top_up,
      shop_id,
      countdown_seconds,
      accept_after_ms,
    })
  }
}

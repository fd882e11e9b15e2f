// larder/src/config.rs

use crate::error::{LarderError, LarderResult};
use crate::model::lifecycle::COUNTDOWN_SECONDS;
use chrono::TimeDelta;
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;

pub const DEFAULT_LEDGER_KEY: &str = "pendingOrders";
pub const DEFAULT_TX_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_DATA_DIR: &str = ".larder";

/// Runtime knobs. Defaults reproduce the shipped behavior; `from_env` lets a
/// deployment or a test harness shorten the countdown or move local storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
  /// Seconds an accepted order stays active before it is completed.
  pub countdown_seconds: i64,
  /// Key under which the pending-order ledger is persisted.
  pub ledger_key: String,
  /// Attempts before a conflicting transaction gives up.
  pub transaction_max_attempts: u32,
  /// Directory for file-backed local storage.
  pub data_dir: PathBuf,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      countdown_seconds: COUNTDOWN_SECONDS,
      ledger_key: DEFAULT_LEDGER_KEY.to_string(),
      transaction_max_attempts: DEFAULT_TX_MAX_ATTEMPTS,
      data_dir: PathBuf::from(DEFAULT_DATA_DIR),
    }
  }
}

impl Settings {
  pub fn from_env() -> LarderResult<Self> {
    dotenv().ok();
    let defaults = Self::default();

    let get_env = |var_name: &str| env::var(var_name).ok().filter(|v| !v.trim().is_empty());

    let countdown_seconds = match get_env("LARDER_COUNTDOWN_SECONDS") {
      Some(raw) => raw.trim().parse::<i64>().map_err(|e| LarderError::Config {
        message: format!("Invalid LARDER_COUNTDOWN_SECONDS '{}': {}", raw, e),
      })?,
      None => defaults.countdown_seconds,
    };
    let ledger_key = get_env("LARDER_LEDGER_KEY").unwrap_or(defaults.ledger_key);
    let transaction_max_attempts = match get_env("LARDER_TX_MAX_ATTEMPTS") {
      Some(raw) => raw.trim().parse::<u32>().map_err(|e| LarderError::Config {
        message: format!("Invalid LARDER_TX_MAX_ATTEMPTS '{}': {}", raw, e),
      })?,
      None => defaults.transaction_max_attempts,
    };
    let data_dir = get_env("LARDER_DATA_DIR").map(PathBuf::from).unwrap_or(defaults.data_dir);

    let settings = Self {
      countdown_seconds,
      ledger_key,
      transaction_max_attempts,
      data_dir,
    };
    settings.validate()?;
    tracing::info!(countdown_seconds, "Larder settings loaded.");
    Ok(settings)
  }

  pub fn validate(&self) -> LarderResult<()> {
    if self.countdown_seconds <= 0 {
      return Err(LarderError::Config {
        message: format!("countdown_seconds must be positive, got {}", self.countdown_seconds),
      });
    }
    if TimeDelta::try_seconds(self.countdown_seconds).is_none() {
      return Err(LarderError::Config {
        message: format!("countdown_seconds {} is out of range", self.countdown_seconds),
      });
    }
    if self.transaction_max_attempts == 0 {
      return Err(LarderError::Config {
        message: "transaction_max_attempts must be at least 1".to_string(),
      });
    }
    if self.ledger_key.trim().is_empty() {
      return Err(LarderError::Config {
        message: "ledger_key must not be empty".to_string(),
      });
    }
    Ok(())
  }

  /// Saturates for values `validate` rejects.
  pub fn countdown(&self) -> TimeDelta {
    TimeDelta::try_seconds(self.countdown_seconds).unwrap_or(TimeDelta::MAX)
  }
}

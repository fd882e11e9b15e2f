// demos/storefront_sim/src/errors.rs

use larder::LarderError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
  #[error("Configuration Error: {0}")]
  Config(String),

  #[error("Larder Error: {source}")]
  Larder {
    #[from]
    source: LarderError,
  },

  #[error("Order '{order_id}' did not reach history within {waited_secs}s")]
  Timeout { order_id: String, waited_secs: u64 },

  #[error("Session ended before the scenario finished")]
  SessionClosed,
}

pub type Result<T, E = SimError> = std::result::Result<T, E>;

// larder/src/error.rs
use anyhow::Error as AnyhowError;
use thiserror::Error;

use crate::model::Cents;

#[derive(Debug, Error)]
pub enum LarderError {
  // --- Checkout ---
  #[error("Insufficient funds: balance {balance} is below order total {total}")]
  InsufficientFunds { balance: Cents, total: Cents },

  #[error("User record not found: {user_id}")]
  UserNotFound { user_id: String },

  #[error("Atomic transaction gave up after {attempts} conflicting attempts")]
  TransactionConflict { attempts: u32 },

  #[error("Cart is empty")]
  EmptyCart,

  #[error("Invalid quantity {quantity} for menu item '{item_id}'")]
  InvalidQuantity { item_id: String, quantity: i64 },

  #[error("Shop not found: {shop_id}")]
  ShopNotFound { shop_id: String },

  #[error("Menu item '{item_id}' is not on the menu of shop '{shop_id}'")]
  UnknownMenuItem { shop_id: String, item_id: String },

  // --- Wallet ---
  #[error("Invalid amount: {amount}")]
  InvalidAmount { amount: Cents },

  #[error("No user is signed in")]
  NotSignedIn,

  // --- Collaborators ---
  #[error("Remote store unavailable during '{operation}'. Source: {source}")]
  RemoteUnavailable {
    operation: String,
    #[source]
    source: AnyhowError,
  },

  #[error("Local pending-order ledger under key '{key}' is corrupt. Source: {source}")]
  CorruptLocalLedger {
    key: String,
    #[source]
    source: serde_json::Error,
  },

  #[error("Local storage failure for key '{key}'. Source: {source}")]
  LocalStorage {
    key: String,
    #[source]
    source: std::io::Error,
  },

  #[error("Configuration error: {message}")]
  Config { message: String },

  // --- Workflow engine ---
  #[error("Step not found: {step_name}")]
  StepNotFound { step_name: String },

  #[error("Handler missing for non-optional step: {step_name}")]
  HandlerMissing { step_name: String },

  #[error("Internal larder error: {0}")]
  Internal(String),
}

impl LarderError {
  pub fn remote(operation: impl Into<String>, source: impl Into<AnyhowError>) -> Self {
    LarderError::RemoteUnavailable {
      operation: operation.into(),
      source: source.into(),
    }
  }

  /// Whether a caller should surface this as "try again later" rather than a
  /// hard failure.
  pub fn is_retryable(&self) -> bool {
    matches!(
      self,
      LarderError::TransactionConflict { .. } | LarderError::RemoteUnavailable { .. }
    )
  }
}

// Foreign failures arriving as anyhow errors are treated as the remote side
// being unreachable; the reconciler retries on its next trigger.
impl From<AnyhowError> for LarderError {
  fn from(err: AnyhowError) -> Self {
    match err.downcast::<LarderError>() {
      Ok(inner) => inner,
      Err(err) => LarderError::RemoteUnavailable {
        operation: "unspecified".to_string(),
        source: err,
      },
    }
  }
}

pub type LarderResult<T, E = LarderError> = std::result::Result<T, E>;

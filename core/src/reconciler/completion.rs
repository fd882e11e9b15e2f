// larder/src/reconciler/completion.rs

use crate::error::{LarderError, LarderResult};
use crate::model::lifecycle::LifecycleState;
use crate::model::order::fields;
use crate::model::timestamp::timestamp_value;
use crate::store::{collections, transaction_body, Document, RemoteStore, Transaction};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument};

/// Result of an automatic completion attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionOutcome {
  /// The order was accepted and is now completed.
  Applied,
  /// Completed or cancelled already. Nothing written.
  AlreadyTerminal,
  /// Still awaiting, or an unknown status. Nothing written.
  NotAccepted,
  /// The order document no longer exists.
  Missing,
}

impl CompletionOutcome {
  /// Whether the local ledger entry has served its purpose.
  pub fn clears_ledger(self) -> bool {
    !matches!(self, CompletionOutcome::NotAccepted)
  }
}

/// Moves `order_id` from accepted to completed.
///
/// The status is re-read inside an atomic transaction and written only when it
/// is still accepted, so a duplicate fire is a no-op and a cancelled order is
/// never turned into a completed one.
#[instrument(name = "complete_order", skip_all, fields(order_id = %order_id))]
pub async fn complete_order(
  store: &dyn RemoteStore,
  order_id: &str,
  now: DateTime<Utc>,
) -> LarderResult<CompletionOutcome> {
  let id = order_id.to_string();
  let body = transaction_body(move |tx: Transaction| {
    let id = id.clone();
    async move {
      let outcome = match tx.get(collections::ORDERS, &id).await? {
        None => CompletionOutcome::Missing,
        Some(doc) => {
          let status = doc.get(fields::STATUS).and_then(Value::as_str).unwrap_or_default();
          match LifecycleState::classify(status) {
            Some(LifecycleState::Accepted) => {
              let mut update = Document::new();
              update.insert(
                fields::STATUS.to_string(),
                Value::from(LifecycleState::Completed.canonical()),
              );
              update.insert(fields::COMPLETED_AT.to_string(), timestamp_value(now));
              tx.set(collections::ORDERS, &id, update, true);
              CompletionOutcome::Applied
            }
            Some(state) if state.is_terminal() => CompletionOutcome::AlreadyTerminal,
            _ => CompletionOutcome::NotAccepted,
          }
        }
      };
      serde_json::to_value(outcome).map_err(|e| LarderError::Internal(format!("completion outcome: {e}")))
    }
  });

  let raw = store.run_transaction(body).await?;
  let outcome: CompletionOutcome =
    serde_json::from_value(raw).map_err(|e| LarderError::Internal(format!("completion outcome: {e}")))?;
  match outcome {
    CompletionOutcome::Applied => info!("Order completed."),
    other => debug!(outcome = ?other, "Completion skipped."),
  }
  Ok(outcome)
}

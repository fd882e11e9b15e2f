// larder/src/model/lifecycle.rs

//! The order lifecycle state machine and the status-text classifier.
//!
//! Remote order documents have used several spellings for the same state over
//! time, so the raw `status` text is only ever interpreted here: it is
//! normalized and looked up in per-state synonym sets. Nothing else in the
//! crate compares raw status strings.

use serde::{Deserialize, Serialize};

/// Dwell time between acceptance and automatic completion.
pub const COUNTDOWN_SECONDS: i64 = 60;

pub const AWAITING_SYNONYMS: &[&str] = &["pending", "waiting", "awaiting", "awaiting_confirmation", "requested"];
pub const ACCEPTED_SYNONYMS: &[&str] = &["accepted", "accept", "preparing", "in_progress"];
pub const COMPLETED_SYNONYMS: &[&str] = &["completed", "complete", "done", "finished"];
pub const CANCELLED_SYNONYMS: &[&str] = &[
  "cancelled",
  "canceled",
  "declined",
  "decline",
  "rejected",
  "cancelled_by_shop",
  "canceled_by_shop",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
  /// The shop has not responded yet.
  Awaiting,
  /// The shop confirmed; the completion countdown is running.
  Accepted,
  Completed,
  Cancelled,
}

/// Case-folds, trims, and joins inner whitespace or hyphen runs with `_`.
pub fn normalize_status(raw: &str) -> String {
  raw
    .trim()
    .to_lowercase()
    .split(|c: char| c.is_whitespace() || c == '-')
    .filter(|part| !part.is_empty())
    .collect::<Vec<_>>()
    .join("_")
}

impl LifecycleState {
  /// Maps free-form status text onto a state. Unrecognized text is `None`;
  /// such orders are shown in history and never tracked.
  pub fn classify(raw: &str) -> Option<Self> {
    let status = normalize_status(raw);
    let status = status.as_str();
    if AWAITING_SYNONYMS.contains(&status) {
      Some(LifecycleState::Awaiting)
    } else if ACCEPTED_SYNONYMS.contains(&status) {
      Some(LifecycleState::Accepted)
    } else if COMPLETED_SYNONYMS.contains(&status) {
      Some(LifecycleState::Completed)
    } else if CANCELLED_SYNONYMS.contains(&status) {
      Some(LifecycleState::Cancelled)
    } else {
      None
    }
  }

  /// The spelling this crate writes.
  pub fn canonical(self) -> &'static str {
    match self {
      LifecycleState::Awaiting => "pending",
      LifecycleState::Accepted => "accepted",
      LifecycleState::Completed => "completed",
      LifecycleState::Cancelled => "cancelled",
    }
  }

  pub fn is_active(self) -> bool {
    matches!(self, LifecycleState::Awaiting | LifecycleState::Accepted)
  }

  pub fn is_terminal(self) -> bool {
    !self.is_active()
  }

  /// Transitions only move forward; nothing leaves a terminal state.
  pub fn can_transition_to(self, next: LifecycleState) -> bool {
    use LifecycleState::*;
    matches!(
      (self, next),
      (Awaiting, Accepted) | (Awaiting, Cancelled) | (Accepted, Completed) | (Accepted, Cancelled)
    )
  }
}

impl std::fmt::Display for LifecycleState {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.canonical())
  }
}

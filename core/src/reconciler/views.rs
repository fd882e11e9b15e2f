// larder/src/reconciler/views.rs

use crate::model::{Cents, LifecycleState, Order, Shop};
use chrono::TimeDelta;
use std::sync::Arc;

/// One order as the order screens show it.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderView {
  pub order: Order,
  /// `None` for statuses outside the known vocabulary.
  pub state: Option<LifecycleState>,
  /// Time left before automatic completion. Only set for accepted orders and
  /// never negative.
  pub remaining: Option<TimeDelta>,
  pub shop: Option<Arc<Shop>>,
  pub display_number: Option<String>,
}

impl OrderView {
  /// Whole seconds left, rounded up so a countdown never shows 0 early.
  pub fn remaining_seconds(&self) -> Option<i64> {
    self.remaining.map(|left| {
      let millis = left.num_milliseconds().max(0);
      (millis + 999) / 1000
    })
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistorySummary {
  pub active_count: usize,
  pub history_count: usize,
  /// Lifetime spend: sum of `total` over every order, active and history.
  pub total_spent: Cents,
}

/// Active and history lists, each sorted newest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderViews {
  pub active: Vec<OrderView>,
  pub history: Vec<OrderView>,
  pub summary: HistorySummary,
}

impl OrderViews {
  pub fn new(active: Vec<OrderView>, history: Vec<OrderView>) -> Self {
    let summary = HistorySummary {
      active_count: active.len(),
      history_count: history.len(),
      total_spent: active.iter().chain(history.iter()).map(|v| v.order.total).sum(),
    };
    Self {
      active,
      history,
      summary,
    }
  }

  pub fn find(&self, order_id: &str) -> Option<&OrderView> {
    self.active.iter().chain(self.history.iter()).find(|v| v.order.id == order_id)
  }

  pub fn is_active(&self, order_id: &str) -> bool {
    self.active.iter().any(|v| v.order.id == order_id)
  }
}

// larder/src/model/order.rs

use crate::model::lifecycle::LifecycleState;
use crate::model::timestamp::parse_timestamp;
use crate::model::{value_cents, value_str, value_u64, Cents};
use crate::store::DocumentSnapshot;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Field names of an order document.
pub mod fields {
  pub const USER_ID: &str = "userId";
  pub const SHOP_ID: &str = "shopId";
  pub const ITEMS: &str = "items";
  pub const TOTAL: &str = "total";
  pub const STATUS: &str = "status";
  pub const CREATED_AT: &str = "createdAt";
  pub const TIMER_STARTED_AT: &str = "timerStartedAt";
  pub const ACCEPTED_AT: &str = "acceptedAt";
  pub const COMPLETED_AT: &str = "completedAt";
  pub const ORDER_NUMBER: &str = "orderNumber";
  pub const SHOP_ORDER_NUMBER: &str = "shopOrderNumber";
}

/// An order as read from the remote store.
///
/// Parsing is lenient: missing or malformed fields become `None`/empty rather
/// than rejecting the document, so one bad record never hides the rest of a
/// snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
  pub id: String,
  pub user_id: Option<String>,
  pub shop_id: Option<String>,
  pub items: BTreeMap<String, u32>,
  pub total: Cents,
  /// Raw status text. Use [`Order::state`] to interpret it.
  pub status: String,
  pub created_at: Option<DateTime<Utc>>,
  pub timer_started_at: Option<DateTime<Utc>>,
  pub accepted_at: Option<DateTime<Utc>>,
  pub order_number: Option<String>,
  pub shop_order_number: Option<u64>,
}

impl Order {
  pub fn from_snapshot(snapshot: &DocumentSnapshot) -> Self {
    let data = &snapshot.data;
    let items = data
      .get(fields::ITEMS)
      .and_then(|v| v.as_object())
      .map(|map| {
        map
          .iter()
          .filter_map(|(item_id, qty)| {
            let qty = qty.as_u64().filter(|q| *q >= 1)?;
            Some((item_id.clone(), u32::try_from(qty).ok()?))
          })
          .collect()
      })
      .unwrap_or_default();

    Order {
      id: snapshot.id.clone(),
      user_id: value_str(data, fields::USER_ID),
      shop_id: value_str(data, fields::SHOP_ID),
      items,
      total: value_cents(data, fields::TOTAL).unwrap_or(0).max(0),
      status: data
        .get(fields::STATUS)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string(),
      created_at: data.get(fields::CREATED_AT).and_then(parse_timestamp),
      timer_started_at: data.get(fields::TIMER_STARTED_AT).and_then(parse_timestamp),
      accepted_at: data.get(fields::ACCEPTED_AT).and_then(parse_timestamp),
      order_number: value_str(data, fields::ORDER_NUMBER),
      shop_order_number: value_u64(data, fields::SHOP_ORDER_NUMBER),
    }
  }

  pub fn state(&self) -> Option<LifecycleState> {
    LifecycleState::classify(&self.status)
  }

  /// When the completion countdown started according to the document:
  /// `timerStartedAt` first, then `acceptedAt`.
  pub fn timer_anchor(&self) -> Option<DateTime<Utc>> {
    self.timer_started_at.or(self.accepted_at)
  }

  pub fn display_number(&self) -> Option<String> {
    self
      .order_number
      .clone()
      .or_else(|| self.shop_order_number.map(format_order_number))
  }
}

/// `7` becomes `#007`.
pub fn format_order_number(shop_order_number: u64) -> String {
  format!("#{:03}", shop_order_number)
}

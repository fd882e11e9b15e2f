// larder/src/checkout/context.rs

use super::{CheckoutReceipt, CheckoutRequest};
use crate::clock::Clock;
use crate::ledger::PendingLedger;
use crate::model::{format_order_number, Cents};
use crate::store::RemoteStore;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct CheckoutEnv {
  pub store: Arc<dyn RemoteStore>,
  pub ledger: Arc<PendingLedger>,
  pub clock: Arc<dyn Clock>,
}

/// Data threaded through the checkout steps.
pub(crate) struct CheckoutCtx {
  pub env: CheckoutEnv,
  pub user_id: String,
  pub shop_id: String,
  pub requested: BTreeMap<String, i64>,
  /// Validated cart, quantities all at least 1.
  pub items: BTreeMap<String, u32>,
  pub total: Cents,
  pub order_id: String,
  pub created_at: DateTime<Utc>,
  pub shop_order_number: Option<u64>,
  pub balance_after: Option<Cents>,
}

impl CheckoutCtx {
  pub fn new(
    env: CheckoutEnv,
    user_id: String,
    request: CheckoutRequest,
    order_id: String,
    created_at: DateTime<Utc>,
  ) -> Self {
    Self {
      env,
      user_id,
      shop_id: request.shop_id,
      requested: request.items,
      items: BTreeMap::new(),
      total: 0,
      order_id,
      created_at,
      shop_order_number: None,
      balance_after: None,
    }
  }

  pub fn receipt(&self) -> Option<CheckoutReceipt> {
    let shop_order_number = self.shop_order_number?;
    Some(CheckoutReceipt {
      order_id: self.order_id.clone(),
      order_number: format_order_number(shop_order_number),
      shop_order_number,
      total: self.total,
      balance_after: self.balance_after?,
    })
  }
}

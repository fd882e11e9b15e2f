// larder/src/checkout/mod.rs

//! Placing an order: price the cart, then debit the wallet, allocate the
//! shop's next order number and create the order in one atomic transaction.

mod context;
mod steps;

use crate::clock::Clock;
use crate::core::ContextData;
use crate::error::{LarderError, LarderResult};
use crate::ledger::PendingLedger;
use crate::model::{Cents, User};
use crate::store::RemoteStore;
use crate::workflow::Workflow;
use context::{CheckoutCtx, CheckoutEnv};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, instrument};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
  pub shop_id: String,
  /// Menu item id to quantity. Zero means "not ordered" and is dropped.
  pub items: BTreeMap<String, i64>,
}

impl CheckoutRequest {
  pub fn new(shop_id: impl Into<String>) -> Self {
    Self {
      shop_id: shop_id.into(),
      items: BTreeMap::new(),
    }
  }

  pub fn item(mut self, item_id: impl Into<String>, quantity: i64) -> Self {
    self.items.insert(item_id.into(), quantity);
    self
  }
}

/// What the customer sees after a successful checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutReceipt {
  pub order_id: String,
  /// Display number, e.g. `#007`.
  pub order_number: String,
  pub shop_order_number: u64,
  pub total: Cents,
  pub balance_after: Cents,
}

pub struct Checkout {
  env: CheckoutEnv,
  workflow: Workflow<CheckoutCtx>,
}

impl Checkout {
  pub fn new(store: Arc<dyn RemoteStore>, ledger: Arc<PendingLedger>, clock: Arc<dyn Clock>) -> LarderResult<Self> {
    Ok(Self {
      env: CheckoutEnv {
        store,
        ledger,
        clock,
      },
      workflow: steps::checkout_workflow()?,
    })
  }

  /// Places `request` for `user`.
  ///
  /// Validation and pricing failures happen before the store is written to.
  /// The wallet debit, the counter increment and the order document are
  /// committed together or not at all. Recording the order in the local
  /// ledger is best effort; the reconciler picks the order up from the live
  /// query regardless.
  #[instrument(name = "Checkout::place_order", skip_all, fields(user_id = %user.uid, shop_id = %request.shop_id))]
  pub async fn place_order(&self, user: &User, request: CheckoutRequest) -> LarderResult<CheckoutReceipt> {
    let order_id = self.env.store.new_document_id(crate::store::collections::ORDERS);
    let ctx = ContextData::new(CheckoutCtx::new(
      self.env.clone(),
      user.uid.clone(),
      request,
      order_id,
      self.env.clock.now(),
    ));
    self.workflow.run(ctx.clone()).await?;

    let guard = ctx.read();
    let receipt = guard
      .receipt()
      .ok_or_else(|| LarderError::Internal("checkout finished without an order number".to_string()))?;
    info!(
      order_id = %receipt.order_id,
      order_number = %receipt.order_number,
      total = receipt.total,
      "Order placed."
    );
    Ok(receipt)
  }
}

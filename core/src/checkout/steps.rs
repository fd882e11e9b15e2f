// larder/src/checkout/steps.rs

use super::context::CheckoutCtx;
use crate::core::{ContextData, StepControl};
use crate::error::{LarderError, LarderResult};
use crate::ledger::LedgerEntry;
use crate::model::lifecycle::LifecycleState;
use crate::model::order::fields as order_fields;
use crate::model::timestamp::timestamp_value;
use crate::model::user::fields as user_fields;
use crate::model::{format_order_number, value_cents, value_u64, Cents, Shop};
use crate::store::{collections, transaction_body, Document, Transaction};
use crate::workflow::Workflow;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::{debug, warn};

const LAST_ORDER_NUMBER: &str = "lastOrderNumber";
const UPDATED_AT: &str = "updatedAt";

pub(crate) const CHECKOUT_STEPS: &[(&str, bool)] = &[
  ("validate_cart", false),
  ("price_cart", false),
  ("commit_transaction", false),
  ("record_pending", true),
];

fn document<const N: usize>(fields: [(&str, Value); N]) -> Document {
  fields.into_iter().map(|(name, value)| (name.to_string(), value)).collect()
}

pub(crate) fn checkout_workflow() -> LarderResult<Workflow<CheckoutCtx>> {
  let mut workflow = Workflow::new("checkout", CHECKOUT_STEPS);

  workflow.on("validate_cart", |ctx: ContextData<CheckoutCtx>| async move {
    let mut guard = ctx.write();
    let mut items = BTreeMap::new();
    for (item_id, quantity) in &guard.requested {
      match *quantity {
        0 => continue,
        q if q < 0 || q > i64::from(u32::MAX) => {
          return Err(LarderError::InvalidQuantity {
            item_id: item_id.clone(),
            quantity: q,
          })
        }
        q => {
          items.insert(item_id.clone(), q as u32);
        }
      }
    }
    if items.is_empty() {
      return Err(LarderError::EmptyCart);
    }
    guard.items = items;
    Ok(StepControl::Continue)
  })?;

  workflow.on("price_cart", |ctx: ContextData<CheckoutCtx>| async move {
    let (store, shop_id, items) = {
      let guard = ctx.read();
      (guard.env.store.clone(), guard.shop_id.clone(), guard.items.clone())
    };
    // Always the live menu: prices are never served from a cache.
    let shop = match store.get(collections::SHOPS, &shop_id).await? {
      Some(doc) => Shop::from_document(&shop_id, &doc).map_err(|e| {
        warn!(shop_id = %shop_id, error = %e, "Shop document malformed.");
        LarderError::ShopNotFound {
          shop_id: shop_id.clone(),
        }
      })?,
      None => {
        return Err(LarderError::ShopNotFound {
          shop_id: shop_id.clone(),
        })
      }
    };

    let mut total: Cents = 0;
    for (item_id, quantity) in &items {
      let item = shop.menu_item(item_id).ok_or_else(|| LarderError::UnknownMenuItem {
        shop_id: shop_id.clone(),
        item_id: item_id.clone(),
      })?;
      let line = item
        .price
        .max(0)
        .checked_mul(Cents::from(*quantity))
        .and_then(|line| total.checked_add(line));
      total = line.ok_or_else(|| LarderError::Internal(format!("cart total overflows at item '{item_id}'")))?;
    }
    debug!(total, items = items.len(), "Cart priced.");
    ctx.write().total = total;
    Ok(StepControl::Continue)
  })?;

  workflow.on("commit_transaction", |ctx: ContextData<CheckoutCtx>| async move {
    let (store, user_id, shop_id, order_id, items, total, created_at) = {
      let guard = ctx.read();
      (
        guard.env.store.clone(),
        guard.user_id.clone(),
        guard.shop_id.clone(),
        guard.order_id.clone(),
        guard.items.clone(),
        guard.total,
        guard.created_at,
      )
    };

    let body = transaction_body(move |tx: Transaction| {
      let (user_id, shop_id, order_id, items) = (user_id.clone(), shop_id.clone(), order_id.clone(), items.clone());
      async move {
        // Every read happens before the first write.
        let user = tx
          .get(collections::USERS, &user_id)
          .await?
          .ok_or_else(|| LarderError::UserNotFound {
            user_id: user_id.clone(),
          })?;
        let balance = value_cents(&user, user_fields::WALLET).unwrap_or(0);
        if balance < total {
          return Err(LarderError::InsufficientFunds { balance, total });
        }
        let last_number = tx
          .get(collections::SHOP_ORDER_COUNTERS, &shop_id)
          .await?
          .and_then(|counter| value_u64(&counter, LAST_ORDER_NUMBER))
          .unwrap_or(0);
        let next_number = last_number + 1;
        let stamp = timestamp_value(created_at);

        tx.set(
          collections::USERS,
          &user_id,
          document([(user_fields::WALLET, json!(balance - total))]),
          true,
        );
        tx.set(
          collections::SHOP_ORDER_COUNTERS,
          &shop_id,
          document([(LAST_ORDER_NUMBER, json!(next_number)), (UPDATED_AT, stamp.clone())]),
          true,
        );
        tx.set(
          collections::ORDERS,
          &order_id,
          document([
            (order_fields::USER_ID, json!(user_id)),
            (order_fields::SHOP_ID, json!(shop_id)),
            (order_fields::ITEMS, json!(items)),
            (order_fields::TOTAL, json!(total)),
            (order_fields::CREATED_AT, stamp),
            (order_fields::STATUS, json!(LifecycleState::Awaiting.canonical())),
            (order_fields::ORDER_NUMBER, json!(format_order_number(next_number))),
            (order_fields::SHOP_ORDER_NUMBER, json!(next_number)),
          ]),
          false,
        );
        Ok(json!({ "shopOrderNumber": next_number, "balanceAfter": balance - total }))
      }
    });

    let committed = store.run_transaction(body).await?;
    let shop_order_number = committed.get("shopOrderNumber").and_then(Value::as_u64);
    let balance_after = committed.get("balanceAfter").and_then(Value::as_i64);
    let mut guard = ctx.write();
    guard.shop_order_number = shop_order_number;
    guard.balance_after = balance_after;
    Ok(StepControl::Continue)
  })?;

  workflow.on("record_pending", |ctx: ContextData<CheckoutCtx>| async move {
    let (ledger, entry) = {
      let guard = ctx.read();
      let entry = LedgerEntry {
        order_id: guard.order_id.clone(),
        created_at: Some(guard.created_at),
        accepted_at: None,
        shop_id: Some(guard.shop_id.clone()),
        order_number: guard.shop_order_number.map(format_order_number),
        shop_order_number: guard.shop_order_number,
      };
      (guard.env.ledger.clone(), entry)
    };
    let order_id = entry.order_id.clone();
    if let Err(e) = ledger.upsert(entry).await {
      warn!(order_id = %order_id, error = %e, "Order placed but not recorded locally.");
    }
    Ok(StepControl::Continue)
  })?;

  Ok(workflow)
}

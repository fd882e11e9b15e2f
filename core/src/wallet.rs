// larder/src/wallet.rs

use crate::clock::Clock;
use crate::error::{LarderError, LarderResult};
use crate::model::order::fields as order_fields;
use crate::model::timestamp::{parse_timestamp, timestamp_value};
use crate::model::user::fields as user_fields;
use crate::model::{value_cents, value_str, Cents, Order};
use crate::store::{collections, transaction_body, Document, RemoteStore, Transaction};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, instrument};

pub mod fields {
  pub const USER_ID: &str = "userId";
  pub const TYPE: &str = "type";
  pub const AMOUNT: &str = "amount";
  pub const CREATED_AT: &str = "createdAt";
  pub const METHOD: &str = "method";

  pub const TYPE_TOP_UP: &str = "topup";
  pub const METHOD_WALLET: &str = "wallet";
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityKind {
  /// Money spent on an order.
  Order {
    shop_id: Option<String>,
    status: String,
    order_number: Option<String>,
  },
  TopUp {
    method: Option<String>,
  },
}

/// One line of the wallet feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityEntry {
  pub id: String,
  pub kind: ActivityKind,
  pub amount: Cents,
  pub created_at: Option<DateTime<Utc>>,
}

pub struct Wallet {
  store: Arc<dyn RemoteStore>,
  clock: Arc<dyn Clock>,
}

impl Wallet {
  pub fn new(store: Arc<dyn RemoteStore>, clock: Arc<dyn Clock>) -> Self {
    Self { store, clock }
  }

  #[instrument(name = "Wallet::balance", skip_all, fields(user_id = %user_id))]
  pub async fn balance(&self, user_id: &str) -> LarderResult<Cents> {
    let user = self
      .store
      .get(collections::USERS, user_id)
      .await?
      .ok_or_else(|| LarderError::UserNotFound {
        user_id: user_id.to_string(),
      })?;
    Ok(value_cents(&user, user_fields::WALLET).unwrap_or(0))
  }

  /// Credits `amount` and records the top-up, atomically. Returns the new
  /// balance.
  #[instrument(name = "Wallet::top_up", skip_all, fields(user_id = %user_id, amount = amount))]
  pub async fn top_up(&self, user_id: &str, amount: Cents) -> LarderResult<Cents> {
    if amount <= 0 {
      return Err(LarderError::InvalidAmount { amount });
    }
    let record_id = self.store.new_document_id(collections::TRANSACTIONS);
    let created_at = timestamp_value(self.clock.now());
    let user_id_owned = user_id.to_string();

    let body = transaction_body(move |tx: Transaction| {
      let user_id = user_id_owned.clone();
      let record_id = record_id.clone();
      let created_at = created_at.clone();
      async move {
        let user = tx
          .get(collections::USERS, &user_id)
          .await?
          .ok_or_else(|| LarderError::UserNotFound {
            user_id: user_id.clone(),
          })?;
        let balance = value_cents(&user, user_fields::WALLET)
          .unwrap_or(0)
          .checked_add(amount)
          .ok_or(LarderError::InvalidAmount { amount })?;

        let mut credit = Document::new();
        credit.insert(user_fields::WALLET.to_string(), json!(balance));
        tx.set(collections::USERS, &user_id, credit, true);

        let mut record = Document::new();
        record.insert(fields::USER_ID.to_string(), json!(user_id));
        record.insert(fields::TYPE.to_string(), json!(fields::TYPE_TOP_UP));
        record.insert(fields::AMOUNT.to_string(), json!(amount));
        record.insert(fields::CREATED_AT.to_string(), created_at);
        record.insert(fields::METHOD.to_string(), json!(fields::METHOD_WALLET));
        tx.set(collections::TRANSACTIONS, &record_id, record, false);

        Ok(json!(balance))
      }
    });

    let committed = self.store.run_transaction(body).await?;
    let balance = committed
      .as_i64()
      .ok_or_else(|| LarderError::Internal("top-up returned no balance".to_string()))?;
    info!(balance, "Wallet topped up.");
    Ok(balance)
  }

  /// Orders and top-ups merged into one feed, newest first.
  #[instrument(name = "Wallet::activity", skip_all, fields(user_id = %user_id))]
  pub async fn activity(&self, user_id: &str) -> LarderResult<Vec<ActivityEntry>> {
    let owner = Value::String(user_id.to_string());
    let orders = self.store.query(collections::ORDERS, order_fields::USER_ID, &owner).await?;
    let records = self.store.query(collections::TRANSACTIONS, fields::USER_ID, &owner).await?;

    let mut feed: Vec<ActivityEntry> = orders
      .iter()
      .map(|snapshot| {
        let order = Order::from_snapshot(snapshot);
        ActivityEntry {
          id: order.id.clone(),
          amount: order.total,
          created_at: order.created_at,
          kind: ActivityKind::Order {
            order_number: order.display_number(),
            shop_id: order.shop_id,
            status: order.status,
          },
        }
      })
      .collect();

    feed.extend(
      records
        .iter()
        .filter(|snapshot| snapshot.data.get(fields::TYPE).and_then(Value::as_str) == Some(fields::TYPE_TOP_UP))
        .map(|snapshot| ActivityEntry {
          id: snapshot.id.clone(),
          amount: value_cents(&snapshot.data, fields::AMOUNT).unwrap_or(0),
          created_at: snapshot.data.get(fields::CREATED_AT).and_then(parse_timestamp),
          kind: ActivityKind::TopUp {
            method: value_str(&snapshot.data, fields::METHOD),
          },
        }),
    );

    feed.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
    Ok(feed)
  }
}

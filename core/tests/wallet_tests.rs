// tests/wallet_tests.rs
mod common;

use common::*;
use larder::store::collections;
use larder::{ActivityKind, LarderError, Wallet};
use serde_json::json;
use serial_test::serial;
use std::time::Duration;

fn wallet_for(harness: &Harness) -> Wallet {
  Wallet::new(harness.store.clone(), harness.clock.clone())
}

#[tokio::test]
#[serial]
async fn test_top_up_credits_wallet_and_records_transaction() {
  setup_tracing();
  let harness = Harness::new();
  harness.seed_user(USER, 2_500);
  let wallet = wallet_for(&harness);

  assert_eq!(wallet.top_up(USER, 10_000).await.unwrap(), 12_500);
  assert_eq!(wallet.balance(USER).await.unwrap(), 12_500);

  let records = harness.store.documents(collections::TRANSACTIONS);
  assert_eq!(records.len(), 1);
  let record = &records[0].data;
  assert_eq!(record["userId"], USER);
  assert_eq!(record["type"], "topup");
  assert_eq!(record["amount"], 10_000);
  assert_eq!(record["method"], "wallet");
  assert!(record.contains_key("createdAt"));
}

#[tokio::test]
#[serial]
async fn test_top_up_rejects_bad_amounts_and_unknown_users() {
  setup_tracing();
  let harness = Harness::new();
  harness.seed_user(USER, 0);
  let wallet = wallet_for(&harness);

  for amount in [0, -500] {
    assert!(matches!(
      wallet.top_up(USER, amount).await,
      Err(LarderError::InvalidAmount { amount: a }) if a == amount
    ));
  }
  assert!(matches!(
    wallet.top_up("ghost", 100).await,
    Err(LarderError::UserNotFound { .. })
  ));
  assert!(matches!(wallet.balance("ghost").await, Err(LarderError::UserNotFound { .. })));
  assert!(harness.store.writes().is_empty());
}

#[tokio::test]
#[serial]
async fn test_top_up_that_would_overflow_the_balance_is_rejected() {
  setup_tracing();
  let harness = Harness::new();
  harness.seed_user(USER, 100);
  let wallet = wallet_for(&harness);

  assert!(matches!(
    wallet.top_up(USER, i64::MAX).await,
    Err(LarderError::InvalidAmount { amount: i64::MAX })
  ));
  assert_eq!(wallet.balance(USER).await.unwrap(), 100);
  assert!(harness.store.writes().is_empty());
  assert!(harness.store.documents(collections::TRANSACTIONS).is_empty());
}

#[tokio::test(start_paused = true)]
#[serial]
async fn test_activity_merges_orders_and_top_ups_newest_first() {
  setup_tracing();
  let harness = Harness::new();
  harness.seed_user(USER, 0);
  let wallet = wallet_for(&harness);

  harness.seed_order("older-order", "completed", harness.ago(3600));
  tokio::time::sleep(Duration::from_secs(10)).await;
  wallet.top_up(USER, 5_000).await.unwrap();
  tokio::time::sleep(Duration::from_secs(10)).await;
  harness.seed_order("newer-order", "pending", harness.now());
  harness.store.seed(
    collections::TRANSACTIONS,
    "refund-1",
    json!({ "userId": USER, "type": "refund", "amount": 100, "createdAt": harness.now().timestamp_millis() }),
  );

  let feed = wallet.activity(USER).await.unwrap();
  let ids: Vec<&str> = feed.iter().map(|e| e.id.as_str()).collect();
  assert_eq!(ids.len(), 3);
  assert_eq!(ids[0], "newer-order");
  assert_eq!(ids[2], "older-order");
  assert!(matches!(feed[1].kind, ActivityKind::TopUp { ref method } if method.as_deref() == Some("wallet")));
  assert_eq!(feed[1].amount, 5_000);
  assert!(matches!(feed[0].kind, ActivityKind::Order { ref status, .. } if status == "pending"));
}

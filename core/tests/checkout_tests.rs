// tests/checkout_tests.rs
mod common;

use common::*;
use larder::store::collections;
use larder::{Checkout, CheckoutRequest, LarderError, MemoryStore, User, Wallet};
use serde_json::json;
use serial_test::serial;

fn checkout_for(harness: &Harness) -> Checkout {
  Checkout::new(harness.store.clone(), harness.ledger.clone(), harness.clock.clone()).unwrap()
}

fn pad_thai_and_tea() -> CheckoutRequest {
  CheckoutRequest::new(SHOP).item("pad-thai", 2).item("iced-tea", 1).item("mango", 0)
}

#[tokio::test]
#[serial]
async fn test_checkout_debits_numbers_and_creates_the_order() {
  setup_tracing();
  let harness = Harness::new();
  harness.seed_user(USER, 20_000);
  harness.seed_shop(SHOP);
  let checkout = checkout_for(&harness);

  let receipt = checkout.place_order(&User::new(USER), pad_thai_and_tea()).await.unwrap();

  assert_eq!(receipt.total, 2 * 6000 + 2500);
  assert_eq!(receipt.order_number, "#001");
  assert_eq!(receipt.shop_order_number, 1);
  assert_eq!(receipt.balance_after, 20_000 - 14_500);

  let order = harness.store.document(collections::ORDERS, &receipt.order_id).unwrap();
  assert_eq!(order["userId"], USER);
  assert_eq!(order["shopId"], SHOP);
  assert_eq!(order["items"], json!({ "pad-thai": 2, "iced-tea": 1 }));
  assert_eq!(order["total"], 14_500);
  assert_eq!(order["status"], "pending");
  assert_eq!(order["orderNumber"], "#001");
  assert_eq!(order["shopOrderNumber"], 1);
  assert!(order.contains_key("createdAt"));

  let user = harness.store.document(collections::USERS, USER).unwrap();
  assert_eq!(user["wallet"], 5_500);
  assert_eq!(user["email"], "user-1@example.com");
  let counter = harness.store.document(collections::SHOP_ORDER_COUNTERS, SHOP).unwrap();
  assert_eq!(counter["lastOrderNumber"], 1);

  let ledger = harness.ledger_entries().await;
  assert_eq!(ledger.len(), 1);
  assert_eq!(ledger[0].order_id, receipt.order_id);
  assert_eq!(ledger[0].order_number.as_deref(), Some("#001"));
  assert_eq!(ledger[0].accepted_at, None);
}

#[tokio::test]
#[serial]
async fn test_insufficient_funds_writes_nothing() {
  setup_tracing();
  let harness = Harness::new();
  harness.seed_user(USER, 1_000);
  harness.seed_shop(SHOP);
  let checkout = checkout_for(&harness);

  let err = checkout.place_order(&User::new(USER), pad_thai_and_tea()).await.unwrap_err();

  match err {
    LarderError::InsufficientFunds { balance, total } => {
      assert_eq!(balance, 1_000);
      assert_eq!(total, 14_500);
    }
    other => panic!("expected InsufficientFunds, got {other:?}"),
  }
  assert!(harness.store.writes().is_empty());
  assert!(harness.store.documents(collections::ORDERS).is_empty());
  assert!(harness.ledger_entries().await.is_empty());
  assert_eq!(harness.store.document(collections::USERS, USER).unwrap()["wallet"], 1_000);
}

#[tokio::test]
#[serial]
async fn test_missing_user_record_aborts_before_any_write() {
  setup_tracing();
  let harness = Harness::new();
  harness.seed_shop(SHOP);
  let checkout = checkout_for(&harness);

  let err = checkout.place_order(&User::new("ghost"), pad_thai_and_tea()).await.unwrap_err();

  assert!(matches!(err, LarderError::UserNotFound { ref user_id } if user_id == "ghost"));
  assert!(harness.store.writes().is_empty());
}

#[tokio::test]
#[serial]
async fn test_cart_validation_and_pricing_errors() {
  setup_tracing();
  let harness = Harness::new();
  harness.seed_user(USER, 100_000);
  harness.seed_shop(SHOP);
  let checkout = checkout_for(&harness);
  let user = User::new(USER);

  let empty = CheckoutRequest::new(SHOP).item("pad-thai", 0);
  assert!(matches!(checkout.place_order(&user, empty).await, Err(LarderError::EmptyCart)));

  let negative = CheckoutRequest::new(SHOP).item("pad-thai", -1);
  assert!(matches!(
    checkout.place_order(&user, negative).await,
    Err(LarderError::InvalidQuantity { quantity: -1, .. })
  ));

  let off_menu = CheckoutRequest::new(SHOP).item("durian", 1);
  assert!(matches!(
    checkout.place_order(&user, off_menu).await,
    Err(LarderError::UnknownMenuItem { ref item_id, .. }) if item_id == "durian"
  ));

  let no_shop = CheckoutRequest::new("closed-shop").item("pad-thai", 1);
  assert!(matches!(
    checkout.place_order(&user, no_shop).await,
    Err(LarderError::ShopNotFound { .. })
  ));

  assert!(harness.store.writes().is_empty());
}

#[tokio::test]
#[serial]
async fn test_each_checkout_prices_against_the_live_menu() {
  setup_tracing();
  let harness = Harness::new();
  harness.seed_user(USER, 100_000);
  let checkout = checkout_for(&harness);
  let user = User::new(USER);

  // The shop opens after the first attempt.
  let early = CheckoutRequest::new(SHOP).item("pad-thai", 1);
  assert!(matches!(
    checkout.place_order(&user, early).await,
    Err(LarderError::ShopNotFound { .. })
  ));
  harness.seed_shop(SHOP);

  let first = checkout
    .place_order(&user, CheckoutRequest::new(SHOP).item("pad-thai", 1))
    .await
    .unwrap();
  assert_eq!(first.total, 6000);

  harness.store.seed(
    collections::SHOPS,
    SHOP,
    json!({
      "name": "Noodle Bar",
      "menu": [{ "id": "pad-thai", "name": "Pad Thai", "price": 7500 }]
    }),
  );
  let second = checkout
    .place_order(&user, CheckoutRequest::new(SHOP).item("pad-thai", 1))
    .await
    .unwrap();
  assert_eq!(second.total, 7500);
  assert_eq!(second.balance_after, 100_000 - 6000 - 7500);
  let order = harness.store.document(collections::ORDERS, &second.order_id).unwrap();
  assert_eq!(order["total"], 7500);
}

#[tokio::test]
#[serial]
async fn test_concurrent_checkouts_get_distinct_increasing_numbers() {
  setup_tracing();
  let harness = Harness::new();
  harness.seed_user(USER, 1_000_000);
  harness.seed_user("user-2", 1_000_000);
  harness.seed_shop(SHOP);
  let first = checkout_for(&harness);
  let second = checkout_for(&harness);

  let one = User::new(USER);
  let two = User::new("user-2");
  let (a, b) = tokio::join!(
    first.place_order(&one, CheckoutRequest::new(SHOP).item("pad-thai", 1)),
    second.place_order(&two, CheckoutRequest::new(SHOP).item("iced-tea", 1)),
  );
  let (a, b) = (a.unwrap(), b.unwrap());

  let mut numbers = vec![a.shop_order_number, b.shop_order_number];
  numbers.sort();
  assert_eq!(numbers, vec![1, 2]);
  let counter = harness.store.document(collections::SHOP_ORDER_COUNTERS, SHOP).unwrap();
  assert_eq!(counter["lastOrderNumber"], 2);

  let third = first
    .place_order(&one, CheckoutRequest::new(SHOP).item("mango", 1))
    .await
    .unwrap();
  assert_eq!(third.order_number, "#003");
  assert_eq!(harness.store.documents(collections::ORDERS).len(), 3);
}

#[tokio::test]
#[serial]
async fn test_conflict_after_exhausted_retries_is_retryable_and_leaves_no_partial_state() {
  setup_tracing();
  let harness = Harness::with_store(MemoryStore::with_max_attempts(1));
  harness.seed_user(USER, 1_000_000);
  harness.seed_user("user-2", 1_000_000);
  harness.seed_shop(SHOP);
  let first = checkout_for(&harness);
  let second = checkout_for(&harness);

  let one = User::new(USER);
  let two = User::new("user-2");
  let (a, b) = tokio::join!(
    first.place_order(&one, CheckoutRequest::new(SHOP).item("pad-thai", 1)),
    second.place_order(&two, CheckoutRequest::new(SHOP).item("pad-thai", 1)),
  );

  let (winner, err, loser) = match (a, b) {
    (Ok(receipt), Err(err)) => (receipt, err, "user-2"),
    (Err(err), Ok(receipt)) => (receipt, err, USER),
    other => panic!("expected exactly one conflict, got {other:?}"),
  };
  assert!(matches!(err, LarderError::TransactionConflict { attempts: 1 }));
  assert!(err.is_retryable());

  assert_eq!(winner.shop_order_number, 1);
  assert_eq!(harness.store.documents(collections::ORDERS).len(), 1);
  assert_eq!(harness.store.document(collections::USERS, loser).unwrap()["wallet"], 1_000_000);
  assert_eq!(harness.ledger_ids().await, vec![winner.order_id]);
}

#[tokio::test]
#[serial]
async fn test_wallet_reflects_checkout_and_top_up() {
  setup_tracing();
  let harness = Harness::new();
  harness.seed_user(USER, 10_000);
  harness.seed_shop(SHOP);
  let checkout = checkout_for(&harness);
  let wallet = Wallet::new(harness.store.clone(), harness.clock.clone());

  checkout
    .place_order(&User::new(USER), CheckoutRequest::new(SHOP).item("pad-thai", 1))
    .await
    .unwrap();
  assert_eq!(wallet.balance(USER).await.unwrap(), 4_000);

  let after = wallet.top_up(USER, 5_000).await.unwrap();
  assert_eq!(after, 9_000);
  assert_eq!(wallet.balance(USER).await.unwrap(), 9_000);
}

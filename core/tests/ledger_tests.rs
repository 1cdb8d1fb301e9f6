// tests/ledger_tests.rs
mod common;
use common::*;
use marketplace::models::{BankDetails, LedgerEntryKind, PayoutRequest, PayoutStatus, VendorGroup, VendorSelector};
use marketplace::store::{collections, DocumentStore};
use marketplace::{MarketConfig, MarketError, Marketplace, OverallStatusPolicy};
use rust_decimal::Decimal;
use serde_json::json;
use serial_test::serial;
use std::sync::Arc;

/// v1 with 900 available after one delivered order of 1000 at 10%.
async fn funded_vendor(market: &Marketplace, store: &dyn DocumentStore) {
  seed_vendor(store, "v1", "Himalayan Weaves", None).await;
  let order = market
    .orders()
    .create_order(checkout("cust-1", &[("v1", "p1", "1000", 1)]))
    .await
    .unwrap();
  market
    .lifecycle()
    .update_order_status(&order.id, "delivered", Some("v1"))
    .await
    .unwrap();
}

fn payout_debits(entries: &[marketplace::models::LedgerEntry]) -> usize {
  entries.iter().filter(|e| e.kind == LedgerEntryKind::PayoutDebit).count()
}

#[tokio::test]
#[serial]
async fn test_payout_debits_available_balance_and_records_ledger() {
  let (market, _events, store) = memory_market();
  seed_vendor(store.as_ref(), "v1", "Himalayan Weaves", None).await;
  let order = market
    .orders()
    .create_order(checkout("cust-1", &[("v1", "p1", "1000", 1)]))
    .await
    .unwrap();
  market
    .lifecycle()
    .update_order_status(&order.id, "delivered", Some("v1"))
    .await
    .unwrap();

  let request = PayoutRequest {
    bank_details: Some(BankDetails {
      account_name: Some("Himalayan Weaves Pvt".to_string()),
      account_number: Some("0012-3344".to_string()),
      ..BankDetails::default()
    }),
    note: Some("weekly".to_string()),
  };
  let payout = market
    .ledger()
    .process_vendor_payout("v1", dec("900"), request)
    .await
    .unwrap();
  assert_eq!(payout.status, PayoutStatus::Pending);
  assert_eq!(payout.amount, dec("900"));
  assert_eq!(payout.bank_details.account_number.as_deref(), Some("0012-3344"));

  let vendor = market.vendors().get_vendor("v1").await.unwrap();
  assert_eq!(vendor.available_balance, Decimal::ZERO);
  assert_eq!(vendor.total_earnings, dec("900"));

  let overdraw = market
    .ledger()
    .process_vendor_payout("v1", dec("0.01"), PayoutRequest::default())
    .await;
  match overdraw {
    Err(MarketError::InsufficientBalance { requested, available }) => {
      assert_eq!(requested, dec("0.01"));
      assert_eq!(available, Decimal::ZERO);
    }
    other => panic!("expected InsufficientBalance, got {other:?}"),
  }

  let payouts = market.ledger().list_payouts("v1").await.unwrap();
  assert_eq!(payouts.len(), 1);
  let entries = market.ledger().list_ledger_entries("v1").await.unwrap();
  let kinds: Vec<LedgerEntryKind> = entries.iter().map(|e| e.kind).collect();
  assert_eq!(kinds, vec![LedgerEntryKind::DeliveryCredit, LedgerEntryKind::PayoutDebit]);

  let report = market.ledger().reconcile_vendor_balances("v1").await.unwrap();
  assert!(!report.has_drift(), "{report:?}");
  assert_eq!(report.ledger_available_balance, Decimal::ZERO);
  assert_eq!(report.ledger_total_sales, dec("1000"));
}

#[tokio::test]
#[serial]
async fn test_payout_amount_validation() {
  let (market, _events, store) = memory_market();
  seed_vendor(store.as_ref(), "v1", "Himalayan Weaves", None).await;

  for amount in ["0", "-5", "10.005"] {
    let result = market
      .ledger()
      .process_vendor_payout("v1", dec(amount), PayoutRequest::default())
      .await;
    assert!(matches!(result, Err(MarketError::Validation(_))), "amount {amount}");
  }
  let unknown = market
    .ledger()
    .process_vendor_payout("ghost", dec("1"), PayoutRequest::default())
    .await;
  assert!(matches!(unknown, Err(MarketError::NotFound { entity: "vendor", .. })));
  assert_eq!(store.count(collections::PAYOUTS), 0);
}

#[tokio::test]
#[serial]
async fn test_vendor_specific_commission_rate_applies() {
  let (market, _events, store) = memory_market();
  seed_vendor(store.as_ref(), "v1", "Himalayan Weaves", Some(dec("12.5"))).await;
  let order = market
    .orders()
    .create_order(checkout("cust-1", &[("v1", "p1", "333.33", 1)]))
    .await
    .unwrap();
  let delivered = market
    .lifecycle()
    .update_order_status(&order.id, "delivered", Some("v1"))
    .await
    .unwrap();
  let settlement = delivered.vendor_order("v1").unwrap().settlement.clone().unwrap();
  assert_eq!(settlement.fee, dec("41.67"));
  assert_eq!(settlement.net, dec("291.66"));
  assert_eq!(settlement.fee + settlement.net, settlement.gross);

  let rejected = market.vendors().set_commission_rate("v1", Some(dec("101"))).await;
  assert!(matches!(rejected, Err(MarketError::Validation(_))));
  let reset = market.vendors().set_commission_rate("v1", None).await.unwrap();
  assert_eq!(reset.commission_rate, None);
}

#[tokio::test]
#[serial]
async fn test_stats_across_a_vendor_group() {
  let (market, _events, store) = memory_market();
  seed_vendor(store.as_ref(), "v1", "Weaves North", None).await;
  seed_vendor(store.as_ref(), "v2", "Weaves South", None).await;
  seed_product(store.as_ref(), "p1", "v1", "Shawl").await;
  seed_product(store.as_ref(), "p2", "v2", "Rug").await;
  store
    .update(collections::PRODUCTS, "p1", json!({ "status": "approved" }))
    .await
    .unwrap();
  store
    .update(collections::VENDORS, "v1", json!({ "rating": 4.0, "reviewCount": 2, "totalSales": 100 }))
    .await
    .unwrap();
  store
    .update(collections::VENDORS, "v2", json!({ "rating": 3.0, "reviewCount": 5, "totalSales": 50 }))
    .await
    .unwrap();

  let group = market
    .ledger()
    .put_vendor_group(VendorGroup {
      id: "weaves".to_string(),
      name: "Weaves".to_string(),
      vendor_ids: vec!["v1".to_string(), "v2".to_string(), "v1".to_string()],
    })
    .await
    .unwrap();
  assert_eq!(group.vendor_ids, vec!["v1".to_string(), "v2".to_string()]);

  let stats = market
    .ledger()
    .get_vendor_stats(&VendorSelector::Group("weaves".to_string()))
    .await
    .unwrap();
  assert_eq!(stats.total_sales, dec("150"));
  assert_eq!(stats.rating, 3.0);
  assert_eq!(stats.review_count, 7);
  assert_eq!(stats.total_products, 2);
  assert_eq!(stats.active_products, 1);

  let bad_group = market
    .ledger()
    .put_vendor_group(VendorGroup {
      id: "broken".to_string(),
      name: "Broken".to_string(),
      vendor_ids: vec!["ghost".to_string()],
    })
    .await;
  assert!(matches!(bad_group, Err(MarketError::Validation(_))));
  let empty = market.ledger().get_vendor_stats(&VendorSelector::Vendors(vec![])).await;
  assert!(matches!(empty, Err(MarketError::Validation(_))));
}

#[tokio::test]
#[serial]
async fn test_payout_retries_after_losing_vendor_write_race() {
  let store = Arc::new(FaultyStore::new());
  let (market, _events) = market_with(store.clone(), OverallStatusPolicy::Manual);
  funded_vendor(&market, store.as_ref()).await;
  let before = market.vendors().get_vendor("v1").await.unwrap();
  store.race(collections::VENDORS, "v1", 1);

  let payout = market
    .ledger()
    .process_vendor_payout("v1", dec("400"), PayoutRequest::default())
    .await
    .unwrap();
  assert_eq!(payout.amount, dec("400"));
  assert!(store.race_once.lock().is_empty());

  let vendor = market.vendors().get_vendor("v1").await.unwrap();
  assert_eq!(vendor.available_balance, dec("500"));
  assert_eq!(vendor.total_earnings, dec("900"));
  // The competing writer and the payout each bumped the revision once.
  assert_eq!(vendor.revision, before.revision + 2);

  let entries = market.ledger().list_ledger_entries("v1").await.unwrap();
  assert_eq!(payout_debits(&entries), 1);
  assert_eq!(market.ledger().list_payouts("v1").await.unwrap().len(), 1);
  let report = market.ledger().reconcile_vendor_balances("v1").await.unwrap();
  assert!(!report.has_drift(), "{report:?}");
}

#[tokio::test]
#[serial]
async fn test_payout_gives_up_with_conflict_when_races_persist() {
  let store = Arc::new(FaultyStore::new());
  let config = MarketConfig {
    cas_max_attempts: 2,
    ..MarketConfig::default()
  };
  let (market, _events) = market_with_config(store.clone(), config);
  funded_vendor(&market, store.as_ref()).await;
  store.race(collections::VENDORS, "v1", 2);

  let result = market
    .ledger()
    .process_vendor_payout("v1", dec("400"), PayoutRequest::default())
    .await;
  match result {
    Err(MarketError::Conflict { subject, attempts }) => {
      assert_eq!(subject, "v1");
      assert_eq!(attempts, 2);
    }
    other => panic!("expected Conflict, got {other:?}"),
  }

  let vendor = market.vendors().get_vendor("v1").await.unwrap();
  assert_eq!(vendor.available_balance, dec("900"));
  assert!(market.ledger().list_payouts("v1").await.unwrap().is_empty());
  let entries = market.ledger().list_ledger_entries("v1").await.unwrap();
  assert_eq!(payout_debits(&entries), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn test_concurrent_payouts_never_overdraw() {
  let store = Arc::new(marketplace::MemoryStore::new());
  // Every lost race implies another payout committed, so 20 attempts cover 20 callers.
  let config = MarketConfig {
    cas_max_attempts: 20,
    ..MarketConfig::default()
  };
  let (market, _events) = market_with_config(store.clone(), config);
  funded_vendor(&market, store.as_ref()).await;

  let handles: Vec<_> = (0..20)
    .map(|_| {
      let ledger = market.ledger();
      tokio::spawn(async move { ledger.process_vendor_payout("v1", dec("100"), PayoutRequest::default()).await })
    })
    .collect();

  let (mut paid, mut refused) = (0, 0);
  for handle in handles {
    match handle.await.unwrap() {
      Ok(_) => paid += 1,
      Err(MarketError::InsufficientBalance { .. }) => refused += 1,
      Err(other) => panic!("unexpected payout failure: {other}"),
    }
  }
  assert_eq!((paid, refused), (9, 11));

  let vendor = market.vendors().get_vendor("v1").await.unwrap();
  assert_eq!(vendor.available_balance, Decimal::ZERO);
  let entries = market.ledger().list_ledger_entries("v1").await.unwrap();
  assert_eq!(payout_debits(&entries), 9);
  let report = market.ledger().reconcile_vendor_balances("v1").await.unwrap();
  assert!(!report.has_drift(), "{report:?}");
}

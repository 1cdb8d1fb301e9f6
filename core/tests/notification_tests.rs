// tests/notification_tests.rs
mod common;
use common::*;
use marketplace::models::{NewNotification, NotificationKind, VendorRegistration, VendorStatus};
use marketplace::store::collections;
use marketplace::{MarketError, OverallStatusPolicy};
use serial_test::serial;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn kinds(list: &[marketplace::models::Notification]) -> Vec<NotificationKind> {
  list.iter().map(|n| n.kind).collect()
}

#[tokio::test]
#[serial]
async fn test_order_placed_notifies_customer_vendors_and_admins() {
  let (market, mut events, store) = memory_market();
  seed_user(store.as_ref(), "admin-1", "admin").await;
  seed_user(store.as_ref(), "cust-1", "customer").await;
  seed_vendor(store.as_ref(), "v1", "Himalayan Weaves", None).await;
  seed_vendor(store.as_ref(), "v2", "Terai Tea House", None).await;

  let order = market
    .orders()
    .create_order(checkout("cust-1", &[("v1", "p1", "500", 1), ("v2", "p2", "700", 1)]))
    .await
    .unwrap();

  let dispatcher = market.dispatcher();
  let mut written = 0;
  for domain_event in events.drain() {
    written += dispatcher.handle(&domain_event).await;
  }
  assert_eq!(written, 4);

  let inbox = market.notifications();
  let customer = inbox.list_for_user("cust-1", false).await.unwrap();
  assert_eq!(kinds(&customer), vec![NotificationKind::OrderPlaced]);
  assert!(customer[0].message.contains(&order.order_number));
  assert_eq!(customer[0].link.as_deref(), Some(format!("/orders/{}", order.id).as_str()));
  assert!(!customer[0].read);

  let vendor = inbox.list_for_user("v2", false).await.unwrap();
  assert_eq!(kinds(&vendor), vec![NotificationKind::VendorNewOrder]);
  assert!(vendor[0].message.contains("700"));
  assert_eq!(
    kinds(&inbox.list_for_user("admin-1", false).await.unwrap()),
    vec![NotificationKind::AdminNewOrder]
  );
}

#[tokio::test]
#[serial]
async fn test_only_customer_facing_transitions_notify() {
  let (market, mut events, store) = memory_market();
  seed_vendor(store.as_ref(), "v1", "Himalayan Weaves", None).await;
  let order = market
    .orders()
    .create_order(checkout("cust-1", &[("v1", "p1", "500", 1)]))
    .await
    .unwrap();
  events.drain();

  let lifecycle = market.lifecycle();
  lifecycle.update_order_status(&order.id, "confirmed", Some("v1")).await.unwrap();
  lifecycle.update_order_status(&order.id, "shipped", Some("v1")).await.unwrap();
  lifecycle.update_order_status(&order.id, "delivered", Some("v1")).await.unwrap();

  let dispatcher = market.dispatcher();
  for domain_event in events.drain() {
    dispatcher.handle(&domain_event).await;
  }
  let mut received = kinds(&market.notifications().list_for_user("cust-1", false).await.unwrap());
  received.sort_by_key(|k| format!("{k:?}"));
  assert_eq!(received, vec![NotificationKind::OrderDelivered, NotificationKind::OrderShipped]);
}

#[tokio::test]
#[serial]
async fn test_notification_failures_never_reach_the_caller() {
  let store = Arc::new(FaultyStore::new());
  let (market, mut events) = market_with(store.clone(), OverallStatusPolicy::Manual);
  seed_vendor(store.as_ref(), "v1", "Himalayan Weaves", None).await;
  *store.fail_batches_on.lock() = Some(collections::NOTIFICATIONS.to_string());

  let order = market
    .orders()
    .create_order(checkout("cust-1", &[("v1", "p1", "500", 1)]))
    .await
    .unwrap();
  assert_eq!(store.inner.count(collections::ORDERS), 1);

  let dispatcher = market.dispatcher();
  for domain_event in events.drain() {
    assert_eq!(dispatcher.handle(&domain_event).await, 0);
  }
  assert_eq!(store.inner.count(collections::NOTIFICATIONS), 0);
  assert_eq!(market.orders().get_order(&order.id).await.unwrap().id, order.id);
}

#[tokio::test]
#[serial]
async fn test_vendor_events_reach_owner_and_admins() {
  let (market, mut events, store) = memory_market();
  seed_user(store.as_ref(), "admin-1", "admin").await;
  seed_user(store.as_ref(), "u-42", "customer").await;

  let vendor = market
    .vendors()
    .register_vendor(VendorRegistration {
      user_id: "u-42".to_string(),
      business_name: "Lakeside Pottery".to_string(),
      ..VendorRegistration::default()
    })
    .await
    .unwrap();
  assert_eq!(vendor.status, VendorStatus::Pending);
  market
    .vendors()
    .update_vendor_status(&vendor.id, VendorStatus::Approved)
    .await
    .unwrap();

  let dispatcher = market.dispatcher();
  for domain_event in events.drain() {
    dispatcher.handle(&domain_event).await;
  }
  let inbox = market.notifications();
  assert_eq!(
    kinds(&inbox.list_for_user("admin-1", false).await.unwrap()),
    vec![NotificationKind::AdminNewVendor]
  );
  assert_eq!(
    kinds(&inbox.list_for_user("u-42", false).await.unwrap()),
    vec![NotificationKind::VendorActivated]
  );
}

#[tokio::test]
#[serial]
async fn test_inbox_read_and_delete() {
  let (market, _events, _store) = memory_market();
  let inbox = market.notifications();
  for title in ["one", "two", "three"] {
    inbox
      .create(NewNotification {
        user_id: "cust-1".to_string(),
        kind: NotificationKind::OrderPlaced,
        title: title.to_string(),
        message: format!("message {title}"),
        link: None,
      })
      .await
      .unwrap();
  }
  let all = inbox.list_for_user("cust-1", false).await.unwrap();
  assert_eq!(all.len(), 3);

  inbox.mark_read(&all[0].id).await.unwrap();
  assert_eq!(inbox.list_for_user("cust-1", true).await.unwrap().len(), 2);
  assert_eq!(inbox.mark_all_read("cust-1").await.unwrap(), 2);
  assert!(inbox.list_for_user("cust-1", true).await.unwrap().is_empty());

  inbox.delete(&all[1].id).await.unwrap();
  assert!(matches!(inbox.delete(&all[1].id).await, Err(MarketError::NotFound { .. })));
  assert_eq!(inbox.delete_all("cust-1").await.unwrap(), 2);
  assert!(inbox.list_for_user("cust-1", false).await.unwrap().is_empty());
}

#[tokio::test]
#[serial]
async fn test_dispatcher_loop_drains_on_shutdown() {
  let (market, events, store) = memory_market();
  seed_vendor(store.as_ref(), "v1", "Himalayan Weaves", None).await;
  let shutdown = CancellationToken::new();
  let handle = market.dispatcher().spawn(events, shutdown.clone());

  market
    .orders()
    .create_order(checkout("cust-1", &[("v1", "p1", "500", 1)]))
    .await
    .unwrap();
  tokio::time::sleep(Duration::from_millis(20)).await;
  shutdown.cancel();
  tokio::time::timeout(Duration::from_secs(2), handle)
    .await
    .expect("dispatcher did not stop")
    .unwrap();

  assert_eq!(store.count(collections::NOTIFICATIONS), 2);
}

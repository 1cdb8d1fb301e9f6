// tests/review_tests.rs
mod common;
use common::*;
use marketplace::models::{Product, ReviewInput, ReviewStatus, ReviewSubject, Vendor};
use marketplace::services::moderation::{
  REASON_FIRST_TIME_REVIEWER, REASON_FLAGGED_CONTENT, REASON_LOW_RATING, REASON_MODERATION_UNAVAILABLE,
};
use marketplace::store::{collections, fetch, DocumentStore, WriteOp};
use marketplace::{MarketError, Marketplace, MemoryStore, OverallStatusPolicy};
use serde_json::{json, Value};
use serial_test::serial;
use std::sync::Arc;

fn product_review(customer: &str, product: &str, rating: i64, comment: &str) -> ReviewInput {
  ReviewInput {
    product_id: Some(product.to_string()),
    customer_id: Some(customer.to_string()),
    customer_name: Some("Asha".to_string()),
    rating,
    title: Some("My thoughts".to_string()),
    comment: Some(comment.to_string()),
    ..ReviewInput::default()
  }
}

fn store_review(customer: &str, vendor: &str, rating: i64) -> ReviewInput {
  ReviewInput {
    vendor_id: Some(vendor.to_string()),
    customer_id: Some(customer.to_string()),
    rating,
    comment: Some("Quick replies, careful packing".to_string()),
    ..ReviewInput::default()
  }
}

async fn seeded() -> (Marketplace, Arc<MemoryStore>) {
  let (market, _events, store) = memory_market();
  seed_vendor(store.as_ref(), "v1", "Himalayan Weaves", None).await;
  seed_product(store.as_ref(), "p1", "v1", "Pashmina Shawl").await;
  (market, store)
}

/// Gets `customer` past the first-review gate.
async fn approved_reviewer(market: &Marketplace, customer: &str) {
  let first = market
    .reviews()
    .submit_review(product_review(customer, "p1", 5, "Soft and warm"))
    .await
    .unwrap();
  market
    .reviews()
    .update_review_status(&first.id, ReviewStatus::Approved, None)
    .await
    .unwrap();
}

#[tokio::test]
#[serial]
async fn test_moderation_rules_apply_in_order() {
  let (market, _store) = seeded().await;
  let reviews = market.reviews();

  let first = reviews
    .submit_review(product_review("cust-1", "p1", 5, "Soft and warm"))
    .await
    .unwrap();
  assert_eq!(first.status, ReviewStatus::Pending);
  assert_eq!(first.moderation_reason.as_deref(), Some(REASON_FIRST_TIME_REVIEWER));
  assert_eq!(first.vendor_id, "v1");

  reviews
    .update_review_status(&first.id, ReviewStatus::Approved, None)
    .await
    .unwrap();

  let low = reviews.submit_review(product_review("cust-1", "p1", 2, "Faded")).await.unwrap();
  assert_eq!(low.moderation_reason.as_deref(), Some(REASON_LOW_RATING));

  let flagged = reviews
    .submit_review(product_review("cust-1", "p1", 5, "Honestly a SCAM"))
    .await
    .unwrap();
  assert_eq!(flagged.moderation_reason.as_deref(), Some(REASON_FLAGGED_CONTENT));

  let fine = reviews
    .submit_review(product_review("cust-1", "p1", 4, "Lovely colours"))
    .await
    .unwrap();
  assert_eq!(fine.status, ReviewStatus::Approved);
  assert_eq!(fine.moderation_reason, None);
}

#[tokio::test]
#[serial]
async fn test_approved_reviews_drive_aggregates() {
  let (market, store) = seeded().await;
  approved_reviewer(&market, "cust-1").await;
  market
    .reviews()
    .submit_review(product_review("cust-1", "p1", 4, "Lovely colours"))
    .await
    .unwrap();
  market
    .reviews()
    .submit_review(product_review("cust-1", "p1", 1, "Unraveled"))
    .await
    .unwrap();
  market.settle().await;

  let product: Product = fetch(store.as_ref(), collections::PRODUCTS, "product", "p1").await.unwrap();
  assert_eq!(product.rating, 4.5);
  assert_eq!(product.review_count, 2);
  let vendor: Vendor = fetch(store.as_ref(), collections::VENDORS, "vendor", "v1").await.unwrap();
  assert_eq!(vendor.rating, 4.5);
  assert_eq!(vendor.review_count, 2);
  // Aggregate refreshes leave the balance guard alone.
  assert_eq!(vendor.revision, 1);
}

#[tokio::test]
#[serial]
async fn test_vendor_reply_forces_approval() {
  let (market, store) = seeded().await;
  let pending = market
    .reviews()
    .submit_review(product_review("cust-7", "p1", 3, "Took a while"))
    .await
    .unwrap();
  assert_eq!(pending.status, ReviewStatus::Pending);

  let replied = market
    .reviews()
    .reply_to_review(&pending.id, "Sorry for the delay, we have a new courier now.")
    .await
    .unwrap();
  assert_eq!(replied.status, ReviewStatus::Approved);
  assert_eq!(replied.moderation_reason, None);
  assert!(replied.vendor_reply.is_some());
  market.settle().await;

  let product: Product = fetch(store.as_ref(), collections::PRODUCTS, "product", "p1").await.unwrap();
  assert_eq!((product.rating, product.review_count), (3.0, 1));

  let empty = market.reviews().reply_to_review(&pending.id, "   ").await;
  assert!(matches!(empty, Err(MarketError::Validation(_))));
}

#[tokio::test]
#[serial]
async fn test_status_change_and_delete_recompute_aggregates() {
  let (market, store) = seeded().await;
  approved_reviewer(&market, "cust-1").await;
  let second = market
    .reviews()
    .submit_review(product_review("cust-1", "p1", 3, "Decent"))
    .await
    .unwrap();
  market.settle().await;
  let product: Product = fetch(store.as_ref(), collections::PRODUCTS, "product", "p1").await.unwrap();
  assert_eq!((product.rating, product.review_count), (4.0, 2));

  market
    .reviews()
    .update_review_status(&second.id, ReviewStatus::Rejected, Some("off topic".to_string()))
    .await
    .unwrap();
  market.settle().await;
  let product: Product = fetch(store.as_ref(), collections::PRODUCTS, "product", "p1").await.unwrap();
  assert_eq!((product.rating, product.review_count), (5.0, 1));

  let all = market.reviews().list_by_product("p1").await.unwrap();
  market.reviews().delete_review(&all[0].id).await.unwrap();
  market.settle().await;
  let product: Product = fetch(store.as_ref(), collections::PRODUCTS, "product", "p1").await.unwrap();
  assert_eq!((product.rating, product.review_count), (0.0, 0));

  let report = market
    .reviews()
    .reconcile_aggregates(&ReviewSubject {
      product_id: Some("p1".to_string()),
      vendor_id: Some("v1".to_string()),
    })
    .await
    .unwrap();
  assert_eq!(report.0.unwrap().review_count, 0);
}

#[tokio::test]
#[serial]
async fn test_submission_validation() {
  let (market, _store) = seeded().await;
  let reviews = market.reviews();

  let no_subject = ReviewInput {
    customer_id: Some("cust-1".to_string()),
    rating: 4,
    ..ReviewInput::default()
  };
  assert!(matches!(reviews.submit_review(no_subject).await, Err(MarketError::Validation(_))));

  let mut no_customer = product_review("cust-1", "p1", 4, "ok");
  no_customer.customer_id = None;
  assert!(matches!(reviews.submit_review(no_customer).await, Err(MarketError::Validation(_))));

  for rating in [0, 6] {
    let out_of_range = product_review("cust-1", "p1", rating, "ok");
    assert!(matches!(reviews.submit_review(out_of_range).await, Err(MarketError::Validation(_))));
  }

  let mut wrong_vendor = product_review("cust-1", "p1", 4, "ok");
  wrong_vendor.vendor_id = Some("v2".to_string());
  assert!(matches!(reviews.submit_review(wrong_vendor).await, Err(MarketError::Validation(_))));

  let unknown_product = product_review("cust-1", "p404", 4, "ok");
  assert!(matches!(
    reviews.submit_review(unknown_product).await,
    Err(MarketError::NotFound { entity: "product", .. })
  ));
}

#[tokio::test]
#[serial]
async fn test_moderation_failure_holds_review_as_pending() {
  let store = Arc::new(FaultyStore::new());
  let (market, _events) = market_with(store.clone(), OverallStatusPolicy::Manual);
  seed_vendor(store.as_ref(), "v1", "Himalayan Weaves", None).await;
  *store.fail_queries_on.lock() = Some(collections::REVIEWS.to_string());

  let review = market.reviews().submit_review(store_review("cust-1", "v1", 5)).await.unwrap();
  assert_eq!(review.status, ReviewStatus::Pending);
  assert_eq!(review.moderation_reason.as_deref(), Some(REASON_MODERATION_UNAVAILABLE));
  assert_eq!(store.inner.count(collections::REVIEWS), 1);
}

#[tokio::test]
#[serial]
async fn test_public_listings_show_only_approved_reviews() {
  let (market, _store) = seeded().await;
  approved_reviewer(&market, "cust-1").await;
  let store_level = market
    .reviews()
    .submit_review(store_review("cust-1", "v1", 5))
    .await
    .unwrap();
  assert_eq!(store_level.product_id, None);
  market
    .reviews()
    .submit_review(product_review("cust-2", "p1", 5, "First time here"))
    .await
    .unwrap();

  let store_reviews = market.reviews().list_by_store("v1").await.unwrap();
  assert_eq!(store_reviews.len(), 1);
  assert_eq!(store_reviews[0].id, store_level.id);
  assert_eq!(market.reviews().list_by_product("p1").await.unwrap().len(), 1);
  assert_eq!(market.reviews().list_by_vendor("v1").await.unwrap().len(), 3);
  assert_eq!(
    market.reviews().list_all(Some(ReviewStatus::Pending)).await.unwrap().len(),
    1
  );

  let helpful = market.reviews().mark_helpful(&store_level.id).await.unwrap();
  assert_eq!(helpful.helpful_count, 1);
  let helpful = market.reviews().mark_helpful(&store_level.id).await.unwrap();
  assert_eq!(helpful.helpful_count, 2);
}

fn approved_store_review(id: &str, vendor: &str, rating: u8) -> Value {
  json!({
    "id": id,
    "productId": null,
    "vendorId": vendor,
    "customerId": format!("cust-{id}"),
    "rating": rating,
    "status": "approved",
    "moderationReason": null,
    "createdAt": "2024-02-01T00:00:00.000000Z",
    "updatedAt": "2024-02-01T00:00:00.000000Z",
  })
}

#[tokio::test]
#[serial]
async fn test_refresh_overtaken_by_newer_aggregate_recomputes_before_writing() {
  let store = Arc::new(FaultyStore::new());
  let (market, _events) = market_with(store.clone(), OverallStatusPolicy::Manual);
  seed_vendor(store.as_ref(), "v1", "Himalayan Weaves", None).await;
  store
    .atomic_batch(vec![WriteOp::insert(collections::REVIEWS, "r1", approved_store_review("r1", "v1", 5))])
    .await
    .unwrap();

  // A newer review and the refresh it triggered land between this refresh's
  // read and its write.
  store.interleave(
    collections::VENDORS,
    "v1",
    vec![
      WriteOp::insert(collections::REVIEWS, "r2", approved_store_review("r2", "v1", 1)),
      WriteOp::update(
        collections::VENDORS,
        "v1",
        json!({ "rating": 3.0, "reviewCount": 2, "ratingGeneration": 1 }),
      ),
    ],
  );

  let subject = ReviewSubject {
    product_id: None,
    vendor_id: Some("v1".to_string()),
  };
  let (_, vendor_aggregate) = market.reviews().reconcile_aggregates(&subject).await.unwrap();
  let vendor_aggregate = vendor_aggregate.unwrap();
  assert_eq!(vendor_aggregate.review_count, 2);
  assert_eq!(vendor_aggregate.rating, 3.0);
  assert!(store.interleave_once.lock().is_empty());

  let v1: Vendor = fetch(store.as_ref(), collections::VENDORS, "vendor", "v1").await.unwrap();
  assert_eq!(v1.review_count, 2);
  assert_eq!(v1.rating, 3.0);
  let raw = store.get(collections::VENDORS, "v1").await.unwrap().unwrap();
  assert_eq!(raw.body["ratingGeneration"], 2);
  // Balance revision untouched by aggregate writes.
  assert_eq!(v1.revision, 1);
}

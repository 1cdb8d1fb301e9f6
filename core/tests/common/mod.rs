// tests/common/mod.rs
#![allow(dead_code)] // Each test binary uses a different subset.

use async_trait::async_trait;
use marketplace::models::{Address, CheckoutItem, CheckoutRequest};
use marketplace::store::{collections, DocumentStore, Query, StoredDocument, WriteOp};
use marketplace::{EventStream, MarketConfig, Marketplace, MemoryStore, OverallStatusPolicy, StoreError, StoreResult};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::Level;

static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer()
    .try_init()
    .ok();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}

pub fn dec(text: &str) -> Decimal {
  text.parse().unwrap()
}

/// Wraps a [`MemoryStore`] with switchable faults.
#[derive(Default)]
pub struct FaultyStore {
  pub inner: MemoryStore,
  /// Queries against this collection fail.
  pub fail_queries_on: Mutex<Option<String>>,
  /// Batches touching this collection fail.
  pub fail_batches_on: Mutex<Option<String>>,
  /// Before the next batch touching `(collection, key)`, a competing writer
  /// bumps that document's revision. Consumed once per entry.
  pub race_once: Mutex<Vec<(String, String)>>,
  /// Before the next batch touching `(collection, key)`, these writes land
  /// first. Consumed once per entry.
  pub interleave_once: Mutex<Vec<((String, String), Vec<WriteOp>)>>,
}

impl FaultyStore {
  pub fn new() -> Self {
    Self::default()
  }

  fn backend_failure(what: &str) -> StoreError {
    StoreError::Backend(anyhow::anyhow!("injected failure: {what}"))
  }
}

#[async_trait]
impl DocumentStore for FaultyStore {
  async fn get(&self, collection: &str, key: &str) -> StoreResult<Option<StoredDocument>> {
    self.inner.get(collection, key).await
  }

  async fn query(&self, collection: &str, query: &Query) -> StoreResult<Vec<StoredDocument>> {
    if self.fail_queries_on.lock().as_deref() == Some(collection) {
      return Err(Self::backend_failure(collection));
    }
    self.inner.query(collection, query).await
  }

  async fn atomic_batch(&self, ops: Vec<WriteOp>) -> StoreResult<()> {
    if let Some(failing) = self.fail_batches_on.lock().clone() {
      if ops.iter().any(|op| op.target().0 == failing) {
        return Err(Self::backend_failure(&failing));
      }
    }
    let raced = {
      let mut pending = self.race_once.lock();
      let hit = pending
        .iter()
        .position(|(c, k)| ops.iter().any(|op| op.target() == (c.as_str(), k.as_str())));
      hit.map(|idx| pending.remove(idx))
    };
    if let Some((collection, key)) = raced {
      if let Some(doc) = self.inner.get(&collection, &key).await? {
        let revision = doc.body["revision"].as_u64().unwrap_or(0);
        self
          .inner
          .update(&collection, &key, json!({ "revision": revision + 1 }))
          .await?;
      }
    }
    let interleaved = {
      let mut pending = self.interleave_once.lock();
      let hit = pending
        .iter()
        .position(|((c, k), _)| ops.iter().any(|op| op.target() == (c.as_str(), k.as_str())));
      hit.map(|idx| pending.remove(idx).1)
    };
    if let Some(competing) = interleaved {
      self.inner.atomic_batch(competing).await?;
    }
    self.inner.atomic_batch(ops).await
  }
}

pub fn market_with(store: Arc<dyn DocumentStore>, policy: OverallStatusPolicy) -> (Marketplace, EventStream) {
  market_with_config(
    store,
    MarketConfig {
      overall_status_policy: policy,
      ..MarketConfig::default()
    },
  )
}

pub fn market_with_config(store: Arc<dyn DocumentStore>, config: MarketConfig) -> (Marketplace, EventStream) {
  setup_tracing();
  Marketplace::new(store, config).unwrap()
}

impl FaultyStore {
  pub fn interleave(&self, collection: &str, key: &str, competing: Vec<WriteOp>) {
    self
      .interleave_once
      .lock()
      .push(((collection.to_string(), key.to_string()), competing));
  }

  /// Queues `times` competing writes against `(collection, key)`.
  pub fn race(&self, collection: &str, key: &str, times: usize) {
    let mut pending = self.race_once.lock();
    for _ in 0..times {
      pending.push((collection.to_string(), key.to_string()));
    }
  }
}

pub fn memory_market() -> (Marketplace, EventStream, Arc<MemoryStore>) {
  let store = Arc::new(MemoryStore::new());
  let (market, events) = market_with(store.clone(), OverallStatusPolicy::Manual);
  (market, events, store)
}

async fn put(store: &dyn DocumentStore, collection: &str, key: &str, body: Value) {
  store
    .atomic_batch(vec![WriteOp::insert(collection, key, body)])
    .await
    .unwrap();
}

/// An approved vendor owned by the user with the same id.
pub async fn seed_vendor(store: &dyn DocumentStore, id: &str, name: &str, commission_rate: Option<Decimal>) {
  put(
    store,
    collections::VENDORS,
    id,
    json!({
      "id": id,
      "userId": id,
      "businessName": name,
      "email": null,
      "phone": null,
      "address": null,
      "description": null,
      "businessType": null,
      "logo": null,
      "banner": null,
      "status": "approved",
      "commissionRate": commission_rate,
      "revision": 1,
      "createdAt": "2024-01-01T00:00:00.000000Z",
      "updatedAt": "2024-01-01T00:00:00.000000Z",
    }),
  )
  .await;
}

pub async fn seed_user(store: &dyn DocumentStore, id: &str, role: &str) {
  put(
    store,
    collections::USERS,
    id,
    json!({ "id": id, "displayName": id, "email": format!("{id}@example.com"), "role": role }),
  )
  .await;
}

pub async fn seed_product(store: &dyn DocumentStore, id: &str, vendor_id: &str, name: &str) {
  put(
    store,
    collections::PRODUCTS,
    id,
    json!({ "id": id, "vendorId": vendor_id, "name": name, "price": 100, "status": "pending" }),
  )
  .await;
}

/// A checkout for `customer_id` with `(vendor, product, price, quantity)` lines.
pub fn checkout(customer_id: &str, lines: &[(&str, &str, &str, i64)]) -> CheckoutRequest {
  let items: Vec<CheckoutItem> = lines
    .iter()
    .map(|(vendor, product, price, quantity)| CheckoutItem {
      product_id: product.to_string(),
      vendor_id: Some(vendor.to_string()),
      vendor_name: None,
      name: format!("Product {product}"),
      price: dec(price),
      quantity: *quantity,
      image: None,
    })
    .collect();
  let subtotal: Decimal = items.iter().map(|i| i.price * Decimal::from(i.quantity)).sum();
  CheckoutRequest {
    customer_id: customer_id.to_string(),
    customer_name: Some("Asha Rai".to_string()),
    customer_email: Some("asha@example.com".to_string()),
    customer_phone: None,
    shipping_address: Some(Address {
      full_name: Some("Asha Rai".to_string()),
      line1: "12 Lakeside Road".to_string(),
      city: "Pokhara".to_string(),
      country: Some("NP".to_string()),
      ..Address::default()
    }),
    items,
    total_amount: subtotal,
    payment_method: Some("cod".to_string()),
    ..CheckoutRequest::default()
  }
}

// core/src/store/mod.rs

//! The document-store capability the marketplace needs: read by key, query
//! by field, and an all-or-nothing batch of inserts/updates/deletes with
//! optional compare-and-swap preconditions.
//!
//! Services receive the store as `Arc<dyn DocumentStore>`; nothing in the
//! crate reaches for a process-wide client.

pub mod memory;
pub mod query;

pub use memory::MemoryStore;
pub use query::{Direction, Filter, FilterOp, OrderBy, Query};

use crate::error::{MarketError, MarketResult, StoreError, StoreResult};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};
use std::future::Future;
use std::time::Duration;

/// Collection names used by the marketplace.
pub mod collections {
  pub const ORDERS: &str = "orders";
  pub const VENDORS: &str = "vendors";
  pub const VENDOR_GROUPS: &str = "vendorGroups";
  pub const USERS: &str = "users";
  pub const PRODUCTS: &str = "products";
  pub const REVIEWS: &str = "reviews";
  pub const PAYOUTS: &str = "payouts";
  pub const LEDGER_ENTRIES: &str = "ledgerEntries";
  pub const NOTIFICATIONS: &str = "notifications";
}

/// A document as stored: its key plus the JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
  pub key: String,
  pub body: Value,
}

impl StoredDocument {
  /// Deserialises the body, filling `id` from the key when the body lacks it.
  pub fn decode<T: DeserializeOwned>(&self) -> StoreResult<T> {
    let mut body = self.body.clone();
    if let Value::Object(map) = &mut body {
      map.entry("id").or_insert_with(|| Value::String(self.key.clone()));
    }
    Ok(serde_json::from_value(body)?)
  }
}

/// Compare-and-swap guard for an update.
#[derive(Debug, Clone, PartialEq)]
pub enum Precondition {
  /// The stored document's `field` must equal `value` at write time.
  FieldEquals { field: String, value: Value },
}

impl Precondition {
  pub fn field_equals(field: &str, value: impl Into<Value>) -> Self {
    Precondition::FieldEquals {
      field: field.to_string(),
      value: value.into(),
    }
  }

  /// Guard on the `revision` counter every mutable aggregate carries.
  pub fn revision(expected: u64) -> Self {
    Self::field_equals("revision", expected)
  }

  pub fn holds(&self, doc: &Value) -> bool {
    match self {
      Precondition::FieldEquals { field, value } => {
        query::values_equal(query::lookup(doc, field).unwrap_or(&Value::Null), value)
      }
    }
  }

  pub fn field(&self) -> &str {
    match self {
      Precondition::FieldEquals { field, .. } => field,
    }
  }
}

/// One element of an atomic batch.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
  /// Create `key`; fails with `AlreadyExists` if present.
  Insert {
    collection: String,
    key: String,
    body: Value,
  },
  /// Shallow-merge `patch` into an existing document.
  Update {
    collection: String,
    key: String,
    patch: Value,
    precondition: Option<Precondition>,
  },
  /// Shallow-merge, creating the document when missing.
  Merge {
    collection: String,
    key: String,
    patch: Value,
  },
  Delete {
    collection: String,
    key: String,
  },
}

impl WriteOp {
  pub fn insert(collection: &str, key: &str, body: Value) -> Self {
    WriteOp::Insert {
      collection: collection.to_string(),
      key: key.to_string(),
      body,
    }
  }

  pub fn update(collection: &str, key: &str, patch: Value) -> Self {
    WriteOp::Update {
      collection: collection.to_string(),
      key: key.to_string(),
      patch,
      precondition: None,
    }
  }

  pub fn update_if(collection: &str, key: &str, patch: Value, precondition: Precondition) -> Self {
    WriteOp::Update {
      collection: collection.to_string(),
      key: key.to_string(),
      patch,
      precondition: Some(precondition),
    }
  }

  pub fn merge(collection: &str, key: &str, patch: Value) -> Self {
    WriteOp::Merge {
      collection: collection.to_string(),
      key: key.to_string(),
      patch,
    }
  }

  pub fn delete(collection: &str, key: &str) -> Self {
    WriteOp::Delete {
      collection: collection.to_string(),
      key: key.to_string(),
    }
  }

  pub fn target(&self) -> (&str, &str) {
    match self {
      WriteOp::Insert { collection, key, .. }
      | WriteOp::Update { collection, key, .. }
      | WriteOp::Merge { collection, key, .. }
      | WriteOp::Delete { collection, key } => (collection, key),
    }
  }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
  async fn get(&self, collection: &str, key: &str) -> StoreResult<Option<StoredDocument>>;

  async fn query(&self, collection: &str, query: &Query) -> StoreResult<Vec<StoredDocument>>;

  /// Applies every op or none of them.
  async fn atomic_batch(&self, ops: Vec<WriteOp>) -> StoreResult<()>;

  /// Inserts under a generated key and returns it.
  async fn insert(&self, collection: &str, body: Value) -> StoreResult<String> {
    let key = uuid::Uuid::new_v4().to_string();
    let mut body = body;
    if let Value::Object(map) = &mut body {
      map.entry("id").or_insert_with(|| Value::String(key.clone()));
    }
    self.atomic_batch(vec![WriteOp::insert(collection, &key, body)]).await?;
    Ok(key)
  }

  async fn update(&self, collection: &str, key: &str, patch: Value) -> StoreResult<()> {
    self.atomic_batch(vec![WriteOp::update(collection, key, patch)]).await
  }

  async fn delete(&self, collection: &str, key: &str) -> StoreResult<()> {
    self.atomic_batch(vec![WriteOp::delete(collection, key)]).await
  }

  /// Sentinel the store replaces with its own clock at write time.
  fn server_timestamp(&self) -> Value {
    server_timestamp()
  }
}

const SERVER_TIMESTAMP_KEY: &str = ".sv";
const SERVER_TIMESTAMP_TAG: &str = "timestamp";

pub fn server_timestamp() -> Value {
  json!({ SERVER_TIMESTAMP_KEY: SERVER_TIMESTAMP_TAG })
}

pub fn is_server_timestamp(value: &Value) -> bool {
  match value {
    Value::Object(map) => map.len() == 1 && map.get(SERVER_TIMESTAMP_KEY) == Some(&Value::from(SERVER_TIMESTAMP_TAG)),
    _ => false,
  }
}

/// Canonical timestamp text written by stores (fixed microsecond width).
pub fn format_timestamp(at: DateTime<Utc>) -> String {
  at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Replaces every server-timestamp sentinel in `value` with `now`.
pub fn resolve_server_timestamps(value: &mut Value, now: DateTime<Utc>) {
  if is_server_timestamp(value) {
    *value = Value::String(format_timestamp(now));
    return;
  }
  match value {
    Value::Object(map) => map.values_mut().for_each(|v| resolve_server_timestamps(v, now)),
    Value::Array(items) => items.iter_mut().for_each(|v| resolve_server_timestamps(v, now)),
    _ => {}
  }
}

/// Shallow merge used by `Update` and `Merge`.
pub fn merge_patch(target: &mut Value, patch: &Value) -> StoreResult<()> {
  let (Value::Object(target_map), Value::Object(patch_map)) = (target, patch) else {
    return Err(StoreError::NotAnObject(patch.to_string()));
  };
  for (field, value) in patch_map {
    target_map.insert(field.clone(), value.clone());
  }
  Ok(())
}

/// Serialises a model into a document body.
pub fn to_document<T: Serialize>(model: &T) -> StoreResult<Value> {
  let value = serde_json::to_value(model)?;
  if !value.is_object() {
    return Err(StoreError::NotAnObject(value.to_string()));
  }
  Ok(value)
}

/// Replaces the named top-level fields with the server-timestamp sentinel.
pub fn stamp(body: &mut Value, fields: &[&str]) {
  if let Value::Object(map) = body {
    for field in fields {
      map.insert((*field).to_string(), server_timestamp());
    }
  }
}

/// Reads and decodes one document, mapping absence to `MarketError::NotFound`.
pub async fn fetch<T: DeserializeOwned>(
  store: &dyn DocumentStore,
  collection: &str,
  entity: &'static str,
  key: &str,
) -> MarketResult<T> {
  match store.get(collection, key).await? {
    Some(doc) => Ok(doc.decode()?),
    None => Err(MarketError::not_found(entity, key)),
  }
}

/// Runs `query` and decodes every hit.
pub async fn fetch_all<T: DeserializeOwned>(
  store: &dyn DocumentStore,
  collection: &str,
  query: &Query,
) -> MarketResult<Vec<T>> {
  let docs = store.query(collection, query).await?;
  docs
    .iter()
    .map(|doc| doc.decode::<T>().map_err(MarketError::from))
    .collect()
}

/// Bounds `fut` by `after`. On expiry the future is dropped, so a batch that
/// has not been applied yet never lands afterwards.
pub async fn with_deadline<T, F>(operation: &'static str, after: Duration, fut: F) -> MarketResult<T>
where
  F: Future<Output = MarketResult<T>>,
{
  match tokio::time::timeout(after, fut).await {
    Ok(result) => result,
    Err(_) => {
      tracing::warn!(operation, ?after, "Operation deadline exceeded.");
      Err(MarketError::Timeout { operation, after })
    }
  }
}

/// True when a batch failed only because a compare-and-swap guard lost.
pub fn is_precondition_failure(err: &MarketError) -> bool {
  matches!(
    err,
    MarketError::Persistence {
      source: StoreError::PreconditionFailed { .. }
    }
  )
}

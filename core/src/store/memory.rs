// core/src/store/memory.rs

use super::query::Query;
use super::{merge_patch, resolve_server_timestamps, DocumentStore, StoredDocument, WriteOp};
use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tracing::{event, Level};

type Collection = BTreeMap<String, Value>;

/// In-process document store. Used by tests, the benchmarks and the server
/// when no database is configured.
///
/// A batch is staged against a private overlay first and only copied into
/// the live maps once every op has validated, all under one write lock.
#[derive(Debug, Default)]
pub struct MemoryStore {
  collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Every document of `collection`, in key order.
  pub fn dump(&self, collection: &str) -> Vec<StoredDocument> {
    self
      .collections
      .read()
      .get(collection)
      .map(|docs| {
        docs
          .iter()
          .map(|(key, body)| StoredDocument {
            key: key.clone(),
            body: body.clone(),
          })
          .collect()
      })
      .unwrap_or_default()
  }

  pub fn count(&self, collection: &str) -> usize {
    self.collections.read().get(collection).map_or(0, BTreeMap::len)
  }
}

/// Pending state of the documents touched by one batch. `None` marks a
/// delete.
type Overlay = HashMap<(String, String), Option<Value>>;

fn current<'a>(
  overlay: &'a Overlay,
  live: &'a HashMap<String, Collection>,
  collection: &str,
  key: &str,
) -> Option<&'a Value> {
  match overlay.get(&(collection.to_string(), key.to_string())) {
    Some(staged) => staged.as_ref(),
    None => live.get(collection).and_then(|docs| docs.get(key)),
  }
}

fn stage(overlay: &mut Overlay, live: &HashMap<String, Collection>, op: WriteOp) -> StoreResult<()> {
  match op {
    WriteOp::Insert { collection, key, body } => {
      if current(overlay, live, &collection, &key).is_some() {
        return Err(StoreError::AlreadyExists { collection, key });
      }
      if !body.is_object() {
        return Err(StoreError::NotAnObject(body.to_string()));
      }
      overlay.insert((collection, key), Some(body));
    }
    WriteOp::Update {
      collection,
      key,
      patch,
      precondition,
    } => {
      let Some(existing) = current(overlay, live, &collection, &key) else {
        return Err(StoreError::NotFound { collection, key });
      };
      if let Some(guard) = &precondition {
        if !guard.holds(existing) {
          let field = guard.field().to_string();
          return Err(StoreError::PreconditionFailed { collection, key, field });
        }
      }
      let mut merged = existing.clone();
      merge_patch(&mut merged, &patch)?;
      overlay.insert((collection, key), Some(merged));
    }
    WriteOp::Merge { collection, key, patch } => {
      let mut merged = current(overlay, live, &collection, &key)
        .cloned()
        .unwrap_or_else(|| Value::Object(Default::default()));
      merge_patch(&mut merged, &patch)?;
      overlay.insert((collection, key), Some(merged));
    }
    WriteOp::Delete { collection, key } => {
      overlay.insert((collection, key), None);
    }
  }
  Ok(())
}

#[async_trait]
impl DocumentStore for MemoryStore {
  async fn get(&self, collection: &str, key: &str) -> StoreResult<Option<StoredDocument>> {
    let guard = self.collections.read();
    Ok(guard.get(collection).and_then(|docs| docs.get(key)).map(|body| StoredDocument {
      key: key.to_string(),
      body: body.clone(),
    }))
  }

  async fn query(&self, collection: &str, query: &Query) -> StoreResult<Vec<StoredDocument>> {
    let hits: Vec<StoredDocument> = {
      let guard = self.collections.read();
      let Some(docs) = guard.get(collection) else {
        return Ok(Vec::new());
      };
      docs
        .iter()
        .filter(|(_, body)| query.matches(body))
        .map(|(key, body)| StoredDocument {
          key: key.clone(),
          body: body.clone(),
        })
        .collect()
    };
    Ok(query.sort_and_page(hits))
  }

  async fn atomic_batch(&self, ops: Vec<WriteOp>) -> StoreResult<()> {
    let op_count = ops.len();
    let now = Utc::now();
    let mut guard = self.collections.write();

    let mut overlay = Overlay::new();
    for op in ops {
      let (collection, key) = {
        let (c, k) = op.target();
        (c.to_string(), k.to_string())
      };
      if let Err(e) = stage(&mut overlay, &guard, op) {
        event!(Level::DEBUG, %collection, %key, error = %e, "Batch rejected; nothing applied.");
        return Err(e);
      }
    }

    for ((collection, key), staged) in overlay {
      let docs = guard.entry(collection).or_default();
      match staged {
        Some(mut body) => {
          resolve_server_timestamps(&mut body, now);
          docs.insert(key, body);
        }
        None => {
          docs.remove(&key);
        }
      }
    }
    event!(Level::TRACE, op_count, "Batch applied.");
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::store::{server_timestamp, Direction, Precondition};
  use serde_json::json;

  #[tokio::test]
  async fn failed_precondition_discards_whole_batch() {
    let store = MemoryStore::new();
    store
      .atomic_batch(vec![WriteOp::insert("vendors", "v1", json!({ "revision": 1, "name": "A" }))])
      .await
      .unwrap();

    let result = store
      .atomic_batch(vec![
        WriteOp::insert("payouts", "p1", json!({ "amount": 10 })),
        WriteOp::update_if("vendors", "v1", json!({ "name": "B" }), Precondition::revision(7)),
      ])
      .await;

    assert!(matches!(result, Err(StoreError::PreconditionFailed { .. })));
    assert_eq!(store.count("payouts"), 0);
    let vendor = store.get("vendors", "v1").await.unwrap().unwrap();
    assert_eq!(vendor.body["name"], "A");
  }

  #[tokio::test]
  async fn update_of_missing_document_is_not_found() {
    let store = MemoryStore::new();
    let result = store.update("orders", "nope", json!({ "status": "confirmed" })).await;
    assert!(matches!(result, Err(StoreError::NotFound { .. })));
  }

  #[tokio::test]
  async fn server_timestamp_is_resolved_on_write() {
    let store = MemoryStore::new();
    let key = store
      .insert("notifications", json!({ "createdAt": server_timestamp(), "nested": { "at": server_timestamp() } }))
      .await
      .unwrap();
    let doc = store.get("notifications", &key).await.unwrap().unwrap();
    assert!(doc.body["createdAt"].is_string());
    assert!(doc.body["nested"]["at"].is_string());
    assert_eq!(doc.body["id"], key.as_str());
  }

  #[tokio::test]
  async fn query_filters_orders_and_pages() {
    let store = MemoryStore::new();
    for (key, total, vendors) in [("a", 30, vec!["v1"]), ("b", 10, vec!["v1", "v2"]), ("c", 20, vec!["v2"])] {
      store
        .atomic_batch(vec![WriteOp::insert("orders", key, json!({ "total": total, "vendorIds": vendors }))])
        .await
        .unwrap();
    }

    let q = Query::new().array_contains("vendorIds", "v1").order_by("total", Direction::Desc);
    let keys: Vec<String> = store.query("orders", &q).await.unwrap().into_iter().map(|d| d.key).collect();
    assert_eq!(keys, vec!["a", "b"]);

    let q = Query::new().order_by("total", Direction::Asc).offset(1).limit(1);
    let keys: Vec<String> = store.query("orders", &q).await.unwrap().into_iter().map(|d| d.key).collect();
    assert_eq!(keys, vec!["c"]);
  }
}

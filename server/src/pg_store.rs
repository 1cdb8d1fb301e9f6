// server/src/pg_store.rs

//! [`DocumentStore`] over one PostgreSQL table of JSONB documents.
//!
//! Equality and array-membership filters are pushed down as `@>` containment
//! so the `body` GIN index can serve them; the full predicate set, ordering
//! and paging are then applied in process with the same rules as
//! [`marketplace::MemoryStore`].

use async_trait::async_trait;
use chrono::Utc;
use marketplace::store::{
  merge_patch, resolve_server_timestamps, DocumentStore, Filter, FilterOp, Query, StoredDocument, WriteOp,
};
use marketplace::{StoreError, StoreResult};
use serde_json::{Map, Value};
use sqlx::postgres::{PgConnection, PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder};
use tracing::{event, instrument, Level};

const SCHEMA: [&str; 3] = [
  "CREATE TABLE IF NOT EXISTS documents (
     collection TEXT NOT NULL,
     key TEXT NOT NULL,
     body JSONB NOT NULL,
     PRIMARY KEY (collection, key)
   )",
  "CREATE INDEX IF NOT EXISTS documents_collection_idx ON documents (collection)",
  "CREATE INDEX IF NOT EXISTS documents_body_idx ON documents USING GIN (body jsonb_path_ops)",
];

fn backend(err: sqlx::Error) -> StoreError {
  StoreError::Backend(anyhow::Error::new(err))
}

#[derive(Clone, Debug)]
pub struct PgDocumentStore {
  pool: PgPool,
}

impl PgDocumentStore {
  pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
    let pool = PgPoolOptions::new()
      .max_connections(max_connections)
      .connect(database_url)
      .await?;
    Ok(Self::new(pool))
  }

  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }

  /// Creates the documents table and its indexes when missing.
  pub async fn ensure_schema(&self) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
      sqlx::query(statement).execute(&self.pool).await?;
    }
    event!(Level::INFO, "Document table ready.");
    Ok(())
  }

  async fn lock_row(conn: &mut PgConnection, collection: &str, key: &str) -> StoreResult<Option<Value>> {
    sqlx::query_scalar::<_, Value>("SELECT body FROM documents WHERE collection = $1 AND key = $2 FOR UPDATE")
      .bind(collection)
      .bind(key)
      .fetch_optional(conn)
      .await
      .map_err(backend)
  }
}

/// `{"a": {"b": value}}` for the dotted path `a.b`.
fn containment(path: &str, value: Value) -> Value {
  path.rsplit('.').fold(value, |inner, segment| {
    let mut map = Map::new();
    map.insert(segment.to_string(), inner);
    Value::Object(map)
  })
}

/// Containment document for filters JSONB `@>` answers exactly. Numbers are
/// left out: `@>` compares them by representation, the store by value.
fn pushdown(filter: &Filter) -> Option<Value> {
  let exact = matches!(filter.value, Value::String(_) | Value::Bool(_));
  match filter.op {
    FilterOp::Eq if exact => Some(containment(&filter.field, filter.value.clone())),
    FilterOp::ArrayContains if exact => Some(containment(&filter.field, Value::Array(vec![filter.value.clone()]))),
    _ => None,
  }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
  async fn get(&self, collection: &str, key: &str) -> StoreResult<Option<StoredDocument>> {
    let body = sqlx::query_scalar::<_, Value>("SELECT body FROM documents WHERE collection = $1 AND key = $2")
      .bind(collection)
      .bind(key)
      .fetch_optional(&self.pool)
      .await
      .map_err(backend)?;
    Ok(body.map(|body| StoredDocument {
      key: key.to_string(),
      body,
    }))
  }

  #[instrument(name = "PgDocumentStore::query", skip(self, query), fields(filters = query.filters.len()))]
  async fn query(&self, collection: &str, query: &Query) -> StoreResult<Vec<StoredDocument>> {
    let mut builder = QueryBuilder::<Postgres>::new("SELECT key, body FROM documents WHERE collection = ");
    builder.push_bind(collection.to_string());
    for contained in query.filters.iter().filter_map(pushdown) {
      builder.push(" AND body @> ");
      builder.push_bind(contained);
    }
    let rows: Vec<(String, Value)> = builder
      .build_query_as()
      .fetch_all(&self.pool)
      .await
      .map_err(backend)?;

    let hits = rows
      .into_iter()
      .filter(|(_, body)| query.matches(body))
      .map(|(key, body)| StoredDocument { key, body })
      .collect();
    Ok(query.sort_and_page(hits))
  }

  #[instrument(name = "PgDocumentStore::atomic_batch", skip_all, fields(op_count = ops.len()))]
  async fn atomic_batch(&self, ops: Vec<WriteOp>) -> StoreResult<()> {
    let now = Utc::now();
    // Dropping the transaction on an early return rolls it back.
    let mut tx = self.pool.begin().await.map_err(backend)?;

    for op in ops {
      match op {
        WriteOp::Insert {
          collection,
          key,
          mut body,
        } => {
          if !body.is_object() {
            return Err(StoreError::NotAnObject(body.to_string()));
          }
          resolve_server_timestamps(&mut body, now);
          let inserted = sqlx::query(
            "INSERT INTO documents (collection, key, body) VALUES ($1, $2, $3) ON CONFLICT (collection, key) DO NOTHING",
          )
          .bind(&collection)
          .bind(&key)
          .bind(&body)
          .execute(&mut *tx)
          .await
          .map_err(backend)?;
          if inserted.rows_affected() == 0 {
            return Err(StoreError::AlreadyExists { collection, key });
          }
        }
        WriteOp::Update {
          collection,
          key,
          patch,
          precondition,
        } => {
          let Some(mut body) = Self::lock_row(&mut tx, &collection, &key).await? else {
            return Err(StoreError::NotFound { collection, key });
          };
          if let Some(guard) = &precondition {
            if !guard.holds(&body) {
              let field = guard.field().to_string();
              event!(Level::DEBUG, %collection, %key, %field, "Precondition lost; rolling back.");
              return Err(StoreError::PreconditionFailed { collection, key, field });
            }
          }
          merge_patch(&mut body, &patch)?;
          resolve_server_timestamps(&mut body, now);
          sqlx::query("UPDATE documents SET body = $3 WHERE collection = $1 AND key = $2")
            .bind(&collection)
            .bind(&key)
            .bind(&body)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        }
        WriteOp::Merge { collection, key, patch } => {
          let mut body = Self::lock_row(&mut tx, &collection, &key)
            .await?
            .unwrap_or_else(|| Value::Object(Map::new()));
          merge_patch(&mut body, &patch)?;
          resolve_server_timestamps(&mut body, now);
          sqlx::query(
            "INSERT INTO documents (collection, key, body) VALUES ($1, $2, $3)
             ON CONFLICT (collection, key) DO UPDATE SET body = EXCLUDED.body",
          )
          .bind(&collection)
          .bind(&key)
          .bind(&body)
          .execute(&mut *tx)
          .await
          .map_err(backend)?;
        }
        WriteOp::Delete { collection, key } => {
          sqlx::query("DELETE FROM documents WHERE collection = $1 AND key = $2")
            .bind(&collection)
            .bind(&key)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        }
      }
    }

    tx.commit().await.map_err(backend)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn containment_nests_dotted_paths() {
    assert_eq!(containment("address.city", json!("Pokhara")), json!({ "address": { "city": "Pokhara" } }));
  }

  #[test]
  fn only_exact_filters_are_pushed_down() {
    let query = Query::new()
      .where_eq("status", "approved")
      .array_contains("vendorIds", "v1")
      .where_eq("revision", 3)
      .filter("createdAt", FilterOp::Gt, "2024-01-01T00:00:00Z");
    let pushed: Vec<Value> = query.filters.iter().filter_map(pushdown).collect();
    assert_eq!(
      pushed,
      vec![json!({ "status": "approved" }), json!({ "vendorIds": ["v1"] })]
    );
  }
}

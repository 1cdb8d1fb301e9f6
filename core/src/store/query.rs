// core/src/store/query.rs

//! Field predicates, ordering and paging for [`super::DocumentStore::query`].
//!
//! Field names are dotted paths into the JSON document (`"address.city"`).
//! Every predicate used in production needs a matching secondary index in a
//! real backend (e.g. `vendorIds` + `status`, `customerId` + `status`).

use super::StoredDocument;
use chrono::DateTime;
use serde_json::Value;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
  Eq,
  Ne,
  Lt,
  Lte,
  Gt,
  Gte,
  /// Field value is one of the elements of the (array) filter value.
  In,
  /// Field is an array containing the filter value.
  ArrayContains,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
  pub field: String,
  pub op: FilterOp,
  pub value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
  Asc,
  Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
  pub field: String,
  pub direction: Direction,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
  pub filters: Vec<Filter>,
  pub order_by: Option<OrderBy>,
  pub offset: usize,
  pub limit: Option<usize>,
}

impl Query {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn filter(mut self, field: &str, op: FilterOp, value: impl Into<Value>) -> Self {
    self.filters.push(Filter {
      field: field.to_string(),
      op,
      value: value.into(),
    });
    self
  }

  pub fn where_eq(self, field: &str, value: impl Into<Value>) -> Self {
    self.filter(field, FilterOp::Eq, value)
  }

  pub fn where_in(self, field: &str, values: Vec<Value>) -> Self {
    self.filter(field, FilterOp::In, Value::Array(values))
  }

  pub fn array_contains(self, field: &str, value: impl Into<Value>) -> Self {
    self.filter(field, FilterOp::ArrayContains, value)
  }

  pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
    self.order_by = Some(OrderBy {
      field: field.to_string(),
      direction,
    });
    self
  }

  pub fn offset(mut self, offset: usize) -> Self {
    self.offset = offset;
    self
  }

  pub fn limit(mut self, limit: usize) -> Self {
    self.limit = Some(limit);
    self
  }

  pub fn matches(&self, doc: &Value) -> bool {
    self.filters.iter().all(|f| f.matches(doc))
  }

  /// Orders already-filtered hits and applies `offset` / `limit`.
  pub fn sort_and_page(&self, mut hits: Vec<StoredDocument>) -> Vec<StoredDocument> {
    if let Some(order) = &self.order_by {
      hits.sort_by(|a, b| {
        let left = lookup(&a.body, &order.field).unwrap_or(&Value::Null);
        let right = lookup(&b.body, &order.field).unwrap_or(&Value::Null);
        let ord = compare_values(left, right).unwrap_or(Ordering::Equal);
        match order.direction {
          Direction::Asc => ord,
          Direction::Desc => ord.reverse(),
        }
      });
    }
    let paged = hits.into_iter().skip(self.offset);
    match self.limit {
      Some(limit) => paged.take(limit).collect(),
      None => paged.collect(),
    }
  }
}

impl Filter {
  pub fn matches(&self, doc: &Value) -> bool {
    let field_value = lookup(doc, &self.field).unwrap_or(&Value::Null);
    match self.op {
      FilterOp::Eq => values_equal(field_value, &self.value),
      FilterOp::Ne => !values_equal(field_value, &self.value),
      FilterOp::Lt => compare_values(field_value, &self.value) == Some(Ordering::Less),
      FilterOp::Lte => matches!(
        compare_values(field_value, &self.value),
        Some(Ordering::Less | Ordering::Equal)
      ),
      FilterOp::Gt => compare_values(field_value, &self.value) == Some(Ordering::Greater),
      FilterOp::Gte => matches!(
        compare_values(field_value, &self.value),
        Some(Ordering::Greater | Ordering::Equal)
      ),
      FilterOp::In => match &self.value {
        Value::Array(candidates) => candidates.iter().any(|c| values_equal(field_value, c)),
        _ => false,
      },
      FilterOp::ArrayContains => match field_value {
        Value::Array(items) => items.iter().any(|item| values_equal(item, &self.value)),
        _ => false,
      },
    }
  }
}

/// Resolves a dotted path inside a JSON document.
pub fn lookup<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
  path.split('.').try_fold(doc, |current, segment| current.get(segment))
}

pub fn values_equal(a: &Value, b: &Value) -> bool {
  match (a, b) {
    (Value::Number(_), Value::Number(_)) => compare_values(a, b) == Some(Ordering::Equal),
    _ => a == b,
  }
}

/// Total-enough ordering for query predicates and sorting. Values of
/// different kinds are incomparable, except that `null` sorts first.
/// RFC 3339 strings compare as instants so differing fraction widths sort
/// correctly.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
  match (a, b) {
    (Value::Null, Value::Null) => Some(Ordering::Equal),
    (Value::Null, _) => Some(Ordering::Less),
    (_, Value::Null) => Some(Ordering::Greater),
    (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
    (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
    (Value::String(x), Value::String(y)) => match (DateTime::parse_from_rfc3339(x), DateTime::parse_from_rfc3339(y)) {
      (Ok(dx), Ok(dy)) => Some(dx.cmp(&dy)),
      _ => Some(x.cmp(y)),
    },
    _ => None,
  }
}

// core/src/models/catalog.rs

//! Products and users. The marketplace reads these but does not own them;
//! only the fields it touches are modelled.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProductStatus {
  Pending,
  Approved,
  Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
  pub id: String,
  pub vendor_id: String,
  pub name: String,
  #[serde(default)]
  pub price: Decimal,
  pub status: ProductStatus,
  #[serde(default = "active_by_default")]
  pub is_active: bool,
  #[serde(default)]
  pub rating: f64,
  #[serde(default)]
  pub review_count: u64,
  #[serde(default)]
  pub rejection_reason: Option<String>,
  #[serde(default)]
  pub updated_at: Option<DateTime<Utc>>,
}

fn active_by_default() -> bool {
  true
}

impl Product {
  pub fn is_live(&self) -> bool {
    self.status == ProductStatus::Approved && self.is_active
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UserRole {
  Customer,
  Vendor,
  Admin,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
  pub id: String,
  pub display_name: Option<String>,
  pub email: Option<String>,
  pub role: UserRole,
}

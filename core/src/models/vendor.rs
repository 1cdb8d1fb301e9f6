// core/src/models/vendor.rs

use super::order::Address;
use super::status::VendorStatus;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BankDetails {
  pub account_name: Option<String>,
  pub account_number: Option<String>,
  pub bank_name: Option<String>,
  pub branch: Option<String>,
  pub routing_code: Option<String>,
}

/// Seller account, keyed by the owning user's id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vendor {
  pub id: String,
  pub user_id: String,
  pub business_name: String,
  pub email: Option<String>,
  pub phone: Option<String>,
  pub address: Option<Address>,
  pub description: Option<String>,
  pub business_type: Option<String>,
  pub logo: Option<String>,
  pub banner: Option<String>,
  #[serde(default)]
  pub bank_details: BankDetails,
  pub status: VendorStatus,
  /// Percentage; `None` means the platform default.
  pub commission_rate: Option<Decimal>,
  #[serde(default)]
  pub rating: f64,
  #[serde(default)]
  pub review_count: u64,
  #[serde(default)]
  pub total_sales: Decimal,
  #[serde(default)]
  pub total_earnings: Decimal,
  #[serde(default)]
  pub available_balance: Decimal,
  #[serde(default)]
  pub pending_balance: Decimal,
  #[serde(default)]
  pub verification_documents: Vec<String>,
  #[serde(default)]
  pub revision: u64,
  pub created_at: Option<DateTime<Utc>>,
  pub updated_at: Option<DateTime<Utc>>,
}

/// Input for vendor registration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VendorRegistration {
  pub user_id: String,
  pub business_name: String,
  pub email: Option<String>,
  pub phone: Option<String>,
  pub address: Option<Address>,
  pub description: Option<String>,
  pub business_type: Option<String>,
  pub logo: Option<String>,
  pub banner: Option<String>,
  pub bank_details: BankDetails,
  pub verification_documents: Vec<String>,
}

/// Profile fields a vendor may edit. Absent fields are left as stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VendorProfileUpdate {
  pub business_name: Option<String>,
  pub email: Option<String>,
  pub phone: Option<String>,
  pub address: Option<Address>,
  pub description: Option<String>,
  pub business_type: Option<String>,
  pub logo: Option<String>,
  pub banner: Option<String>,
  pub bank_details: Option<BankDetails>,
}

/// Admin-curated set of vendor records presented as one storefront.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorGroup {
  pub id: String,
  pub name: String,
  pub vendor_ids: Vec<String>,
}

/// Which vendor records a stats query covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VendorSelector {
  Vendor(String),
  Vendors(Vec<String>),
  Group(String),
}

/// Sums across the selected vendor records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorStats {
  pub vendor_ids: Vec<String>,
  pub total_sales: Decimal,
  pub total_earnings: Decimal,
  pub available_balance: Decimal,
  pub pending_balance: Decimal,
  /// Rating of the record with the most reviews.
  pub rating: f64,
  /// Summed over every record.
  pub review_count: u64,
  pub total_products: u64,
  pub active_products: u64,
}

/// A customer who bought from a vendor, derived from orders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorCustomer {
  pub customer_id: String,
  pub customer_name: Option<String>,
  pub customer_email: Option<String>,
  pub order_count: u64,
  pub total_spent: Decimal,
  pub last_order_at: Option<DateTime<Utc>>,
}

// core/src/models/payout.rs

use super::vendor::BankDetails;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PayoutStatus {
  Pending,
  Completed,
  Failed,
}

/// Withdrawal request. The balance is debited when this is created; later
/// settlement happens outside the marketplace core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payout {
  pub id: String,
  pub vendor_id: String,
  pub amount: Decimal,
  pub status: PayoutStatus,
  pub bank_details: BankDetails,
  pub note: Option<String>,
  pub created_at: Option<DateTime<Utc>>,
}

/// Caller-supplied payout instructions. Bank fields left empty fall back to
/// the vendor's stored bank details.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PayoutRequest {
  pub bank_details: Option<BankDetails>,
  pub note: Option<String>,
}

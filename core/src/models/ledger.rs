// core/src/models/ledger.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LedgerEntryKind {
  /// Net earnings of a delivered sub-order.
  DeliveryCredit,
  PayoutDebit,
}

/// Immutable record of one balance movement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
  pub id: String,
  pub vendor_id: String,
  pub kind: LedgerEntryKind,
  pub order_id: Option<String>,
  pub payout_id: Option<String>,
  /// Sale value before commission; zero for payouts.
  pub gross: Decimal,
  pub fee: Decimal,
  /// Signed change to the available balance.
  pub amount: Decimal,
  pub created_at: Option<DateTime<Utc>>,
}

impl LedgerEntry {
  /// Deterministic key so a sub-order can be credited at most once.
  pub fn delivery_key(order_id: &str, vendor_id: &str) -> String {
    format!("delivered:{order_id}:{vendor_id}")
  }

  pub fn payout_key(payout_id: &str) -> String {
    format!("payout:{payout_id}")
  }
}

/// Balances rebuilt from the ledger next to the stored ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceReconciliation {
  pub vendor_id: String,
  pub entries: usize,
  pub ledger_available_balance: Decimal,
  pub ledger_total_earnings: Decimal,
  pub ledger_total_sales: Decimal,
  pub stored_available_balance: Decimal,
  pub stored_total_earnings: Decimal,
  pub stored_total_sales: Decimal,
}

impl BalanceReconciliation {
  pub fn has_drift(&self) -> bool {
    self.ledger_available_balance != self.stored_available_balance
      || self.ledger_total_earnings != self.stored_total_earnings
      || self.ledger_total_sales != self.stored_total_sales
  }
}

// core/src/services/ledger.rs

//! Commission and balances. Balance fields on a vendor are only written
//! through compare-and-swap on the vendor's `revision`, and every movement
//! of the available balance is mirrored by an immutable ledger entry.

use crate::error::{MarketError, MarketResult};
use crate::models::money::{commission_fee, round2};
use crate::models::{
  BalanceReconciliation, LedgerEntry, LedgerEntryKind, Payout, PayoutRequest, Product, Settlement, Vendor,
  VendorGroup, VendorOrder, VendorSelector, VendorStats,
};
use crate::pipelines::contexts::PayoutCtxData;
use crate::state::MarketState;
use crate::store::{collections, fetch, fetch_all, server_timestamp, to_document, Direction, Precondition, Query, WriteOp};
use crate::workflow::{ContextData, PipelineOutcome};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tracing::{event, instrument, Level};

/// Fee and net for one vendor's portion at the vendor's commission rate.
pub fn compute_settlement(vendor_order: &VendorOrder, vendor: &Vendor, default_rate: Decimal) -> Settlement {
  let rate = vendor.commission_rate.unwrap_or(default_rate);
  let gross = round2(vendor_order.subtotal);
  let fee = commission_fee(gross, rate);
  Settlement {
    gross,
    fee,
    net: gross - fee,
    commission_rate: rate,
    settled_at: None,
  }
}

/// `value - amount`, floored at zero. Pending balances that predate the
/// pending accrual can be short; the shortfall is logged, not stored.
fn release(vendor_id: &str, balance: Decimal, amount: Decimal) -> Decimal {
  let remaining = balance - amount;
  if remaining < Decimal::ZERO {
    event!(Level::WARN, vendor_id, %balance, %amount, "Pending balance short of released amount; flooring at zero.");
    return Decimal::ZERO;
  }
  remaining
}

fn credit(balance: Decimal, amount: Decimal) -> MarketResult<Decimal> {
  balance
    .checked_add(amount)
    .ok_or_else(|| MarketError::validation("balance out of range"))
}

pub(crate) fn guarded_vendor_update(vendor: &Vendor, mut patch: Value) -> WriteOp {
  if let Value::Object(map) = &mut patch {
    map.insert("revision".to_string(), json!(vendor.revision + 1));
    map.insert("updatedAt".to_string(), server_timestamp());
  }
  WriteOp::update_if(collections::VENDORS, &vendor.id, patch, Precondition::revision(vendor.revision))
}

/// Writes crediting a delivered sub-order: the ledger entry (keyed so it can
/// exist only once) and the vendor balance move from pending to available.
pub(crate) fn delivery_credit_ops(
  order_id: &str,
  vendor: &Vendor,
  settlement: &Settlement,
  now: DateTime<Utc>,
) -> MarketResult<Vec<WriteOp>> {
  let key = LedgerEntry::delivery_key(order_id, &vendor.id);
  let entry = LedgerEntry {
    id: key.clone(),
    vendor_id: vendor.id.clone(),
    kind: LedgerEntryKind::DeliveryCredit,
    order_id: Some(order_id.to_string()),
    payout_id: None,
    gross: settlement.gross,
    fee: settlement.fee,
    amount: settlement.net,
    created_at: Some(now),
  };
  let vendor_patch = json!({
    "pendingBalance": release(&vendor.id, vendor.pending_balance, settlement.gross),
    "availableBalance": credit(vendor.available_balance, settlement.net)?,
    "totalEarnings": credit(vendor.total_earnings, settlement.net)?,
    "totalSales": credit(vendor.total_sales, settlement.gross)?,
  });
  Ok(vec![
    WriteOp::insert(collections::LEDGER_ENTRIES, &key, to_document(&entry)?),
    guarded_vendor_update(vendor, vendor_patch),
  ])
}

/// Returns a cancelled sub-order's subtotal from the vendor's pending balance.
pub(crate) fn pending_release_op(vendor: &Vendor, amount: Decimal) -> WriteOp {
  guarded_vendor_update(
    vendor,
    json!({ "pendingBalance": release(&vendor.id, vendor.pending_balance, amount) }),
  )
}

/// Adds a new order's subtotal to the vendor's pending balance.
pub(crate) fn pending_accrual_op(vendor: &Vendor, amount: Decimal) -> MarketResult<WriteOp> {
  Ok(guarded_vendor_update(
    vendor,
    json!({ "pendingBalance": credit(vendor.pending_balance, amount)? }),
  ))
}

/// Writes for a payout request: the payout record, its ledger debit and the
/// balance decrement.
pub(crate) fn payout_ops(vendor: &Vendor, payout: &Payout) -> MarketResult<Vec<WriteOp>> {
  let entry_key = LedgerEntry::payout_key(&payout.id);
  let entry = LedgerEntry {
    id: entry_key.clone(),
    vendor_id: vendor.id.clone(),
    kind: LedgerEntryKind::PayoutDebit,
    order_id: None,
    payout_id: Some(payout.id.clone()),
    gross: Decimal::ZERO,
    fee: Decimal::ZERO,
    amount: -payout.amount,
    created_at: payout.created_at,
  };
  let mut payout_doc = to_document(payout)?;
  crate::store::stamp(&mut payout_doc, &["createdAt"]);
  Ok(vec![
    WriteOp::insert(collections::PAYOUTS, &payout.id, payout_doc),
    WriteOp::insert(collections::LEDGER_ENTRIES, &entry_key, to_document(&entry)?),
    guarded_vendor_update(
      vendor,
      json!({ "availableBalance": vendor.available_balance - payout.amount }),
    ),
  ])
}

#[derive(Clone, Debug)]
pub struct LedgerService {
  state: MarketState,
}

impl LedgerService {
  pub fn new(state: MarketState) -> Self {
    Self { state }
  }

  /// Resolves a selector to vendor ids, de-duplicated in order.
  pub async fn resolve_selector(&self, selector: &VendorSelector) -> MarketResult<Vec<String>> {
    let raw = match selector {
      VendorSelector::Vendor(id) => vec![id.clone()],
      VendorSelector::Vendors(ids) => ids.clone(),
      VendorSelector::Group(group_id) => self.get_vendor_group(group_id).await?.vendor_ids,
    };
    let mut ids: Vec<String> = Vec::with_capacity(raw.len());
    for id in raw {
      let id = id.trim().to_string();
      if !id.is_empty() && !ids.contains(&id) {
        ids.push(id);
      }
    }
    if ids.is_empty() {
      return Err(MarketError::validation("at least one vendor id is required"));
    }
    Ok(ids)
  }

  /// Sums balances and totals across the selected vendor records.
  #[instrument(name = "LedgerService::get_vendor_stats", skip(self), err(Display))]
  pub async fn get_vendor_stats(&self, selector: &VendorSelector) -> MarketResult<VendorStats> {
    let store = self.state.store();
    let ids = self.resolve_selector(selector).await?;

    let mut vendors: Vec<Vendor> = Vec::with_capacity(ids.len());
    for id in &ids {
      vendors.push(fetch(store, collections::VENDORS, "vendor", id).await?);
    }

    let rating = vendors
      .iter()
      .fold(None::<&Vendor>, |best, v| match best {
        Some(b) if b.review_count >= v.review_count => Some(b),
        _ => Some(v),
      })
      .map(|v| v.rating)
      .unwrap_or(0.0);

    let id_values: Vec<Value> = ids.iter().map(|id| Value::String(id.clone())).collect();
    let products: Vec<Product> = fetch_all(
      store,
      collections::PRODUCTS,
      &Query::new().where_in("vendorId", id_values),
    )
    .await?;

    Ok(VendorStats {
      total_sales: vendors.iter().map(|v| v.total_sales).sum(),
      total_earnings: vendors.iter().map(|v| v.total_earnings).sum(),
      available_balance: vendors.iter().map(|v| v.available_balance).sum(),
      pending_balance: vendors.iter().map(|v| v.pending_balance).sum(),
      rating,
      review_count: vendors.iter().map(|v| v.review_count).sum(),
      total_products: products.len() as u64,
      active_products: products.iter().filter(|p| p.is_live()).count() as u64,
      vendor_ids: ids,
    })
  }

  /// Debits `amount` from the available balance and records a pending payout.
  #[instrument(name = "LedgerService::process_vendor_payout", skip(self, request), err(Display))]
  pub async fn process_vendor_payout(
    &self,
    vendor_id: &str,
    amount: Decimal,
    request: PayoutRequest,
  ) -> MarketResult<Payout> {
    let ctx = ContextData::new(PayoutCtxData::new(self.state.clone(), vendor_id, amount, request));
    match self.state.workflows.run(ctx.clone()).await? {
      PipelineOutcome::Completed => ctx
        .with(|data| data.payout.clone())
        .ok_or_else(|| MarketError::Internal("payout pipeline completed without a payout".to_string())),
      PipelineOutcome::Stopped => Err(MarketError::Internal("payout pipeline stopped early".to_string())),
    }
  }

  pub async fn list_payouts(&self, vendor_id: &str) -> MarketResult<Vec<Payout>> {
    let query = Query::new()
      .where_eq("vendorId", vendor_id)
      .order_by("createdAt", Direction::Desc);
    fetch_all(self.state.store(), collections::PAYOUTS, &query).await
  }

  pub async fn list_ledger_entries(&self, vendor_id: &str) -> MarketResult<Vec<LedgerEntry>> {
    let query = Query::new()
      .where_eq("vendorId", vendor_id)
      .order_by("createdAt", Direction::Asc);
    fetch_all(self.state.store(), collections::LEDGER_ENTRIES, &query).await
  }

  /// Rebuilds balances from the ledger and compares them with the stored ones.
  #[instrument(name = "LedgerService::reconcile_vendor_balances", skip(self), err(Display))]
  pub async fn reconcile_vendor_balances(&self, vendor_id: &str) -> MarketResult<BalanceReconciliation> {
    let vendor: Vendor = fetch(self.state.store(), collections::VENDORS, "vendor", vendor_id).await?;
    let entries = self.list_ledger_entries(vendor_id).await?;

    let credits = entries.iter().filter(|e| e.kind == LedgerEntryKind::DeliveryCredit);
    let report = BalanceReconciliation {
      vendor_id: vendor.id.clone(),
      entries: entries.len(),
      ledger_available_balance: entries.iter().map(|e| e.amount).sum(),
      ledger_total_earnings: credits.clone().map(|e| e.amount).sum(),
      ledger_total_sales: credits.map(|e| e.gross).sum(),
      stored_available_balance: vendor.available_balance,
      stored_total_earnings: vendor.total_earnings,
      stored_total_sales: vendor.total_sales,
    };
    if report.has_drift() {
      event!(Level::WARN, vendor_id, ?report, "Vendor balances drift from ledger.");
    }
    Ok(report)
  }

  pub async fn get_vendor_group(&self, group_id: &str) -> MarketResult<VendorGroup> {
    fetch(self.state.store(), collections::VENDOR_GROUPS, "vendor group", group_id).await
  }

  pub async fn list_vendor_groups(&self) -> MarketResult<Vec<VendorGroup>> {
    fetch_all(
      self.state.store(),
      collections::VENDOR_GROUPS,
      &Query::new().order_by("name", Direction::Asc),
    )
    .await
  }

  /// Creates or replaces a vendor group. Every member must exist.
  #[instrument(name = "LedgerService::put_vendor_group", skip(self, group), fields(group_id = %group.id), err(Display))]
  pub async fn put_vendor_group(&self, group: VendorGroup) -> MarketResult<VendorGroup> {
    let id = super::require_text(&group.id, "id")?;
    let name = super::require_text(&group.name, "name")?;
    let vendor_ids = self.resolve_selector(&VendorSelector::Vendors(group.vendor_ids)).await?;
    for vendor_id in &vendor_ids {
      if self.state.store().get(collections::VENDORS, vendor_id).await?.is_none() {
        return Err(MarketError::validation(format!("unknown vendor '{vendor_id}' in group")));
      }
    }
    let group = VendorGroup { id, name, vendor_ids };
    self
      .state
      .store()
      .atomic_batch(vec![WriteOp::merge(collections::VENDOR_GROUPS, &group.id, to_document(&group)?)])
      .await?;
    Ok(group)
  }

  pub async fn delete_vendor_group(&self, group_id: &str) -> MarketResult<()> {
    self.get_vendor_group(group_id).await?;
    self.state.store().delete(collections::VENDOR_GROUPS, group_id).await?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::models::SubOrderStatus;
  use crate::models::{BankDetails, VendorStatus};

  fn vendor(rate: Option<Decimal>) -> Vendor {
    Vendor {
      id: "v1".to_string(),
      user_id: "v1".to_string(),
      business_name: "Clay & Co".to_string(),
      email: None,
      phone: None,
      address: None,
      description: None,
      business_type: None,
      logo: None,
      banner: None,
      bank_details: BankDetails::default(),
      status: VendorStatus::Approved,
      commission_rate: rate,
      rating: 0.0,
      review_count: 0,
      total_sales: Decimal::ZERO,
      total_earnings: Decimal::ZERO,
      available_balance: Decimal::ZERO,
      pending_balance: Decimal::from(1000),
      verification_documents: vec![],
      revision: 3,
      created_at: None,
      updated_at: None,
    }
  }

  fn fragment(subtotal: i64) -> VendorOrder {
    VendorOrder {
      vendor_id: "v1".to_string(),
      vendor_name: None,
      items: vec![],
      subtotal: Decimal::from(subtotal),
      status: SubOrderStatus::Shipped,
      tracking_number: None,
      carrier: None,
      shipped_at: None,
      delivered_at: None,
      settlement: None,
    }
  }

  #[test]
  fn settlement_uses_vendor_rate_or_default() {
    let s = compute_settlement(&fragment(1000), &vendor(None), Decimal::TEN);
    assert_eq!((s.gross, s.fee, s.net), (Decimal::from(1000), Decimal::from(100), Decimal::from(900)));

    let s = compute_settlement(&fragment(1000), &vendor(Some(Decimal::from(15))), Decimal::TEN);
    assert_eq!(s.fee, Decimal::from(150));
    assert_eq!(s.net, Decimal::from(850));
  }

  #[test]
  fn delivery_ops_are_guarded_by_vendor_revision() {
    let v = vendor(None);
    let s = compute_settlement(&fragment(1000), &v, Decimal::TEN);
    let ops = delivery_credit_ops("o1", &v, &s, Utc::now()).unwrap();
    assert_eq!(ops.len(), 2);
    assert_eq!(ops[0].target(), (collections::LEDGER_ENTRIES, "delivered:o1:v1"));
    match &ops[1] {
      WriteOp::Update { patch, precondition, .. } => {
        assert_eq!(precondition.as_ref(), Some(&Precondition::revision(3)));
        assert_eq!(patch["revision"], json!(4));
        assert_eq!(patch["pendingBalance"], json!(Decimal::ZERO));
      }
      other => panic!("unexpected op {other:?}"),
    }
  }
}

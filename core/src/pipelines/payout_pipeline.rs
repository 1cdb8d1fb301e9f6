// core/src/pipelines/payout_pipeline.rs

use crate::error::MarketError;
use crate::events::DomainEvent;
use crate::models::money::round2;
use crate::models::{Payout, PayoutStatus, Vendor};
use crate::pipelines::contexts::PayoutCtxData;
use crate::services::ledger::payout_ops;
use crate::services::with_cas_retry;
use crate::store::{collections, fetch};
use crate::workflow::{ContextData, Pipeline, StepControl, StepDef, Workflows};
use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{info, warn};

pub fn register_payout_pipeline(workflows: &Workflows<MarketError>) {
  let mut p = Pipeline::<PayoutCtxData, MarketError>::new(
    "vendor_payout",
    vec![
      StepDef::required("validate_amount"),
      StepDef::required("debit_balance"),
      StepDef::optional("publish_payout_requested"),
    ],
  );

  p.on_step("validate_amount", |ctx: ContextData<PayoutCtxData>| async move {
    let (vendor_id, amount) = ctx.with(|data| (data.vendor_id.clone(), data.amount));
    if vendor_id.is_empty() {
      return Err(MarketError::validation("vendorId is required"));
    }
    if amount <= Decimal::ZERO {
      return Err(MarketError::validation("payout amount must be positive"));
    }
    if round2(amount) != amount {
      return Err(MarketError::validation("payout amount has more than two decimal places"));
    }
    Ok::<_, MarketError>(StepControl::Continue)
  });

  // Balance check and debit happen against the same read of the vendor; a
  // concurrent writer forces a fresh read and a fresh check.
  p.on_step("debit_balance", |ctx: ContextData<PayoutCtxData>| async move {
    let (state, vendor_id, amount, request) =
      ctx.with(|data| (data.state.clone(), data.vendor_id.clone(), data.amount, data.request.clone()));
    let store = state.store();
    let vendor_id = vendor_id.as_str();
    let request = &request;

    let (vendor, payout) = with_cas_retry(vendor_id, state.config.cas_max_attempts, move |_| async move {
      let vendor: Vendor = fetch(store, collections::VENDORS, "vendor", vendor_id).await?;
      if amount > vendor.available_balance {
        warn!(vendor_id, %amount, available = %vendor.available_balance, "Payout exceeds available balance.");
        return Err(MarketError::InsufficientBalance {
          requested: amount,
          available: vendor.available_balance,
        });
      }
      let payout = Payout {
        id: uuid::Uuid::new_v4().to_string(),
        vendor_id: vendor.id.clone(),
        amount,
        status: PayoutStatus::Pending,
        bank_details: request.bank_details.clone().unwrap_or_else(|| vendor.bank_details.clone()),
        note: crate::services::normalize_text(request.note.clone()),
        created_at: Some(Utc::now()),
      };
      store.atomic_batch(payout_ops(&vendor, &payout)?).await?;
      Ok::<_, MarketError>((vendor, payout))
    })
    .await?;

    info!(vendor_id, payout_id = %payout.id, %amount, "Payout recorded and balance debited.");
    ctx.update(|data| {
      data.vendor = Some(vendor);
      data.payout = Some(payout);
    });
    Ok::<_, MarketError>(StepControl::Continue)
  });

  p.on_step("publish_payout_requested", |ctx: ContextData<PayoutCtxData>| async move {
    ctx.with(|data| {
      if let Some(payout) = &data.payout {
        data.state.events.publish(DomainEvent::PayoutRequested {
          payout_id: payout.id.clone(),
          vendor_id: payout.vendor_id.clone(),
          amount: payout.amount,
        });
      }
    });
    Ok::<_, MarketError>(StepControl::Continue)
  });

  workflows.register(p);
}

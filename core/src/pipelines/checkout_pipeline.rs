// core/src/pipelines/checkout_pipeline.rs

use crate::error::{MarketError, MarketResult};
use crate::events::{DomainEvent, VendorShare};
use crate::models::Vendor;
use crate::pipelines::contexts::CheckoutCtxData;
use crate::services::ledger::pending_accrual_op;
use crate::services::splitter::{build_order, generate_order_code, validate_checkout};
use crate::services::with_cas_retry;
use crate::store::{collections, fetch, stamp, to_document, DocumentStore, Query, WriteOp};
use crate::workflow::{ContextData, Pipeline, StepControl, StepDef, Workflows};
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::{error, info, warn};

/// Fresh codes drawn when a generated order code is already taken.
const ORDER_CODE_ATTEMPTS: usize = 3;

async fn order_code_taken(store: &dyn DocumentStore, code: &str) -> MarketResult<bool> {
  let hits = store
    .query(collections::ORDERS, &Query::new().where_eq("orderNumber", code).limit(1))
    .await?;
  Ok(!hits.is_empty())
}

pub fn register_checkout_pipeline(workflows: &Workflows<MarketError>) {
  let mut p = Pipeline::<CheckoutCtxData, MarketError>::new(
    "checkout",
    vec![
      StepDef::required("validate_payload"),
      StepDef::required("resolve_vendors"),
      StepDef::required("split_order"),
      StepDef::required("persist_order"),
      StepDef::optional("publish_order_placed"),
    ],
  );

  // Step 1: reject malformed carts before touching the store.
  p.on_step("validate_payload", |ctx: ContextData<CheckoutCtxData>| async move {
    let items = ctx.with(|data| validate_checkout(&data.request))?;
    let item_count = items.len();
    ctx.update(|data| data.items = items);
    info!(item_count, "Checkout payload validated.");
    Ok::<_, MarketError>(StepControl::Continue)
  });

  // Step 2: every vendor in the cart must exist; capture current names.
  p.on_step("resolve_vendors", |ctx: ContextData<CheckoutCtxData>| async move {
    let (state, vendor_ids) = ctx.with(|data| {
      let mut ids: Vec<String> = Vec::new();
      for item in &data.items {
        if !ids.contains(&item.vendor_id) {
          ids.push(item.vendor_id.clone());
        }
      }
      (data.state.clone(), ids)
    });

    let mut names = HashMap::new();
    for vendor_id in &vendor_ids {
      match state.store().get(collections::VENDORS, vendor_id).await? {
        Some(doc) => {
          let vendor: Vendor = doc.decode()?;
          names.insert(vendor.id.clone(), vendor.business_name);
        }
        None => {
          warn!(%vendor_id, "Cart references an unknown vendor.");
          return Err(MarketError::validation(format!("unknown vendor '{vendor_id}'")));
        }
      }
    }
    ctx.update(|data| data.vendor_names = names);
    Ok::<_, MarketError>(StepControl::Continue)
  });

  // Step 3: assign a code and split the items into per-vendor sub-orders.
  p.on_step("split_order", |ctx: ContextData<CheckoutCtxData>| async move {
    let state = ctx.with(|data| data.state.clone());
    let config = state.config.clone();

    let mut order_number = String::new();
    for attempt in 1..=ORDER_CODE_ATTEMPTS {
      let candidate = generate_order_code(
        &config.order_code_prefix,
        config.order_code_suffix_len,
        Utc::now(),
        &mut rand::thread_rng(),
      );
      if !order_code_taken(state.store(), &candidate).await? {
        order_number = candidate;
        break;
      }
      warn!(%candidate, attempt, "Generated order code already in use; drawing another.");
    }
    if order_number.is_empty() {
      return Err(MarketError::Conflict {
        subject: "order code".to_string(),
        attempts: ORDER_CODE_ATTEMPTS as u32,
      });
    }

    ctx.update(|data| {
      let order = build_order(
        uuid::Uuid::new_v4().to_string(),
        order_number,
        &data.request,
        std::mem::take(&mut data.items),
        &data.vendor_names,
        Utc::now(),
      )?;
      info!(
        order_id = %order.id,
        order_number = %order.order_number,
        sub_orders = order.vendor_orders.len(),
        subtotal = %order.subtotal,
        "Order split by vendor."
      );
      data.order = Some(order);
      Ok::<_, MarketError>(())
    })?;
    Ok::<_, MarketError>(StepControl::Continue)
  });

  // Every cart line lands in exactly one sub-order and the subtotals add up
  // before anything touches a vendor balance.
  p.after_step("split_order", |ctx: ContextData<CheckoutCtxData>| async move {
    let check = ctx.with(|data| {
      data.order.as_ref().map(|order| {
        let split_items: usize = order.vendor_orders.iter().map(|vo| vo.items.len()).sum();
        let split_total = order
          .vendor_orders
          .iter()
          .try_fold(Decimal::ZERO, |acc, vo| acc.checked_add(vo.subtotal));
        (order.id.clone(), order.items.len() == split_items && split_total == Some(order.subtotal))
      })
    });
    match check {
      Some((_, true)) => Ok::<_, MarketError>(StepControl::Continue),
      Some((order_id, false)) => {
        error!(%order_id, "Sub-orders do not account for the whole cart.");
        Err(MarketError::Internal(format!("order {order_id} split does not conserve the cart")))
      }
      None => Err(MarketError::Internal("split_order produced no order".to_string())),
    }
  });

  // Step 4: the order and every vendor's pending accrual land in one batch.
  p.on_step("persist_order", |ctx: ContextData<CheckoutCtxData>| async move {
    let (state, order) = ctx.with(|data| (data.state.clone(), data.order.clone()));
    let order = order.ok_or_else(|| MarketError::Internal("order missing before persist".to_string()))?;

    let mut body = to_document(&order)?;
    stamp(&mut body, &["createdAt", "updatedAt"]);
    let accruals: Vec<(String, Decimal)> = order
      .vendor_orders
      .iter()
      .map(|vo| (vo.vendor_id.clone(), vo.subtotal))
      .collect();

    let store = state.store();
    let body = &body;
    let accruals = &accruals;
    let order_id = order.id.as_str();
    let attempts = with_cas_retry(order_id, state.config.cas_max_attempts, move |attempt| async move {
      let mut ops = vec![WriteOp::insert(collections::ORDERS, order_id, body.clone())];
      for (vendor_id, subtotal) in accruals {
        let vendor: Vendor = fetch(store, collections::VENDORS, "vendor", vendor_id).await?;
        ops.push(pending_accrual_op(&vendor, *subtotal)?);
      }
      store.atomic_batch(ops).await?;
      Ok::<_, MarketError>(attempt)
    })
    .await?;

    info!(order_id, attempts, "Order persisted.");
    ctx.update(|data| data.persist_attempts = attempts);
    Ok::<_, MarketError>(StepControl::Continue)
  });

  // Step 5: notifications are best effort and run off the event stream.
  p.on_step("publish_order_placed", |ctx: ContextData<CheckoutCtxData>| async move {
    ctx.with(|data| {
      if let Some(order) = &data.order {
        data.state.events.publish(DomainEvent::OrderPlaced {
          order_id: order.id.clone(),
          order_number: order.order_number.clone(),
          customer_id: order.customer_id.clone(),
          total: order.total_amount,
          vendors: order
            .vendor_orders
            .iter()
            .map(|vo| VendorShare {
              vendor_id: vo.vendor_id.clone(),
              subtotal: vo.subtotal,
            })
            .collect(),
        });
      }
    });
    Ok::<_, MarketError>(StepControl::Continue)
  });

  workflows.register(p);
}

// core/src/services/lifecycle.rs

//! Status changes on an order and its vendor sub-orders.
//!
//! Two independent axes: each sub-order moves along its own forward-only
//! path under the acting vendor, while the overall order status is moved by
//! the administrative channel (or derived, when configured). Reaching
//! `delivered` on a sub-order settles it into the vendor's balances exactly
//! once; the order write and the balance write share one atomic batch and
//! both are guarded by `revision`.

use super::ledger::{compute_settlement, delivery_credit_ops, pending_release_op};
use super::{normalize_text, require_text, with_cas_retry};
use crate::config::OverallStatusPolicy;
use crate::error::{MarketError, MarketResult};
use crate::events::DomainEvent;
use crate::models::status::derive_overall_status;
use crate::models::{
  CancellationRecord, Order, OrderStatus, PaymentStatus, ReturnRequest, SubOrderStatus, Vendor, VendorOrder,
};
use crate::state::MarketState;
use crate::store::{collections, fetch, server_timestamp, DocumentStore, Precondition, WriteOp};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::{event, instrument, Level};

fn guarded_order_update(order: &Order, mut patch: Value) -> WriteOp {
  if let Value::Object(map) = &mut patch {
    map.insert("revision".to_string(), json!(order.revision + 1));
    map.insert("updatedAt".to_string(), server_timestamp());
  }
  WriteOp::update_if(collections::ORDERS, &order.id, patch, Precondition::revision(order.revision))
}

fn illegal(subject: String, from: impl ToString, to: impl ToString) -> MarketError {
  MarketError::State {
    subject,
    from: from.to_string(),
    to: to.to_string(),
  }
}

/// What a committed sub-order transition changed, for event publication.
#[derive(Debug, Clone)]
struct SubOrderChange {
  from: SubOrderStatus,
  to: SubOrderStatus,
  overall: Option<(OrderStatus, OrderStatus)>,
}

/// Moves `vendor_orders[idx]` to `to`, appending the balance writes the move
/// implies. The caller has checked legality.
async fn transition_sub_order(
  store: &dyn DocumentStore,
  default_rate: rust_decimal::Decimal,
  order_id: &str,
  vendor_order: &mut VendorOrder,
  to: SubOrderStatus,
  now: DateTime<Utc>,
  ops: &mut Vec<WriteOp>,
) -> MarketResult<()> {
  match to {
    SubOrderStatus::Shipped => {
      vendor_order.shipped_at = Some(now);
    }
    SubOrderStatus::Delivered => {
      let vendor: Vendor = fetch(store, collections::VENDORS, "vendor", &vendor_order.vendor_id).await?;
      let mut settlement = compute_settlement(vendor_order, &vendor, default_rate);
      settlement.settled_at = Some(now);
      ops.extend(delivery_credit_ops(order_id, &vendor, &settlement, now)?);
      event!(
        Level::INFO,
        order_id,
        vendor_id = %vendor.id,
        gross = %settlement.gross,
        fee = %settlement.fee,
        net = %settlement.net,
        "Sub-order settled."
      );
      vendor_order.delivered_at = Some(now);
      vendor_order.settlement = Some(settlement);
    }
    SubOrderStatus::Cancelled => {
      let vendor: Vendor = fetch(store, collections::VENDORS, "vendor", &vendor_order.vendor_id).await?;
      ops.push(pending_release_op(&vendor, vendor_order.subtotal));
    }
    SubOrderStatus::Pending | SubOrderStatus::Confirmed | SubOrderStatus::Processing => {}
  }
  vendor_order.status = to;
  Ok(())
}

/// Overall status to write after a sub-order change, if the policy derives
/// one and it is a legal forward move.
fn derived_overall(policy: OverallStatusPolicy, current: OrderStatus, vendor_orders: &[VendorOrder]) -> Option<OrderStatus> {
  if policy != OverallStatusPolicy::DeriveFromSubOrders {
    return None;
  }
  let statuses: Vec<SubOrderStatus> = vendor_orders.iter().map(|vo| vo.status).collect();
  derive_overall_status(&statuses).filter(|next| *next != current && current.can_transition_to(*next))
}

#[derive(Clone, Debug)]
pub struct LifecycleService {
  state: MarketState,
}

impl LifecycleService {
  pub fn new(state: MarketState) -> Self {
    Self { state }
  }

  async fn get_order(&self, order_id: &str) -> MarketResult<Order> {
    fetch(self.state.store(), collections::ORDERS, "order", order_id).await
  }

  /// With `acting_vendor_id`, moves that vendor's sub-order; without it,
  /// moves the overall order status.
  #[instrument(name = "LifecycleService::update_order_status", skip(self), err(Display))]
  pub async fn update_order_status(
    &self,
    order_id: &str,
    new_status: &str,
    acting_vendor_id: Option<&str>,
  ) -> MarketResult<Order> {
    match acting_vendor_id.map(str::trim).filter(|v| !v.is_empty()) {
      Some(vendor_id) => {
        let to: SubOrderStatus = new_status.trim().parse()?;
        self.update_sub_order_status(order_id, vendor_id, to).await
      }
      None => {
        let to: OrderStatus = new_status.trim().parse()?;
        match to {
          OrderStatus::Cancelled => return self.cancel_order(order_id, None, "admin").await,
          OrderStatus::ReturnRequested => {
            return Err(MarketError::validation(
              "returnRequested is set by the customer's return request",
            ));
          }
          _ => {}
        }
        self.update_overall_status(order_id, to).await
      }
    }
  }

  async fn update_sub_order_status(&self, order_id: &str, vendor_id: &str, to: SubOrderStatus) -> MarketResult<Order> {
    let store = self.state.store();
    let config = self.state.config.as_ref();

    let (order, change) = with_cas_retry(order_id, config.cas_max_attempts, move |_| async move {
      let order: Order = fetch(store, collections::ORDERS, "order", order_id).await?;
      let idx = order
        .vendor_order_index(vendor_id)
        .ok_or_else(|| MarketError::not_found("sub-order", format!("{order_id}/{vendor_id}")))?;
      let from = order.vendor_orders[idx].status;
      if !from.can_transition_to(to) {
        event!(Level::WARN, order_id, vendor_id, %from, %to, "Rejected sub-order transition.");
        return Err(illegal(format!("sub-order {order_id}/{vendor_id}"), from, to));
      }

      let now = Utc::now();
      let mut ops = Vec::new();
      let mut vendor_orders = order.vendor_orders.clone();
      transition_sub_order(
        store,
        config.default_commission_rate,
        order_id,
        &mut vendor_orders[idx],
        to,
        now,
        &mut ops,
      )
      .await?;

      let overall = derived_overall(config.overall_status_policy, order.status, &vendor_orders);
      let mut patch = json!({ "vendorOrders": vendor_orders });
      if let Some(next) = overall {
        patch["status"] = json!(next);
      }
      ops.insert(0, guarded_order_update(&order, patch));
      store.atomic_batch(ops).await?;

      let change = SubOrderChange {
        from,
        to,
        overall: overall.map(|next| (order.status, next)),
      };
      Ok::<_, MarketError>((order, change))
    })
    .await?;

    event!(Level::INFO, order_id, vendor_id, from = %change.from, to = %change.to, "Sub-order status updated.");
    let vendor_name = order.vendor_order(vendor_id).and_then(|vo| vo.vendor_name.clone());
    self.state.events.publish(DomainEvent::SubOrderStatusChanged {
      order_id: order.id.clone(),
      order_number: order.order_number.clone(),
      customer_id: order.customer_id.clone(),
      vendor_id: vendor_id.to_string(),
      vendor_name,
      from: change.from,
      to: change.to,
    });
    if let Some((from, to)) = change.overall {
      self.publish_overall_change(&order, from, to);
    }
    self.get_order(order_id).await
  }

  async fn update_overall_status(&self, order_id: &str, to: OrderStatus) -> MarketResult<Order> {
    let store = self.state.store();
    let (order, from) = with_cas_retry(order_id, self.state.config.cas_max_attempts, move |_| async move {
      let order: Order = fetch(store, collections::ORDERS, "order", order_id).await?;
      let from = order.status;
      if !from.can_transition_to(to) {
        event!(Level::WARN, order_id, %from, %to, "Rejected order transition.");
        return Err(illegal(format!("order {order_id}"), from, to));
      }
      store
        .atomic_batch(vec![guarded_order_update(&order, json!({ "status": to }))])
        .await?;
      Ok::<_, MarketError>((order, from))
    })
    .await?;

    event!(Level::INFO, order_id, %from, %to, "Order status updated.");
    self.publish_overall_change(&order, from, to);
    self.get_order(order_id).await
  }

  fn publish_overall_change(&self, order: &Order, from: OrderStatus, to: OrderStatus) {
    self.state.events.publish(DomainEvent::OrderStatusChanged {
      order_id: order.id.clone(),
      order_number: order.order_number.clone(),
      customer_id: order.customer_id.clone(),
      from,
      to,
    });
  }

  /// Sets tracking details and marks the vendor's sub-order shipped in the
  /// same write. On an already shipped sub-order only the tracking fields
  /// change.
  #[instrument(name = "LifecycleService::add_tracking_info", skip(self), err(Display))]
  pub async fn add_tracking_info(
    &self,
    order_id: &str,
    vendor_id: &str,
    tracking_number: &str,
    carrier: Option<String>,
  ) -> MarketResult<Order> {
    let tracking_number = require_text(tracking_number, "trackingNumber")?;
    let carrier = normalize_text(carrier);
    let store = self.state.store();
    let config = self.state.config.as_ref();
    let tracking_number = tracking_number.as_str();
    let carrier = &carrier;

    let (order, change) = with_cas_retry(order_id, config.cas_max_attempts, move |_| async move {
      let order: Order = fetch(store, collections::ORDERS, "order", order_id).await?;
      let idx = order
        .vendor_order_index(vendor_id)
        .ok_or_else(|| MarketError::not_found("sub-order", format!("{order_id}/{vendor_id}")))?;
      let from = order.vendor_orders[idx].status;
      if from.is_terminal() {
        return Err(illegal(format!("sub-order {order_id}/{vendor_id}"), from, SubOrderStatus::Shipped));
      }

      let mut ops = Vec::new();
      let mut vendor_orders = order.vendor_orders.clone();
      let fragment = &mut vendor_orders[idx];
      fragment.tracking_number = Some(tracking_number.to_string());
      fragment.carrier = carrier.clone();
      if from != SubOrderStatus::Shipped {
        transition_sub_order(
          store,
          config.default_commission_rate,
          order_id,
          fragment,
          SubOrderStatus::Shipped,
          Utc::now(),
          &mut ops,
        )
        .await?;
      }

      let overall = derived_overall(config.overall_status_policy, order.status, &vendor_orders);
      let mut patch = json!({ "vendorOrders": vendor_orders });
      if let Some(next) = overall {
        patch["status"] = json!(next);
      }
      ops.insert(0, guarded_order_update(&order, patch));
      store.atomic_batch(ops).await?;

      let change = SubOrderChange {
        from,
        to: SubOrderStatus::Shipped,
        overall: overall.map(|next| (order.status, next)),
      };
      Ok::<_, MarketError>((order, change))
    })
    .await?;

    event!(Level::INFO, order_id, vendor_id, tracking_number, "Tracking info attached.");
    if change.from != change.to {
      self.state.events.publish(DomainEvent::SubOrderStatusChanged {
        order_id: order.id.clone(),
        order_number: order.order_number.clone(),
        customer_id: order.customer_id.clone(),
        vendor_id: vendor_id.to_string(),
        vendor_name: order.vendor_order(vendor_id).and_then(|vo| vo.vendor_name.clone()),
        from: change.from,
        to: change.to,
      });
    }
    if let Some((from, to)) = change.overall {
      self.publish_overall_change(&order, from, to);
    }
    self.get_order(order_id).await
  }

  /// Cancels the whole order: every live sub-order is cancelled and its
  /// pending balance released. Delivered sub-orders keep their earnings.
  #[instrument(name = "LifecycleService::cancel_order", skip(self, reason), err(Display))]
  pub async fn cancel_order(&self, order_id: &str, reason: Option<String>, cancelled_by: &str) -> MarketResult<Order> {
    let reason = normalize_text(reason);
    let cancelled_by = require_text(cancelled_by, "cancelledBy")?;
    let store = self.state.store();
    let config = self.state.config.as_ref();
    let reason = &reason;
    let cancelled_by = cancelled_by.as_str();

    let order = with_cas_retry(order_id, config.cas_max_attempts, move |_| async move {
      let order: Order = fetch(store, collections::ORDERS, "order", order_id).await?;
      if !order.status.can_transition_to(OrderStatus::Cancelled) {
        return Err(illegal(format!("order {order_id}"), order.status, OrderStatus::Cancelled));
      }

      let now = Utc::now();
      let mut ops = Vec::new();
      let mut vendor_orders = order.vendor_orders.clone();
      for fragment in vendor_orders.iter_mut().filter(|vo| !vo.status.is_terminal()) {
        transition_sub_order(
          store,
          config.default_commission_rate,
          order_id,
          fragment,
          SubOrderStatus::Cancelled,
          now,
          &mut ops,
        )
        .await?;
      }
      let record = CancellationRecord {
        reason: reason.clone(),
        cancelled_by: cancelled_by.to_string(),
        cancelled_at: now,
      };
      let patch = json!({
        "status": OrderStatus::Cancelled,
        "vendorOrders": vendor_orders,
        "cancellation": record,
      });
      ops.insert(0, guarded_order_update(&order, patch));
      store.atomic_batch(ops).await?;
      Ok::<_, MarketError>(order)
    })
    .await?;

    event!(Level::INFO, order_id, cancelled_by, "Order cancelled.");
    self.state.events.publish(DomainEvent::OrderCancelled {
      order_id: order.id.clone(),
      order_number: order.order_number.clone(),
      customer_id: order.customer_id.clone(),
      reason: reason.clone(),
      vendor_ids: order.vendor_ids.clone(),
    });
    self.get_order(order_id).await
  }

  /// Opens a return for a delivered order on behalf of the customer who
  /// placed it.
  #[instrument(name = "LifecycleService::request_return", skip(self, reason), err(Display))]
  pub async fn request_return(&self, order_id: &str, customer_id: &str, reason: &str) -> MarketResult<Order> {
    let reason = require_text(reason, "reason")?;
    let store = self.state.store();
    let reason = reason.as_str();

    let order = with_cas_retry(order_id, self.state.config.cas_max_attempts, move |_| async move {
      let order: Order = fetch(store, collections::ORDERS, "order", order_id).await?;
      if order.customer_id != customer_id {
        return Err(MarketError::validation("only the ordering customer can request a return"));
      }
      let delivered = order.status == OrderStatus::Delivered || order.all_live_sub_orders_delivered();
      if !delivered || order.status.is_terminal() || order.status.in_return_path() {
        return Err(illegal(format!("order {order_id}"), order.status, OrderStatus::ReturnRequested));
      }
      let request = ReturnRequest {
        reason: reason.to_string(),
        requested_by: customer_id.to_string(),
        requested_at: Utc::now(),
      };
      let patch = json!({ "status": OrderStatus::ReturnRequested, "returnRequest": request });
      store.atomic_batch(vec![guarded_order_update(&order, patch)]).await?;
      Ok::<_, MarketError>(order)
    })
    .await?;

    event!(Level::INFO, order_id, customer_id, "Return requested.");
    self.state.events.publish(DomainEvent::ReturnRequested {
      order_id: order.id.clone(),
      order_number: order.order_number.clone(),
      customer_id: order.customer_id.clone(),
    });
    self.get_order(order_id).await
  }

  #[instrument(name = "LifecycleService::update_payment_status", skip(self), err(Display))]
  pub async fn update_payment_status(&self, order_id: &str, status: PaymentStatus) -> MarketResult<Order> {
    let store = self.state.store();
    with_cas_retry(order_id, self.state.config.cas_max_attempts, move |_| async move {
      let order: Order = fetch(store, collections::ORDERS, "order", order_id).await?;
      if order.payment_status == status {
        return Ok(());
      }
      store
        .atomic_batch(vec![guarded_order_update(&order, json!({ "paymentStatus": status }))])
        .await?;
      Ok::<_, MarketError>(())
    })
    .await?;
    event!(Level::INFO, order_id, %status, "Payment status updated.");
    self.get_order(order_id).await
  }
}

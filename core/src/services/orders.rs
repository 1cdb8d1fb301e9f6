// core/src/services/orders.rs

use crate::error::{MarketError, MarketResult};
use crate::models::{CheckoutRequest, Order, OrderStatus, SubOrderStatus};
use crate::pipelines::contexts::CheckoutCtxData;
use crate::state::MarketState;
use crate::store::{collections, fetch_all, Direction, Query};
use crate::workflow::{ContextData, PipelineOutcome};
use serde::{Deserialize, Serialize};
use tracing::{event, instrument, Level};

/// Admin listing filter. `limit` defaults to 50.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OrderListQuery {
  pub status: Option<OrderStatus>,
  pub offset: usize,
  pub limit: Option<usize>,
}

const DEFAULT_PAGE_SIZE: usize = 50;

#[derive(Clone, Debug)]
pub struct OrderService {
  state: MarketState,
}

impl OrderService {
  pub fn new(state: MarketState) -> Self {
    Self { state }
  }

  /// Splits a checkout into per-vendor sub-orders and stores it in one write.
  #[instrument(name = "OrderService::create_order", skip_all, fields(customer_id = %request.customer_id), err(Display))]
  pub async fn create_order(&self, request: CheckoutRequest) -> MarketResult<Order> {
    let ctx = ContextData::new(CheckoutCtxData::new(self.state.clone(), request));
    match self.state.workflows.run(ctx.clone()).await? {
      PipelineOutcome::Completed => ctx
        .with(|data| data.order.clone())
        .ok_or_else(|| MarketError::Internal("checkout completed without an order".to_string())),
      PipelineOutcome::Stopped => Err(MarketError::Internal("checkout pipeline stopped early".to_string())),
    }
  }

  /// Looks an order up by id, then by order code.
  pub async fn get_order(&self, id_or_code: &str) -> MarketResult<Order> {
    let key = id_or_code.trim();
    if key.is_empty() {
      return Err(MarketError::validation("order id is required"));
    }
    if let Some(doc) = self.state.store().get(collections::ORDERS, key).await? {
      return Ok(doc.decode()?);
    }
    let by_code: Vec<Order> = fetch_all(
      self.state.store(),
      collections::ORDERS,
      &Query::new().where_eq("orderNumber", key).limit(1),
    )
    .await?;
    by_code
      .into_iter()
      .next()
      .ok_or_else(|| MarketError::not_found("order", key))
  }

  pub async fn list_by_customer(&self, customer_id: &str, status: Option<OrderStatus>) -> MarketResult<Vec<Order>> {
    let mut query = Query::new().where_eq("customerId", customer_id);
    if let Some(status) = status {
      query = query.where_eq("status", status.as_str());
    }
    fetch_all(
      self.state.store(),
      collections::ORDERS,
      &query.order_by("createdAt", Direction::Desc),
    )
    .await
  }

  /// Orders containing a sub-order of `vendor_id`, optionally narrowed to
  /// that sub-order's status.
  pub async fn list_by_vendor(&self, vendor_id: &str, status: Option<SubOrderStatus>) -> MarketResult<Vec<Order>> {
    let query = Query::new()
      .array_contains("vendorIds", vendor_id)
      .order_by("createdAt", Direction::Desc);
    let orders: Vec<Order> = fetch_all(self.state.store(), collections::ORDERS, &query).await?;
    let Some(status) = status else {
      return Ok(orders);
    };
    Ok(
      orders
        .into_iter()
        .filter(|order| order.vendor_order(vendor_id).is_some_and(|vo| vo.status == status))
        .collect(),
    )
  }

  #[instrument(name = "OrderService::list_all", skip(self), err(Display))]
  pub async fn list_all(&self, filter: &OrderListQuery) -> MarketResult<Vec<Order>> {
    let mut query = Query::new();
    if let Some(status) = filter.status {
      query = query.where_eq("status", status.as_str());
    }
    let query = query
      .order_by("createdAt", Direction::Desc)
      .offset(filter.offset)
      .limit(filter.limit.unwrap_or(DEFAULT_PAGE_SIZE));
    let orders: Vec<Order> = fetch_all(self.state.store(), collections::ORDERS, &query).await?;
    event!(Level::DEBUG, count = orders.len(), "Listed orders.");
    Ok(orders)
  }
}

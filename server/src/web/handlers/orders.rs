// server/src/web/handlers/orders.rs

use actix_web::{web, HttpResponse};
use marketplace::models::{CheckoutRequest, OrderStatus, PaymentStatus};
use marketplace::OrderListQuery;
use serde::Deserialize;
use tracing::{info, instrument};

use super::{parse_status, ActingUser};
use crate::errors::{ApiError, Result};
use crate::state::AppState;

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct OrderListParams {
  pub status: Option<String>,
  pub offset: usize,
  pub limit: Option<usize>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdatePayload {
  pub status: String,
  /// Present when a vendor moves its own sub-order.
  pub vendor_id: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TrackingPayload {
  pub vendor_id: String,
  pub tracking_number: String,
  pub carrier: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ReasonPayload {
  pub reason: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload {
  pub payment_status: String,
}

#[instrument(name = "handler::create_order", skip(app_state, payload, user), fields(user_id = %user.user_id))]
pub async fn create_order_handler(
  app_state: web::Data<AppState>,
  user: ActingUser,
  payload: web::Json<CheckoutRequest>,
) -> Result<HttpResponse> {
  let mut request = payload.into_inner();
  if request.customer_id.trim().is_empty() {
    request.customer_id = user.user_id.clone();
  } else if request.customer_id != user.user_id {
    return Err(ApiError::BadRequest("customerId does not match the acting user".to_string()));
  }
  let order = app_state.market.orders().create_order(request).await?;
  info!(order_id = %order.id, order_number = %order.order_number, "Order placed.");
  Ok(HttpResponse::Created().json(order))
}

#[instrument(name = "handler::get_order", skip(app_state))]
pub async fn get_order_handler(app_state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse> {
  let order = app_state.market.orders().get_order(&path.into_inner()).await?;
  Ok(HttpResponse::Ok().json(order))
}

#[instrument(name = "handler::list_orders", skip(app_state))]
pub async fn list_orders_handler(
  app_state: web::Data<AppState>,
  params: web::Query<OrderListParams>,
) -> Result<HttpResponse> {
  let params = params.into_inner();
  let filter = OrderListQuery {
    status: parse_status::<OrderStatus>(params.status.as_deref())?,
    offset: params.offset,
    limit: params.limit,
  };
  let orders = app_state.market.orders().list_all(&filter).await?;
  Ok(HttpResponse::Ok().json(orders))
}

#[instrument(name = "handler::list_my_orders", skip(app_state, user), fields(user_id = %user.user_id))]
pub async fn list_my_orders_handler(
  app_state: web::Data<AppState>,
  user: ActingUser,
  params: web::Query<OrderListParams>,
) -> Result<HttpResponse> {
  let status = parse_status::<OrderStatus>(params.status.as_deref())?;
  let orders = app_state.market.orders().list_by_customer(&user.user_id, status).await?;
  Ok(HttpResponse::Ok().json(orders))
}

#[instrument(name = "handler::update_order_status", skip(app_state, payload))]
pub async fn update_status_handler(
  app_state: web::Data<AppState>,
  path: web::Path<String>,
  payload: web::Json<StatusUpdatePayload>,
) -> Result<HttpResponse> {
  let order_id = path.into_inner();
  let payload = payload.into_inner();
  let order = app_state
    .market
    .lifecycle()
    .update_order_status(&order_id, &payload.status, payload.vendor_id.as_deref())
    .await?;
  Ok(HttpResponse::Ok().json(order))
}

#[instrument(name = "handler::add_tracking", skip(app_state, payload))]
pub async fn add_tracking_handler(
  app_state: web::Data<AppState>,
  path: web::Path<String>,
  payload: web::Json<TrackingPayload>,
) -> Result<HttpResponse> {
  let order_id = path.into_inner();
  let payload = payload.into_inner();
  let order = app_state
    .market
    .lifecycle()
    .add_tracking_info(&order_id, &payload.vendor_id, &payload.tracking_number, payload.carrier)
    .await?;
  Ok(HttpResponse::Ok().json(order))
}

#[instrument(name = "handler::cancel_order", skip(app_state, payload, user), fields(user_id = %user.user_id))]
pub async fn cancel_order_handler(
  app_state: web::Data<AppState>,
  user: ActingUser,
  path: web::Path<String>,
  payload: Option<web::Json<ReasonPayload>>,
) -> Result<HttpResponse> {
  let reason = payload.and_then(|p| p.into_inner().reason);
  let order = app_state
    .market
    .lifecycle()
    .cancel_order(&path.into_inner(), reason, &user.user_id)
    .await?;
  Ok(HttpResponse::Ok().json(order))
}

#[instrument(name = "handler::request_return", skip(app_state, payload, user), fields(user_id = %user.user_id))]
pub async fn request_return_handler(
  app_state: web::Data<AppState>,
  user: ActingUser,
  path: web::Path<String>,
  payload: web::Json<ReasonPayload>,
) -> Result<HttpResponse> {
  let reason = payload.into_inner().reason.unwrap_or_default();
  let order = app_state
    .market
    .lifecycle()
    .request_return(&path.into_inner(), &user.user_id, &reason)
    .await?;
  Ok(HttpResponse::Ok().json(order))
}

#[instrument(name = "handler::update_payment_status", skip(app_state, payload))]
pub async fn update_payment_handler(
  app_state: web::Data<AppState>,
  path: web::Path<String>,
  payload: web::Json<PaymentPayload>,
) -> Result<HttpResponse> {
  let status: PaymentStatus = payload.payment_status.trim().parse()?;
  let order = app_state
    .market
    .lifecycle()
    .update_payment_status(&path.into_inner(), status)
    .await?;
  Ok(HttpResponse::Ok().json(order))
}

// server/src/web/handlers/vendors.rs

use actix_web::{web, HttpResponse};
use marketplace::models::{
  BankDetails, PayoutRequest, SubOrderStatus, VendorGroup, VendorProfileUpdate, VendorRegistration, VendorSelector,
  VendorStatus,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};

use super::{parse_status, ActingUser};
use crate::errors::{ApiError, Result};
use crate::state::AppState;

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct StatusFilter {
  pub status: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct StatsParams {
  /// Comma-separated vendor ids.
  pub ids: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct VendorStatusPayload {
  pub status: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CommissionPayload {
  /// `null` falls back to the platform default.
  pub commission_rate: Option<Decimal>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PayoutPayload {
  pub amount: Decimal,
  #[serde(default)]
  pub bank_details: Option<BankDetails>,
  #[serde(default)]
  pub note: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GroupPayload {
  pub name: String,
  pub vendor_ids: Vec<String>,
}

#[instrument(name = "handler::register_vendor", skip(app_state, payload, user), fields(user_id = %user.user_id))]
pub async fn register_vendor_handler(
  app_state: web::Data<AppState>,
  user: ActingUser,
  payload: web::Json<VendorRegistration>,
) -> Result<HttpResponse> {
  let mut registration = payload.into_inner();
  registration.user_id = user.user_id;
  let vendor = app_state.market.vendors().register_vendor(registration).await?;
  info!(vendor_id = %vendor.id, "Vendor registration received.");
  Ok(HttpResponse::Created().json(vendor))
}

#[instrument(name = "handler::list_vendors", skip(app_state))]
pub async fn list_vendors_handler(
  app_state: web::Data<AppState>,
  params: web::Query<StatusFilter>,
) -> Result<HttpResponse> {
  let status = parse_status::<VendorStatus>(params.status.as_deref())?;
  Ok(HttpResponse::Ok().json(app_state.market.vendors().list_vendors(status).await?))
}

#[instrument(name = "handler::get_vendor", skip(app_state))]
pub async fn get_vendor_handler(app_state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse> {
  Ok(HttpResponse::Ok().json(app_state.market.vendors().get_vendor(&path.into_inner()).await?))
}

#[instrument(name = "handler::update_vendor_profile", skip(app_state, payload))]
pub async fn update_profile_handler(
  app_state: web::Data<AppState>,
  path: web::Path<String>,
  payload: web::Json<VendorProfileUpdate>,
) -> Result<HttpResponse> {
  let vendor = app_state
    .market
    .vendors()
    .update_vendor_profile(&path.into_inner(), payload.into_inner())
    .await?;
  Ok(HttpResponse::Ok().json(vendor))
}

#[instrument(name = "handler::update_vendor_status", skip(app_state, payload))]
pub async fn update_status_handler(
  app_state: web::Data<AppState>,
  path: web::Path<String>,
  payload: web::Json<VendorStatusPayload>,
) -> Result<HttpResponse> {
  let status: VendorStatus = payload.status.trim().parse()?;
  let vendor = app_state
    .market
    .vendors()
    .update_vendor_status(&path.into_inner(), status)
    .await?;
  Ok(HttpResponse::Ok().json(vendor))
}

#[instrument(name = "handler::set_commission_rate", skip(app_state, payload))]
pub async fn set_commission_handler(
  app_state: web::Data<AppState>,
  path: web::Path<String>,
  payload: web::Json<CommissionPayload>,
) -> Result<HttpResponse> {
  let vendor = app_state
    .market
    .vendors()
    .set_commission_rate(&path.into_inner(), payload.commission_rate)
    .await?;
  Ok(HttpResponse::Ok().json(vendor))
}

#[instrument(name = "handler::vendor_orders", skip(app_state))]
pub async fn vendor_orders_handler(
  app_state: web::Data<AppState>,
  path: web::Path<String>,
  params: web::Query<StatusFilter>,
) -> Result<HttpResponse> {
  let status = parse_status::<SubOrderStatus>(params.status.as_deref())?;
  let orders = app_state
    .market
    .orders()
    .list_by_vendor(&path.into_inner(), status)
    .await?;
  Ok(HttpResponse::Ok().json(orders))
}

#[instrument(name = "handler::vendor_customers", skip(app_state))]
pub async fn vendor_customers_handler(
  app_state: web::Data<AppState>,
  path: web::Path<String>,
) -> Result<HttpResponse> {
  let customers = app_state
    .market
    .vendors()
    .list_vendor_customers(&path.into_inner())
    .await?;
  Ok(HttpResponse::Ok().json(customers))
}

#[instrument(name = "handler::vendor_stats", skip(app_state))]
pub async fn vendor_stats_handler(app_state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse> {
  let selector = VendorSelector::Vendor(path.into_inner());
  Ok(HttpResponse::Ok().json(app_state.market.ledger().get_vendor_stats(&selector).await?))
}

#[instrument(name = "handler::multi_vendor_stats", skip(app_state))]
pub async fn multi_vendor_stats_handler(
  app_state: web::Data<AppState>,
  params: web::Query<StatsParams>,
) -> Result<HttpResponse> {
  let ids: Vec<String> = params
    .ids
    .as_deref()
    .unwrap_or_default()
    .split(',')
    .map(str::trim)
    .filter(|id| !id.is_empty())
    .map(str::to_string)
    .collect();
  if ids.is_empty() {
    return Err(ApiError::BadRequest("ids must name at least one vendor".to_string()));
  }
  let selector = VendorSelector::Vendors(ids);
  Ok(HttpResponse::Ok().json(app_state.market.ledger().get_vendor_stats(&selector).await?))
}

#[instrument(name = "handler::request_payout", skip(app_state, payload))]
pub async fn request_payout_handler(
  app_state: web::Data<AppState>,
  path: web::Path<String>,
  payload: web::Json<PayoutPayload>,
) -> Result<HttpResponse> {
  let payload = payload.into_inner();
  let request = PayoutRequest {
    bank_details: payload.bank_details,
    note: payload.note,
  };
  let payout = app_state
    .market
    .ledger()
    .process_vendor_payout(&path.into_inner(), payload.amount, request)
    .await?;
  Ok(HttpResponse::Created().json(payout))
}

#[instrument(name = "handler::list_payouts", skip(app_state))]
pub async fn list_payouts_handler(app_state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse> {
  Ok(HttpResponse::Ok().json(app_state.market.ledger().list_payouts(&path.into_inner()).await?))
}

#[instrument(name = "handler::ledger_entries", skip(app_state))]
pub async fn ledger_entries_handler(app_state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse> {
  let entries = app_state
    .market
    .ledger()
    .list_ledger_entries(&path.into_inner())
    .await?;
  Ok(HttpResponse::Ok().json(entries))
}

#[instrument(name = "handler::reconcile_balances", skip(app_state))]
pub async fn reconcile_handler(app_state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse> {
  let report = app_state
    .market
    .ledger()
    .reconcile_vendor_balances(&path.into_inner())
    .await?;
  Ok(HttpResponse::Ok().json(report))
}

#[instrument(name = "handler::list_vendor_groups", skip(app_state))]
pub async fn list_groups_handler(app_state: web::Data<AppState>) -> Result<HttpResponse> {
  Ok(HttpResponse::Ok().json(app_state.market.ledger().list_vendor_groups().await?))
}

#[instrument(name = "handler::get_vendor_group", skip(app_state))]
pub async fn get_group_handler(app_state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse> {
  Ok(HttpResponse::Ok().json(app_state.market.ledger().get_vendor_group(&path.into_inner()).await?))
}

#[instrument(name = "handler::put_vendor_group", skip(app_state, payload))]
pub async fn put_group_handler(
  app_state: web::Data<AppState>,
  path: web::Path<String>,
  payload: web::Json<GroupPayload>,
) -> Result<HttpResponse> {
  let payload = payload.into_inner();
  let group = VendorGroup {
    id: path.into_inner(),
    name: payload.name,
    vendor_ids: payload.vendor_ids,
  };
  Ok(HttpResponse::Ok().json(app_state.market.ledger().put_vendor_group(group).await?))
}

#[instrument(name = "handler::delete_vendor_group", skip(app_state))]
pub async fn delete_group_handler(app_state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse> {
  let group_id = path.into_inner();
  app_state.market.ledger().delete_vendor_group(&group_id).await?;
  Ok(HttpResponse::Ok().json(json!({ "deleted": group_id })))
}

#[instrument(name = "handler::vendor_group_stats", skip(app_state))]
pub async fn group_stats_handler(app_state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse> {
  let selector = VendorSelector::Group(path.into_inner());
  Ok(HttpResponse::Ok().json(app_state.market.ledger().get_vendor_stats(&selector).await?))
}

// server/src/web/handlers/catalog.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use tracing::instrument;

use crate::errors::Result;
use crate::state::AppState;

#[derive(Deserialize, Debug)]
pub struct ModerationPayload {
  pub approved: bool,
  #[serde(default)]
  pub reason: Option<String>,
}

#[instrument(name = "handler::get_product", skip(app_state))]
pub async fn get_product_handler(app_state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse> {
  Ok(HttpResponse::Ok().json(app_state.market.catalog().get_product(&path.into_inner()).await?))
}

#[instrument(name = "handler::vendor_products", skip(app_state))]
pub async fn vendor_products_handler(app_state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse> {
  Ok(HttpResponse::Ok().json(app_state.market.catalog().list_by_vendor(&path.into_inner()).await?))
}

#[instrument(name = "handler::moderate_product", skip(app_state, payload))]
pub async fn moderate_product_handler(
  app_state: web::Data<AppState>,
  path: web::Path<String>,
  payload: web::Json<ModerationPayload>,
) -> Result<HttpResponse> {
  let payload = payload.into_inner();
  let product = app_state
    .market
    .catalog()
    .moderate_product(&path.into_inner(), payload.approved, payload.reason)
    .await?;
  Ok(HttpResponse::Ok().json(product))
}

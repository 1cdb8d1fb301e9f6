// server/src/web/handlers/reviews.rs

use actix_web::{web, HttpResponse};
use marketplace::models::{ReviewInput, ReviewStatus, ReviewSubject};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};

use super::{parse_status, ActingUser};
use crate::errors::{ApiError, Result};
use crate::state::AppState;

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct ReviewListParams {
  pub status: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct ReviewStatusPayload {
  pub status: String,
  #[serde(default)]
  pub reason: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct ReplyPayload {
  pub text: String,
}

#[instrument(name = "handler::submit_review", skip(app_state, payload, user), fields(user_id = %user.user_id))]
pub async fn submit_review_handler(
  app_state: web::Data<AppState>,
  user: ActingUser,
  payload: web::Json<ReviewInput>,
) -> Result<HttpResponse> {
  let mut input = payload.into_inner();
  match input.customer_id.as_deref() {
    None => input.customer_id = Some(user.user_id.clone()),
    Some(customer_id) if customer_id != user.user_id => {
      return Err(ApiError::BadRequest("customerId does not match the acting user".to_string()));
    }
    Some(_) => {}
  }
  let review = app_state.market.reviews().submit_review(input).await?;
  info!(review_id = %review.id, status = %review.status, "Review submitted.");
  Ok(HttpResponse::Created().json(review))
}

#[instrument(name = "handler::get_review", skip(app_state))]
pub async fn get_review_handler(app_state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse> {
  Ok(HttpResponse::Ok().json(app_state.market.reviews().get_review(&path.into_inner()).await?))
}

#[instrument(name = "handler::list_reviews", skip(app_state))]
pub async fn list_reviews_handler(
  app_state: web::Data<AppState>,
  params: web::Query<ReviewListParams>,
) -> Result<HttpResponse> {
  let status = parse_status::<ReviewStatus>(params.status.as_deref())?;
  Ok(HttpResponse::Ok().json(app_state.market.reviews().list_all(status).await?))
}

#[instrument(name = "handler::product_reviews", skip(app_state))]
pub async fn product_reviews_handler(app_state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse> {
  Ok(HttpResponse::Ok().json(app_state.market.reviews().list_by_product(&path.into_inner()).await?))
}

#[instrument(name = "handler::store_reviews", skip(app_state))]
pub async fn store_reviews_handler(app_state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse> {
  Ok(HttpResponse::Ok().json(app_state.market.reviews().list_by_store(&path.into_inner()).await?))
}

/// Every review of the vendor whatever its status, for the vendor dashboard.
#[instrument(name = "handler::vendor_reviews", skip(app_state))]
pub async fn vendor_reviews_handler(app_state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse> {
  Ok(HttpResponse::Ok().json(app_state.market.reviews().list_by_vendor(&path.into_inner()).await?))
}

#[instrument(name = "handler::my_reviews", skip(app_state, user), fields(user_id = %user.user_id))]
pub async fn my_reviews_handler(app_state: web::Data<AppState>, user: ActingUser) -> Result<HttpResponse> {
  Ok(HttpResponse::Ok().json(app_state.market.reviews().list_by_customer(&user.user_id).await?))
}

#[instrument(name = "handler::update_review_status", skip(app_state, payload))]
pub async fn update_status_handler(
  app_state: web::Data<AppState>,
  path: web::Path<String>,
  payload: web::Json<ReviewStatusPayload>,
) -> Result<HttpResponse> {
  let payload = payload.into_inner();
  let status: ReviewStatus = payload.status.trim().parse()?;
  let review = app_state
    .market
    .reviews()
    .update_review_status(&path.into_inner(), status, payload.reason)
    .await?;
  Ok(HttpResponse::Ok().json(review))
}

#[instrument(name = "handler::reply_to_review", skip(app_state, payload))]
pub async fn reply_handler(
  app_state: web::Data<AppState>,
  path: web::Path<String>,
  payload: web::Json<ReplyPayload>,
) -> Result<HttpResponse> {
  let review = app_state
    .market
    .reviews()
    .reply_to_review(&path.into_inner(), &payload.text)
    .await?;
  Ok(HttpResponse::Ok().json(review))
}

#[instrument(name = "handler::mark_review_helpful", skip(app_state))]
pub async fn helpful_handler(app_state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse> {
  Ok(HttpResponse::Ok().json(app_state.market.reviews().mark_helpful(&path.into_inner()).await?))
}

#[instrument(name = "handler::delete_review", skip(app_state))]
pub async fn delete_review_handler(app_state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse> {
  let review_id = path.into_inner();
  app_state.market.reviews().delete_review(&review_id).await?;
  Ok(HttpResponse::Ok().json(json!({ "deleted": review_id })))
}

#[instrument(name = "handler::reconcile_ratings", skip(app_state, payload))]
pub async fn reconcile_ratings_handler(
  app_state: web::Data<AppState>,
  payload: web::Json<ReviewSubject>,
) -> Result<HttpResponse> {
  let (product, vendor) = app_state
    .market
    .reviews()
    .reconcile_aggregates(&payload.into_inner())
    .await?;
  Ok(HttpResponse::Ok().json(json!({ "product": product, "vendor": vendor })))
}

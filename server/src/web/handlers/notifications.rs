// server/src/web/handlers/notifications.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use super::ActingUser;
use crate::errors::Result;
use crate::state::AppState;

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct InboxParams {
  pub unread_only: bool,
}

#[instrument(name = "handler::list_notifications", skip(app_state, user), fields(user_id = %user.user_id))]
pub async fn list_handler(
  app_state: web::Data<AppState>,
  user: ActingUser,
  params: web::Query<InboxParams>,
) -> Result<HttpResponse> {
  let notifications = app_state
    .market
    .notifications()
    .list_for_user(&user.user_id, params.unread_only)
    .await?;
  Ok(HttpResponse::Ok().json(notifications))
}

#[instrument(name = "handler::mark_notification_read", skip(app_state))]
pub async fn mark_read_handler(app_state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse> {
  app_state.market.notifications().mark_read(&path.into_inner()).await?;
  Ok(HttpResponse::NoContent().finish())
}

#[instrument(name = "handler::mark_all_notifications_read", skip(app_state, user), fields(user_id = %user.user_id))]
pub async fn mark_all_read_handler(app_state: web::Data<AppState>, user: ActingUser) -> Result<HttpResponse> {
  let updated = app_state.market.notifications().mark_all_read(&user.user_id).await?;
  Ok(HttpResponse::Ok().json(json!({ "updated": updated })))
}

#[instrument(name = "handler::delete_notification", skip(app_state))]
pub async fn delete_handler(app_state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse> {
  app_state.market.notifications().delete(&path.into_inner()).await?;
  Ok(HttpResponse::NoContent().finish())
}

#[instrument(name = "handler::delete_all_notifications", skip(app_state, user), fields(user_id = %user.user_id))]
pub async fn delete_all_handler(app_state: web::Data<AppState>, user: ActingUser) -> Result<HttpResponse> {
  let deleted = app_state.market.notifications().delete_all(&user.user_id).await?;
  Ok(HttpResponse::Ok().json(json!({ "deleted": deleted })))
}

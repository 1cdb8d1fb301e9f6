// server/src/web/mod.rs

pub mod handlers;
pub mod routes;

pub use routes::configure_app_routes;

use crate::errors::ApiError;
use actix_web::web;

/// Body limits and JSON rejection mapped onto the API error envelope.
pub fn json_config() -> web::JsonConfig {
  web::JsonConfig::default()
    .limit(256 * 1024)
    .error_handler(|err, _req| ApiError::BadRequest(err.to_string()).into())
}

/// Same envelope for malformed query strings.
pub fn query_config() -> web::QueryConfig {
  web::QueryConfig::default().error_handler(|err, _req| ApiError::BadRequest(err.to_string()).into())
}

// server/src/errors.rs

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use marketplace::MarketError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
  #[error(transparent)]
  Market(#[from] MarketError),

  #[error("Authentication required: {0}")]
  Auth(String),

  #[error("Bad request: {0}")]
  BadRequest(String),

  #[error("Configuration Error: {0}")]
  Config(String),

  #[error("Database Error: {0}")]
  Sqlx(#[from] sqlx::Error),
}

impl ApiError {
  pub fn kind(&self) -> &'static str {
    match self {
      ApiError::Market(inner) => inner.kind(),
      ApiError::Auth(_) => "auth",
      ApiError::BadRequest(_) => "validation",
      ApiError::Config(_) => "config",
      ApiError::Sqlx(_) => "persistence",
    }
  }
}

impl ResponseError for ApiError {
  fn status_code(&self) -> StatusCode {
    match self {
      ApiError::Market(inner) => match inner {
        MarketError::Validation(_) => StatusCode::BAD_REQUEST,
        MarketError::NotFound { .. } => StatusCode::NOT_FOUND,
        MarketError::State { .. } | MarketError::Conflict { .. } => StatusCode::CONFLICT,
        MarketError::InsufficientBalance { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        MarketError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
      },
      ApiError::Auth(_) => StatusCode::UNAUTHORIZED,
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Config(_) | ApiError::Sqlx(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  fn error_response(&self) -> HttpResponse {
    let status = self.status_code();
    if status.is_server_error() {
      tracing::error!(error = %self, kind = self.kind(), "Responding with error");
    } else {
      tracing::warn!(error = %self, kind = self.kind(), "Request rejected");
    }
    // Backend details stay in the logs.
    let message = match self {
      ApiError::Sqlx(_) => "Database operation failed".to_string(),
      ApiError::Market(MarketError::Persistence { .. }) => "Storage operation failed".to_string(),
      other => other.to_string(),
    };
    HttpResponse::build(status).json(json!({ "error": message, "kind": self.kind() }))
  }
}

pub type Result<T, E = ApiError> = std::result::Result<T, E>;

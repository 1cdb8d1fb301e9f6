// server/src/web/handlers/mod.rs

pub mod catalog;
pub mod notifications;
pub mod orders;
pub mod reviews;
pub mod vendors;

use crate::errors::ApiError;
use actix_web::{dev::Payload, FromRequest, HttpRequest};
use futures_util::future::{ready, Ready};
use tracing::warn;

pub const USER_HEADER: &str = "X-User-Id";

/// The caller, as asserted by the authenticating proxy in front of us.
#[derive(Debug, Clone)]
pub struct ActingUser {
  pub user_id: String,
}

impl FromRequest for ActingUser {
  type Error = ApiError;
  type Future = Ready<Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
    let user_id = req
      .headers()
      .get(USER_HEADER)
      .and_then(|value| value.to_str().ok())
      .map(str::trim)
      .filter(|value| !value.is_empty());
    match user_id {
      Some(user_id) => ready(Ok(ActingUser {
        user_id: user_id.to_string(),
      })),
      None => {
        warn!("Missing or invalid {} header.", USER_HEADER);
        ready(Err(ApiError::Auth(format!("missing {} header", USER_HEADER))))
      }
    }
  }
}

/// Parses an optional status filter from a query string.
pub(crate) fn parse_status<T>(raw: Option<&str>) -> Result<Option<T>, ApiError>
where
  T: std::str::FromStr<Err = marketplace::MarketError>,
{
  match raw.map(str::trim).filter(|s| !s.is_empty()) {
    Some(text) => Ok(Some(text.parse::<T>()?)),
    None => Ok(None),
  }
}

// core/src/services/mod.rs

//! Marketplace operations, grouped by the aggregate they work on. Every
//! service is a cheap clone over [`crate::state::MarketState`].

pub mod catalog;
pub mod ledger;
pub mod lifecycle;
pub mod moderation;
pub mod notifications;
pub mod orders;
pub mod reviews;
pub mod splitter;
pub mod vendors;

pub use catalog::CatalogService;
pub use ledger::LedgerService;
pub use lifecycle::LifecycleService;
pub use notifications::{NotificationDispatcher, NotificationService};
pub use orders::{OrderListQuery, OrderService};
pub use reviews::ReviewService;
pub use vendors::VendorService;

use crate::error::{MarketError, MarketResult};
use crate::store::is_precondition_failure;
use std::future::Future;
use tracing::{event, Level};

/// Runs `attempt` until it stops failing on a compare-and-swap guard.
///
/// Each attempt must re-read the documents it guards. Any other error ends
/// the loop immediately.
pub(crate) async fn with_cas_retry<T, F, Fut>(subject: &str, max_attempts: u32, mut attempt: F) -> MarketResult<T>
where
  F: FnMut(u32) -> Fut,
  Fut: Future<Output = MarketResult<T>>,
{
  for n in 1..=max_attempts {
    match attempt(n).await {
      Err(e) if is_precondition_failure(&e) => {
        event!(Level::DEBUG, subject, attempt = n, "Concurrent modification detected; retrying.");
      }
      other => return other,
    }
  }
  event!(Level::WARN, subject, attempts = max_attempts, "Giving up after repeated write conflicts.");
  Err(MarketError::Conflict {
    subject: subject.to_string(),
    attempts: max_attempts,
  })
}

/// Trims free text; blank becomes `None`.
pub(crate) fn normalize_text(value: Option<String>) -> Option<String> {
  value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

pub(crate) fn require_text(value: &str, field: &str) -> MarketResult<String> {
  let trimmed = value.trim();
  if trimmed.is_empty() {
    return Err(MarketError::validation(format!("{field} is required")));
  }
  Ok(trimmed.to_string())
}

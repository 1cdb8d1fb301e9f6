// core/src/services/moderation.rs

//! The review moderation gate: first matching rule wins.

use crate::error::{MarketError, MarketResult};
use crate::models::ModerationDecision;

pub const REASON_FIRST_TIME_REVIEWER: &str = "first time reviewer";
pub const REASON_LOW_RATING: &str = "low rating";
pub const REASON_FLAGGED_CONTENT: &str = "flagged content";
/// Used when the gate itself could not run; never approve blind.
pub const REASON_MODERATION_UNAVAILABLE: &str = "moderation unavailable";

/// Ratings at or below this are held.
pub const LOW_RATING_THRESHOLD: u8 = 2;

pub fn validate_rating(rating: i64) -> MarketResult<u8> {
  match u8::try_from(rating) {
    Ok(r @ 1..=5) => Ok(r),
    _ => Err(MarketError::validation(format!("rating must be between 1 and 5, got {rating}"))),
  }
}

/// Case-insensitive substring match of any denylisted term in title + comment.
pub fn contains_flagged_term(title: Option<&str>, comment: Option<&str>, denylist: &[String]) -> bool {
  let text = format!("{} {}", title.unwrap_or_default(), comment.unwrap_or_default()).to_lowercase();
  denylist
    .iter()
    .map(|term| term.trim().to_lowercase())
    .any(|term| !term.is_empty() && text.contains(&term))
}

pub fn decide(
  prior_approved_reviews: usize,
  rating: u8,
  title: Option<&str>,
  comment: Option<&str>,
  denylist: &[String],
) -> ModerationDecision {
  if prior_approved_reviews == 0 {
    return ModerationDecision::pending(REASON_FIRST_TIME_REVIEWER);
  }
  if rating <= LOW_RATING_THRESHOLD {
    return ModerationDecision::pending(REASON_LOW_RATING);
  }
  if contains_flagged_term(title, comment, denylist) {
    return ModerationDecision::pending(REASON_FLAGGED_CONTENT);
  }
  ModerationDecision::approved()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::models::ReviewStatus;

  fn denylist() -> Vec<String> {
    vec!["scam".to_string(), "fake".to_string()]
  }

  #[test]
  fn rules_apply_in_order() {
    let first = decide(0, 5, Some("Lovely"), Some("great gift"), &denylist());
    assert_eq!(first, ModerationDecision::pending(REASON_FIRST_TIME_REVIEWER));

    let low = decide(2, 1, Some("Meh"), Some("arrived late"), &denylist());
    assert_eq!(low, ModerationDecision::pending(REASON_LOW_RATING));

    let flagged = decide(2, 5, Some("Total SCAM"), None, &denylist());
    assert_eq!(flagged, ModerationDecision::pending(REASON_FLAGGED_CONTENT));

    let ok = decide(1, 4, Some("Nice"), Some("well packed"), &denylist());
    assert_eq!(ok.status, ReviewStatus::Approved);
    assert_eq!(ok.reason, None);
  }

  #[test]
  fn rating_bounds() {
    assert_eq!(validate_rating(1).unwrap(), 1);
    assert_eq!(validate_rating(5).unwrap(), 5);
    assert!(validate_rating(0).is_err());
    assert!(validate_rating(6).is_err());
    assert!(validate_rating(-3).is_err());
  }
}

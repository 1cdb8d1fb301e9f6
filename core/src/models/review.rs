// core/src/models/review.rs

use super::status::ReviewStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorReply {
  pub text: String,
  pub replied_at: DateTime<Utc>,
}

/// A product review, or a store review when `product_id` is `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
  pub id: String,
  pub product_id: Option<String>,
  pub vendor_id: String,
  pub customer_id: String,
  pub customer_name: Option<String>,
  pub rating: u8,
  pub title: Option<String>,
  pub comment: Option<String>,
  #[serde(default)]
  pub images: Vec<String>,
  pub status: ReviewStatus,
  pub moderation_reason: Option<String>,
  #[serde(default)]
  pub helpful_count: u64,
  #[serde(default)]
  pub vendor_reply: Option<VendorReply>,
  #[serde(default)]
  pub revision: u64,
  pub created_at: Option<DateTime<Utc>>,
  pub updated_at: Option<DateTime<Utc>>,
}

impl Review {
  pub fn subject(&self) -> ReviewSubject {
    ReviewSubject {
      product_id: self.product_id.clone(),
      vendor_id: Some(self.vendor_id.clone()),
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReviewInput {
  pub product_id: Option<String>,
  pub vendor_id: Option<String>,
  pub customer_id: Option<String>,
  pub customer_name: Option<String>,
  pub rating: i64,
  pub title: Option<String>,
  pub comment: Option<String>,
  pub images: Vec<String>,
}

/// The aggregates a review feeds: its product (if any) and its vendor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReviewSubject {
  pub product_id: Option<String>,
  pub vendor_id: Option<String>,
}

/// Outcome of the moderation gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModerationDecision {
  pub status: ReviewStatus,
  pub reason: Option<String>,
}

impl ModerationDecision {
  pub fn approved() -> Self {
    Self {
      status: ReviewStatus::Approved,
      reason: None,
    }
  }

  pub fn pending(reason: &str) -> Self {
    Self {
      status: ReviewStatus::Pending,
      reason: Some(reason.to_string()),
    }
  }
}

/// Recomputed mean rating and count for one subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingAggregate {
  pub rating: f64,
  pub review_count: u64,
}

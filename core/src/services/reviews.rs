// core/src/services/reviews.rs

use super::{require_text, with_cas_retry};
use crate::error::{MarketError, MarketResult};
use crate::models::money::mean_rating;
use crate::models::{RatingAggregate, Review, ReviewInput, ReviewStatus, ReviewSubject, VendorReply};
use crate::pipelines::contexts::ReviewSubmissionCtxData;
use crate::state::MarketState;
use crate::store::{collections, fetch, fetch_all, server_timestamp, Direction, Precondition, Query, WriteOp};
use crate::workflow::{ContextData, PipelineOutcome};
use chrono::Utc;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{event, instrument, Level};

const REFRESH_BACKOFF: Duration = Duration::from_millis(50);

async fn aggregate_for(state: &MarketState, field: &str, id: &str) -> MarketResult<RatingAggregate> {
  let query = Query::new()
    .where_eq(field, id)
    .where_eq("status", ReviewStatus::Approved.as_str());
  let approved: Vec<Review> = fetch_all(state.store(), collections::REVIEWS, &query).await?;
  let ratings: Vec<u8> = approved.iter().map(|r| r.rating).collect();
  Ok(RatingAggregate {
    rating: mean_rating(&ratings),
    review_count: ratings.len() as u64,
  })
}

/// Bumped by every aggregate write on a product or vendor document.
pub const RATING_GENERATION_FIELD: &str = "ratingGeneration";

/// Recomputes and stores one subject's aggregate. The generation is read
/// before the reviews are queried and the write is guarded on it, so a
/// refresh computed from an older review set cannot overwrite a newer one.
/// Only the aggregate fields are written; balance writers guarded by
/// `revision` are not disturbed.
async fn refresh_aggregate(
  state: &MarketState,
  collection: &str,
  field: &str,
  id: &str,
) -> MarketResult<RatingAggregate> {
  with_cas_retry(id, state.config.cas_max_attempts, move |_| async move {
    let generation = state
      .store()
      .get(collection, id)
      .await?
      .map(|doc| doc.body.get(RATING_GENERATION_FIELD).cloned().unwrap_or(Value::Null));
    let aggregate = aggregate_for(state, field, id).await?;
    let Some(generation) = generation else {
      event!(Level::DEBUG, collection, key = id, "Aggregate subject no longer exists; skipping.");
      return Ok(aggregate);
    };
    let next = generation.as_u64().unwrap_or(0) + 1;
    let patch = json!({
      "rating": aggregate.rating,
      "reviewCount": aggregate.review_count,
      (RATING_GENERATION_FIELD): next,
    });
    state
      .store()
      .atomic_batch(vec![WriteOp::update_if(
        collection,
        id,
        patch,
        Precondition::field_equals(RATING_GENERATION_FIELD, generation),
      )])
      .await?;
    Ok::<_, MarketError>(aggregate)
  })
  .await
}

/// Recomputes the approved-review mean and count for the product and the
/// vendor of `subject`. Returns `(product, vendor)` aggregates.
pub(crate) async fn recompute_aggregates(
  state: &MarketState,
  subject: &ReviewSubject,
) -> MarketResult<(Option<RatingAggregate>, Option<RatingAggregate>)> {
  let mut product_aggregate = None;
  if let Some(product_id) = &subject.product_id {
    product_aggregate = Some(refresh_aggregate(state, collections::PRODUCTS, "productId", product_id).await?);
  }
  let mut vendor_aggregate = None;
  if let Some(vendor_id) = &subject.vendor_id {
    vendor_aggregate = Some(refresh_aggregate(state, collections::VENDORS, "vendorId", vendor_id).await?);
  }
  Ok((product_aggregate, vendor_aggregate))
}

/// Recomputes aggregates in the background, retrying a few times. Failures
/// are logged; the caller's mutation already stands.
pub(crate) fn schedule_aggregate_refresh(state: &MarketState, subject: ReviewSubject) {
  let state = state.clone();
  let attempts = state.config.aggregate_recompute_attempts;
  state.tasks.clone().spawn(async move {
    for attempt in 1..=attempts {
      match recompute_aggregates(&state, &subject).await {
        Ok(_) => {
          event!(Level::DEBUG, ?subject, attempt, "Aggregates refreshed.");
          return;
        }
        Err(e) => {
          event!(Level::WARN, ?subject, attempt, error = %e, "Aggregate refresh failed.");
          tokio::time::sleep(REFRESH_BACKOFF * attempt).await;
        }
      }
    }
    event!(Level::ERROR, ?subject, attempts, "Aggregate refresh abandoned; reconcile later.");
  });
}

#[derive(Clone, Debug)]
pub struct ReviewService {
  state: MarketState,
}

impl ReviewService {
  pub fn new(state: MarketState) -> Self {
    Self { state }
  }

  /// Moderates and stores a review. Never drops a review: when moderation
  /// cannot decide, the review is kept as pending.
  #[instrument(name = "ReviewService::submit_review", skip_all, err(Display))]
  pub async fn submit_review(&self, input: ReviewInput) -> MarketResult<Review> {
    let ctx = ContextData::new(ReviewSubmissionCtxData::new(self.state.clone(), input));
    match self.state.workflows.run(ctx.clone()).await? {
      PipelineOutcome::Completed => ctx
        .with(|data| data.review.clone())
        .ok_or_else(|| MarketError::Internal("review pipeline completed without a review".to_string())),
      PipelineOutcome::Stopped => Err(MarketError::Internal("review pipeline stopped early".to_string())),
    }
  }

  pub async fn get_review(&self, review_id: &str) -> MarketResult<Review> {
    fetch(self.state.store(), collections::REVIEWS, "review", review_id).await
  }

  async fn list(&self, query: Query) -> MarketResult<Vec<Review>> {
    fetch_all(
      self.state.store(),
      collections::REVIEWS,
      &query.order_by("createdAt", Direction::Desc),
    )
    .await
  }

  /// Approved reviews of a product.
  pub async fn list_by_product(&self, product_id: &str) -> MarketResult<Vec<Review>> {
    self
      .list(
        Query::new()
          .where_eq("productId", product_id)
          .where_eq("status", ReviewStatus::Approved.as_str()),
      )
      .await
  }

  /// Approved store-level reviews of a vendor.
  pub async fn list_by_store(&self, vendor_id: &str) -> MarketResult<Vec<Review>> {
    self
      .list(
        Query::new()
          .where_eq("vendorId", vendor_id)
          .where_eq("productId", Value::Null)
          .where_eq("status", ReviewStatus::Approved.as_str()),
      )
      .await
  }

  /// Every review of a vendor's products and store, any status.
  pub async fn list_by_vendor(&self, vendor_id: &str) -> MarketResult<Vec<Review>> {
    self.list(Query::new().where_eq("vendorId", vendor_id)).await
  }

  pub async fn list_by_customer(&self, customer_id: &str) -> MarketResult<Vec<Review>> {
    self.list(Query::new().where_eq("customerId", customer_id)).await
  }

  pub async fn list_all(&self, status: Option<ReviewStatus>) -> MarketResult<Vec<Review>> {
    let query = match status {
      Some(status) => Query::new().where_eq("status", status.as_str()),
      None => Query::new(),
    };
    self.list(query).await
  }

  /// Re-reads a review and applies `patch_for` under its revision guard.
  async fn guarded_update<F>(&self, review_id: &str, patch_for: F) -> MarketResult<Review>
  where
    F: Fn(&Review) -> MarketResult<Option<Value>>,
  {
    let store = self.state.store();
    let patch_for = &patch_for;
    with_cas_retry(review_id, self.state.config.cas_max_attempts, move |_| async move {
      let review: Review = fetch(store, collections::REVIEWS, "review", review_id).await?;
      let Some(mut patch) = patch_for(&review)? else {
        return Ok(review);
      };
      if let Value::Object(map) = &mut patch {
        map.insert("revision".to_string(), json!(review.revision + 1));
        map.insert("updatedAt".to_string(), server_timestamp());
      }
      store
        .atomic_batch(vec![WriteOp::update_if(
          collections::REVIEWS,
          review_id,
          patch,
          Precondition::revision(review.revision),
        )])
        .await?;
      fetch(store, collections::REVIEWS, "review", review_id).await
    })
    .await
  }

  #[instrument(name = "ReviewService::update_review_status", skip(self), err(Display))]
  pub async fn update_review_status(
    &self,
    review_id: &str,
    status: ReviewStatus,
    reason: Option<String>,
  ) -> MarketResult<Review> {
    let reason = super::normalize_text(reason);
    let review = self
      .guarded_update(review_id, |current| {
        if current.status == status && reason.is_none() {
          return Ok(None);
        }
        Ok(Some(json!({ "status": status, "moderationReason": reason })))
      })
      .await?;
    schedule_aggregate_refresh(&self.state, review.subject());
    Ok(review)
  }

  /// A vendor reply approves the review whatever its prior status.
  #[instrument(name = "ReviewService::reply_to_review", skip(self, text), err(Display))]
  pub async fn reply_to_review(&self, review_id: &str, text: &str) -> MarketResult<Review> {
    let text = require_text(text, "reply text")?;
    let review = self
      .guarded_update(review_id, |_| {
        let reply = VendorReply {
          text: text.clone(),
          replied_at: Utc::now(),
        };
        Ok(Some(json!({
          "vendorReply": reply,
          "status": ReviewStatus::Approved,
          "moderationReason": Value::Null,
        })))
      })
      .await?;
    schedule_aggregate_refresh(&self.state, review.subject());
    Ok(review)
  }

  pub async fn mark_helpful(&self, review_id: &str) -> MarketResult<Review> {
    self
      .guarded_update(review_id, |current| Ok(Some(json!({ "helpfulCount": current.helpful_count + 1 }))))
      .await
  }

  #[instrument(name = "ReviewService::delete_review", skip(self), err(Display))]
  pub async fn delete_review(&self, review_id: &str) -> MarketResult<()> {
    let review = self.get_review(review_id).await?;
    self.state.store().delete(collections::REVIEWS, review_id).await?;
    event!(Level::INFO, review_id, "Review deleted.");
    schedule_aggregate_refresh(&self.state, review.subject());
    Ok(())
  }

  /// Synchronous recompute, for repair jobs and admin tooling.
  #[instrument(name = "ReviewService::reconcile_aggregates", skip(self), err(Display))]
  pub async fn reconcile_aggregates(
    &self,
    subject: &ReviewSubject,
  ) -> MarketResult<(Option<RatingAggregate>, Option<RatingAggregate>)> {
    if subject.product_id.is_none() && subject.vendor_id.is_none() {
      return Err(MarketError::validation("a product or vendor is required"));
    }
    recompute_aggregates(&self.state, subject).await
  }
}

// core/src/pipelines/review_pipeline.rs

use crate::error::MarketError;
use crate::events::DomainEvent;
use crate::models::{ModerationDecision, Product, Review, ReviewStatus, Vendor};
use crate::pipelines::contexts::ReviewSubmissionCtxData;
use crate::services::moderation::{self, REASON_MODERATION_UNAVAILABLE};
use crate::services::reviews::schedule_aggregate_refresh;
use crate::services::{normalize_text, require_text};
use crate::store::{collections, fetch, stamp, to_document, Query, WriteOp};
use crate::workflow::{ContextData, Pipeline, StepControl, StepDef, Workflows};
use chrono::Utc;
use tracing::{info, warn};

fn is_approved(ctx: &ContextData<ReviewSubmissionCtxData>) -> bool {
  ctx.with(|data| matches!(&data.decision, Some(d) if d.status == ReviewStatus::Approved))
}

pub fn register_review_pipeline(workflows: &Workflows<MarketError>) {
  let mut p = Pipeline::<ReviewSubmissionCtxData, MarketError>::new(
    "review_submission",
    vec![
      StepDef::required("validate_input"),
      StepDef::required("resolve_subject"),
      StepDef::required("moderate"),
      StepDef::required("persist_review"),
      StepDef::optional("refresh_aggregates").skip_if(|ctx| !is_approved(ctx)),
      StepDef::optional("publish_review_submitted"),
    ],
  );

  p.on_step("validate_input", |ctx: ContextData<ReviewSubmissionCtxData>| async move {
    let checked = ctx.with(|data| -> Result<_, MarketError> {
      let input = &data.input;
      let customer_id = require_text(input.customer_id.as_deref().unwrap_or_default(), "customerId")?;
      let product_id = normalize_text(input.product_id.clone());
      let vendor_id = normalize_text(input.vendor_id.clone());
      if product_id.is_none() && vendor_id.is_none() {
        return Err(MarketError::validation("either productId or vendorId is required"));
      }
      let rating = moderation::validate_rating(input.rating)?;
      Ok((customer_id, product_id, vendor_id, rating))
    })?;
    ctx.update(|data| {
      (data.customer_id, data.product_id, data.vendor_id, data.rating) = checked;
    });
    Ok::<_, MarketError>(StepControl::Continue)
  });

  // A product review names its vendor through the product record.
  p.on_step("resolve_subject", |ctx: ContextData<ReviewSubmissionCtxData>| async move {
    let (state, product_id, vendor_id) =
      ctx.with(|data| (data.state.clone(), data.product_id.clone(), data.vendor_id.clone()));
    let store = state.store();

    let vendor_id = match product_id {
      Some(product_id) => {
        let product: Product = fetch(store, collections::PRODUCTS, "product", &product_id).await?;
        match vendor_id {
          Some(given) if given != product.vendor_id => {
            return Err(MarketError::validation(format!(
              "vendorId '{given}' does not own product '{product_id}'"
            )));
          }
          _ => product.vendor_id,
        }
      }
      None => {
        let vendor_id = vendor_id.unwrap_or_default();
        let vendor: Vendor = fetch(store, collections::VENDORS, "vendor", &vendor_id).await?;
        vendor.id
      }
    };
    ctx.update(|data| data.vendor_id = Some(vendor_id));
    Ok::<_, MarketError>(StepControl::Continue)
  });

  p.on_step("moderate", |ctx: ContextData<ReviewSubmissionCtxData>| async move {
    let (state, customer_id, rating, title, comment) = ctx.with(|data| {
      (
        data.state.clone(),
        data.customer_id.clone(),
        data.rating,
        normalize_text(data.input.title.clone()),
        normalize_text(data.input.comment.clone()),
      )
    });

    let history = Query::new()
      .where_eq("customerId", customer_id.as_str())
      .where_eq("status", ReviewStatus::Approved.as_str())
      .limit(1);
    let decision = match state.store().query(collections::REVIEWS, &history).await {
      Ok(prior) => moderation::decide(
        prior.len(),
        rating,
        title.as_deref(),
        comment.as_deref(),
        &state.config.review_denylist,
      ),
      Err(e) => {
        warn!(%customer_id, error = %e, "Reviewer history unavailable; holding review for moderation.");
        ModerationDecision::pending(REASON_MODERATION_UNAVAILABLE)
      }
    };
    info!(%customer_id, status = %decision.status, reason = ?decision.reason, "Review moderated.");
    ctx.update(|data| data.decision = Some(decision));
    Ok::<_, MarketError>(StepControl::Continue)
  });

  // No review is stored without a moderation decision; lacking one it is
  // held for a moderator.
  p.before_step("persist_review", |ctx: ContextData<ReviewSubmissionCtxData>| async move {
    ctx.update(|data| {
      if data.decision.is_none() {
        warn!(customer_id = %data.customer_id, "No moderation decision recorded; holding review.");
        data.decision = Some(ModerationDecision::pending(REASON_MODERATION_UNAVAILABLE));
      }
    });
    Ok::<_, MarketError>(StepControl::Continue)
  });

  p.on_step("persist_review", |ctx: ContextData<ReviewSubmissionCtxData>| async move {
    let decision = ctx
      .with(|data| data.decision.clone())
      .ok_or_else(|| MarketError::Internal("review reached persist without a decision".to_string()))?;
    let (state, review) = ctx.with(|data| {
      let now = Utc::now();
      let review = Review {
        id: uuid::Uuid::new_v4().to_string(),
        product_id: data.product_id.clone(),
        vendor_id: data.vendor_id.clone().unwrap_or_default(),
        customer_id: data.customer_id.clone(),
        customer_name: normalize_text(data.input.customer_name.clone()),
        rating: data.rating,
        title: normalize_text(data.input.title.clone()),
        comment: normalize_text(data.input.comment.clone()),
        images: data.input.images.iter().filter(|i| !i.trim().is_empty()).cloned().collect(),
        status: decision.status,
        moderation_reason: decision.reason,
        helpful_count: 0,
        vendor_reply: None,
        revision: 1,
        created_at: Some(now),
        updated_at: Some(now),
      };
      (data.state.clone(), review)
    });

    let mut body = to_document(&review)?;
    stamp(&mut body, &["createdAt", "updatedAt"]);
    state
      .store()
      .atomic_batch(vec![WriteOp::insert(collections::REVIEWS, &review.id, body)])
      .await?;
    info!(review_id = %review.id, vendor_id = %review.vendor_id, status = %review.status, "Review stored.");
    ctx.update(|data| data.review = Some(review));
    Ok::<_, MarketError>(StepControl::Continue)
  });

  p.on_step("refresh_aggregates", |ctx: ContextData<ReviewSubmissionCtxData>| async move {
    ctx.with(|data| {
      if let Some(review) = &data.review {
        schedule_aggregate_refresh(&data.state, review.subject());
      }
    });
    Ok::<_, MarketError>(StepControl::Continue)
  });

  p.on_step("publish_review_submitted", |ctx: ContextData<ReviewSubmissionCtxData>| async move {
    ctx.with(|data| {
      if let Some(review) = &data.review {
        data.state.events.publish(DomainEvent::ReviewSubmitted {
          review_id: review.id.clone(),
          vendor_id: review.vendor_id.clone(),
          product_id: review.product_id.clone(),
          rating: review.rating,
          status: review.status,
        });
      }
    });
    Ok::<_, MarketError>(StepControl::Continue)
  });

  workflows.register(p);
}

// core/src/pipelines/mod.rs

pub mod checkout_pipeline;
pub mod contexts;
pub mod payout_pipeline;
pub mod review_pipeline;

use crate::error::MarketError;
use crate::workflow::Workflows;

pub fn register_all_pipelines(workflows: &Workflows<MarketError>) {
  checkout_pipeline::register_checkout_pipeline(workflows);
  payout_pipeline::register_payout_pipeline(workflows);
  review_pipeline::register_review_pipeline(workflows);
  tracing::info!(pipelines = ?workflows.registered_names(), "Marketplace pipelines registered.");
}

// core/src/workflow/mod.rs

//! A small async step-pipeline engine.
//!
//! Business operations made of several ordered steps (checkout, vendor
//! payout, review submission) are expressed as a [`Pipeline`] of named steps
//! whose handlers share one [`ContextData`]. Pipelines are registered once in
//! a [`Workflows`] registry and looked up by their context type when run.

pub mod context_data;
pub mod control;
pub mod pipeline;
pub mod registry;
pub mod step;

pub use context_data::ContextData;
pub use control::{PipelineOutcome, StepControl};
pub use pipeline::{Handler, Pipeline};
pub use registry::Workflows;
pub use step::{SkipCondition, StepDef};

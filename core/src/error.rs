// core/src/error.rs

//! Error types for the three layers of the crate: the step engine
//! (`PipelineError`), the document store (`StoreError`) and the marketplace
//! domain (`MarketError`).

use anyhow::Error as AnyhowError;
use rust_decimal::Decimal;
use std::time::Duration;
use thiserror::Error;

/// Framework-level failures of the step engine in [`crate::workflow`].
#[derive(Debug, Error)]
pub enum PipelineError {
  #[error("Handler missing for required step: {step_name}")]
  HandlerMissing { step_name: String },

  #[error("No pipeline registered for context type {type_name}")]
  NotRegistered { type_name: String },

  #[error("Context type mismatch (expected {expected_type})")]
  TypeMismatch { expected_type: String },

  #[error("Internal pipeline error: {0}")]
  Internal(String),
}

/// Failures reported by a [`crate::store::DocumentStore`] implementation.
#[derive(Debug, Error)]
pub enum StoreError {
  #[error("Document {collection}/{key} not found")]
  NotFound { collection: String, key: String },

  #[error("Document {collection}/{key} already exists")]
  AlreadyExists { collection: String, key: String },

  #[error("Precondition failed on {collection}/{key}: field '{field}' changed")]
  PreconditionFailed {
    collection: String,
    key: String,
    field: String,
  },

  #[error("Document is not a JSON object: {0}")]
  NotAnObject(String),

  #[error("Document (de)serialization failed: {0}")]
  Serialization(#[from] serde_json::Error),

  #[error("Store backend failure: {0}")]
  Backend(#[source] AnyhowError),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Domain error taxonomy surfaced by every marketplace operation.
#[derive(Debug, Error)]
pub enum MarketError {
  #[error("Validation error: {0}")]
  Validation(String),

  #[error("{entity} '{key}' not found")]
  NotFound { entity: &'static str, key: String },

  #[error("Insufficient balance: requested {requested}, available {available}")]
  InsufficientBalance { requested: Decimal, available: Decimal },

  #[error("Illegal status transition on {subject}: {from} -> {to}")]
  State {
    subject: String,
    from: String,
    to: String,
  },

  #[error("Persistence error: {source}")]
  Persistence {
    #[source]
    source: StoreError,
  },

  #[error("Concurrent modification of {subject}; gave up after {attempts} attempts")]
  Conflict { subject: String, attempts: u32 },

  #[error("Operation '{operation}' timed out after {after:?}")]
  Timeout { operation: &'static str, after: Duration },

  #[error("Configuration error: {0}")]
  Config(String),

  #[error("Workflow error: {source}")]
  Workflow {
    #[from]
    source: PipelineError,
  },

  #[error("Internal error: {0}")]
  Internal(String),
}

impl MarketError {
  pub fn not_found(entity: &'static str, key: impl Into<String>) -> Self {
    MarketError::NotFound {
      entity,
      key: key.into(),
    }
  }

  pub fn validation(message: impl Into<String>) -> Self {
    MarketError::Validation(message.into())
  }

  /// Stable machine-readable tag, used by the HTTP layer and in logs.
  pub fn kind(&self) -> &'static str {
    match self {
      MarketError::Validation(_) => "validation",
      MarketError::NotFound { .. } => "not_found",
      MarketError::InsufficientBalance { .. } => "insufficient_balance",
      MarketError::State { .. } => "state",
      MarketError::Persistence { .. } => "persistence",
      MarketError::Conflict { .. } => "conflict",
      MarketError::Timeout { .. } => "timeout",
      MarketError::Config(_) => "config",
      MarketError::Workflow { .. } => "workflow",
      MarketError::Internal(_) => "internal",
    }
  }
}

impl From<StoreError> for MarketError {
  fn from(err: StoreError) -> Self {
    MarketError::Persistence { source: err }
  }
}

impl From<serde_json::Error> for MarketError {
  fn from(err: serde_json::Error) -> Self {
    MarketError::Persistence {
      source: StoreError::Serialization(err),
    }
  }
}

impl From<AnyhowError> for MarketError {
  fn from(err: AnyhowError) -> Self {
    MarketError::Internal(format!("{err:#}"))
  }
}

pub type MarketResult<T, E = MarketError> = std::result::Result<T, E>;

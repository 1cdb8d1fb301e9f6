// core/src/state.rs

use crate::config::MarketConfig;
use crate::error::MarketError;
use crate::events::EventBus;
use crate::store::DocumentStore;
use crate::workflow::Workflows;
use std::sync::Arc;
use tokio_util::task::TaskTracker;

/// Shared handles every service and pipeline context carries.
#[derive(Clone)]
pub struct MarketState {
  pub store: Arc<dyn DocumentStore>,
  pub events: EventBus,
  pub config: Arc<MarketConfig>,
  pub workflows: Arc<Workflows<MarketError>>,
  /// Background work (aggregate refreshes) spawned on behalf of callers.
  pub tasks: TaskTracker,
}

impl MarketState {
  pub fn new(store: Arc<dyn DocumentStore>, events: EventBus, config: MarketConfig) -> Self {
    Self {
      store,
      events,
      config: Arc::new(config),
      workflows: Arc::new(Workflows::new()),
      tasks: TaskTracker::new(),
    }
  }

  pub fn store(&self) -> &dyn DocumentStore {
    self.store.as_ref()
  }
}

impl std::fmt::Debug for MarketState {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("MarketState")
      .field("config", &self.config)
      .field("pipelines", &self.workflows.registered_names())
      .field("background_tasks", &self.tasks.len())
      .finish()
  }
}

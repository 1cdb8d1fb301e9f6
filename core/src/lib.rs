// core/src/lib.rs

//! Core of a multi-vendor marketplace.
//!
//! A checkout becomes one [`models::Order`] split into per-vendor
//! [`models::VendorOrder`]s. Each sub-order moves through its own lifecycle;
//! delivery settles it into the vendor's balances (commission deducted)
//! exactly once. Reviews pass a moderation gate before they count towards
//! product and vendor ratings. Side effects that must not fail an operation
//! (notifications) run off a [`events::DomainEvent`] stream.
//!
//! Storage is abstracted behind [`store::DocumentStore`]; the crate ships an
//! in-memory implementation and the server crate a Postgres-backed one.
//!
//! ```ignore
//! let (market, events) = Marketplace::new(Arc::new(MemoryStore::new()), MarketConfig::default())?;
//! let dispatcher = market.dispatcher().spawn(events, shutdown.clone());
//! let order = market.orders().create_order(request).await?;
//! market.lifecycle().update_order_status(&order.id, "delivered", Some("vendor-1")).await?;
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod models;
pub mod pipelines;
pub mod services;
pub mod state;
pub mod store;
pub mod workflow;

pub use crate::config::{MarketConfig, OverallStatusPolicy};
pub use crate::error::{MarketError, MarketResult, PipelineError, StoreError, StoreResult};
pub use crate::events::{DomainEvent, EventBus, EventStream};
pub use crate::services::{
  CatalogService, LedgerService, LifecycleService, NotificationDispatcher, NotificationService, OrderListQuery,
  OrderService, ReviewService, VendorService,
};
pub use crate::state::MarketState;
pub use crate::store::{DocumentStore, MemoryStore};

use std::sync::Arc;

/// Entry point bundling the shared state with one handle per service.
#[derive(Clone, Debug)]
pub struct Marketplace {
  state: MarketState,
}

impl Marketplace {
  /// Builds the shared state and registers every pipeline. The returned
  /// stream carries domain events; hand it to a [`NotificationDispatcher`]
  /// or drain it yourself.
  pub fn new(store: Arc<dyn DocumentStore>, config: MarketConfig) -> MarketResult<(Self, EventStream)> {
    config.validate()?;
    let (bus, stream) = EventBus::channel();
    let state = MarketState::new(store, bus, config);
    pipelines::register_all_pipelines(&state.workflows);
    Ok((Self { state }, stream))
  }

  pub fn state(&self) -> &MarketState {
    &self.state
  }

  pub fn orders(&self) -> OrderService {
    OrderService::new(self.state.clone())
  }

  pub fn lifecycle(&self) -> LifecycleService {
    LifecycleService::new(self.state.clone())
  }

  pub fn ledger(&self) -> LedgerService {
    LedgerService::new(self.state.clone())
  }

  pub fn vendors(&self) -> VendorService {
    VendorService::new(self.state.clone())
  }

  pub fn reviews(&self) -> ReviewService {
    ReviewService::new(self.state.clone())
  }

  pub fn catalog(&self) -> CatalogService {
    CatalogService::new(self.state.clone())
  }

  pub fn notifications(&self) -> NotificationService {
    NotificationService::new(self.state.clone())
  }

  pub fn dispatcher(&self) -> NotificationDispatcher {
    NotificationDispatcher::new(self.state.clone())
  }

  /// Waits for background work spawned so far (aggregate refreshes).
  pub async fn settle(&self) {
    self.state.tasks.close();
    self.state.tasks.wait().await;
    self.state.tasks.reopen();
  }
}

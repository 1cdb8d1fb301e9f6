// server/src/state.rs
use crate::config::ServerConfig;
use marketplace::Marketplace;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
  pub market: Marketplace,
  pub config: Arc<ServerConfig>,
}

// server/src/config.rs

use crate::errors::{ApiError, Result};
use dotenvy::dotenv;
use marketplace::MarketConfig;
use std::env;

#[derive(Debug, Clone)]
pub struct ServerConfig {
  pub server_host: String,
  pub server_port: u16,
  /// PostgreSQL store when set, in-memory store otherwise.
  pub database_url: Option<String>,
  pub db_max_connections: u32,
  pub dispatch_notifications: bool,
  pub market: MarketConfig,
}

impl ServerConfig {
  pub fn from_env() -> Result<Self> {
    dotenv().ok();

    let get_env = |var_name: &str| env::var(var_name).ok().filter(|v| !v.trim().is_empty());

    let server_host = get_env("SERVER_HOST").unwrap_or_else(|| "127.0.0.1".to_string());
    let server_port = get_env("SERVER_PORT")
      .unwrap_or_else(|| "8080".to_string())
      .parse::<u16>()
      .map_err(|e| ApiError::Config(format!("Invalid SERVER_PORT: {}", e)))?;
    let database_url = get_env("DATABASE_URL");
    let db_max_connections = get_env("DB_MAX_CONNECTIONS")
      .unwrap_or_else(|| "10".to_string())
      .parse::<u32>()
      .map_err(|e| ApiError::Config(format!("Invalid DB_MAX_CONNECTIONS: {}", e)))?;
    let dispatch_notifications = get_env("DISPATCH_NOTIFICATIONS")
      .unwrap_or_else(|| "true".to_string())
      .parse::<bool>()
      .map_err(|e| ApiError::Config(format!("Invalid DISPATCH_NOTIFICATIONS value: {}", e)))?;

    let market = MarketConfig::from_env()?;

    tracing::info!(
      host = %server_host,
      port = server_port,
      postgres = database_url.is_some(),
      dispatch_notifications,
      "Server configuration loaded."
    );

    Ok(Self {
      server_host,
      server_port,
      database_url,
      db_max_connections,
      dispatch_notifications,
      market,
    })
  }

  pub fn bind_address(&self) -> String {
    format!("{}:{}", self.server_host, self.server_port)
  }
}

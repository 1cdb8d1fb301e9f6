// server/src/main.rs

use actix_web::{web as actix_data, App, HttpServer};
use marketplace::{DocumentStore, Marketplace, MemoryStore};
use marketplace_server::pg_store::PgDocumentStore;
use marketplace_server::{AppState, ServerConfig};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
  tracing_subscriber::fmt()
    .with_max_level(Level::INFO)
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .with_span_events(FmtSpan::CLOSE)
    .init();

  tracing::info!("Starting marketplace server...");

  let server_config = match ServerConfig::from_env() {
    Ok(cfg) => Arc::new(cfg),
    Err(e) => {
      tracing::error!(error = %e, "Failed to load server configuration.");
      return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()));
    }
  };

  let store: Arc<dyn DocumentStore> = match &server_config.database_url {
    Some(url) => {
      let pg = PgDocumentStore::connect(url, server_config.db_max_connections)
        .await
        .map_err(|e| {
          tracing::error!(error = %e, "Failed to connect to the database.");
          std::io::Error::new(std::io::ErrorKind::ConnectionRefused, e.to_string())
        })?;
      pg.ensure_schema().await.map_err(|e| {
        tracing::error!(error = %e, "Failed to prepare the document table.");
        std::io::Error::other(e.to_string())
      })?;
      tracing::info!("Using PostgreSQL document store.");
      Arc::new(pg)
    }
    None => {
      tracing::warn!("DATABASE_URL not set; using the in-memory document store.");
      Arc::new(MemoryStore::new())
    }
  };

  let (market, events) = Marketplace::new(store, server_config.market.clone())
    .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))?;

  let shutdown = CancellationToken::new();
  let dispatcher_handle = if server_config.dispatch_notifications {
    Some(market.dispatcher().spawn(events, shutdown.clone()))
  } else {
    tracing::info!("Notification dispatch disabled.");
    drop(events);
    None
  };

  let app_state = AppState {
    market: market.clone(),
    config: server_config.clone(),
  };

  let server_address = server_config.bind_address();
  tracing::info!("Attempting to bind server to {}...", server_address);

  let result = HttpServer::new(move || {
    App::new()
      .app_data(actix_data::Data::new(app_state.clone()))
      .app_data(marketplace_server::web::json_config())
      .wrap(tracing_actix_web::TracingLogger::default())
      .configure(marketplace_server::web::configure_app_routes)
  })
  .bind(&server_address)?
  .run()
  .await;

  shutdown.cancel();
  if let Some(handle) = dispatcher_handle {
    if let Err(e) = handle.await {
      tracing::warn!(error = %e, "Notification dispatcher ended abnormally.");
    }
  }
  market.settle().await;
  tracing::info!("Marketplace server stopped.");
  result
}

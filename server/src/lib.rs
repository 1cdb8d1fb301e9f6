// server/src/lib.rs

//! HTTP front end for the `marketplace` crate.

pub mod config;
pub mod errors;
pub mod pg_store;
pub mod state;
pub mod web;

pub use crate::config::ServerConfig;
pub use crate::errors::{ApiError, Result};
pub use crate::state::AppState;

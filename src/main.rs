//! SmartKid · Learning Game Backend
//!
//! - Axum HTTP API for quizzes, progression, chests and tic-tac-toe
//! - Profile and content cache persisted in a JSON key-value file
//! - Static SPA fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT                 : u16 (default 3000)
//!   SMARTKID_CONFIG_PATH : path to TOML config (rules, question bank, topic lists)
//!   SMARTKID_STORE_PATH  : JSON store file; overrides `[store] path` from the config
//!   LOG_LEVEL            : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT           : "pretty" (default) or "json"

mod telemetry;
mod domain;
mod config;
mod rng;
mod store;
mod progression;
mod quiz;
mod tictactoe;
mod seeds;
mod provider;
mod content;
mod state;
mod protocol;
mod logic;
mod routes;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, instrument};

use crate::routes::build_router;
use crate::state::AppState;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Shared state: rules, store-backed profile, content library, live sessions.
  let state = Arc::new(AppState::new());

  let app = build_router(state.clone());

  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "smartkid_backend", %addr, "HTTP server listening");
  axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(target: "smartkid_backend", error = %e, "Cannot listen for shutdown signal");
    std::future::pending::<()>().await;
  }
  info!(target: "smartkid_backend", "Shutdown signal received");
}

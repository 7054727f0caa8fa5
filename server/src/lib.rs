//! Foosball relay server library.
//!
//! This module exposes the server components for use in tests and binaries.

pub mod config;
pub mod relay;
pub mod session;
pub mod ws;

use axum::routing::get;
use axum::Router;
use tokio::sync::{broadcast, mpsc};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use crate::config::ServerConfig;
use crate::relay::{run_relay, Delivery, RelayCommand};
use crate::ws::{ws_handler, AppState};

/// Spawn the relay task and return the state the WebSocket handlers share.
pub fn spawn_relay(config: &ServerConfig) -> AppState {
    let (relay_tx, relay_rx) = mpsc::channel::<RelayCommand>(256);
    let (delivery_tx, _) = broadcast::channel::<Delivery>(config.delivery_capacity);

    let relay_config = config.clone();
    let relay_delivery_tx = delivery_tx.clone();
    tokio::spawn(async move {
        run_relay(relay_rx, relay_delivery_tx, relay_config).await;
    });

    AppState {
        relay_tx,
        delivery_tx,
        max_message_bytes: config.max_message_bytes,
        max_parse_errors: config.max_parse_errors,
    }
}

/// Routes: the relay socket at `/ws`, plus the web client when configured.
pub fn router(app_state: AppState, config: &ServerConfig) -> Router {
    let mut app = Router::new().route("/ws", get(ws_handler));
    if let Some(dir) = &config.static_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }
    app.layer(CorsLayer::permissive()).with_state(app_state)
}

//! Axum Router Configuration
//!
//! This module defines the HTTP routing for the application: the health probe
//! and the voice relay WebSocket endpoint.

use crate::{handlers, state::AppState, ws::ws_handler};

use axum::{Router, routing::get};
use std::sync::Arc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let relay_router = Router::new()
        .route("/ws/nova", get(ws_handler))
        .with_state(app_state);

    Router::new()
        .route("/health", get(handlers::health))
        .merge(relay_router)
}

//! Axum Handlers for the plain HTTP endpoints.

use axum::response::Json;
use serde_json::{Value, json};

/// Liveness probe.
pub async fn health() -> Json<Value> {
    Json(json!({ "ok": true }))
}

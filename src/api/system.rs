//! System endpoints: health check.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::app_state::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    timestamp: String,
    version: String,
    /// Record-store reachability: `"reachable"` or `"unreachable"`.
    database: String,
    /// Live WebSocket connections on this process.
    connections: usize,
    /// Non-empty rooms on this process.
    rooms: usize,
}

/// `GET /health` — Process status, record-store reachability, and
/// current connection/room counts.
///
/// Always returns 200: an unreachable record store is degraded
/// operation, not process failure.
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let database = if state.profiles.ping().await {
        "reachable"
    } else {
        "unreachable"
    };
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            database: database.to_string(),
            connections: state.registry.connection_count().await,
            rooms: state.registry.room_count().await,
        }),
    )
}

/// System routes mounted at the root level (not under /api/v1).
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_handler))
}

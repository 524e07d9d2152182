//! Position query endpoint.
//!
//! Any process instance can answer, regardless of which one last
//! received the object's updates — the cache lives in the shared store.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::app_state::AppState;
use crate::error::{ErrorBody, ErrorResponse};

/// `GET /api/v1/positions/{object_id}` — Last cached position for a
/// tracked object.
///
/// Returns 404 once the TTL has elapsed since the last write. A cache
/// outage reads as a miss, never as a server error.
pub async fn get_position(
    State(state): State<AppState>,
    Path(object_id): Path<i64>,
) -> impl IntoResponse {
    match state.cache.get(object_id).await {
        Ok(Some(position)) => Json(position).into_response(),
        Ok(None) => not_found(object_id),
        Err(e) => {
            tracing::warn!(object_id, error = %e, "position read failed; reporting absent");
            not_found(object_id)
        }
    }
}

fn not_found(object_id: i64) -> axum::response::Response {
    let body = ErrorResponse {
        error: ErrorBody {
            code: 2003,
            message: format!("no recent position for object {object_id}"),
            details: None,
        },
    };
    (StatusCode::NOT_FOUND, Json(body)).into_response()
}

/// Position routes, mounted under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new().route("/positions/{object_id}", get(get_position))
}

//! REST surface: health check and position queries.
//!
//! Deliberately small — account management and record CRUD belong to
//! other services.

pub mod positions;
pub mod system;

use axum::Router;

use crate::app_state::AppState;

/// Builds the complete REST router.
pub fn build_router() -> Router<AppState> {
    Router::new()
        .nest("/api/v1", positions::routes())
        .merge(system::routes())
}

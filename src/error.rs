//! Relay error types with HTTP status code mapping.
//!
//! [`RelayError`] is the central error type for the gateway. Each variant
//! maps to a numeric error code and, for the REST surface, an HTTP status
//! and structured JSON body. On the WebSocket side errors are rendered as
//! `error{message}` frames by the connection layer.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Structured JSON error response body.
///
/// All REST error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 1001,
///     "message": "missing required field: lat",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Numeric error code (see code ranges on [`RelayError`]).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum for the relay core.
///
/// # Error Code Ranges
///
/// | Range     | Category                  | HTTP Status                |
/// |-----------|---------------------------|----------------------------|
/// | 1000–1999 | Event validation          | 400 Bad Request / 403      |
/// | 2000–2999 | Authentication / identity | 401 / 404                  |
/// | 3000–3999 | Infrastructure            | 500 / 503                  |
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Bearer token failed signature or expiry validation. The connection
    /// stays open; the client may retry with a fresh token.
    #[error("invalid or expired token")]
    InvalidToken,

    /// The account behind a structurally valid token no longer resolves
    /// (deactivated or deleted since token issuance).
    #[error("account not found or deactivated: {0}")]
    AccountNotFound(i64),

    /// The session lacks the role required for this event type.
    #[error("{0} role required")]
    RoleRequired(&'static str),

    /// A required event field is absent or not of the expected type.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// A field is present but outside its allowed range.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Publish/subscribe handle to the broker is down. Publishes are
    /// dropped, never queued (live-only guarantee).
    #[error("broker unavailable: {0}")]
    BrokerUnavailable(String),

    /// Position cache read/write failed; treated as a miss by callers.
    #[error("cache unavailable: {0}")]
    CacheUnavailable(String),

    /// Record store failure during identity resolution or health probe.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::MissingField(_) => 1001,
            Self::InvalidRequest(_) => 1002,
            Self::RoleRequired(_) => 1003,
            Self::InvalidToken => 2001,
            Self::AccountNotFound(_) => 2002,
            Self::Internal(_) => 3000,
            Self::Persistence(_) => 3001,
            Self::BrokerUnavailable(_) => 3002,
            Self::CacheUnavailable(_) => 3003,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingField(_) | Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::RoleRequired(_) => StatusCode::FORBIDDEN,
            Self::InvalidToken => StatusCode::UNAUTHORIZED,
            Self::AccountNotFound(_) => StatusCode::NOT_FOUND,
            Self::BrokerUnavailable(_) | Self::CacheUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::Persistence(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

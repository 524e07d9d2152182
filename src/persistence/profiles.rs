//! Record-store access for identity resolution.
//!
//! The relay never embeds account/vehicle/trip storage logic; this is
//! the one read it performs — resolving a token's account against
//! current record state. A token remains structurally valid after
//! account deactivation, so this check is mandatory on every
//! authentication before any room membership is granted.

use sqlx::PgPool;

use crate::error::RelayError;

/// Current account state for an authenticated identity.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProfileSummary {
    /// Account identifier.
    pub id: i64,
    /// Display name.
    pub full_name: String,
    /// Role string as stored; the token's role claim is authoritative
    /// for authorization, this is informational.
    pub role: String,
    /// Whether the account is currently active.
    pub is_active: bool,
}

/// Read-only handle onto the record store's account table.
#[derive(Debug, Clone)]
pub struct ProfileStore {
    pool: PgPool,
}

impl ProfileStore {
    /// Wraps an existing connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Resolves an account id against current record state.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::AccountNotFound`] when the account is
    /// missing or deactivated, and [`RelayError::Persistence`] on store
    /// failure.
    pub async fn fetch_profile(&self, id: i64) -> Result<ProfileSummary, RelayError> {
        let profile = sqlx::query_as::<_, ProfileSummary>(
            "SELECT id, full_name, role, is_active FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RelayError::Persistence(e.to_string()))?
        .ok_or(RelayError::AccountNotFound(id))?;

        if !profile.is_active {
            return Err(RelayError::AccountNotFound(id));
        }
        Ok(profile)
    }

    /// Probes record-store reachability for the health endpoint.
    pub async fn ping(&self) -> bool {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .is_ok()
    }
}

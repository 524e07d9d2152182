//! Last-known-position cache.
//!
//! Backed by the shared external store so any process can answer a
//! position query regardless of which process last received the object's
//! updates. Each write fully overwrites the key and re-arms its TTL;
//! reads never refresh expiry, so an object silent past the TTL reads as
//! absent rather than stale.

use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::domain::event::LocationEvent;
use crate::error::RelayError;

/// Key prefix for cached positions.
const KEY_PREFIX: &str = "current_position";

/// Write-through cache of each tracked object's most recent position.
#[derive(Clone)]
pub struct PositionCache {
    conn: ConnectionManager,
    ttl_secs: u64,
}

impl std::fmt::Debug for PositionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PositionCache")
            .field("ttl_secs", &self.ttl_secs)
            .finish_non_exhaustive()
    }
}

impl PositionCache {
    /// Wraps an established store connection with the given TTL.
    #[must_use]
    pub const fn new(conn: ConnectionManager, ttl_secs: u64) -> Self {
        Self { conn, ttl_secs }
    }

    /// Stores a position, overwriting any previous value for the object.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::CacheUnavailable`] on store failure. Callers
    /// log and continue — a missed cache write never fails the event.
    pub async fn put(&self, event: &LocationEvent) -> Result<(), RelayError> {
        let payload = serde_json::to_string(event)
            .map_err(|e| RelayError::Internal(format!("position serialization: {e}")))?;
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(key(event.object_id), payload, self.ttl_secs)
            .await
            .map_err(|e| RelayError::CacheUnavailable(e.to_string()))
    }

    /// Returns the most recent position for an object, or `None` once
    /// the TTL has elapsed since the last write.
    ///
    /// Issues a plain `GET` (never `GETEX`): a read must not re-arm the
    /// key's TTL, or polling observers would keep a silent object's
    /// stale position alive indefinitely.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::CacheUnavailable`] on store failure. Callers
    /// treat this as a miss.
    pub async fn get(&self, object_id: i64) -> Result<Option<LocationEvent>, RelayError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn
            .get(key(object_id))
            .await
            .map_err(|e| RelayError::CacheUnavailable(e.to_string()))?;

        match raw {
            None => Ok(None),
            Some(json) => match serde_json::from_str(&json) {
                Ok(event) => Ok(Some(event)),
                Err(e) => {
                    // A corrupt entry is as good as absent.
                    tracing::warn!(object_id, error = %e, "corrupt cached position; ignoring");
                    Ok(None)
                }
            },
        }
    }
}

fn key(object_id: i64) -> String {
    format!("{KEY_PREFIX}:{object_id}")
}

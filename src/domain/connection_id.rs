//! Type-safe connection identifier.
//!
//! [`ConnectionId`] is a newtype wrapper around [`uuid::Uuid`] (v4).
//! Connections are the only handle callers ever hold to a session; all
//! membership state lives inside the registry, keyed by this id.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique identifier for a live WebSocket connection.
///
/// Allocated when the connection opens and immutable thereafter. Used as
/// the key into the [`super::SessionRegistry`] and carried in room
/// membership sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(uuid::Uuid);

impl ConnectionId {
    /// Creates a new random `ConnectionId` (UUID v4).
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Returns the inner [`uuid::Uuid`].
    #[must_use]
    pub const fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

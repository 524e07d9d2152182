//! Session registry: the sole owner of connection and room membership
//! state.
//!
//! Connections hold only an opaque [`ConnectionId`]; every membership
//! mutation and every room delivery goes through atomic operations on
//! this registry. Locks are held only to mutate or snapshot the maps,
//! never across an await point — outbound delivery is a non-blocking
//! send into each member's own unbounded queue, so a stalled connection
//! cannot stall its room peers or the broker subscription loop.

use std::collections::{HashMap, HashSet};

use tokio::sync::{RwLock, mpsc};

use crate::auth::{Claims, Role};
use crate::error::RelayError;

use super::{ConnectionId, RoomName};

/// Per-connection outbound queue for already-serialized JSON frames.
pub type OutboundSender = mpsc::UnboundedSender<String>;

/// State held for one live connection.
#[derive(Debug)]
struct SessionEntry {
    /// Claims set by the authentication handshake; `None` until then.
    identity: Option<Claims>,
    /// Rooms this connection currently belongs to.
    rooms: HashSet<RoomName>,
    /// Outbound frame queue owned by the connection's writer task.
    tx: OutboundSender,
}

/// Bidirectional mapping between live connections and rooms.
///
/// # Concurrency
///
/// Both maps sit behind `tokio::sync::RwLock`. One writer mutates a given
/// connection's entry (its own task), while room delivery snapshots the
/// member set under the read lock and releases it before sending, so a
/// join or leave racing a delivery can at worst miss or catch the
/// in-flight message — it can never corrupt delivery to other members.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<ConnectionId, SessionEntry>>,
    rooms: RwLock<HashMap<RoomName, HashSet<ConnectionId>>>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new unauthenticated session and returns its id.
    ///
    /// `tx` is the connection's outbound frame queue; dropping the paired
    /// receiver (when the connection's writer exits) makes all further
    /// deliveries to this session silent no-ops.
    pub async fn open(&self, tx: OutboundSender) -> ConnectionId {
        let id = ConnectionId::new();
        let entry = SessionEntry {
            identity: None,
            rooms: HashSet::new(),
            tx,
        };
        self.sessions.write().await.insert(id, entry);
        tracing::debug!(connection_id = %id, "session opened");
        id
    }

    /// Binds verified claims to a session and joins its identity rooms.
    ///
    /// Joins `user:<id>` and `role:<role>` unconditionally, plus the
    /// entity room matching the role when a linked entity is present.
    /// Re-authentication replaces: rooms bound to the previous identity
    /// are released before the new ones are joined, so delivery can never
    /// leak to a stale identity. Object rooms survive the swap.
    ///
    /// Returns the identity rooms joined.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Internal`] if the connection is not
    /// registered (already closed).
    pub async fn set_identity(
        &self,
        connection_id: ConnectionId,
        claims: Claims,
    ) -> Result<Vec<RoomName>, RelayError> {
        let joined = identity_rooms(&claims);

        let mut sessions = self.sessions.write().await;
        let entry = sessions
            .get_mut(&connection_id)
            .ok_or_else(|| RelayError::Internal(format!("unknown connection {connection_id}")))?;

        let stale: Vec<RoomName> = entry
            .rooms
            .iter()
            .filter(|r| r.is_identity_bound())
            .cloned()
            .collect();
        for room in &stale {
            entry.rooms.remove(room);
        }
        for room in &joined {
            entry.rooms.insert(room.clone());
        }
        entry.identity = Some(claims);
        drop(sessions);

        let mut rooms = self.rooms.write().await;
        for room in &stale {
            remove_member(&mut rooms, room, connection_id);
        }
        for room in &joined {
            rooms.entry(room.clone()).or_default().insert(connection_id);
        }
        drop(rooms);

        tracing::debug!(connection_id = %connection_id, rooms = joined.len(), "identity bound");
        Ok(joined)
    }

    /// Adds the connection to a room. Idempotent.
    ///
    /// Any open connection may join `object:` rooms; callers enforce
    /// nothing further here.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Internal`] if the connection is not
    /// registered.
    pub async fn subscribe(
        &self,
        connection_id: ConnectionId,
        room: RoomName,
    ) -> Result<(), RelayError> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions
            .get_mut(&connection_id)
            .ok_or_else(|| RelayError::Internal(format!("unknown connection {connection_id}")))?;
        entry.rooms.insert(room.clone());
        drop(sessions);

        self.rooms
            .write()
            .await
            .entry(room)
            .or_default()
            .insert(connection_id);
        Ok(())
    }

    /// Removes the connection from a room. A leave on a room the
    /// connection does not belong to is a no-op, not an error.
    pub async fn unsubscribe(&self, connection_id: ConnectionId, room: &RoomName) {
        let mut sessions = self.sessions.write().await;
        if let Some(entry) = sessions.get_mut(&connection_id) {
            entry.rooms.remove(room);
        }
        drop(sessions);

        remove_member(&mut *self.rooms.write().await, room, connection_id);
    }

    /// Removes the session and all its room memberships. Idempotent.
    ///
    /// After this returns, no delivery will be attempted to the
    /// connection; in-flight sends into its queue fail silently once the
    /// receiver is dropped.
    pub async fn close(&self, connection_id: ConnectionId) {
        let Some(entry) = self.sessions.write().await.remove(&connection_id) else {
            return;
        };
        let mut rooms = self.rooms.write().await;
        for room in &entry.rooms {
            remove_member(&mut rooms, room, connection_id);
        }
        drop(rooms);
        tracing::debug!(connection_id = %connection_id, "session closed");
    }

    /// Returns a clone of the session's claims, if authenticated.
    pub async fn identity_of(&self, connection_id: ConnectionId) -> Option<Claims> {
        self.sessions
            .read()
            .await
            .get(&connection_id)
            .and_then(|e| e.identity.clone())
    }

    /// Delivers a serialized frame to every current member of a room.
    ///
    /// Membership is snapshotted under the read lock, then the lock is
    /// released before any send. Returns the number of queues the frame
    /// was placed into.
    pub async fn deliver(&self, room: &RoomName, frame: &str) -> usize {
        let members: Vec<ConnectionId> = match self.rooms.read().await.get(room) {
            Some(set) => set.iter().copied().collect(),
            None => return 0,
        };

        let sessions = self.sessions.read().await;
        let txs: Vec<OutboundSender> = members
            .iter()
            .filter_map(|id| sessions.get(id).map(|e| e.tx.clone()))
            .collect();
        drop(sessions);

        let mut delivered = 0;
        for tx in txs {
            // A send failure means the connection is mid-close; skip it.
            if tx.send(frame.to_string()).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    /// Number of live connections.
    pub async fn connection_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Number of non-empty rooms.
    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    /// Returns a snapshot of the rooms a connection belongs to.
    /// Test and diagnostics helper.
    pub async fn rooms_of(&self, connection_id: ConnectionId) -> HashSet<RoomName> {
        self.sessions
            .read()
            .await
            .get(&connection_id)
            .map(|e| e.rooms.clone())
            .unwrap_or_default()
    }
}

/// The identity rooms a claim set maps to: `user:` and `role:` always,
/// plus the role-matching entity room when the link is present.
fn identity_rooms(claims: &Claims) -> Vec<RoomName> {
    let mut rooms = vec![RoomName::User(claims.id), RoomName::Role(claims.role)];
    if let Some(entity_id) = claims.linked_entity_id() {
        match claims.role {
            Role::Driver => rooms.push(RoomName::Driver(entity_id)),
            Role::Parent => rooms.push(RoomName::Parent(entity_id)),
            Role::Admin => {}
        }
    }
    rooms
}

/// Drops a member from a room set, erasing the room when it empties.
fn remove_member(
    rooms: &mut HashMap<RoomName, HashSet<ConnectionId>>,
    room: &RoomName,
    connection_id: ConnectionId,
) {
    if let Some(members) = rooms.get_mut(room) {
        members.remove(&connection_id);
        if members.is_empty() {
            rooms.remove(room);
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::auth::Role;

    fn claims(id: i64, role: Role, entity: Option<i64>) -> Claims {
        Claims {
            id,
            role,
            driver_id: if role == Role::Driver { entity } else { None },
            parent_id: if role == Role::Parent { entity } else { None },
            exp: 4_102_444_800,
        }
    }

    async fn open(registry: &SessionRegistry) -> (ConnectionId, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (registry.open(tx).await, rx)
    }

    #[tokio::test]
    async fn authentication_joins_exact_room_set() {
        let registry = SessionRegistry::new();
        let (id, _rx) = open(&registry).await;

        let Ok(joined) = registry.set_identity(id, claims(42, Role::Driver, Some(3))).await
        else {
            panic!("set_identity failed");
        };
        assert_eq!(joined.len(), 3);

        let rooms = registry.rooms_of(id).await;
        assert!(rooms.contains(&RoomName::User(42)));
        assert!(rooms.contains(&RoomName::Role(Role::Driver)));
        assert!(rooms.contains(&RoomName::Driver(3)));
        assert_eq!(rooms.len(), 3);
    }

    #[tokio::test]
    async fn admin_gets_no_entity_room() {
        let registry = SessionRegistry::new();
        let (id, _rx) = open(&registry).await;

        let Ok(joined) = registry.set_identity(id, claims(1, Role::Admin, None)).await else {
            panic!("set_identity failed");
        };
        assert_eq!(joined, vec![RoomName::User(1), RoomName::Role(Role::Admin)]);
    }

    #[tokio::test]
    async fn reauthentication_replaces_identity_rooms() {
        let registry = SessionRegistry::new();
        let (id, _rx) = open(&registry).await;

        let Ok(_) = registry.set_identity(id, claims(42, Role::Driver, Some(3))).await else {
            panic!("first set_identity failed");
        };
        let Ok(_) = registry.set_identity(id, claims(7, Role::Parent, Some(9))).await else {
            panic!("second set_identity failed");
        };

        let rooms = registry.rooms_of(id).await;
        assert!(rooms.contains(&RoomName::User(7)));
        assert!(rooms.contains(&RoomName::Role(Role::Parent)));
        assert!(rooms.contains(&RoomName::Parent(9)));
        assert!(!rooms.contains(&RoomName::User(42)));
        assert!(!rooms.contains(&RoomName::Driver(3)));

        // The stale identity's rooms must no longer deliver to this connection.
        assert_eq!(registry.deliver(&RoomName::Driver(3), "x").await, 0);
    }

    #[tokio::test]
    async fn object_rooms_survive_reauthentication() {
        let registry = SessionRegistry::new();
        let (id, _rx) = open(&registry).await;

        let Ok(()) = registry.subscribe(id, RoomName::Object(1)).await else {
            panic!("subscribe failed");
        };
        let Ok(_) = registry.set_identity(id, claims(42, Role::Driver, Some(3))).await else {
            panic!("set_identity failed");
        };

        assert!(registry.rooms_of(id).await.contains(&RoomName::Object(1)));
    }

    #[tokio::test]
    async fn unauthenticated_connection_may_subscribe() {
        let registry = SessionRegistry::new();
        let (id, mut rx) = open(&registry).await;

        let Ok(()) = registry.subscribe(id, RoomName::Object(1)).await else {
            panic!("subscribe failed");
        };
        assert_eq!(registry.deliver(&RoomName::Object(1), "update").await, 1);
        assert_eq!(rx.recv().await.as_deref(), Some("update"));
    }

    #[tokio::test]
    async fn unsubscribe_unknown_room_is_noop() {
        let registry = SessionRegistry::new();
        let (id, _rx) = open(&registry).await;
        registry.unsubscribe(id, &RoomName::Object(99)).await;
        assert_eq!(registry.room_count().await, 0);
    }

    #[tokio::test]
    async fn deliver_reaches_all_members_and_only_members() {
        let registry = SessionRegistry::new();
        let (a, mut rx_a) = open(&registry).await;
        let (b, mut rx_b) = open(&registry).await;
        let (_c, mut rx_c) = open(&registry).await;

        let Ok(()) = registry.subscribe(a, RoomName::Object(1)).await else {
            panic!("subscribe failed");
        };
        let Ok(()) = registry.subscribe(b, RoomName::Object(1)).await else {
            panic!("subscribe failed");
        };

        assert_eq!(registry.deliver(&RoomName::Object(1), "frame").await, 2);
        assert_eq!(rx_a.recv().await.as_deref(), Some("frame"));
        assert_eq!(rx_b.recv().await.as_deref(), Some("frame"));
        assert!(rx_c.try_recv().is_err());
    }

    #[tokio::test]
    async fn close_releases_all_memberships() {
        let registry = SessionRegistry::new();
        let (a, _rx_a) = open(&registry).await;
        let (b, mut rx_b) = open(&registry).await;

        let Ok(_) = registry.set_identity(a, claims(7, Role::Parent, Some(7))).await else {
            panic!("set_identity failed");
        };
        let Ok(()) = registry.subscribe(b, RoomName::Object(1)).await else {
            panic!("subscribe failed");
        };
        let Ok(()) = registry.subscribe(a, RoomName::Object(1)).await else {
            panic!("subscribe failed");
        };

        registry.close(a).await;

        // A subsequent alert at a's prior rooms must not reach a, and must
        // not disturb b's delivery path.
        assert_eq!(registry.deliver(&RoomName::Parent(7), "alert").await, 0);
        assert_eq!(registry.deliver(&RoomName::Object(1), "update").await, 1);
        assert_eq!(rx_b.recv().await.as_deref(), Some("update"));
        assert_eq!(registry.connection_count().await, 1);
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let registry = SessionRegistry::new();
        let (id, _rx) = open(&registry).await;
        registry.close(id).await;
        registry.close(id).await;
        assert_eq!(registry.connection_count().await, 0);
    }

    #[tokio::test]
    async fn delivery_after_receiver_drop_is_silent() {
        let registry = SessionRegistry::new();
        let (id, rx) = open(&registry).await;
        let Ok(()) = registry.subscribe(id, RoomName::Object(1)).await else {
            panic!("subscribe failed");
        };
        drop(rx);
        // Queue is gone but the session has not closed yet; delivery skips it.
        assert_eq!(registry.deliver(&RoomName::Object(1), "frame").await, 0);
    }

    #[tokio::test]
    async fn set_identity_on_closed_connection_fails() {
        let registry = SessionRegistry::new();
        let (id, _rx) = open(&registry).await;
        registry.close(id).await;
        assert!(
            registry
                .set_identity(id, claims(1, Role::Admin, None))
                .await
                .is_err()
        );
    }
}

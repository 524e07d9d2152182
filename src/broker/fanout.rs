//! Broker fanout: publish globally, deliver locally from the
//! subscription.
//!
//! Each process holds exactly one outbound publish handle and one inbound
//! pub/sub connection, regardless of local connection count. Every
//! canonical event is published to its natural channel; the wildcard
//! subscription then hands every matching message — including this
//! process's own publishes — to local room delivery. Delivery semantics
//! are therefore identical whether the publisher and receiver are
//! colocated or on different processes.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::domain::alert_router;
use crate::domain::event::AlertKind;
use crate::domain::{CanonicalEvent, RoomName, SessionRegistry};
use crate::error::RelayError;
use crate::ws::messages::ServerMessage;

/// The wildcard patterns covering all three channel families.
const SUBSCRIBE_PATTERNS: [&str; 3] = ["object:*", "trip:*", "alert:*"];

/// The process-wide publish handle.
///
/// Cloneable; all clones share one multiplexed connection with the
/// broker client's own reconnect policy behind it.
#[derive(Clone)]
pub struct BrokerPublisher {
    conn: ConnectionManager,
}

impl std::fmt::Debug for BrokerPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerPublisher").finish_non_exhaustive()
    }
}

impl BrokerPublisher {
    /// Wraps an established broker connection.
    #[must_use]
    pub const fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    /// Publishes a canonical event to its natural channel.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::BrokerUnavailable`] when the broker rejects
    /// the publish. Callers log and drop — events are never queued or
    /// retried (live-only guarantee).
    pub async fn publish(&self, event: &CanonicalEvent) -> Result<(), RelayError> {
        let channel = event.channel();
        let payload = serde_json::to_string(event)
            .map_err(|e| RelayError::Internal(format!("event serialization: {e}")))?;

        let mut conn = self.conn.clone();
        conn.publish::<_, _, i64>(&channel, payload)
            .await
            .map_err(|e| RelayError::BrokerUnavailable(e.to_string()))?;
        tracing::trace!(channel, event_type = event.event_type_str(), "published");
        Ok(())
    }
}

/// Runs the process-wide broker subscription loop.
///
/// Subscribes to the wildcard patterns and routes every message into the
/// local registry until the broker becomes unreachable for
/// `retry_max` consecutive connection attempts.
///
/// # Errors
///
/// Returns [`RelayError::BrokerUnavailable`] after retries are
/// exhausted. This surfaces as a process-level connectivity failure;
/// individual connections are unaffected beyond losing fanout.
pub async fn run_subscriber(
    client: redis::Client,
    registry: Arc<SessionRegistry>,
    retry_max: u32,
    retry_delay: Duration,
) -> Result<(), RelayError> {
    let mut attempts: u32 = 0;
    loop {
        match subscribe_and_route(&client, &registry).await {
            Ok(()) => {
                // Stream ended cleanly (broker closed the connection).
                attempts = 0;
                tracing::warn!("broker subscription stream ended; reconnecting");
            }
            Err(e) => {
                attempts += 1;
                if attempts >= retry_max {
                    return Err(RelayError::BrokerUnavailable(format!(
                        "subscriber gave up after {attempts} attempts: {e}"
                    )));
                }
                tracing::warn!(error = %e, attempts, "broker subscription failed; retrying");
            }
        }
        tokio::time::sleep(retry_delay).await;
    }
}

/// One subscription lifetime: connect, psubscribe, pump messages.
async fn subscribe_and_route(
    client: &redis::Client,
    registry: &Arc<SessionRegistry>,
) -> Result<(), RelayError> {
    let mut pubsub = client
        .get_async_pubsub()
        .await
        .map_err(|e| RelayError::BrokerUnavailable(e.to_string()))?;
    pubsub
        .psubscribe(&SUBSCRIBE_PATTERNS)
        .await
        .map_err(|e| RelayError::BrokerUnavailable(e.to_string()))?;
    tracing::info!(patterns = ?SUBSCRIBE_PATTERNS, "broker subscription established");

    let mut stream = pubsub.on_message();
    while let Some(msg) = stream.next().await {
        let channel = msg.get_channel_name().to_string();
        let payload: String = match msg.get_payload() {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(channel, error = %e, "non-text broker payload; skipping");
                continue;
            }
        };
        route_message(registry, &channel, &payload).await;
    }
    Ok(())
}

/// Routes one broker message into local room delivery.
///
/// `object:*` and `trip:*` messages go verbatim to the equally-named
/// room; `alert:*` messages go through the routing policy table. A
/// payload that fails to deserialize is skipped with a warning — the
/// loop never dies to one bad message.
pub(crate) async fn route_message(registry: &SessionRegistry, channel: &str, payload: &str) {
    let event: CanonicalEvent = match serde_json::from_str(payload) {
        Ok(e) => e,
        Err(e) => {
            tracing::warn!(channel, error = %e, "undeserializable broker message; skipping");
            return;
        }
    };

    match event {
        CanonicalEvent::Location(_) | CanonicalEvent::TripStatus(_) => {
            let Ok(room) = channel.parse::<RoomName>() else {
                tracing::warn!(channel, "event on unroutable channel; skipping");
                return;
            };
            let frame = ServerMessage::ObjectUpdate { event }.to_json();
            let delivered = registry.deliver(&room, &frame).await;
            tracing::trace!(channel, delivered, "event fanned out");
        }
        CanonicalEvent::Alert(alert) => {
            if alert.kind == AlertKind::Unknown {
                tracing::warn!(channel, "unknown alert kind; dropping");
                return;
            }
            let rooms = alert_router::route(&alert);
            let frame = match alert.kind {
                AlertKind::Emergency => ServerMessage::EmergencyAlert { alert },
                AlertKind::NearStop => ServerMessage::NearStopAlert { alert },
                AlertKind::Delay => ServerMessage::DelayAlert { alert },
                AlertKind::Unknown => return,
            }
            .to_json();
            for room in &rooms {
                registry.deliver(room, &frame).await;
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use chrono::Utc;
    use tokio::sync::mpsc;

    use super::*;
    use crate::auth::{Claims, Role};
    use crate::domain::event::{AlertEvent, LocationEvent};
    use crate::domain::ConnectionId;

    async fn open(
        registry: &SessionRegistry,
    ) -> (ConnectionId, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (registry.open(tx).await, rx)
    }

    fn location_payload(object_id: i64) -> (String, String) {
        let event = CanonicalEvent::Location(LocationEvent {
            object_id,
            trip_id: Some(5),
            lat: 10.76,
            lng: 106.66,
            speed: 0.0,
            heading: 0.0,
            timestamp: Utc::now(),
            origin_id: 3,
        });
        let Ok(payload) = serde_json::to_string(&event) else {
            panic!("serialization failed");
        };
        (event.channel(), payload)
    }

    fn alert_payload(kind: AlertKind, target_ids: Vec<i64>) -> (String, String) {
        let event = CanonicalEvent::Alert(AlertEvent {
            kind,
            severity: "warning".to_string(),
            message: "m".to_string(),
            object_id: None,
            trip_id: None,
            target_ids,
            origin_id: None,
            timestamp: Utc::now(),
        });
        let Ok(payload) = serde_json::to_string(&event) else {
            panic!("serialization failed");
        };
        (event.channel(), payload)
    }

    #[tokio::test]
    async fn object_message_reaches_room_members() {
        let registry = SessionRegistry::new();
        let (a, mut rx_a) = open(&registry).await;
        let (_b, mut rx_b) = open(&registry).await;
        let Ok(()) = registry.subscribe(a, RoomName::Object(1)).await else {
            panic!("subscribe failed");
        };

        let (channel, payload) = location_payload(1);
        route_message(&registry, &channel, &payload).await;

        let Some(frame) = rx_a.recv().await else {
            panic!("subscriber got nothing");
        };
        assert!(frame.contains(r#""type":"object_update""#));
        assert!(frame.contains(r#""originId":3"#));
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn location_without_trip_id_fans_out() {
        let registry = SessionRegistry::new();
        let (a, mut rx) = open(&registry).await;
        let Ok(()) = registry.subscribe(a, RoomName::Object(1)).await else {
            panic!("subscribe failed");
        };

        let event = CanonicalEvent::Location(LocationEvent {
            object_id: 1,
            trip_id: None,
            lat: 10.76,
            lng: 106.66,
            speed: 0.0,
            heading: 0.0,
            timestamp: Utc::now(),
            origin_id: 3,
        });
        let Ok(payload) = serde_json::to_string(&event) else {
            panic!("serialization failed");
        };
        route_message(&registry, &event.channel(), &payload).await;

        let Some(frame) = rx.recv().await else {
            panic!("subscriber got nothing");
        };
        assert!(frame.contains(r#""lat":10.76"#));
        assert!(frame.contains(r#""lng":106.66"#));
        assert!(frame.contains(r#""originId":3"#));
        assert!(!frame.contains("tripId"));
    }

    #[tokio::test]
    async fn near_stop_alert_reaches_exactly_the_targeted_parents() {
        let registry = SessionRegistry::new();
        let (p7, mut rx7) = open(&registry).await;
        let (p11, mut rx11) = open(&registry).await;

        let parent = |id: i64| Claims {
            id: id + 100,
            role: Role::Parent,
            driver_id: None,
            parent_id: Some(id),
            exp: 4_102_444_800,
        };
        let Ok(_) = registry.set_identity(p7, parent(7)).await else {
            panic!("set_identity failed");
        };
        let Ok(_) = registry.set_identity(p11, parent(11)).await else {
            panic!("set_identity failed");
        };

        let (channel, payload) = alert_payload(AlertKind::NearStop, vec![7, 9]);
        route_message(&registry, &channel, &payload).await;

        let Some(frame) = rx7.recv().await else {
            panic!("parent 7 got nothing");
        };
        assert!(frame.contains(r#""type":"near_stop_alert""#));
        assert!(rx11.try_recv().is_err());
    }

    #[tokio::test]
    async fn emergency_alert_reaches_admins() {
        let registry = SessionRegistry::new();
        let (admin, mut rx) = open(&registry).await;
        let Ok(_) = registry
            .set_identity(
                admin,
                Claims {
                    id: 1,
                    role: Role::Admin,
                    driver_id: None,
                    parent_id: None,
                    exp: 4_102_444_800,
                },
            )
            .await
        else {
            panic!("set_identity failed");
        };

        let (channel, payload) = alert_payload(AlertKind::Emergency, Vec::new());
        route_message(&registry, &channel, &payload).await;

        let Some(frame) = rx.recv().await else {
            panic!("admin got nothing");
        };
        assert!(frame.contains(r#""type":"emergency_alert""#));
    }

    #[tokio::test]
    async fn unknown_alert_kind_is_dropped() {
        let registry = SessionRegistry::new();
        let (admin, mut rx) = open(&registry).await;
        let Ok(_) = registry
            .set_identity(
                admin,
                Claims {
                    id: 1,
                    role: Role::Admin,
                    driver_id: None,
                    parent_id: None,
                    exp: 4_102_444_800,
                },
            )
            .await
        else {
            panic!("set_identity failed");
        };

        let payload = r#"{"event_type":"alert","kind":"road_closure","severity":"info","message":"x","timestamp":"2026-01-01T00:00:00Z"}"#;
        route_message(&registry, "alert:road_closure", payload).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn garbage_payload_is_skipped() {
        let registry = SessionRegistry::new();
        let (a, mut rx) = open(&registry).await;
        let Ok(()) = registry.subscribe(a, RoomName::Object(1)).await else {
            panic!("subscribe failed");
        };
        route_message(&registry, "object:1", "{not json").await;
        assert!(rx.try_recv().is_err());
    }
}

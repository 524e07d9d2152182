//! WebSocket wire messages.
//!
//! Both directions are JSON objects discriminated by a `"type"` field.
//! Tag names mirror the event names the original clients already speak
//! (`driver:location`, `subscribe:object`, ...), so deployed driver and
//! observer apps connect unchanged.

use serde::{Deserialize, Serialize};

use crate::auth::Role;
use crate::domain::event::{AlertEvent, CanonicalEvent};

/// Client → Server frames.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Authentication handshake carrying a bearer token.
    #[serde(rename = "authenticate")]
    Authenticate {
        /// Bearer token issued by the account service.
        token: String,
    },

    /// Position report. Driver role required.
    #[serde(rename = "driver:location")]
    DriverLocation {
        /// Tracked vehicle id.
        #[serde(rename = "objectId")]
        object_id: Option<i64>,
        /// Current trip id.
        #[serde(rename = "tripId")]
        trip_id: Option<i64>,
        /// Latitude in degrees.
        lat: Option<f64>,
        /// Longitude in degrees.
        lng: Option<f64>,
        /// Speed over ground, optional.
        speed: Option<f64>,
        /// Heading in degrees, optional.
        heading: Option<f64>,
    },

    /// Trip status update. Driver role required.
    #[serde(rename = "driver:trip_status")]
    DriverTripStatus {
        /// Trip being updated.
        #[serde(rename = "tripId")]
        trip_id: Option<i64>,
        /// Status discriminator.
        status: Option<String>,
        /// Stop the update refers to, optional.
        #[serde(rename = "stopId")]
        stop_id: Option<i64>,
        /// Transported individual the update refers to, optional.
        #[serde(rename = "subjectId")]
        subject_id: Option<i64>,
    },

    /// Emergency alert. Driver role required; severity is forced to
    /// critical server-side.
    #[serde(rename = "driver:emergency")]
    DriverEmergency {
        /// Vehicle raising the emergency.
        #[serde(rename = "objectId")]
        object_id: Option<i64>,
        /// Trip the vehicle is running.
        #[serde(rename = "tripId")]
        trip_id: Option<i64>,
        /// Free-form description.
        message: Option<String>,
    },

    /// Join the broadcast room for one tracked object. Open to
    /// unauthenticated connections.
    #[serde(rename = "subscribe:object")]
    SubscribeObject {
        /// Tracked object to follow.
        #[serde(rename = "objectId")]
        object_id: i64,
    },

    /// Leave a tracked object's broadcast room. No-op when not a member.
    #[serde(rename = "unsubscribe:object")]
    UnsubscribeObject {
        /// Tracked object to stop following.
        #[serde(rename = "objectId")]
        object_id: i64,
    },
}

/// Server → Client frames.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Successful authentication handshake.
    #[serde(rename = "authenticated")]
    Authenticated {
        /// Authenticated account id.
        #[serde(rename = "identityId")]
        identity_id: i64,
        /// Authenticated role.
        role: Role,
    },

    /// Failed authentication handshake; the connection stays open.
    #[serde(rename = "authentication_error")]
    AuthenticationError {
        /// Human-readable failure reason.
        message: String,
    },

    /// Ack for a processed `driver:location`.
    #[serde(rename = "location_received")]
    LocationReceived {},

    /// Ack for a processed `driver:trip_status`.
    #[serde(rename = "trip_status_received")]
    TripStatusReceived {},

    /// Ack for a processed `driver:emergency`.
    #[serde(rename = "emergency_sent")]
    EmergencySent {},

    /// Validation or role failure for the previous frame.
    #[serde(rename = "error")]
    Error {
        /// Human-readable failure reason.
        message: String,
    },

    /// Event delivered to a room member (location or trip status).
    #[serde(rename = "object_update")]
    ObjectUpdate {
        /// The canonical event, verbatim from the broker.
        event: CanonicalEvent,
    },

    /// Emergency alert delivered per the routing table.
    #[serde(rename = "emergency_alert")]
    EmergencyAlert {
        /// The routed alert.
        alert: AlertEvent,
    },

    /// Near-stop alert delivered per the routing table.
    #[serde(rename = "near_stop_alert")]
    NearStopAlert {
        /// The routed alert.
        alert: AlertEvent,
    },

    /// Delay alert delivered per the routing table.
    #[serde(rename = "delay_alert")]
    DelayAlert {
        /// The routed alert.
        alert: AlertEvent,
    },

    /// Ack for `subscribe:object`.
    #[serde(rename = "subscription_confirmed")]
    SubscriptionConfirmed {
        /// The object room joined.
        #[serde(rename = "objectId")]
        object_id: i64,
    },

    /// Ack for `unsubscribe:object`.
    #[serde(rename = "unsubscription_confirmed")]
    UnsubscriptionConfirmed {
        /// The object room left.
        #[serde(rename = "objectId")]
        object_id: i64,
    },
}

impl ServerMessage {
    /// Serializes this frame to its JSON wire form.
    ///
    /// Serialization of server-built frames cannot fail in practice; a
    /// failure is logged and collapsed to a generic error frame.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            tracing::error!(error = %e, "failed to serialize server frame");
            r#"{"type":"error","message":"internal serialization error"}"#.to_string()
        })
    }
}

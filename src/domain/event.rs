//! Canonical events: the validated, origin-stamped internal form of
//! inbound actor actions.
//!
//! Raw client payloads never travel past the validator; everything that
//! reaches the broker or a room is one of these variants, carrying the
//! authenticated origin attached server-side.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::RoomName;

/// A position report from a vehicle operator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationEvent {
    /// Tracked object (vehicle) this position belongs to.
    pub object_id: i64,
    /// Trip the vehicle is currently running, when the client reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trip_id: Option<i64>,
    /// Latitude in degrees, validated to [-90, 90].
    pub lat: f64,
    /// Longitude in degrees, validated to [-180, 180].
    pub lng: f64,
    /// Speed over ground; 0 when the client omits it.
    #[serde(default)]
    pub speed: f64,
    /// Heading in degrees; 0 when the client omits it.
    #[serde(default)]
    pub heading: f64,
    /// Server-side receipt timestamp.
    pub timestamp: DateTime<Utc>,
    /// Authenticated driver entity that produced this event. Attached by
    /// the validator, never trusted from the raw payload.
    pub origin_id: i64,
}

/// A trip lifecycle update (departed, arrived at stop, boarding, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEvent {
    /// Trip being updated.
    pub trip_id: i64,
    /// Free-form status discriminator as the record store defines it.
    pub status: String,
    /// Stop the update refers to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_id: Option<i64>,
    /// Transported individual the update refers to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<i64>,
    /// Server-side receipt timestamp.
    pub timestamp: DateTime<Utc>,
    /// Authenticated driver entity that produced this event.
    pub origin_id: i64,
}

/// Alert classification.
///
/// `Unknown` absorbs kinds introduced by newer processes; the router
/// drops them with a warning instead of crashing (forward compatibility).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// Driver-raised emergency; always critical, routed to admins.
    Emergency,
    /// Vehicle approaching a stop; routed to the targeted parents.
    NearStop,
    /// Trip running late; routed to admins and targeted parents.
    Delay,
    /// Any kind this process version does not know.
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Emergency => "emergency",
            Self::NearStop => "near_stop",
            Self::Delay => "delay",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// An alert to be routed by the per-kind policy table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertEvent {
    /// Alert classification, the routing discriminant.
    pub kind: AlertKind,
    /// Severity string; forced to `"critical"` for emergencies.
    pub severity: String,
    /// Human-readable message.
    pub message: String,
    /// Vehicle involved, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<i64>,
    /// Trip involved, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trip_id: Option<i64>,
    /// Parent entities targeted by `near_stop` / `delay` alerts.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target_ids: Vec<i64>,
    /// Driver entity that raised the alert, stamped by the validator for
    /// actor-originated alerts; absent for system-injected ones.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_id: Option<i64>,
    /// Server-side receipt timestamp.
    pub timestamp: DateTime<Utc>,
}

/// Tagged union of everything that crosses the broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum CanonicalEvent {
    /// Position report, published under `object:<objectId>`.
    Location(LocationEvent),
    /// Trip status update, published under `trip:<tripId>`.
    TripStatus(StatusEvent),
    /// Alert, published under `alert:<kind>` and routed by policy.
    Alert(AlertEvent),
}

impl CanonicalEvent {
    /// Returns the broker channel this event is published under.
    ///
    /// For the two event-bearing families the channel name is also the
    /// delivery room name; alerts go through the router instead.
    #[must_use]
    pub fn channel(&self) -> String {
        match self {
            Self::Location(e) => RoomName::Object(e.object_id).to_string(),
            Self::TripStatus(e) => RoomName::Trip(e.trip_id).to_string(),
            Self::Alert(e) => format!("alert:{}", e.kind),
        }
    }

    /// Returns the event type as a static string slice.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::Location(_) => "location",
            Self::TripStatus(_) => "trip_status",
            Self::Alert(_) => "alert",
        }
    }
}

//! Event ingestion and validation.
//!
//! Inbound actor events are checked here — once, against a single
//! authorization table — then normalized into canonical, origin-stamped
//! events. Nothing downstream of this module ever re-checks roles or
//! trusts a client-supplied origin.

use chrono::Utc;

use crate::auth::{Claims, Role};
use crate::domain::event::{AlertEvent, AlertKind, LocationEvent, StatusEvent};
use crate::domain::CanonicalEvent;
use crate::error::RelayError;

/// Inbound event classification for the authorization table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// `driver:location`.
    Location,
    /// `driver:trip_status`.
    TripStatus,
    /// `driver:emergency`.
    Emergency,
}

/// The authorization table: which roles may send which event kinds.
///
/// Centralized so a new event type or role changes exactly one place.
const fn role_may_send(role: Role, kind: EventKind) -> bool {
    match (role, kind) {
        (Role::Driver, EventKind::Location | EventKind::TripStatus | EventKind::Emergency) => true,
        (Role::Admin | Role::Parent, _) => false,
    }
}

/// Checks the session's role against the table and returns the origin
/// entity id to stamp on the canonical event.
///
/// # Errors
///
/// [`RelayError::RoleRequired`] when the session is unauthenticated or
/// the role is not permitted for `kind`; [`RelayError::InvalidRequest`]
/// when the identity carries no linked entity to use as origin.
fn authorize(identity: Option<&Claims>, kind: EventKind) -> Result<i64, RelayError> {
    let claims = identity.ok_or(RelayError::RoleRequired("driver"))?;
    if !role_may_send(claims.role, kind) {
        return Err(RelayError::RoleRequired("driver"));
    }
    claims
        .linked_entity_id()
        .ok_or_else(|| RelayError::InvalidRequest("identity has no linked entity".to_string()))
}

/// Validates a `driver:location` payload into a canonical event.
///
/// Only `objectId`, `lat`, and `lng` are required. `speed` and `heading`
/// default to 0 when absent, `tripId` may be omitted entirely, and the
/// timestamp and origin are always stamped server-side.
///
/// # Errors
///
/// Role failures per [`RelayError::RoleRequired`];
/// [`RelayError::MissingField`] for absent required fields;
/// [`RelayError::InvalidRequest`] for out-of-range coordinates.
#[allow(clippy::too_many_arguments)]
pub fn validate_location(
    identity: Option<&Claims>,
    object_id: Option<i64>,
    trip_id: Option<i64>,
    lat: Option<f64>,
    lng: Option<f64>,
    speed: Option<f64>,
    heading: Option<f64>,
) -> Result<CanonicalEvent, RelayError> {
    let origin_id = authorize(identity, EventKind::Location)?;

    let object_id = object_id.ok_or(RelayError::MissingField("objectId"))?;
    let lat = lat.ok_or(RelayError::MissingField("lat"))?;
    let lng = lng.ok_or(RelayError::MissingField("lng"))?;

    if !(-90.0..=90.0).contains(&lat) {
        return Err(RelayError::InvalidRequest(format!("lat out of range: {lat}")));
    }
    if !(-180.0..=180.0).contains(&lng) {
        return Err(RelayError::InvalidRequest(format!("lng out of range: {lng}")));
    }

    Ok(CanonicalEvent::Location(LocationEvent {
        object_id,
        trip_id,
        lat,
        lng,
        speed: speed.unwrap_or(0.0),
        heading: heading.unwrap_or(0.0),
        timestamp: Utc::now(),
        origin_id,
    }))
}

/// Validates a `driver:trip_status` payload into a canonical event.
///
/// # Errors
///
/// Role failures per [`RelayError::RoleRequired`];
/// [`RelayError::MissingField`] for absent `tripId` or `status`.
pub fn validate_trip_status(
    identity: Option<&Claims>,
    trip_id: Option<i64>,
    status: Option<String>,
    stop_id: Option<i64>,
    subject_id: Option<i64>,
) -> Result<CanonicalEvent, RelayError> {
    let origin_id = authorize(identity, EventKind::TripStatus)?;

    let trip_id = trip_id.ok_or(RelayError::MissingField("tripId"))?;
    let status = status.ok_or(RelayError::MissingField("status"))?;

    Ok(CanonicalEvent::TripStatus(StatusEvent {
        trip_id,
        status,
        stop_id,
        subject_id,
        timestamp: Utc::now(),
        origin_id,
    }))
}

/// Validates a `driver:emergency` payload into a canonical alert.
///
/// Severity is forced to `critical` regardless of input.
///
/// # Errors
///
/// Role failures per [`RelayError::RoleRequired`];
/// [`RelayError::MissingField`] for an absent `message`.
pub fn validate_emergency(
    identity: Option<&Claims>,
    object_id: Option<i64>,
    trip_id: Option<i64>,
    message: Option<String>,
) -> Result<CanonicalEvent, RelayError> {
    let origin_id = authorize(identity, EventKind::Emergency)?;

    let message = message.ok_or(RelayError::MissingField("message"))?;

    Ok(CanonicalEvent::Alert(AlertEvent {
        kind: AlertKind::Emergency,
        severity: "critical".to_string(),
        message,
        object_id,
        trip_id,
        target_ids: Vec::new(),
        origin_id: Some(origin_id),
        timestamp: Utc::now(),
    }))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn claims(role: Role, driver_id: Option<i64>) -> Claims {
        Claims {
            id: 42,
            role,
            driver_id,
            parent_id: None,
            exp: 4_102_444_800,
        }
    }

    #[test]
    fn unauthenticated_location_is_role_gated() {
        let result = validate_location(None, Some(1), Some(5), Some(1.0), Some(2.0), None, None);
        assert!(matches!(result, Err(RelayError::RoleRequired("driver"))));
    }

    #[test]
    fn non_driver_roles_cannot_send_anything() {
        for role in [Role::Admin, Role::Parent] {
            let c = claims(role, None);
            assert!(matches!(
                validate_location(Some(&c), Some(1), Some(5), Some(1.0), Some(2.0), None, None),
                Err(RelayError::RoleRequired("driver"))
            ));
            assert!(matches!(
                validate_trip_status(Some(&c), Some(5), Some("departed".to_string()), None, None),
                Err(RelayError::RoleRequired("driver"))
            ));
            assert!(matches!(
                validate_emergency(Some(&c), Some(1), Some(5), Some("help".to_string())),
                Err(RelayError::RoleRequired("driver"))
            ));
        }
    }

    #[test]
    fn location_stamps_origin_from_claims() {
        let c = claims(Role::Driver, Some(3));
        let Ok(CanonicalEvent::Location(event)) =
            validate_location(Some(&c), Some(1), Some(5), Some(10.76), Some(106.66), None, None)
        else {
            panic!("expected location event");
        };
        assert_eq!(event.origin_id, 3);
        assert_eq!(event.object_id, 1);
        assert_eq!(event.speed, 0.0);
        assert_eq!(event.heading, 0.0);
    }

    #[test]
    fn location_without_trip_id_is_valid() {
        let c = claims(Role::Driver, Some(3));
        let Ok(CanonicalEvent::Location(event)) =
            validate_location(Some(&c), Some(1), None, Some(10.76), Some(106.66), None, None)
        else {
            panic!("location without tripId must validate");
        };
        assert_eq!(event.trip_id, None);
        assert_eq!(event.lat, 10.76);
        assert_eq!(event.lng, 106.66);
        assert_eq!(event.origin_id, 3);
        assert_eq!(CanonicalEvent::Location(event).channel(), "object:1");
    }

    #[test]
    fn location_requires_coordinates() {
        let c = claims(Role::Driver, Some(3));
        assert!(matches!(
            validate_location(Some(&c), Some(1), Some(5), None, Some(2.0), None, None),
            Err(RelayError::MissingField("lat"))
        ));
        assert!(matches!(
            validate_location(Some(&c), Some(1), Some(5), Some(1.0), None, None, None),
            Err(RelayError::MissingField("lng"))
        ));
        assert!(matches!(
            validate_location(Some(&c), None, Some(5), Some(1.0), Some(2.0), None, None),
            Err(RelayError::MissingField("objectId"))
        ));
    }

    #[test]
    fn location_rejects_out_of_range_coordinates() {
        let c = claims(Role::Driver, Some(3));
        assert!(matches!(
            validate_location(Some(&c), Some(1), Some(5), Some(91.0), Some(2.0), None, None),
            Err(RelayError::InvalidRequest(_))
        ));
        assert!(matches!(
            validate_location(Some(&c), Some(1), Some(5), Some(1.0), Some(-180.5), None, None),
            Err(RelayError::InvalidRequest(_))
        ));
    }

    #[test]
    fn driver_without_linked_entity_cannot_publish() {
        let c = claims(Role::Driver, None);
        assert!(matches!(
            validate_location(Some(&c), Some(1), Some(5), Some(1.0), Some(2.0), None, None),
            Err(RelayError::InvalidRequest(_))
        ));
    }

    #[test]
    fn emergency_forces_critical_severity() {
        let c = claims(Role::Driver, Some(3));
        let Ok(CanonicalEvent::Alert(alert)) =
            validate_emergency(Some(&c), Some(1), Some(5), Some("brake failure".to_string()))
        else {
            panic!("expected alert event");
        };
        assert_eq!(alert.severity, "critical");
        assert_eq!(alert.kind, AlertKind::Emergency);
        assert_eq!(
            CanonicalEvent::Alert(alert).channel(),
            "alert:emergency"
        );
    }

    #[test]
    fn trip_status_requires_trip_and_status() {
        let c = claims(Role::Driver, Some(3));
        assert!(matches!(
            validate_trip_status(Some(&c), None, Some("departed".to_string()), None, None),
            Err(RelayError::MissingField("tripId"))
        ));
        assert!(matches!(
            validate_trip_status(Some(&c), Some(5), None, None, None),
            Err(RelayError::MissingField("status"))
        ));

        let Ok(event) = validate_trip_status(
            Some(&c),
            Some(5),
            Some("departed".to_string()),
            Some(2),
            None,
        ) else {
            panic!("expected status event");
        };
        assert_eq!(event.channel(), "trip:5");
    }
}

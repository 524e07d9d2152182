//! Identity claims carried by a verified bearer token.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Actor role encoded in the token and used for event authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Dispatcher / operations staff. Receives emergency and delay alerts.
    Admin,
    /// Vehicle operator. The only role allowed to publish telemetry.
    Driver,
    /// Guardian of a transported individual. Receives targeted alerts.
    Parent,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Admin => "admin",
            Self::Driver => "driver",
            Self::Parent => "parent",
        };
        f.write_str(s)
    }
}

impl FromStr for Role {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "driver" => Ok(Self::Driver),
            "parent" => Ok(Self::Parent),
            _ => Err(()),
        }
    }
}

/// Claims decoded from a bearer token.
///
/// Immutable for the lifetime of a connection's authenticated state.
/// The entity links (`driver_id` / `parent_id`) are issued at login time;
/// only the one matching `role` is meaningful.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Account identifier.
    pub id: i64,
    /// Actor role.
    pub role: Role,
    /// Linked driver entity, present for `role = driver`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver_id: Option<i64>,
    /// Linked parent entity, present for `role = parent`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<i64>,
    /// Expiry as a unix timestamp, validated by the verifier.
    pub exp: i64,
}

impl Claims {
    /// Returns the entity id linked to this identity's role, if any.
    ///
    /// A driver claim with only `parent_id` set (or vice versa) yields
    /// `None`; the link must match the role to count.
    #[must_use]
    pub const fn linked_entity_id(&self) -> Option<i64> {
        match self.role {
            Role::Driver => self.driver_id,
            Role::Parent => self.parent_id,
            Role::Admin => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn claims(role: Role, driver_id: Option<i64>, parent_id: Option<i64>) -> Claims {
        Claims {
            id: 1,
            role,
            driver_id,
            parent_id,
            exp: 4_102_444_800,
        }
    }

    #[test]
    fn linked_entity_follows_role() {
        assert_eq!(
            claims(Role::Driver, Some(3), None).linked_entity_id(),
            Some(3)
        );
        assert_eq!(
            claims(Role::Parent, None, Some(9)).linked_entity_id(),
            Some(9)
        );
        assert_eq!(claims(Role::Admin, Some(3), Some(9)).linked_entity_id(), None);
    }

    #[test]
    fn mismatched_link_is_ignored() {
        // A driver token without a driver link has no origin entity.
        assert_eq!(claims(Role::Driver, None, Some(9)).linked_entity_id(), None);
    }

    #[test]
    fn role_serializes_snake_case() {
        let Ok(json) = serde_json::to_string(&Role::Admin) else {
            panic!("serialization failed");
        };
        assert_eq!(json, "\"admin\"");
    }

    #[test]
    fn role_parse_round_trips() {
        for role in [Role::Admin, Role::Driver, Role::Parent] {
            let Ok(parsed) = role.to_string().parse::<Role>() else {
                panic!("round trip failed for {role}");
            };
            assert_eq!(parsed, role);
        }
    }
}

//! Structured room names.
//!
//! A room is a named multicast group of connections sharing a delivery
//! interest. Rooms have no existence beyond their member set; an empty
//! room is simply absent from the registry.

use std::fmt;
use std::str::FromStr;

use crate::auth::Role;

/// Structured key identifying a room.
///
/// The textual form doubles as the broker channel name for the two
/// event-bearing families (`object:<id>`, `trip:<id>`), so `Display` and
/// [`FromStr`] must stay inverse of each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RoomName {
    /// Per-identity room, joined unconditionally on authentication.
    User(i64),
    /// Per-role room, joined unconditionally on authentication.
    Role(Role),
    /// Entity room for a driver identity.
    Driver(i64),
    /// Entity room for a parent identity.
    Parent(i64),
    /// Subscription room for observers following one tracked object.
    /// Unauthenticated broadcast channel: any open connection may join.
    Object(i64),
    /// Per-trip room receiving status updates.
    Trip(i64),
}

impl RoomName {
    /// Returns `true` for rooms derived from an authenticated identity.
    ///
    /// These are the rooms released and rejoined on re-authentication;
    /// [`RoomName::Object`] and [`RoomName::Trip`] memberships survive an
    /// identity change.
    #[must_use]
    pub const fn is_identity_bound(&self) -> bool {
        matches!(
            self,
            Self::User(_) | Self::Role(_) | Self::Driver(_) | Self::Parent(_)
        )
    }
}

impl fmt::Display for RoomName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(id) => write!(f, "user:{id}"),
            Self::Role(role) => write!(f, "role:{role}"),
            Self::Driver(id) => write!(f, "driver:{id}"),
            Self::Parent(id) => write!(f, "parent:{id}"),
            Self::Object(id) => write!(f, "object:{id}"),
            Self::Trip(id) => write!(f, "trip:{id}"),
        }
    }
}

impl FromStr for RoomName {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (prefix, rest) = s.split_once(':').ok_or(())?;
        match prefix {
            "role" => rest.parse::<Role>().map(Self::Role),
            "user" => rest.parse().map(Self::User).map_err(|_| ()),
            "driver" => rest.parse().map(Self::Driver).map_err(|_| ()),
            "parent" => rest.parse().map(Self::Parent).map_err(|_| ()),
            "object" => rest.parse().map(Self::Object).map_err(|_| ()),
            "trip" => rest.parse().map(Self::Trip).map_err(|_| ()),
            _ => Err(()),
        }
    }
}

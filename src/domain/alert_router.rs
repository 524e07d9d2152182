//! Alert routing policy.
//!
//! Every process applies the same fixed table to alerts arriving from the
//! broker subscription, so routing is identical regardless of which
//! process a receiving connection lives on.

use crate::auth::Role;

use super::event::{AlertEvent, AlertKind};
use super::RoomName;

/// Computes the target room set for an alert.
///
/// | kind      | targets                                          |
/// |-----------|--------------------------------------------------|
/// | emergency | `role:admin`                                     |
/// | near_stop | `parent:<id>` for each id in `target_ids`        |
/// | delay     | `role:admin` plus `parent:<id>` for each target  |
///
/// Unknown kinds return an empty set; the caller logs and drops them so
/// that new alert kinds never crash older processes.
#[must_use]
pub fn route(alert: &AlertEvent) -> Vec<RoomName> {
    match alert.kind {
        AlertKind::Emergency => vec![RoomName::Role(Role::Admin)],
        AlertKind::NearStop => alert
            .target_ids
            .iter()
            .map(|id| RoomName::Parent(*id))
            .collect(),
        AlertKind::Delay => {
            let mut rooms = Vec::with_capacity(alert.target_ids.len() + 1);
            rooms.push(RoomName::Role(Role::Admin));
            rooms.extend(alert.target_ids.iter().map(|id| RoomName::Parent(*id)));
            rooms
        }
        AlertKind::Unknown => Vec::new(),
    }
}

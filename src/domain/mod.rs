//! Domain layer: connection identity, rooms, canonical events, the
//! session registry, and the alert routing policy.

pub mod alert_router;
pub mod connection_id;
pub mod event;
pub mod registry;
pub mod room;

pub use connection_id::ConnectionId;
pub use event::CanonicalEvent;
pub use registry::SessionRegistry;
pub use room::RoomName;

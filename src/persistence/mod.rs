//! Persistence layer: read-only record-store access.
//!
//! Account, vehicle, and trip records live in a conventional relational
//! store owned by other services; the relay only resolves identities and
//! probes reachability.

pub mod profiles;

pub use profiles::{ProfileStore, ProfileSummary};

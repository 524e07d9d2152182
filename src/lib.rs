//! # fleet-relay
//!
//! Real-time distribution core for a vehicle tracking service. Drivers
//! push positions, trip status, and alerts over long-lived WebSocket
//! connections; dispatchers, guardians, and anonymous observers receive
//! live room deliveries. Fanout crosses process boundaries through a
//! shared Redis pub/sub namespace, so vehicles and their observers never
//! need to share a process.
//!
//! ## Architecture
//!
//! ```text
//! Clients (WebSocket, HTTP)
//!     │
//!     ├── WS connection loop (ws/)
//!     │       │
//!     │       ├── CredentialVerifier (auth/) + ProfileStore (persistence/)
//!     │       ├── Validator (ingest/)
//!     │       └── SessionRegistry rooms (domain/)
//!     │
//!     ├── BrokerPublisher ──► Redis channels ──► subscriber loop (broker/)
//!     │                                              │
//!     │                                              ├── object:*/trip:* → rooms
//!     │                                              └── alert:* → AlertRouter (domain/)
//!     │
//!     ├── PositionCache (broker/) — write-through, TTL
//!     └── REST: /health, /api/v1/positions (api/)
//! ```
//!
//! Live-only by design: missed events are gone, the broker is the only
//! cross-process channel, and the cache is a best-effort latest-value
//! snapshot rather than a linearization point.

pub mod api;
pub mod app_state;
pub mod auth;
pub mod broker;
pub mod config;
pub mod domain;
pub mod error;
pub mod ingest;
pub mod persistence;
pub mod ws;

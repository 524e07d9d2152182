//! WebSocket layer: connection handling, wire messages, and dispatch.
//!
//! The WebSocket endpoint at `/ws` is the bidirectional connection
//! protocol of the relay: actors authenticate, push telemetry, and
//! receive room deliveries over it.

pub mod connection;
pub mod handler;
pub mod messages;

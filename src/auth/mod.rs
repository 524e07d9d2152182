//! Credential verification: bearer token decoding and identity claims.
//!
//! The relay authenticates actors on long-lived connections; this module
//! owns the token-to-claims half of that handshake. Current-account
//! eligibility is re-checked separately through the persistence layer.

pub mod claims;
pub mod verifier;

pub use claims::{Claims, Role};
pub use verifier::CredentialVerifier;

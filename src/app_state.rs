//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::auth::CredentialVerifier;
use crate::broker::{BrokerPublisher, PositionCache};
use crate::domain::SessionRegistry;
use crate::persistence::ProfileStore;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Sole owner of connection and room membership state.
    pub registry: Arc<SessionRegistry>,
    /// Bearer token verifier.
    pub verifier: Arc<CredentialVerifier>,
    /// Record-store access for identity resolution and health probe.
    pub profiles: ProfileStore,
    /// The process-wide broker publish handle.
    pub broker: BrokerPublisher,
    /// Last-known-position cache.
    pub cache: PositionCache,
}

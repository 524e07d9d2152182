//! fleet-relay server entry point.
//!
//! Starts the Axum HTTP server with the WebSocket endpoint, wires the
//! broker handles, and spawns the process-wide subscription loop.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::get;
use redis::aio::ConnectionManager;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use fleet_relay::api;
use fleet_relay::app_state::AppState;
use fleet_relay::auth::CredentialVerifier;
use fleet_relay::broker::{self, BrokerPublisher, PositionCache};
use fleet_relay::config::RelayConfig;
use fleet_relay::domain::SessionRegistry;
use fleet_relay::persistence::ProfileStore;
use fleet_relay::ws::handler::ws_handler;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = RelayConfig::from_env()?;
    tracing::info!(addr = %config.listen_addr, "starting fleet-relay");

    // Record store: lazy pool, probed by /health and used per-auth.
    let pg_pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .min_connections(config.database_min_connections)
        .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
        .connect_lazy(&config.database_url)?;

    // Broker: one publish handle and one subscribe connection per process.
    let redis_client = redis::Client::open(config.redis_url.as_str())?;
    let manager = ConnectionManager::new(redis_client.clone()).await?;
    let broker_publisher = BrokerPublisher::new(manager.clone());
    let position_cache = PositionCache::new(manager, config.position_ttl_secs);
    tracing::info!("broker publish handle connected");

    // Domain layer
    let registry = Arc::new(SessionRegistry::new());

    // Build application state
    let app_state = AppState {
        registry: Arc::clone(&registry),
        verifier: Arc::new(CredentialVerifier::new(&config.jwt_secret)),
        profiles: ProfileStore::new(pg_pool),
        broker: broker_publisher,
        cache: position_cache,
    };

    // Process-wide subscription loop: every matching broker message,
    // own publishes included, flows back through local room delivery.
    let subscriber_registry = Arc::clone(&registry);
    let retry_max = config.broker_retry_max;
    let retry_delay = Duration::from_millis(config.broker_retry_delay_ms);
    tokio::spawn(async move {
        if let Err(e) =
            broker::run_subscriber(redis_client, subscriber_registry, retry_max, retry_delay).await
        {
            tracing::error!(error = %e, "broker subscription lost; cross-process fanout disabled");
        }
    });

    // Build router
    let app = Router::new()
        .merge(api::build_router())
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}

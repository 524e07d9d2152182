//! Per-connection read/write loop and inbound dispatch.
//!
//! One task per connection. The loop selects between client frames and
//! the connection's own outbound queue (filled by room deliveries from
//! the broker subscription). Per-event failures answer only this
//! connection; an unparseable or binary frame is protocol corruption
//! and terminates it.

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use super::messages::{ClientMessage, ServerMessage};
use crate::app_state::AppState;
use crate::auth::Claims;
use crate::domain::{CanonicalEvent, ConnectionId, RoomName};
use crate::error::RelayError;
use crate::ingest;

/// Runs the read/write loop for a single WebSocket connection.
///
/// Registers the session on entry and closes it unconditionally on exit,
/// releasing all room memberships atomically. Closing drops the outbound
/// receiver, so any delivery racing the close fails silently without
/// touching other connections.
pub async fn run_connection(socket: WebSocket, state: AppState) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let connection_id = state.registry.open(tx).await;

    loop {
        tokio::select! {
            // Incoming frame from the client.
            msg = ws_rx.next() => {
                let Some(Ok(raw)) = msg else { break };
                match classify_frame(connection_id, raw) {
                    Inbound::Message(inbound) => {
                        let reply = dispatch(&state, connection_id, inbound).await;
                        if ws_tx.send(Message::text(reply.to_json())).await.is_err() {
                            break;
                        }
                    }
                    Inbound::Ignore => {}
                    Inbound::Terminate => break,
                }
            }
            // Room delivery from the broker subscription.
            frame = rx.recv() => {
                match frame {
                    Some(json) => {
                        if ws_tx.send(Message::text(json)).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }

    state.registry.close(connection_id).await;
    tracing::debug!(connection_id = %connection_id, "ws connection closed");
}

/// Outcome of classifying one raw WebSocket frame.
#[derive(Debug)]
enum Inbound {
    /// A well-formed protocol message to dispatch.
    Message(ClientMessage),
    /// Transport chatter (ping/pong); nothing to do.
    Ignore,
    /// Protocol corruption or an orderly close; drop the connection.
    Terminate,
}

/// Classifies a raw frame before dispatch.
///
/// The protocol is text-only JSON: an unparseable text frame or any
/// binary frame is corruption and terminates the connection rather
/// than being skipped.
fn classify_frame(connection_id: ConnectionId, raw: Message) -> Inbound {
    match raw {
        Message::Text(text) => match serde_json::from_str::<ClientMessage>(text.as_str()) {
            Ok(inbound) => Inbound::Message(inbound),
            Err(e) => {
                tracing::warn!(
                    connection_id = %connection_id,
                    error = %e,
                    "unparseable frame; terminating connection"
                );
                Inbound::Terminate
            }
        },
        Message::Binary(_) => {
            tracing::warn!(
                connection_id = %connection_id,
                "binary frame on text-only protocol; terminating connection"
            );
            Inbound::Terminate
        }
        Message::Close(_) => Inbound::Terminate,
        Message::Ping(_) | Message::Pong(_) => Inbound::Ignore,
    }
}

/// Dispatches one inbound message, producing the direct reply frame.
async fn dispatch(
    state: &AppState,
    connection_id: ConnectionId,
    msg: ClientMessage,
) -> ServerMessage {
    match msg {
        ClientMessage::Authenticate { token } => {
            match authenticate(state, connection_id, &token).await {
                Ok(claims) => ServerMessage::Authenticated {
                    identity_id: claims.id,
                    role: claims.role,
                },
                Err(e) => {
                    tracing::debug!(connection_id = %connection_id, error = %e, "authentication rejected");
                    ServerMessage::AuthenticationError {
                        message: e.to_string(),
                    }
                }
            }
        }

        ClientMessage::DriverLocation {
            object_id,
            trip_id,
            lat,
            lng,
            speed,
            heading,
        } => {
            let identity = state.registry.identity_of(connection_id).await;
            match ingest::validate_location(
                identity.as_ref(),
                object_id,
                trip_id,
                lat,
                lng,
                speed,
                heading,
            ) {
                Ok(event) => {
                    publish_location(state, &event).await;
                    ServerMessage::LocationReceived {}
                }
                Err(e) => reject(connection_id, &e),
            }
        }

        ClientMessage::DriverTripStatus {
            trip_id,
            status,
            stop_id,
            subject_id,
        } => {
            let identity = state.registry.identity_of(connection_id).await;
            match ingest::validate_trip_status(identity.as_ref(), trip_id, status, stop_id, subject_id)
            {
                Ok(event) => {
                    publish_best_effort(state, &event).await;
                    ServerMessage::TripStatusReceived {}
                }
                Err(e) => reject(connection_id, &e),
            }
        }

        ClientMessage::DriverEmergency {
            object_id,
            trip_id,
            message,
        } => {
            let identity = state.registry.identity_of(connection_id).await;
            match ingest::validate_emergency(identity.as_ref(), object_id, trip_id, message) {
                Ok(event) => {
                    publish_best_effort(state, &event).await;
                    ServerMessage::EmergencySent {}
                }
                Err(e) => reject(connection_id, &e),
            }
        }

        ClientMessage::SubscribeObject { object_id } => {
            match state
                .registry
                .subscribe(connection_id, RoomName::Object(object_id))
                .await
            {
                Ok(()) => ServerMessage::SubscriptionConfirmed { object_id },
                Err(e) => reject(connection_id, &e),
            }
        }

        ClientMessage::UnsubscribeObject { object_id } => {
            state
                .registry
                .unsubscribe(connection_id, &RoomName::Object(object_id))
                .await;
            ServerMessage::UnsubscriptionConfirmed { object_id }
        }
    }
}

/// Full authentication handshake: token verification, then resolution
/// against current account state, then room membership.
///
/// Resolution is mandatory on every handshake — a token stays
/// structurally valid after its account is deactivated.
async fn authenticate(
    state: &AppState,
    connection_id: ConnectionId,
    token: &str,
) -> Result<Claims, RelayError> {
    let claims = state.verifier.verify(token)?;
    let profile = state.profiles.fetch_profile(claims.id).await?;
    state.registry.set_identity(connection_id, claims.clone()).await?;
    tracing::info!(
        connection_id = %connection_id,
        identity_id = claims.id,
        role = %claims.role,
        name = %profile.full_name,
        "authenticated"
    );
    Ok(claims)
}

/// Publishes a location event and write-through updates the position
/// cache. The two side effects are independent and run concurrently;
/// neither failure blocks the other or the ack.
async fn publish_location(state: &AppState, event: &CanonicalEvent) {
    if let CanonicalEvent::Location(location) = event {
        let (published, cached) =
            tokio::join!(state.broker.publish(event), state.cache.put(location));
        if let Err(e) = published {
            tracing::warn!(error = %e, "location publish dropped");
        }
        if let Err(e) = cached {
            tracing::warn!(error = %e, "position cache write failed");
        }
    }
}

/// Publishes an event, logging and dropping on broker failure.
async fn publish_best_effort(state: &AppState, event: &CanonicalEvent) {
    if let Err(e) = state.broker.publish(event).await {
        tracing::warn!(error = %e, event_type = event.event_type_str(), "publish dropped");
    }
}

/// Renders a per-event validation failure as an `error` frame. Local to
/// the offending connection; the ingestion loop continues.
fn reject(connection_id: ConnectionId, error: &RelayError) -> ServerMessage {
    tracing::debug!(connection_id = %connection_id, error = %error, "event rejected");
    ServerMessage::Error {
        message: error.to_string(),
    }
}

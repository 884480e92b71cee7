//! `WebSocket` transport for the realtime lobby protocol.
//!
//! Clients connect to `GET /ws` and exchange JSON text frames of the form
//! `{"event": "<name>", "data": {...}}`. Each socket gets a connection id
//! and an outbound queue from the [`Gateway`](tavern_session::Gateway);
//! the socket task drains the queue and feeds inbound frames to the
//! dispatcher one at a time, so events from a single client are handled
//! in arrival order.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use tavern_db::Store;
use tavern_types::{ClientEvent, ServerEvent};
use tracing::{debug, warn};

use crate::state::AppState;

/// Error code sent back for frames that are not a known client event.
pub const BAD_REQUEST_CODE: &str = "bad_request";

/// Upgrade an HTTP request to a lobby socket.
///
/// # Route
///
/// `GET /ws`
pub async fn ws_lobby<S: Store>(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState<S>>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_ws(socket, state))
}

/// Parse an inbound text frame. On failure, returns the error event to
/// send back to the client.
pub fn decode_frame(text: &str) -> Result<ClientEvent, ServerEvent> {
    serde_json::from_str(text).map_err(|e| ServerEvent::Error {
        code: BAD_REQUEST_CODE.to_owned(),
        message: format!("Malformed event: {e}"),
    })
}

async fn handle_ws<S: Store>(mut socket: WebSocket, state: Arc<AppState<S>>) {
    let (conn, mut outbox) = state.gateway.connect().await;
    debug!(connection_id = %conn, "WebSocket client connected");

    loop {
        tokio::select! {
            queued = outbox.recv() => {
                let Some(event) = queued else {
                    break;
                };
                if !forward(&mut socket, &event).await {
                    debug!(connection_id = %conn, "WebSocket client disconnected (send failed)");
                    break;
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Text(text))) => match decode_frame(text.as_str()) {
                        Ok(event) => state.gateway.handle(conn, event).await,
                        Err(reply) => {
                            debug!(connection_id = %conn, "Rejected malformed frame");
                            state.gateway.hub().send_to(conn, reply).await;
                        }
                    },
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_)) | Err(_)) | None => {
                        debug!(connection_id = %conn, "WebSocket client disconnected");
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    state.gateway.disconnect(conn).await;
}

/// Write one event to the socket. Returns `false` once the socket is gone.
async fn forward(socket: &mut WebSocket, event: &ServerEvent) -> bool {
    match serde_json::to_string(event) {
        Ok(json) => socket.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            warn!(error = %e, "Failed to serialize server event");
            true
        }
    }
}

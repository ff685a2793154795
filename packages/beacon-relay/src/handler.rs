//! WebSocket connection handler.
//!
//! Owns one socket for its lifetime: a writer task drains the connection's
//! outbound queue onto the socket while the read loop feeds frames to the
//! relay state. Any frame may be the first; registration is just another
//! message.

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::protocol::Envelope;
use crate::state::RelayState;

/// Handle a single WebSocket connection until it closes.
pub async fn handle_websocket(socket: WebSocket, state: RelayState) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let (tx, mut rx) = mpsc::unbounded_channel::<Envelope>();
    let connection = state.open_connection(tx);

    // ── Sender Task ───────────────────────────────────────────────────────

    let sender_task = tokio::spawn(async move {
        while let Some(envelope) = rx.recv().await {
            match serde_json::to_string(&envelope) {
                Ok(json) => {
                    if ws_sender.send(Message::Text(json)).await.is_err() {
                        break; // Connection closed
                    }
                }
                Err(e) => {
                    tracing::error!("Failed to serialize server message: {}", e);
                }
            }
        }
    });

    // ── Read Loop ─────────────────────────────────────────────────────────

    while let Some(msg_result) = ws_receiver.next().await {
        match msg_result {
            Ok(Message::Text(text)) => state.handle_text(connection, &text),
            Ok(Message::Binary(bytes)) => state.handle_binary(connection, &bytes),
            Ok(Message::Close(_)) => {
                tracing::debug!(connection = %connection, "Client sent close frame");
                break;
            }
            Err(e) => {
                tracing::warn!(
                    connection = %connection,
                    error = %e,
                    "WebSocket error"
                );
                break;
            }
            _ => {} // Ping/Pong are answered by axum
        }
    }

    // ── Cleanup ───────────────────────────────────────────────────────────

    state.close_connection(connection);
    sender_task.abort();
}

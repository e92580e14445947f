//! WebSocket stream of live order events.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};

use crate::AppState;

/// GET /ws: upgrade and stream every order event as a JSON text frame.
pub async fn subscribe(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Owns one connection for its lifetime.
///
/// Events arrive from the subscription's bounded channel. The connection
/// ends when the peer closes, a write fails, or the registry drops the
/// subscriber (for example after eviction); in every case the subscriber is
/// unregistered before returning. Events committed before the subscriber
/// registered are never delivered to it.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let registry = &state.registry;
    let mut subscription = state
        .order_service
        .at_commit_barrier(|last| registry.register_after(last));
    let subscriber_id = subscription.id();
    let (mut sender, mut receiver) = socket.split();

    let mut send_task = tokio::spawn(async move {
        while let Some(event) = subscription.recv().await {
            let json = match serde_json::to_string(event.as_ref()) {
                Ok(json) => json,
                Err(error) => {
                    tracing::warn!(%error, sequence = %event.sequence, "failed to encode event");
                    continue;
                }
            };
            if sender.send(Message::Text(json.into())).await.is_err() {
                return;
            }
        }
        tracing::debug!(
            liveness = %subscription.liveness(),
            "subscription closed, closing socket"
        );
        let _ = sender.send(Message::Close(None)).await;
    });

    // Inbound frames are only watched for close and errors.
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Close(_) = msg {
                break;
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    }

    registry.unregister(subscriber_id);
    tracing::info!(subscriber_id = %subscriber_id, "stream connection closed");
}

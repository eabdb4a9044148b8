//--------------------------------------------------------------------------------------------------
// FUNCTIONS
//--------------------------------------------------------------------------------------------------
// | Name            | Description                                        | Return Type         |
// |-----------------|----------------------------------------------------|---------------------|
// | ws_handler      | Upgrades `GET /` and `GET /ws` to a WebSocket      | impl IntoResponse   |
// | handle_command  | Executes one command frame for a connection        | WsResponse          |
//--------------------------------------------------------------------------------------------------

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Extension,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::domain::models::types::ConnectionId;
use crate::domain::services::subscriptions::{OutboundStream, SubscriptionManager};

use super::{AppState, WsCommand, WsResponse};

// Command replies waiting for the writer task.
const REPLY_BUFFER: usize = 32;

/// WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Extension(state): Extension<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Runs one streaming session until the client goes away.
///
/// A writer task drains both the connection's event queue and the command
/// replies to the socket; this task reads command frames.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let conn_id = ConnectionId::generate();
    let (_connection, mut outbound) = match state.manager.open_connection(conn_id.clone()) {
        Ok(opened) => opened,
        Err(e) => {
            error!(%conn_id, error = %e, "Failed to register connection");
            return;
        }
    };
    info!(%conn_id, "New WebSocket connection");

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (reply_tx, mut reply_rx) = mpsc::channel::<String>(REPLY_BUFFER);

    let writer_id = conn_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(message) = next_outgoing(&mut reply_rx, &mut outbound).await {
            if ws_sender.send(message).await.is_err() {
                debug!(conn_id = %writer_id, "WebSocket send failed");
                break;
            }
        }
        let _ = ws_sender.close().await;
    });

    while let Some(result) = ws_receiver.next().await {
        let text = match result {
            Ok(Message::Text(text)) => text,
            Ok(Message::Binary(data)) => match String::from_utf8(data) {
                Ok(text) => text,
                Err(_) => {
                    warn!(%conn_id, "Ignoring non UTF-8 binary frame");
                    continue;
                }
            },
            Ok(Message::Close(_)) => {
                info!(%conn_id, "WebSocket close requested");
                break;
            }
            Ok(_) => continue,
            Err(e) => {
                warn!(%conn_id, error = %e, "WebSocket error");
                break;
            }
        };

        let reply = handle_command(&state.manager, &conn_id, &text);
        match serde_json::to_string(&reply) {
            Ok(reply) => {
                if reply_tx.send(reply).await.is_err() {
                    break;
                }
            }
            Err(e) => error!(%conn_id, error = %e, "Failed to serialize reply"),
        }
    }

    state.manager.remove(&conn_id);
    drop(reply_tx);
    let _ = send_task.await;
    info!(%conn_id, "WebSocket connection closed");
}

/// Next frame for the writer task, or `None` once either side is closed.
///
/// Replies win over queued events, so a subscribe reply is written before
/// any event the new filter admits.
async fn next_outgoing(
    replies: &mut mpsc::Receiver<String>,
    outbound: &mut OutboundStream,
) -> Option<Message> {
    tokio::select! {
        biased;
        reply = replies.recv() => reply.map(Message::Text),
        payload = outbound.recv() => {
            payload.map(|payload| Message::Text(String::from_utf8_lossy(&payload).into_owned()))
        }
    }
}

/// Executes one command frame.
///
/// # Arguments
/// * `manager` - The subscription manager
/// * `conn_id` - The connection the frame arrived on
/// * `text` - Raw frame text
///
/// # Returns
/// The reply frame; failures are reported in it, never as a transport error.
pub fn handle_command(manager: &SubscriptionManager, conn_id: &ConnectionId, text: &str) -> WsResponse {
    let raw: Value = match serde_json::from_str(text) {
        Ok(raw) => raw,
        Err(e) => {
            return WsResponse::error(None, "jsonInvalid", e.to_string(), Value::String(text.to_string()));
        }
    };
    let command: WsCommand = match serde_json::from_value(raw.clone()) {
        Ok(command) => command,
        Err(e) => {
            let id = raw.get("id").cloned();
            return WsResponse::error(id, "invalidParams", e.to_string(), raw);
        }
    };
    let id = command.id.clone();

    match command.command.as_deref() {
        Some("subscribe") => match manager.subscribe(conn_id, &command.filter) {
            Ok(result) => match serde_json::to_value(&result) {
                Ok(result) => WsResponse::success(id, result),
                Err(e) => WsResponse::error(id, "internal", e.to_string(), raw),
            },
            Err(e) => WsResponse::from_subscription_error(id, &e, raw),
        },
        Some("unsubscribe") => match manager.unsubscribe(conn_id, &command.filter) {
            Ok(()) => WsResponse::success(id, json!({})),
            Err(e) => WsResponse::from_subscription_error(id, &e, raw),
        },
        Some("ping") => WsResponse::success(id, json!({})),
        Some(other) => {
            let message = format!("Unknown command: {}", other);
            WsResponse::error(id, "unknownCmd", message, raw)
        }
        None => WsResponse::error(id, "missingCommand", "Missing field 'command'", raw),
    }
}

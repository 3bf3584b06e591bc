use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use varia_core::progress::session_hello;
use varia_core::types::{DbId, SessionId};

use crate::auth::jwt::validate_token;
use crate::state::AppState;
use crate::ws::manager::WsManager;

/// Query parameters accepted on the upgrade request.
#[derive(Debug, Deserialize)]
pub struct WsParams {
    /// Optional access token binding the session to a user. Browsers cannot
    /// set headers on a WebSocket upgrade, so it travels in the query.
    pub token: Option<String>,
}

/// HTTP handler that upgrades the connection to WebSocket.
///
/// Every connection gets a fresh session id, announced to the client in a
/// `{"type":"session","sid":..}` frame; uploads quote it as `?sid=` so
/// their progress is routed back here.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let user_id = params
        .token
        .as_deref()
        .and_then(|token| validate_token(token, &state.config.jwt).ok())
        .map(|claims| claims.sub);

    ws.on_upgrade(move |socket| handle_socket(socket, state.ws_manager, user_id))
}

/// Manage a single WebSocket connection after upgrade.
///
/// Splits the socket into a sink (outbound) and stream (inbound), then:
///   1. Registers the connection with `WsManager` under a new session id.
///   2. Queues the session hello frame.
///   3. Spawns a sender task that forwards messages from the manager channel.
///   4. Processes inbound messages on the current task.
///   5. Cleans up on disconnect.
async fn handle_socket(socket: WebSocket, ws_manager: Arc<WsManager>, user_id: Option<DbId>) {
    let session_id = SessionId::generate();
    tracing::info!(session_id = %session_id, user_id = ?user_id, "WebSocket connected");

    let mut rx = ws_manager.add(session_id.clone(), user_id).await;
    ws_manager
        .send_to_session(
            &session_id,
            Message::Text(session_hello(&session_id).to_string().into()),
        )
        .await;

    let (mut sink, mut stream) = socket.split();

    // Sender task: forward channel messages to the WebSocket sink.
    let sender_session = session_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                tracing::debug!(session_id = %sender_session, "WebSocket sink closed");
                break;
            }
        }
    });

    // Receiver loop: the client only ever closes or answers pings.
    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                tracing::trace!(session_id = %session_id, "Pong received");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(session_id = %session_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    ws_manager.remove(&session_id).await;
    send_task.abort();
    tracing::info!(session_id = %session_id, "WebSocket disconnected");
}

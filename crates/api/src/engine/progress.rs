//! Relay from the local progress bus to WebSocket sessions.
//!
//! Each [`SessionEvent`] on the bus is serialised to its wire form and sent
//! to the connection registered for its session. Events for sessions that
//! are not connected to this process are dropped.

use std::sync::Arc;

use axum::extract::ws::Message;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use varia_core::progress::SessionEvent;

use crate::ws::WsManager;

/// Forwards progress events to their owning WebSocket connection.
pub struct ProgressRelay {
    ws_manager: Arc<WsManager>,
}

impl ProgressRelay {
    pub fn new(ws_manager: Arc<WsManager>) -> Self {
        Self { ws_manager }
    }

    /// Run until the bus closes or the cancellation token is triggered.
    pub async fn run(
        self,
        mut receiver: broadcast::Receiver<SessionEvent>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Progress relay shutting down");
                    break;
                }
                received = receiver.recv() => match received {
                    Ok(envelope) => self.deliver(envelope).await,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "Progress relay lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::info!("Progress bus closed, relay shutting down");
                        break;
                    }
                },
            }
        }
    }

    async fn deliver(&self, envelope: SessionEvent) {
        let SessionEvent { session_id, event } = envelope;
        let payload = match serde_json::to_string(&event) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(error = %e, session_id = %session_id, "Failed to encode progress event");
                return;
            }
        };

        if self
            .ws_manager
            .send_to_session(&session_id, Message::Text(payload.into()))
            .await
        {
            tracing::debug!(session_id = %session_id, kind = event.kind(), "Progress event delivered");
        } else {
            tracing::debug!(
                session_id = %session_id,
                kind = event.kind(),
                "No live connection for session, dropping progress event",
            );
        }
    }
}

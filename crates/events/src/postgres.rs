//! Cross-process progress transport over Postgres `LISTEN`/`NOTIFY`.
//!
//! Workers publish through [`PgNotifyPublisher`]; every serving process
//! runs a [`PgProgressListener`] that re-publishes the envelopes it hears
//! onto its local [`ProgressBus`]. Notifications committed one after
//! another by a single publisher are delivered in that order.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::PgListener;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use varia_core::progress::{ProgressEvent, SessionEvent};
use varia_core::types::SessionId;

use crate::bus::ProgressBus;
use crate::publisher::ProgressPublisher;

/// Postgres notification channel carrying [`SessionEvent`] JSON payloads.
pub const PROGRESS_CHANNEL: &str = "variation_progress";

/// Pause before retrying after the listener connection drops.
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

// ---------------------------------------------------------------------------
// Publisher
// ---------------------------------------------------------------------------

/// Publishes progress events with `pg_notify`.
pub struct PgNotifyPublisher {
    pool: PgPool,
}

impl PgNotifyPublisher {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProgressPublisher for PgNotifyPublisher {
    async fn publish(&self, session_id: &SessionId, event: ProgressEvent) {
        let kind = event.kind();
        let envelope = SessionEvent::new(session_id.clone(), event);

        let payload = match serde_json::to_string(&envelope) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(error = %e, session_id = %session_id, kind, "Failed to encode progress event");
                return;
            }
        };

        if let Err(e) = sqlx::query("SELECT pg_notify($1, $2)")
            .bind(PROGRESS_CHANNEL)
            .bind(&payload)
            .execute(&self.pool)
            .await
        {
            tracing::error!(
                error = %e,
                session_id = %session_id,
                kind,
                "Failed to publish progress notification",
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Listener
// ---------------------------------------------------------------------------

/// Background service relaying Postgres notifications onto a local bus.
pub struct PgProgressListener {
    pool: PgPool,
    bus: Arc<ProgressBus>,
}

impl PgProgressListener {
    pub fn new(pool: PgPool, bus: Arc<ProgressBus>) -> Self {
        Self { pool, bus }
    }

    /// Listen until the cancellation token is triggered.
    ///
    /// Fails only if the initial `LISTEN` cannot be established; later
    /// connection losses are logged and the listener reconnects.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), sqlx::Error> {
        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(PROGRESS_CHANNEL).await?;
        tracing::info!(channel = PROGRESS_CHANNEL, "Progress listener started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Progress listener shutting down");
                    break;
                }
                notification = listener.recv() => match notification {
                    Ok(notification) => self.forward(notification.payload()),
                    Err(e) => {
                        tracing::warn!(error = %e, "Progress listener connection lost, reconnecting");
                        tokio::time::sleep(RECONNECT_DELAY).await;
                    }
                },
            }
        }

        Ok(())
    }

    fn forward(&self, payload: &str) {
        match decode_envelope(payload) {
            Some(envelope) => self.bus.send(envelope),
            None => {
                tracing::warn!(payload, "Discarding malformed progress notification");
            }
        }
    }
}

/// Decode a notification payload, returning `None` if it is not a valid
/// [`SessionEvent`].
pub fn decode_envelope(payload: &str) -> Option<SessionEvent> {
    serde_json::from_str(payload).ok()
}

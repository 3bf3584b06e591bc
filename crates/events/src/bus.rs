//! In-process progress bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`ProgressBus`] fans every [`SessionEvent`] out to all subscribers; the
//! serving layer's relay picks out the events for the sessions it owns.
//! It is designed to be shared via `Arc<ProgressBus>`.

use async_trait::async_trait;
use tokio::sync::broadcast;
use varia_core::progress::{ProgressEvent, SessionEvent};
use varia_core::types::SessionId;

use crate::publisher::ProgressPublisher;

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out bus for session-addressed progress events.
///
/// # Usage
///
/// ```rust
/// use varia_core::progress::{ProgressEvent, SessionEvent};
/// use varia_events::ProgressBus;
///
/// let bus = ProgressBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.send(SessionEvent::new(
///     "sid-1".into(),
///     ProgressEvent::BatchComplete { filename: "song.mid".into() },
/// ));
/// ```
pub struct ProgressBus {
    sender: broadcast::Sender<SessionEvent>,
}

impl ProgressBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow receivers will observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Send an addressed event to all current subscribers.
    ///
    /// If there are no active subscribers the event is silently dropped.
    pub fn send(&self, envelope: SessionEvent) {
        // A SendError only means there are zero receivers.
        let _ = self.sender.send(envelope);
    }

    /// Subscribe to every event sent on this bus from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }
}

impl Default for ProgressBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl ProgressPublisher for ProgressBus {
    async fn publish(&self, session_id: &SessionId, event: ProgressEvent) {
        tracing::debug!(session_id = %session_id, kind = event.kind(), "Publishing progress event");
        self.send(SessionEvent::new(session_id.clone(), event));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

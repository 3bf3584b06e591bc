use async_trait::async_trait;
use varia_core::progress::ProgressEvent;
use varia_core::types::SessionId;

/// Delivers progress events to whichever live connection owns a session.
///
/// Publishing is fire-and-forget: there is no acknowledgement and no
/// delivery guarantee when the session is not currently connected.
/// Implementations log transport failures instead of returning them.
/// Events published by one caller for one session must reach a subscriber
/// in publication order.
#[async_trait]
pub trait ProgressPublisher: Send + Sync {
    async fn publish(&self, session_id: &SessionId, event: ProgressEvent);
}

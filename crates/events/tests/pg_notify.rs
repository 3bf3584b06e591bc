//! Integration tests for the Postgres NOTIFY progress transport.

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use varia_core::progress::{ProgressEvent, SessionEvent};
use varia_core::types::SessionId;
use varia_events::postgres::{PgNotifyPublisher, PgProgressListener, PROGRESS_CHANNEL};
use varia_events::{ProgressBus, ProgressPublisher};

const SESSION: &str = "sid-notify";

fn complete(job: u32) -> ProgressEvent {
    ProgressEvent::JobComplete {
        filename: "song.mid".into(),
        job,
    }
}

/// Start a listener relaying onto `bus` and wait until it is subscribed.
///
/// Events published before `LISTEN` takes effect are lost, so keep
/// publishing a marker on a separate session until one arrives.
async fn start_listener(
    pool: &PgPool,
    bus: &Arc<ProgressBus>,
    rx: &mut broadcast::Receiver<SessionEvent>,
    cancel: &CancellationToken,
) -> tokio::task::JoinHandle<Result<(), sqlx::Error>> {
    let listener = PgProgressListener::new(pool.clone(), Arc::clone(bus));
    let handle = tokio::spawn(listener.run(cancel.clone()));

    let publisher = PgNotifyPublisher::new(pool.clone());
    let marker = SessionId::new("sid-marker");
    for _ in 0..100 {
        publisher.publish(&marker, complete(0)).await;
        if let Ok(Ok(envelope)) = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await
        {
            if envelope.session_id == marker {
                return handle;
            }
        }
    }
    panic!("progress listener never subscribed");
}

/// Next event addressed to `session`, skipping stray markers.
async fn next_for(rx: &mut broadcast::Receiver<SessionEvent>, session: &SessionId) -> ProgressEvent {
    loop {
        let envelope = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for a progress event")
            .expect("bus closed");
        if &envelope.session_id == session {
            return envelope.event;
        }
    }
}

// ---------------------------------------------------------------------------
// Test: notifications reach the local bus in publish order
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = false)]
async fn published_events_reach_bus_in_order(pool: PgPool) {
    let bus = Arc::new(ProgressBus::default());
    let mut rx = bus.subscribe();
    let cancel = CancellationToken::new();
    let handle = start_listener(&pool, &bus, &mut rx, &cancel).await;

    let publisher = PgNotifyPublisher::new(pool.clone());
    let session = SessionId::new(SESSION);
    publisher.publish(&session, complete(1)).await;
    publisher.publish(&session, complete(2)).await;
    publisher
        .publish(
            &session,
            ProgressEvent::BatchComplete {
                filename: "song.mid".into(),
            },
        )
        .await;

    assert_eq!(next_for(&mut rx, &session).await, complete(1));
    assert_eq!(next_for(&mut rx, &session).await, complete(2));
    assert!(next_for(&mut rx, &session).await.is_terminal());

    cancel.cancel();
    handle.await.unwrap().unwrap();
}

// ---------------------------------------------------------------------------
// Test: a malformed notification is skipped without stopping the listener
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = false)]
async fn malformed_notification_is_skipped(pool: PgPool) {
    let bus = Arc::new(ProgressBus::default());
    let mut rx = bus.subscribe();
    let cancel = CancellationToken::new();
    let handle = start_listener(&pool, &bus, &mut rx, &cancel).await;

    sqlx::query("SELECT pg_notify($1, $2)")
        .bind(PROGRESS_CHANNEL)
        .bind("not json")
        .execute(&pool)
        .await
        .unwrap();

    let session = SessionId::new(SESSION);
    PgNotifyPublisher::new(pool.clone())
        .publish(
            &session,
            ProgressEvent::JobFailed {
                filename: "song.mid".into(),
                job: 1,
            },
        )
        .await;

    assert_eq!(
        next_for(&mut rx, &session).await,
        ProgressEvent::JobFailed {
            filename: "song.mid".into(),
            job: 1,
        }
    );

    cancel.cancel();
    handle.await.unwrap().unwrap();
}

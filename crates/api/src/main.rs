use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use varia_core::storage::StorageLayout;
use varia_db::queue::{BatchQueue, MemoryBatchQueue, PgBatchQueue};
use varia_events::{PgProgressListener, ProgressBus};
use varia_generator::HttpGenerator;
use varia_worker::{JobExecutor, WorkerContext, WorkerRunner};

use varia_api::config::{QueueBackend, ServerConfig};
use varia_api::engine::dispatcher::VariationDispatcher;
use varia_api::engine::progress::ProgressRelay;
use varia_api::router::build_app_router;
use varia_api::state::AppState;
use varia_api::ws;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "varia_api=debug,varia_worker=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = %config.port,
        backend = ?config.queue_backend,
        "Loaded server configuration",
    );

    let storage = StorageLayout::new(config.upload_root.clone(), config.variation_root.clone());

    // --- Progress bus, WebSocket manager, heartbeat ---
    let progress_bus = Arc::new(ProgressBus::default());
    let ws_manager = Arc::new(ws::WsManager::new());
    let heartbeat_handle = ws::start_heartbeat(Arc::clone(&ws_manager));

    let cancel = CancellationToken::new();
    let mut background: Vec<JoinHandle<()>> = Vec::new();

    background.push(tokio::spawn(
        ProgressRelay::new(Arc::clone(&ws_manager)).run(progress_bus.subscribe(), cancel.clone()),
    ));

    // --- Queue backend ---
    let (pool, queue): (Option<varia_db::DbPool>, Arc<dyn BatchQueue>) = match config.queue_backend
    {
        QueueBackend::Postgres => {
            let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

            let pool = varia_db::create_pool(&database_url)
                .await
                .expect("Failed to connect to database");
            varia_db::health_check(&pool)
                .await
                .expect("Database health check failed");
            varia_db::run_migrations(&pool)
                .await
                .expect("Failed to run database migrations");
            tracing::info!("Database ready");

            // Worker processes report progress through Postgres NOTIFY.
            let listener = PgProgressListener::new(pool.clone(), Arc::clone(&progress_bus));
            let listener_cancel = cancel.clone();
            background.push(tokio::spawn(async move {
                if let Err(e) = listener.run(listener_cancel).await {
                    tracing::error!(error = %e, "Progress listener failed to start");
                }
            }));

            let queue: Arc<dyn BatchQueue> = Arc::new(PgBatchQueue::new(pool.clone()));
            (Some(pool), queue)
        }
        QueueBackend::Memory => {
            let queue: Arc<dyn BatchQueue> = Arc::new(MemoryBatchQueue::new());

            let generator = HttpGenerator::new(config.generator_url.clone(), None)
                .expect("Failed to build generator client");
            let ctx = WorkerContext::new(
                Arc::new(generator),
                progress_bus.clone(),
                storage.clone(),
            );

            for i in 0..config.embedded_workers {
                let runner = WorkerRunner::new(
                    format!("embedded-{i}"),
                    Arc::clone(&queue),
                    JobExecutor::new(ctx.clone()),
                );
                let runner_cancel = cancel.clone();
                background.push(tokio::spawn(async move { runner.run(runner_cancel).await }));
            }
            tracing::info!(workers = config.embedded_workers, "Embedded workers started");

            (None, queue)
        }
    };

    // --- App state ---
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        ws_manager: Arc::clone(&ws_manager),
        dispatcher: Arc::new(VariationDispatcher::new(queue, storage.clone())),
        storage,
        progress_bus,
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    // Runners finish their in-flight batch before observing cancellation.
    cancel.cancel();
    let shutdown_timeout = Duration::from_secs(config.shutdown_timeout_secs);
    for handle in background {
        if tokio::time::timeout(shutdown_timeout, handle).await.is_err() {
            tracing::warn!("Background task did not stop within the shutdown timeout");
        }
    }
    tracing::info!("Background services stopped");

    let ws_count = ws_manager.connection_count().await;
    tracing::info!(ws_count, "Closing remaining WebSocket connections");
    ws_manager.shutdown_all().await;

    heartbeat_handle.abort();
    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use varia_core::storage::StorageLayout;
use varia_db::queue::{BatchQueue, PgBatchQueue};
use varia_events::PgNotifyPublisher;
use varia_generator::HttpGenerator;
use varia_worker::config::WorkerConfig;
use varia_worker::{JobExecutor, WorkerContext, WorkerRunner};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "varia_worker=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = WorkerConfig::from_env();
    tracing::info!(
        name = %config.name,
        concurrency = config.concurrency,
        generator_url = %config.generator_url,
        claim_lease_secs = config.claim_lease.as_secs(),
        "Loaded worker configuration",
    );

    // --- Database ---
    let pool = varia_db::create_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");
    varia_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    varia_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database ready");

    // --- Shared context ---
    let generator = HttpGenerator::new(config.generator_url.clone(), config.generator_timeout)
        .expect("Failed to build generator client");
    let ctx = WorkerContext::new(
        Arc::new(generator),
        Arc::new(PgNotifyPublisher::new(pool.clone())),
        StorageLayout::new(config.upload_root.clone(), config.variation_root.clone()),
    );
    let queue: Arc<dyn BatchQueue> = Arc::new(
        PgBatchQueue::new(pool)
            .with_lease(config.claim_lease)
            .with_max_attempts(config.max_attempts),
    );

    // --- Runners ---
    let cancel = CancellationToken::new();
    let handles: Vec<_> = (0..config.concurrency)
        .map(|i| {
            let runner = WorkerRunner::new(
                format!("{}-{i}", config.name),
                Arc::clone(&queue),
                JobExecutor::new(ctx.clone()),
            )
            .with_poll_interval(config.poll_interval);
            let cancel = cancel.clone();
            tokio::spawn(async move { runner.run(cancel).await })
        })
        .collect();

    shutdown_signal().await;

    // In-flight batches finish before their runner observes cancellation.
    cancel.cancel();
    for handle in handles {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Worker runner task panicked");
        }
    }

    tracing::info!("Worker shutdown complete");
}

/// Wait for SIGINT or SIGTERM.
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

//! Persistence and the durable batch queue.
//!
//! - [`repositories::BatchRepo`] -- SQL for the `variation_batches` table.
//! - [`queue::BatchQueue`] -- the job-submission boundary between the
//!   serving layer and workers, with Postgres-backed and in-memory
//!   implementations.

use sqlx::postgres::PgPoolOptions;

pub mod models;
pub mod queue;
pub mod repositories;

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Verify the database answers a trivial query.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply the embedded migrations in `crates/db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

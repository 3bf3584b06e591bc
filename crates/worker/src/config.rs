use std::path::PathBuf;
use std::time::Duration;

/// Worker process configuration loaded from environment variables.
///
/// | Variable                 | Default                 |
/// |--------------------------|-------------------------|
/// | `DATABASE_URL`           | (required)              |
/// | `GENERATOR_URL`          | `http://127.0.0.1:8500` |
/// | `GENERATOR_TIMEOUT_SECS` | none                    |
/// | `UPLOAD_ROOT`            | `uploads`               |
/// | `VARIATION_ROOT`         | `variations`            |
/// | `WORKER_CONCURRENCY`     | `1`                     |
/// | `POLL_INTERVAL_MS`       | `1000`                  |
/// | `WORKER_NAME`            | `worker-<uuid>`         |
/// | `BATCH_LEASE_SECS`       | `1800`                  |
/// | `BATCH_MAX_ATTEMPTS`     | `3`                     |
///
/// A stable `WORKER_NAME` lets a restarted worker release the batches it
/// held immediately instead of waiting for their lease to expire.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    pub generator_url: String,
    /// Per-call generator timeout. `None` lets a call run indefinitely.
    pub generator_timeout: Option<Duration>,
    pub upload_root: PathBuf,
    pub variation_root: PathBuf,
    /// Number of runners in this process.
    pub concurrency: usize,
    pub poll_interval: Duration,
    /// Prefix of each runner's name, recorded as `claimed_by`.
    pub name: String,
    /// Age after which an unfinished claim may be taken over.
    pub claim_lease: Duration,
    /// Claims allowed per batch before it is failed as abandoned.
    pub max_attempts: i32,
}

impl WorkerConfig {
    /// Load configuration from environment variables.
    ///
    /// Panics if `DATABASE_URL` is missing or a numeric variable does not
    /// parse.
    pub fn from_env() -> Self {
        let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let generator_url = std::env::var("GENERATOR_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:8500".into());

        let generator_timeout = std::env::var("GENERATOR_TIMEOUT_SECS").ok().map(|v| {
            Duration::from_secs(
                v.parse()
                    .expect("GENERATOR_TIMEOUT_SECS must be a valid u64"),
            )
        });

        let upload_root = std::env::var("UPLOAD_ROOT").unwrap_or_else(|_| "uploads".into());
        let variation_root =
            std::env::var("VARIATION_ROOT").unwrap_or_else(|_| "variations".into());

        let concurrency: usize = std::env::var("WORKER_CONCURRENCY")
            .unwrap_or_else(|_| "1".into())
            .parse()
            .expect("WORKER_CONCURRENCY must be a valid usize");

        let poll_interval_ms: u64 = std::env::var("POLL_INTERVAL_MS")
            .unwrap_or_else(|_| "1000".into())
            .parse()
            .expect("POLL_INTERVAL_MS must be a valid u64");

        let name = std::env::var("WORKER_NAME")
            .unwrap_or_else(|_| format!("worker-{}", uuid::Uuid::new_v4()));

        let lease_secs: u64 = std::env::var("BATCH_LEASE_SECS")
            .unwrap_or_else(|_| "1800".into())
            .parse()
            .expect("BATCH_LEASE_SECS must be a valid u64");

        let max_attempts: i32 = std::env::var("BATCH_MAX_ATTEMPTS")
            .unwrap_or_else(|_| "3".into())
            .parse()
            .expect("BATCH_MAX_ATTEMPTS must be a valid i32");

        Self {
            database_url,
            generator_url,
            generator_timeout,
            upload_root: upload_root.into(),
            variation_root: variation_root.into(),
            concurrency: concurrency.max(1),
            poll_interval: Duration::from_millis(poll_interval_ms),
            name,
            claim_lease: Duration::from_secs(lease_secs),
            max_attempts: max_attempts.max(1),
        }
    }
}

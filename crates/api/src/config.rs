use std::path::PathBuf;
use std::str::FromStr;

use crate::auth::jwt::JwtConfig;

/// Default upper bound on an upload request body (20 MiB).
const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Where submitted batches go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueBackend {
    /// Durable `variation_batches` table, consumed by separate worker processes.
    Postgres,
    /// In-process queue consumed by runners embedded in the server.
    Memory,
}

impl FromStr for QueueBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" => Ok(QueueBackend::Postgres),
            "memory" => Ok(QueueBackend::Memory),
            other => Err(format!("unknown queue backend '{other}'")),
        }
    }
}

/// Server configuration loaded from environment variables.
///
/// All fields except the JWT secret have defaults suitable for local
/// development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8008`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Upper bound on waiting for background tasks at shutdown (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Largest accepted request body in bytes.
    pub max_upload_bytes: usize,
    pub upload_root: PathBuf,
    pub variation_root: PathBuf,
    pub queue_backend: QueueBackend,
    /// Runners started in-process when `queue_backend` is `Memory`.
    pub embedded_workers: usize,
    /// Generator service used by embedded runners.
    pub generator_url: String,
    /// JWT validation settings.
    pub jwt: JwtConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                 |
    /// |-------------------------|-------------------------|
    /// | `HOST`                  | `0.0.0.0`               |
    /// | `PORT`                  | `8008`                  |
    /// | `CORS_ORIGINS`          | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`  | `30`                    |
    /// | `SHUTDOWN_TIMEOUT_SECS` | `30`                    |
    /// | `MAX_UPLOAD_BYTES`      | `20971520`              |
    /// | `UPLOAD_ROOT`           | `uploads`               |
    /// | `VARIATION_ROOT`        | `variations`            |
    /// | `QUEUE_BACKEND`         | `postgres`              |
    /// | `EMBEDDED_WORKERS`      | `1`                     |
    /// | `GENERATOR_URL`         | `http://127.0.0.1:8500` |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "8008".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let max_upload_bytes: usize = std::env::var("MAX_UPLOAD_BYTES")
            .unwrap_or_else(|_| DEFAULT_MAX_UPLOAD_BYTES.to_string())
            .parse()
            .expect("MAX_UPLOAD_BYTES must be a valid usize");

        let upload_root = std::env::var("UPLOAD_ROOT").unwrap_or_else(|_| "uploads".into());
        let variation_root =
            std::env::var("VARIATION_ROOT").unwrap_or_else(|_| "variations".into());

        let queue_backend: QueueBackend = std::env::var("QUEUE_BACKEND")
            .unwrap_or_else(|_| "postgres".into())
            .parse()
            .unwrap_or_else(|e| panic!("QUEUE_BACKEND: {e}"));

        let embedded_workers: usize = std::env::var("EMBEDDED_WORKERS")
            .unwrap_or_else(|_| "1".into())
            .parse()
            .expect("EMBEDDED_WORKERS must be a valid usize");

        let generator_url = std::env::var("GENERATOR_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:8500".into());

        let jwt = JwtConfig::from_env();

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            max_upload_bytes,
            upload_root: upload_root.into(),
            variation_root: variation_root.into(),
            queue_backend,
            embedded_workers: embedded_workers.max(1),
            generator_url,
            jwt,
        }
    }
}

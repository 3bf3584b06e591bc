//! Shared fixtures for API integration tests.
//!
//! The test app uses the in-memory queue backend and a temporary storage
//! root, so no database or generator service is needed.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;
use varia_api::auth::jwt::{generate_access_token, JwtConfig};
use varia_api::config::{QueueBackend, ServerConfig};
use varia_api::engine::dispatcher::VariationDispatcher;
use varia_api::engine::progress::ProgressRelay;
use varia_api::router::build_app_router;
use varia_api::state::AppState;
use varia_api::ws::WsManager;
use varia_core::storage::StorageLayout;
use varia_db::queue::MemoryBatchQueue;
use varia_events::ProgressBus;
use varia_generator::{GeneratedVariation, GenerationParams, GeneratorError, VariationGenerator};
use varia_worker::{JobExecutor, WorkerContext, WorkerRunner};

pub const BOUNDARY: &str = "varia-test-boundary";

/// Build a test `ServerConfig` rooted at `root`.
pub fn test_config(root: &Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        max_upload_bytes: 1024 * 1024,
        upload_root: root.join("uploads"),
        variation_root: root.join("variations"),
        queue_backend: QueueBackend::Memory,
        embedded_workers: 1,
        generator_url: "http://127.0.0.1:1".to_string(),
        jwt: JwtConfig {
            secret: "integration-test-secret".to_string(),
            access_token_expiry_mins: 15,
        },
    }
}

/// A running test application and handles on its internals.
pub struct TestApp {
    pub router: Router,
    pub config: ServerConfig,
    pub queue: Arc<MemoryBatchQueue>,
    pub ws_manager: Arc<WsManager>,
    pub progress_bus: Arc<ProgressBus>,
    pub storage: StorageLayout,
    pub cancel: CancellationToken,
    _dir: TempDir,
}

impl TestApp {
    /// Bearer token for `user_id`.
    pub fn token(&self, user_id: i64) -> String {
        generate_access_token(user_id, &self.config.jwt).unwrap()
    }

    /// A runner over this app's queue whose generator always succeeds,
    /// returning `variation-<n>` for the n-th call.
    pub fn runner(&self) -> WorkerRunner {
        let ctx = WorkerContext::new(
            Arc::new(CountingGenerator::default()),
            self.progress_bus.clone(),
            self.storage.clone(),
        );
        WorkerRunner::new("test-runner", self.queue.clone(), JobExecutor::new(ctx))
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Build the full application router with all middleware layers.
///
/// Must be called inside a Tokio runtime: it spawns the progress relay.
pub fn build_test_app() -> TestApp {
    build_test_app_with(|_| {})
}

pub fn build_test_app_with(customize: impl FnOnce(&mut ServerConfig)) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    customize(&mut config);

    let storage = StorageLayout::new(config.upload_root.clone(), config.variation_root.clone());
    let queue = Arc::new(MemoryBatchQueue::new());
    let ws_manager = Arc::new(WsManager::new());
    let progress_bus = Arc::new(ProgressBus::default());
    let cancel = CancellationToken::new();

    tokio::spawn(
        ProgressRelay::new(Arc::clone(&ws_manager)).run(progress_bus.subscribe(), cancel.clone()),
    );

    let state = AppState {
        pool: None,
        config: Arc::new(config.clone()),
        ws_manager: Arc::clone(&ws_manager),
        dispatcher: Arc::new(VariationDispatcher::new(queue.clone(), storage.clone())),
        storage: storage.clone(),
        progress_bus: Arc::clone(&progress_bus),
    };

    TestApp {
        router: build_app_router(state, &config),
        config,
        queue,
        ws_manager,
        progress_bus,
        storage,
        cancel,
        _dir: dir,
    }
}

// ---------------------------------------------------------------------------
// Generator
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct CountingGenerator {
    calls: std::sync::Mutex<u32>,
}

#[async_trait]
impl VariationGenerator for CountingGenerator {
    async fn generate(
        &self,
        _params: &GenerationParams<'_>,
    ) -> Result<GeneratedVariation, GeneratorError> {
        let mut calls = self.calls.lock().unwrap();
        *calls += 1;
        Ok(GeneratedVariation {
            data: format!("variation-{}", *calls).into_bytes(),
        })
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// POST a multipart body, optionally authenticated.
pub async fn post_multipart(app: Router, uri: &str, token: Option<&str>, body: Vec<u8>) -> Response {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .header(header::CONTENT_LENGTH, body.len());
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    app.oneshot(builder.body(Body::from(body)).unwrap())
        .await
        .unwrap()
}

/// A `file` part for [`multipart`].
pub fn file<'a>(filename: &'a str, data: &'a [u8]) -> Option<(&'a str, &'a [u8])> {
    Some((filename, data))
}

/// Encode text fields and an optional file part as `multipart/form-data`.
pub fn multipart(fields: &[(&str, &str)], file: Option<(&str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((filename, data)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
                 Content-Type: audio/midi\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

pub async fn body_bytes(response: Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

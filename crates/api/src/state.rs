use std::sync::Arc;

use varia_core::storage::StorageLayout;
use varia_events::ProgressBus;

use crate::config::ServerConfig;
use crate::engine::dispatcher::VariationDispatcher;
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool; `None` with the in-memory queue backend.
    pub pool: Option<varia_db::DbPool>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Session-keyed WebSocket connection manager.
    pub ws_manager: Arc<WsManager>,
    /// Accepts uploads and submits them as variation batches.
    pub dispatcher: Arc<VariationDispatcher>,
    /// Per-user upload and variation directories.
    pub storage: StorageLayout,
    /// Local fan-out of progress events for this process's sessions.
    pub progress_bus: Arc<ProgressBus>,
}

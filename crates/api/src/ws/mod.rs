//! WebSocket infrastructure for live progress delivery.
//!
//! Provides session-keyed connection management, heartbeat monitoring, and
//! the HTTP upgrade handler used by Axum routes.

mod handler;
mod heartbeat;
pub mod manager;

pub use handler::ws_handler;
pub use heartbeat::start_heartbeat;
pub use manager::WsManager;

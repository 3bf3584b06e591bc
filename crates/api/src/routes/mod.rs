pub mod health;

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{upload, variations};
use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// ```text
/// GET  /ws                      live progress channel (session hello first)
/// POST /upload?sid={session}    submit a variation batch
/// GET  /variations/{filename}   download one of the caller's variations
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/upload", post(upload::upload))
        .route("/variations/{filename}", get(variations::download))
}

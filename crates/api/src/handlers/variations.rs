//! Download of generated variations.

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use varia_core::error::CoreError;
use varia_core::storage::sanitize_filename;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

/// Content type of generated variations.
const MIDI_CONTENT_TYPE: &str = "audio/midi";

/// GET /api/v1/variations/{filename}
///
/// Serve one of the caller's generated variations (e.g. `2_song.mid`) as an
/// attachment. Only the caller's own namespace is searched.
pub async fn download(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(filename): Path<String>,
) -> AppResult<impl IntoResponse> {
    if sanitize_filename(&filename).as_deref() != Some(filename.as_str()) {
        return Err(AppError::Core(CoreError::Validation(format!(
            "Invalid variation filename '{filename}'"
        ))));
    }

    let path = state.storage.user_variation_dir(auth.user_id).join(&filename);
    let data = match tokio::fs::read(&path).await {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(AppError::Core(CoreError::NotFound {
                entity: "Variation",
                key: filename,
            }));
        }
        Err(e) => {
            return Err(AppError::InternalError(format!(
                "Failed to read {}: {e}",
                path.display()
            )));
        }
    };

    tracing::debug!(user_id = auth.user_id, filename = %filename, bytes = data.len(), "Serving variation");

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, MIDI_CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        data,
    ))
}

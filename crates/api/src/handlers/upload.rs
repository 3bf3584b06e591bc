//! Handler for variation uploads.

use axum::body::Bytes;
use axum::extract::{Multipart, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use varia_core::attributes::MusicalAttribute;
use varia_core::error::CoreError;
use varia_core::request::VariationForm;
use varia_core::types::SessionId;

use crate::engine::dispatcher::{Submission, UploadedFile};
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

/// Query string of an upload.
#[derive(Debug, Deserialize)]
pub struct UploadParams {
    /// Session that should receive the batch's progress events.
    pub sid: Option<String>,
}

/// POST /api/v1/upload?sid={session}
///
/// Multipart form with a `file` part and the variation fields. Responds
/// 202 once the batch is queued; progress arrives over the WebSocket
/// identified by `sid`.
pub async fn upload(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<UploadParams>,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let (file, form) = read_upload_form(multipart).await?;

    let session_id = params
        .sid
        .filter(|sid| !sid.is_empty())
        .map(SessionId::from)
        .ok_or_else(|| AppError::BadRequest("Missing session id (sid)".into()))?;

    if let Some(owner) = state.ws_manager.session_user(&session_id).await {
        if owner != auth.user_id {
            return Err(AppError::Core(CoreError::Unauthorized(
                "Session belongs to another user".into(),
            )));
        }
    }

    let accepted = state
        .dispatcher
        .dispatch(Submission {
            user_id: auth.user_id,
            session_id,
            file,
            form,
        })
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({
            "message": "File added to processing queue",
            "filename": accepted.filename,
            "batch_id": accepted.batch_id,
        })),
    ))
}

/// Drain the multipart body into the uploaded file and raw form fields.
///
/// Attribute flags arrive as one field per attribute (`pitch=true`, ...);
/// bar boundaries as repeated `numbers[]` and temperature overrides as
/// repeated `temperatures[]`. Unknown fields are ignored.
async fn read_upload_form(
    mut multipart: Multipart,
) -> AppResult<(Option<UploadedFile>, VariationForm)> {
    let mut file: Option<UploadedFile> = None;
    let mut flags: [Option<String>; MusicalAttribute::ALL.len()] = Default::default();
    let mut form = VariationForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or("").to_string();

        if name == "file" {
            let filename = field.file_name().unwrap_or("").to_string();
            let data: Bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(e.to_string()))?;
            file = Some(UploadedFile { filename, data });
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;

        if let Some(attribute) = MusicalAttribute::from_form_field(&name) {
            flags[attribute.index()] = Some(value);
            continue;
        }

        match name.as_str() {
            "numbers[]" => form.bar_boundaries.push(value),
            "temperatures[]" => form.temperatures.push(parse_field(&name, &value)?),
            "entiretrack" => form.entire_track = Some(value),
            "jobs" => form.jobs = Some(parse_field(&name, &value)?),
            "barlevel" => form.bar_level = Some(value),
            "newnotes" => form.new_notes = Some(value),
            "variationamount" => form.variation_amount = Some(parse_field(&name, &value)?),
            _ => {} // ignore unknown fields
        }
    }

    form.attribute_flags = flags
        .into_iter()
        .map(|flag| flag.unwrap_or_else(|| "false".to_string()))
        .collect();

    Ok((file, form))
}

fn parse_field<T: std::str::FromStr>(name: &str, value: &str) -> AppResult<T> {
    value.trim().parse().map_err(|_| {
        AppError::Core(CoreError::Validation(format!(
            "Field '{name}' has invalid value '{value}'"
        )))
    })
}

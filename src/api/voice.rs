//! Voice endpoints: recording in, transcript pair out; text in, speech out

use std::path::Path;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        DefaultBodyLimit, Multipart, State,
        multipart::{MultipartError, MultipartRejection},
    },
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::post,
};
use serde_json::Value;

use super::{ApiError, ApiState, FormFields, SessionId};
use crate::config::UploadConfig;
use crate::transcript::TranscriptBundle;

/// Field names accepted for the text to synthesize
const SYNTHESIZE_FIELDS: &[&str] = &["ai_response", "text"];

/// Build voice router
pub fn router(state: Arc<ApiState>) -> Router {
    let upload_limit = state.upload.max_bytes;

    Router::new()
        .route(
            "/transcribe",
            post(transcribe).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/synthesize", post(synthesize))
        .with_state(state)
}

fn multipart_error(err: &MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(err.body_text())
    } else {
        ApiError::BadRequest(err.body_text())
    }
}

fn has_extension(file_name: &str, allowed: &str) -> bool {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(allowed))
}

/// Pull the recording out of the form, validating name and container
///
/// Nothing is stored until both checks pass.
async fn read_recording(
    multipart: &mut Multipart,
    upload: &UploadConfig,
) -> Result<Vec<u8>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(&e))?
    {
        if field.name() != Some(upload.field_name.as_str()) {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        if file_name.is_empty() {
            return Err(ApiError::BadRequest(format!(
                "field '{}' must be a file upload",
                upload.field_name
            )));
        }
        if !has_extension(&file_name, &upload.allowed_extension) {
            return Err(ApiError::BadRequest(format!(
                "only .{} recordings are accepted",
                upload.allowed_extension
            )));
        }

        let bytes = field.bytes().await.map_err(|e| multipart_error(&e))?;
        if bytes.is_empty() {
            return Err(ApiError::BadRequest("recording is empty".to_string()));
        }
        return Ok(bytes.to_vec());
    }

    Err(ApiError::BadRequest(format!(
        "missing '{}' file",
        upload.field_name
    )))
}

/// Transcribe a recording and reply to it
///
/// The recording is stored only for the duration of recognition and is
/// removed whether or not recognition succeeds.
async fn transcribe(
    State(state): State<Arc<ApiState>>,
    SessionId(session_id): SessionId,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Value>, ApiError> {
    let mut multipart = multipart.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let bytes = read_recording(&mut multipart, &state.upload).await?;

    let audio = state
        .audio_store
        .persist(&bytes)
        .map_err(|e| ApiError::Storage(e.to_string()))?;
    tracing::debug!(session = %session_id, bytes = audio.len(), "recording stored");

    let recognized = state.recognizer.recognize(&audio).await;
    if let Err(e) = audio.release() {
        tracing::warn!(error = %e, "failed to remove recording");
    }
    let user_text = recognized.map_err(|e| ApiError::RecognitionFailed(e.to_string()))?;

    let user_text = user_text.trim();
    if user_text.is_empty() {
        return Err(ApiError::NoSpeech);
    }

    let reply = state
        .conversations
        .submit_user_text(&session_id, user_text)
        .await?;

    let bundle = TranscriptBundle {
        user: user_text.to_string(),
        assistant: reply,
    };
    Ok(Json(state.response_shape.render(&bundle, &state.persona)))
}

/// Synthesize text to speech
///
/// Returns the full audio body with the synthesizer's content type.
async fn synthesize(
    State(state): State<Arc<ApiState>>,
    fields: FormFields,
) -> Result<Response, ApiError> {
    let text = fields
        .text(SYNTHESIZE_FIELDS)
        .ok_or_else(|| ApiError::BadRequest("missing 'ai_response' text".to_string()))?;

    let audio = state
        .synthesizer
        .synthesize(text)
        .await
        .map_err(|e| ApiError::SynthesisFailed(e.to_string()))?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, state.synthesizer.content_type())],
        audio,
    )
        .into_response())
}

//! Conversation feedback endpoint

use std::sync::Arc;

use axum::{Router, extract::State, http::header, response::IntoResponse, routing::post};

use super::{ApiError, ApiState, FormFields};

/// Field names accepted for the serialized conversation
const TRANSCRIPT_FIELDS: &[&str] = &["conversation", "transcript"];

pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/feedback", post(feedback))
        .with_state(state)
}

/// Critique a finished conversation
///
/// The caller sends the whole conversation as one text blob; nothing is
/// read from or written to any session.
async fn feedback(
    State(state): State<Arc<ApiState>>,
    fields: FormFields,
) -> Result<impl IntoResponse, ApiError> {
    let transcript = fields
        .text(TRANSCRIPT_FIELDS)
        .ok_or_else(|| ApiError::BadRequest("missing 'conversation' text".to_string()))?;

    let critique = state.feedback.critique(transcript).await?;

    Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], critique))
}

//! Error responses for the HTTP surface

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::chat::CompletionError;

/// Message shown when the conversation no longer fits the model
const CONTEXT_TOO_LARGE_MESSAGE: &str =
    "AI Memory Error: the conversation is too long, reset the session to continue";

/// API errors
///
/// Upstream failures carry their detail for the log only; callers see a
/// generic message.
#[derive(Debug)]
pub enum ApiError {
    /// Missing or invalid input
    BadRequest(String),
    /// Upload larger than the configured limit
    PayloadTooLarge(String),
    /// The recording contained no recognizable speech
    NoSpeech,
    /// Global request budget exhausted
    RateLimited,
    /// The recording could not be stored
    Storage(String),
    /// Speech recognition failed
    RecognitionFailed(String),
    /// The conversation history overflowed the model's context
    ContextTooLarge(String),
    /// Chat completion failed for any other reason
    CompletionFailed(String),
    /// Speech synthesis failed
    SynthesisFailed(String),
}

impl ApiError {
    /// Status code, stable error code and caller-facing message
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            Self::PayloadTooLarge(msg) => {
                (StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large", msg.clone())
            }
            Self::NoSpeech => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "no_speech",
                "no speech was recognized in the recording".to_string(),
            ),
            Self::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limited",
                "too many requests".to_string(),
            ),
            Self::Storage(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "storage_failed",
                "Internal Server Error".to_string(),
            ),
            Self::RecognitionFailed(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "transcription_failed",
                "Internal Server Error".to_string(),
            ),
            Self::ContextTooLarge(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "context_too_large",
                CONTEXT_TOO_LARGE_MESSAGE.to_string(),
            ),
            Self::CompletionFailed(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "completion_failed",
                "Internal Server Error".to_string(),
            ),
            Self::SynthesisFailed(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "synthesis_failed",
                "Internal Server Error".to_string(),
            ),
        }
    }
}

impl From<CompletionError> for ApiError {
    fn from(err: CompletionError) -> Self {
        match err {
            CompletionError::ContextTooLarge(msg) => Self::ContextTooLarge(msg),
            CompletionError::ServiceUnavailable(msg) => Self::CompletionFailed(msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: ErrorBody,
        }

        #[derive(Serialize)]
        struct ErrorBody {
            code: &'static str,
            message: String,
        }

        let (status, code, message) = self.parts();

        match &self {
            Self::Storage(detail)
            | Self::RecognitionFailed(detail)
            | Self::ContextTooLarge(detail)
            | Self::CompletionFailed(detail)
            | Self::SynthesisFailed(detail) => {
                tracing::error!(code, detail = %detail, "request failed");
            }
            _ => tracing::debug!(code, message = %message, "request rejected"),
        }

        (
            status,
            Json(ErrorResponse {
                error: ErrorBody { code, message },
            }),
        )
            .into_response()
    }
}

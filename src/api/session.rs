//! Session selection, reset and history

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{FromRequestParts, State},
    http::{StatusCode, request::Parts},
    routing::get,
};
use serde::Serialize;

use super::{ApiError, ApiState};
use crate::conversation::{SessionState, Turn};

/// Header that selects the conversation a request belongs to
pub const SESSION_HEADER: &str = "x-session-id";

/// Session used when a request names none
pub const DEFAULT_SESSION: &str = "default";

const MAX_SESSION_ID_LEN: usize = 128;

/// Session a request acts on, taken from [`SESSION_HEADER`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionId(pub String);

impl SessionId {
    fn is_valid(id: &str) -> bool {
        !id.is_empty()
            && id.len() <= MAX_SESSION_ID_LEN
            && id
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
    }
}

impl<S> FromRequestParts<S> for SessionId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(SESSION_HEADER) else {
            return Ok(Self(DEFAULT_SESSION.to_string()));
        };

        let id = value
            .to_str()
            .map_err(|_| ApiError::BadRequest(format!("{SESSION_HEADER} must be ASCII")))?;

        if Self::is_valid(id) {
            Ok(Self(id.to_string()))
        } else {
            Err(ApiError::BadRequest(format!(
                "{SESSION_HEADER} must be 1-{MAX_SESSION_ID_LEN} letters, digits, '-' or '_'"
            )))
        }
    }
}

pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/reset", get(reset).post(reset))
        .route("/history", get(history))
        .with_state(state)
}

/// Clear the session's turns
async fn reset(State(state): State<Arc<ApiState>>, SessionId(id): SessionId) -> StatusCode {
    state.conversations.reset(&id).await;
    StatusCode::NO_CONTENT
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub session: String,
    pub state: SessionState,
    pub turns: Vec<Turn>,
}

/// Turns recorded so far, oldest first
async fn history(
    State(state): State<Arc<ApiState>>,
    SessionId(id): SessionId,
) -> Json<HistoryResponse> {
    let turns = state.conversations.history(&id).await;
    let session_state = if turns.is_empty() {
        SessionState::Empty
    } else {
        SessionState::Active
    };

    Json(HistoryResponse {
        session: id,
        state: session_state,
        turns,
    })
}

//! Turn-based conversation engine
//!
//! Each session holds an append-only history seeded with the persona prompt.
//! A submitted user turn is recorded before the model is called, so an
//! upstream failure leaves it in place; only the assistant turn is missing.

mod feedback;
mod session;

pub use feedback::FeedbackEngine;
pub use session::{Role, Session, SessionState, SessionStore, SharedSession, Turn};

use std::sync::Arc;

use crate::chat::{ChatCompletion, CompletionError};

/// Relays user text through the chat model, one session at a time
pub struct ConversationEngine {
    completion: Arc<dyn ChatCompletion>,
    sessions: SessionStore,
}

impl ConversationEngine {
    /// Create an engine whose sessions start from `persona_prompt`
    #[must_use]
    pub fn new(
        completion: Arc<dyn ChatCompletion>,
        persona_prompt: impl Into<Arc<str>>,
        max_context_turns: Option<usize>,
    ) -> Self {
        Self {
            completion,
            sessions: SessionStore::new(persona_prompt, max_context_turns),
        }
    }

    /// Session storage
    #[must_use]
    pub const fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Record `text` as a user turn and return the assistant's reply
    ///
    /// The session lock is held across the completion call, so concurrent
    /// submissions to one session are applied one after another.
    ///
    /// # Errors
    ///
    /// Returns [`CompletionError::ContextTooLarge`] if the history no longer
    /// fits the model, [`CompletionError::ServiceUnavailable`] for any other
    /// upstream failure. The user turn stays recorded in both cases.
    pub async fn submit_user_text(
        &self,
        session_id: &str,
        text: &str,
    ) -> Result<String, CompletionError> {
        let session = self.sessions.get_or_create(session_id).await;
        let mut session = session.lock().await;

        session.push(Turn::user(text));
        let context = session.context();

        match self.completion.complete(&context).await {
            Ok(reply) => {
                session.push(Turn::assistant(reply.clone()));
                tracing::info!(
                    session = %session_id,
                    turns = session.turns().len(),
                    model = %self.completion.model(),
                    "conversation turn complete"
                );
                Ok(reply)
            }
            Err(e) => {
                tracing::warn!(
                    session = %session_id,
                    turns = session.turns().len(),
                    error = %e,
                    "completion failed, user turn kept"
                );
                Err(e)
            }
        }
    }

    /// Clear a session's history
    ///
    /// Unknown sessions are already empty, so this is a no-op for them.
    pub async fn reset(&self, session_id: &str) {
        if let Some(session) = self.sessions.get(session_id).await {
            session.lock().await.reset();
            tracing::info!(session = %session_id, "session reset");
        }
    }

    /// Snapshot of a session's turns in append order
    pub async fn history(&self, session_id: &str) -> Vec<Turn> {
        match self.sessions.get(session_id).await {
            Some(session) => session.lock().await.turns().to_vec(),
            None => Vec::new(),
        }
    }
}

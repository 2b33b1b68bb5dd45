//! Stateless conversation critique

use std::sync::Arc;

use crate::chat::{ChatCompletion, ChatMessage, CompletionError};
use crate::persona::Persona;

/// Produces a critique of a caller-supplied transcript
///
/// Nothing is retained between calls: each request is the feedback prompt
/// plus the transcript.
pub struct FeedbackEngine {
    completion: Arc<dyn ChatCompletion>,
    persona: Arc<Persona>,
}

impl FeedbackEngine {
    #[must_use]
    pub fn new(completion: Arc<dyn ChatCompletion>, persona: Arc<Persona>) -> Self {
        Self {
            completion,
            persona,
        }
    }

    /// Critique a serialized conversation
    ///
    /// # Errors
    ///
    /// Returns the completion failure unchanged
    pub async fn critique(&self, transcript: &str) -> Result<String, CompletionError> {
        let messages = [
            ChatMessage::system(self.persona.feedback_prompt.clone()),
            ChatMessage::user(self.persona.feedback_request(transcript)),
        ];

        tracing::debug!(chars = transcript.len(), "requesting feedback");
        let critique = self.completion.complete(&messages).await?;
        tracing::info!(chars = critique.len(), "feedback generated");
        Ok(critique)
    }
}

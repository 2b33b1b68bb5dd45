//! Chat completion capability
//!
//! The conversation and feedback engines talk to the language model only
//! through [`ChatCompletion`]. Upstream failures are classified by the client
//! into [`CompletionError`] so callers never inspect provider error strings.

mod openai;

pub use openai::OpenAiChat;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Role of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One message in a completion request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    /// System instruction message
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    /// User message
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    /// Assistant message
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Failure of a completion call
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CompletionError {
    /// The request exceeded the model's context window
    #[error("context too large: {0}")]
    ContextTooLarge(String),

    /// Any other failure (transport, timeout, provider error, bad response)
    #[error("completion service unavailable: {0}")]
    ServiceUnavailable(String),
}

/// Produces the next assistant message for an ordered message history
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    /// Complete `messages` with a single assistant reply
    ///
    /// # Errors
    ///
    /// Returns [`CompletionError::ContextTooLarge`] when the history does not
    /// fit the model, [`CompletionError::ServiceUnavailable`] otherwise
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, CompletionError>;

    /// Model identifier for logging
    fn model(&self) -> &str;
}

//! `OpenAI`-compatible chat completions client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::{ChatCompletion, ChatMessage, CompletionError};
use crate::config::{Config, clone_secret};
use crate::{Error, Result};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Error code `OpenAI` returns when the prompt overflows the context window
const CONTEXT_LENGTH_EXCEEDED: &str = "context_length_exceeded";

/// Chat completions over the `OpenAI` HTTP API
pub struct OpenAiChat {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
    max_tokens: Option<u32>,
    base_url: String,
}

impl OpenAiChat {
    /// Create a new chat client
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing or the HTTP client cannot be built
    pub fn new(api_key: SecretString, model: String, timeout: Duration) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config(
                "OpenAI API key required for chat completions".to_string(),
            ));
        }

        Ok(Self {
            client: crate::upstream_client(timeout)?,
            api_key,
            model,
            max_tokens: None,
            base_url: OPENAI_BASE_URL.to_string(),
        })
    }

    /// Build the chat client described by `config`
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(
            clone_secret(&config.api_keys.openai),
            config.llm.model.clone(),
            config.upstream_timeout,
        )?
        .with_max_tokens(config.llm.max_tokens)
        .with_base_url(&config.llm.base_url))
    }

    /// Cap the length of each reply
    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Override the API base URL (proxies, compatible servers)
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    code: Option<String>,
}

/// Classify a non-success response from the completions endpoint
fn classify_error(status: StatusCode, body: &str) -> CompletionError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => {
            let overflow = envelope.error.code.as_deref() == Some(CONTEXT_LENGTH_EXCEEDED)
                || envelope.error.message.contains(CONTEXT_LENGTH_EXCEEDED)
                || envelope.error.message.contains("maximum context length");
            if overflow {
                CompletionError::ContextTooLarge(envelope.error.message)
            } else {
                CompletionError::ServiceUnavailable(format!("{status}: {}", envelope.error.message))
            }
        }
        Err(_) if body.contains(CONTEXT_LENGTH_EXCEEDED) => {
            CompletionError::ContextTooLarge(body.to_string())
        }
        Err(_) => CompletionError::ServiceUnavailable(format!("{status}: {body}")),
    }
}

#[async_trait]
impl ChatCompletion for OpenAiChat {
    async fn complete(&self, messages: &[ChatMessage]) -> std::result::Result<String, CompletionError> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages,
            max_tokens: self.max_tokens,
        };

        tracing::debug!(model = %self.model, messages = messages.len(), "requesting chat completion");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, timeout = e.is_timeout(), "chat completion request failed");
                if e.is_timeout() {
                    CompletionError::ServiceUnavailable("request timed out".to_string())
                } else {
                    CompletionError::ServiceUnavailable(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "chat completion API error");
            return Err(classify_error(status, &body));
        }

        let result: ChatCompletionResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse chat completion response");
            CompletionError::ServiceUnavailable(format!("invalid response: {e}"))
        })?;

        result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| CompletionError::ServiceUnavailable("empty completion".to_string()))
    }

    fn model(&self) -> &str {
        &self.model
    }
}

//! Text-to-speech (TTS) processing

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::config::{Config, TtsProviderKind, clone_secret};
use crate::{Error, Result};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const ELEVENLABS_BASE_URL: &str = "https://api.elevenlabs.io/v1";

/// Fixed voice settings used for every synthesis in a process
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceProfile {
    /// Engine/model identifier (e.g. "tts-1")
    pub model: String,
    /// Voice identity (e.g. "alloy", or an ElevenLabs voice ID)
    pub voice: String,
    /// Speed multiplier (0.25 to 4.0, `OpenAI` only)
    pub speed: f64,
}

impl Default for VoiceProfile {
    fn default() -> Self {
        Self {
            model: "tts-1".to_string(),
            voice: "alloy".to_string(),
            speed: 1.0,
        }
    }
}

/// Converts text into spoken audio
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text`, returning MP3 bytes
    ///
    /// # Errors
    ///
    /// Returns [`Error::Tts`] (or a transport error) if the service fails
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>>;

    /// MIME type of the returned audio
    fn content_type(&self) -> &'static str {
        "audio/mpeg"
    }

    /// Provider name for logging
    fn name(&self) -> &'static str;
}

/// TTS provider backend
#[derive(Clone, Copy, Debug)]
enum TtsProvider {
    OpenAI,
    ElevenLabs,
}

/// Synthesizes speech from text
pub struct TextToSpeech {
    client: reqwest::Client,
    api_key: SecretString,
    profile: VoiceProfile,
    base_url: String,
    provider: TtsProvider,
}

impl TextToSpeech {
    /// Create a new TTS instance using `OpenAI`
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing or the HTTP client cannot be built
    pub fn new_openai(api_key: SecretString, profile: VoiceProfile, timeout: Duration) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config("OpenAI API key required for TTS".to_string()));
        }

        Ok(Self {
            client: crate::upstream_client(timeout)?,
            api_key,
            profile,
            base_url: OPENAI_BASE_URL.to_string(),
            provider: TtsProvider::OpenAI,
        })
    }

    /// Create a new TTS instance using ElevenLabs
    ///
    /// The profile's `voice` is the ElevenLabs voice ID; `speed` is ignored.
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing or the HTTP client cannot be built
    pub fn new_elevenlabs(
        api_key: SecretString,
        profile: VoiceProfile,
        timeout: Duration,
    ) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config(
                "ElevenLabs API key required for TTS".to_string(),
            ));
        }

        Ok(Self {
            client: crate::upstream_client(timeout)?,
            api_key,
            profile,
            base_url: ELEVENLABS_BASE_URL.to_string(),
            provider: TtsProvider::ElevenLabs,
        })
    }

    /// Build the synthesizer selected in `config`
    ///
    /// # Errors
    ///
    /// Returns error if the selected provider's key is missing
    pub fn from_config(config: &Config) -> Result<Self> {
        let timeout = config.upstream_timeout;
        let profile = config.voice.tts.clone();
        match config.voice.tts_provider {
            TtsProviderKind::OpenAi => {
                Ok(Self::new_openai(clone_secret(&config.api_keys.openai), profile, timeout)?
                    .with_base_url(&config.llm.base_url))
            }
            TtsProviderKind::ElevenLabs => {
                let key = config
                    .api_keys
                    .elevenlabs
                    .as_ref()
                    .ok_or_else(|| Error::Config("ELEVENLABS_API_KEY is not set".to_string()))?;
                Self::new_elevenlabs(clone_secret(key), profile, timeout)
            }
        }
    }

    /// Override the provider base URL (proxies, compatible APIs)
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// The voice settings in use
    #[must_use]
    pub const fn profile(&self) -> &VoiceProfile {
        &self.profile
    }

    /// Synthesize using OpenAI TTS
    async fn synthesize_openai(&self, text: &str) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct TtsRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            response_format: &'a str,
            speed: f64,
        }

        let request = TtsRequest {
            model: &self.profile.model,
            input: text,
            voice: &self.profile.voice,
            response_format: "mp3",
            speed: self.profile.speed,
        };

        let response = self
            .client
            .post(format!("{}/audio/speech", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "OpenAI TTS error");
            return Err(Error::Tts(format!("OpenAI TTS error {status}: {body}")));
        }

        let audio = response.bytes().await?;
        Ok(audio.to_vec())
    }

    /// Synthesize using ElevenLabs TTS
    async fn synthesize_elevenlabs(&self, text: &str) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct ElevenLabsRequest<'a> {
            text: &'a str,
            model_id: &'a str,
        }

        let url = format!(
            "{}/text-to-speech/{}",
            self.base_url, self.profile.voice
        );

        let request = ElevenLabsRequest {
            text,
            model_id: &self.profile.model,
        };

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", self.api_key.expose_secret())
            .header("Accept", "audio/mpeg")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "ElevenLabs TTS error");
            return Err(Error::Tts(format!("ElevenLabs TTS error {status}: {body}")));
        }

        let audio = response.bytes().await?;
        Ok(audio.to_vec())
    }
}

#[async_trait]
impl SpeechSynthesizer for TextToSpeech {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        tracing::debug!(chars = text.len(), provider = self.name(), "synthesizing speech");
        let audio = match self.provider {
            TtsProvider::OpenAI => self.synthesize_openai(text).await?,
            TtsProvider::ElevenLabs => self.synthesize_elevenlabs(text).await?,
        };
        tracing::info!(bytes = audio.len(), voice = %self.profile.voice, "synthesis complete");
        Ok(audio)
    }

    fn name(&self) -> &'static str {
        match self.provider {
            TtsProvider::OpenAI => "openai",
            TtsProvider::ElevenLabs => "elevenlabs",
        }
    }
}

//! Configuration management for Parley gateway
//!
//! Values resolve as environment > TOML file > default. Credentials are
//! checked here so a missing key stops the process at startup instead of
//! failing individual requests.

pub mod file;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use crate::persona::Persona;
use crate::transcript::ResponseShape;
use crate::voice::VoiceProfile;
use crate::{Error, Result};

use file::ParleyConfigFile;

/// Default listen port
pub const DEFAULT_PORT: u16 = 5000;

/// Default upload size limit in bytes
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 20_000_000;

/// Default `OpenAI` API base URL
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Parley gateway configuration
#[derive(Debug)]
pub struct Config {
    /// Port to listen on
    pub port: u16,

    /// API keys
    pub api_keys: ApiKeys,

    /// Chat model configuration
    pub llm: LlmConfig,

    /// Speech recognition and synthesis configuration
    pub voice: VoiceConfig,

    /// Upload validation
    pub upload: UploadConfig,

    /// Timeout applied to every upstream call
    pub upstream_timeout: Duration,

    /// Directory for transient audio files
    pub temp_dir: PathBuf,

    /// Active persona
    pub persona: Persona,

    /// Layout of transcribe responses
    pub response_shape: ResponseShape,

    /// Path to static files directory (web UI assets)
    pub static_dir: Option<PathBuf>,

    /// Global request budget per minute; `None` disables limiting
    pub rate_limit_rpm: Option<u32>,
}

/// API keys for external services
#[derive(Debug)]
pub struct ApiKeys {
    /// `OpenAI` API key (chat, and Whisper/TTS when selected)
    pub openai: SecretString,

    /// Deepgram API key (required when STT provider is Deepgram)
    pub deepgram: Option<SecretString>,

    /// `ElevenLabs` API key (required when TTS provider is `ElevenLabs`)
    pub elevenlabs: Option<SecretString>,
}

/// Copy a secret for a second client without exposing it elsewhere
pub(crate) fn clone_secret(secret: &SecretString) -> SecretString {
    SecretString::from(secret.expose_secret().to_owned())
}

/// Chat model configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Model identifier
    pub model: String,

    /// Reply length cap
    pub max_tokens: Option<u32>,

    /// Send only this many recent turns upstream
    pub max_context_turns: Option<usize>,

    /// `OpenAI`-compatible API base URL
    pub base_url: String,
}

/// Speech-to-text backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SttProviderKind {
    Whisper,
    Deepgram,
}

impl FromStr for SttProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "whisper" | "openai" => Ok(Self::Whisper),
            "deepgram" => Ok(Self::Deepgram),
            other => Err(Error::Config(format!("unknown STT provider \"{other}\""))),
        }
    }
}

/// Text-to-speech backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtsProviderKind {
    OpenAi,
    ElevenLabs,
}

impl FromStr for TtsProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "elevenlabs" => Ok(Self::ElevenLabs),
            other => Err(Error::Config(format!("unknown TTS provider \"{other}\""))),
        }
    }
}

/// Voice processing configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    pub stt_provider: SttProviderKind,

    /// STT model (e.g. "whisper-1", "nova-2")
    pub stt_model: String,

    pub tts_provider: TtsProviderKind,

    /// Fixed synthesis settings
    pub tts: VoiceProfile,
}

/// Upload validation configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadConfig {
    /// Multipart field carrying the recording
    pub field_name: String,

    /// Accepted container extension, lowercase without the dot
    pub allowed_extension: String,

    /// Maximum request body size for uploads
    pub max_bytes: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            field_name: "recording".to_string(),
            allowed_extension: "webm".to_string(),
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl Config {
    /// Load configuration from `.env`, the process environment and the TOML file
    ///
    /// # Errors
    ///
    /// Returns error if a required key is missing or a value is invalid
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!(path = %path.display(), "loaded .env"),
            Err(e) if e.not_found() => {}
            Err(e) => tracing::warn!(error = %e, "failed to load .env"),
        }

        let fc = file::load_config_file(config_path)?;
        Self::resolve(|key| std::env::var(key).ok(), fc)
    }

    /// Resolve configuration from an environment lookup and a parsed file
    ///
    /// # Errors
    ///
    /// Returns error if a required key is missing or a value is invalid
    pub fn resolve<F>(env: F, fc: ParleyConfigFile) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let port = parse_env::<u16, _>(&env, "PARLEY_PORT")?
            .or(fc.port)
            .unwrap_or(DEFAULT_PORT);

        // Voice config (env > toml > default)
        let stt_provider = env("PARLEY_STT_PROVIDER")
            .or(fc.voice.stt_provider)
            .map(|s| s.parse::<SttProviderKind>())
            .transpose()?
            .unwrap_or(SttProviderKind::Whisper);
        let default_stt_model = match stt_provider {
            SttProviderKind::Whisper => "whisper-1",
            SttProviderKind::Deepgram => "nova-2",
        };
        let tts_provider = env("PARLEY_TTS_PROVIDER")
            .or(fc.voice.tts_provider)
            .map(|s| s.parse::<TtsProviderKind>())
            .transpose()?
            .unwrap_or(TtsProviderKind::OpenAi);
        let (default_tts_model, default_tts_voice) = match tts_provider {
            TtsProviderKind::OpenAi => ("tts-1", "alloy"),
            TtsProviderKind::ElevenLabs => ("eleven_monolingual_v1", "21m00Tcm4TlvDq8ikWAM"),
        };
        let tts_speed = parse_env::<f64, _>(&env, "PARLEY_TTS_SPEED")?
            .or(fc.voice.tts_speed)
            .unwrap_or(1.0);
        if !(0.25..=4.0).contains(&tts_speed) {
            return Err(Error::Config(format!(
                "TTS speed {tts_speed} out of range (0.25 to 4.0)"
            )));
        }
        let voice = VoiceConfig {
            stt_provider,
            stt_model: env("PARLEY_STT_MODEL")
                .or(fc.voice.stt_model)
                .unwrap_or_else(|| default_stt_model.to_string()),
            tts_provider,
            tts: VoiceProfile {
                model: env("PARLEY_TTS_MODEL")
                    .or(fc.voice.tts_model)
                    .unwrap_or_else(|| default_tts_model.to_string()),
                voice: env("PARLEY_TTS_VOICE")
                    .or(fc.voice.tts_voice)
                    .unwrap_or_else(|| default_tts_voice.to_string()),
                speed: tts_speed,
            },
        };

        // API keys (env > toml), checked against the selected providers
        let openai = env("OPENAI_API_KEY")
            .or(fc.api_keys.openai)
            .map(SecretString::from)
            .ok_or_else(|| Error::Config("OPENAI_API_KEY is not set".to_string()))?;
        let deepgram = env("DEEPGRAM_API_KEY")
            .or(fc.api_keys.deepgram)
            .map(SecretString::from);
        let elevenlabs = env("ELEVENLABS_API_KEY")
            .or(fc.api_keys.elevenlabs)
            .map(SecretString::from);
        if stt_provider == SttProviderKind::Deepgram && deepgram.is_none() {
            return Err(Error::Config(
                "DEEPGRAM_API_KEY is required for the deepgram STT provider".to_string(),
            ));
        }
        if tts_provider == TtsProviderKind::ElevenLabs && elevenlabs.is_none() {
            return Err(Error::Config(
                "ELEVENLABS_API_KEY is required for the elevenlabs TTS provider".to_string(),
            ));
        }
        let api_keys = ApiKeys {
            openai,
            deepgram,
            elevenlabs,
        };

        let max_context_turns: Option<usize> =
            parse_env::<usize, _>(&env, "PARLEY_MAX_CONTEXT_TURNS")?.or(fc.llm.max_context_turns);
        if max_context_turns == Some(0) {
            return Err(Error::Config(
                "max context turns must be at least 1".to_string(),
            ));
        }
        let llm = LlmConfig {
            model: env("PARLEY_LLM_MODEL")
                .or(fc.llm.model)
                .unwrap_or_else(|| "gpt-3.5-turbo".to_string()),
            max_tokens: parse_env::<u32, _>(&env, "PARLEY_LLM_MAX_TOKENS")?.or(fc.llm.max_tokens),
            max_context_turns,
            base_url: env("PARLEY_OPENAI_BASE_URL")
                .or(fc.llm.base_url)
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
        };

        // Upload validation (env > toml > default)
        let defaults = UploadConfig::default();
        let max_bytes = parse_env::<usize, _>(&env, "PARLEY_MAX_UPLOAD_BYTES")?
            .or(fc.upload.max_bytes)
            .unwrap_or(defaults.max_bytes);
        if max_bytes == 0 {
            return Err(Error::Config("upload limit must be positive".to_string()));
        }
        let allowed_extension = env("PARLEY_ALLOWED_EXTENSION")
            .or(fc.upload.allowed_extension)
            .map_or(defaults.allowed_extension, |ext| {
                ext.trim().trim_start_matches('.').to_ascii_lowercase()
            });
        if allowed_extension.is_empty() {
            return Err(Error::Config("allowed extension must not be empty".to_string()));
        }
        let upload = UploadConfig {
            field_name: env("PARLEY_UPLOAD_FIELD")
                .or(fc.upload.field)
                .unwrap_or(defaults.field_name),
            allowed_extension,
            max_bytes,
        };

        let timeout_secs = parse_env::<u64, _>(&env, "PARLEY_UPSTREAM_TIMEOUT_SECS")?
            .or(fc.server.upstream_timeout_secs)
            .unwrap_or(60);
        if timeout_secs == 0 {
            return Err(Error::Config("upstream timeout must be positive".to_string()));
        }

        let temp_dir = env("PARLEY_TEMP_DIR")
            .map(PathBuf::from)
            .or(fc.server.temp_dir)
            .unwrap_or_else(std::env::temp_dir);

        let persona = match env("PARLEY_PERSONA_FILE")
            .map(PathBuf::from)
            .or(fc.server.persona_file)
        {
            Some(path) => Persona::from_file(&path)?,
            None => Persona::investor(),
        };

        let response_shape = env("PARLEY_RESPONSE_SHAPE")
            .or(fc.server.response_shape)
            .map(|s| s.parse::<ResponseShape>())
            .transpose()?
            .unwrap_or_default();

        let static_dir = env("PARLEY_STATIC_DIR")
            .map(PathBuf::from)
            .or(fc.server.static_dir);

        let rate_limit_rpm = parse_env::<u32, _>(&env, "PARLEY_RATE_LIMIT_RPM")?
            .or(fc.server.rate_limit_rpm)
            .filter(|rpm| *rpm > 0);

        Ok(Self {
            port,
            api_keys,
            llm,
            voice,
            upload,
            upstream_timeout: Duration::from_secs(timeout_secs),
            temp_dir,
            persona,
            response_shape,
            static_dir,
            rate_limit_rpm,
        })
    }
}

/// Parse an optional environment value, failing on malformed input
fn parse_env<T, F>(env: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    env(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|e| Error::Config(format!("invalid {key} \"{raw}\": {e}")))
        })
        .transpose()
}

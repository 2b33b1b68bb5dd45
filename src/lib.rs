//! Parley Gateway - turn-based voice conversation relay
//!
//! This library provides the pieces of the Parley voice relay:
//! - Transient storage for uploaded recordings
//! - Speech recognition and synthesis through hosted APIs
//! - Per-session conversation history driven by a chat model
//! - Stateless feedback on finished conversations
//! - The HTTP surface wiring them together
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                   HTTP Surface                       │
//! │  /  │  /transcribe  │  /synthesize  │  /feedback  │ … │
//! └──────────┬──────────────────┬───────────────┬───────┘
//!            │                  │               │
//! ┌──────────▼─────────┐ ┌──────▼──────┐ ┌──────▼──────┐
//! │ Audio Store → STT  │ │     TTS     │ │  Feedback   │
//! │  → Conversation    │ │             │ │   Engine    │
//! └──────────┬─────────┘ └──────┬──────┘ └──────┬──────┘
//!            │                  │               │
//! ┌──────────▼──────────────────▼───────────────▼───────┐
//! │        Hosted APIs (Whisper, chat, TTS)              │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod audio;
pub mod chat;
pub mod config;
pub mod conversation;
pub mod error;
pub mod persona;
pub mod transcript;
pub mod voice;

use std::time::Duration;

pub use audio::{AudioStore, TransientAudio};
pub use chat::{ChatCompletion, ChatMessage, ChatRole, CompletionError, OpenAiChat};
pub use config::Config;
pub use conversation::{ConversationEngine, FeedbackEngine, Role, Session, SessionStore, Turn};
pub use error::{Error, Result};
pub use persona::Persona;
pub use transcript::{ResponseShape, TranscriptBundle};
pub use voice::{SpeechRecognizer, SpeechSynthesizer, SpeechToText, TextToSpeech, VoiceProfile};

/// HTTP client for upstream APIs with a bounded per-request timeout
pub(crate) fn upstream_client(timeout: Duration) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .build()?;
    Ok(client)
}

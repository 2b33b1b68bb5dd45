//! Voice processing module
//!
//! Speech recognition and synthesis backed by hosted APIs.

mod stt;
mod tts;

pub use stt::{SpeechRecognizer, SpeechToText};
pub use tts::{SpeechSynthesizer, TextToSpeech, VoiceProfile};

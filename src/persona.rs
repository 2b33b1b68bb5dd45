//! Persona configuration
//!
//! A persona fixes the assistant's character for a whole process: the
//! conversation prompt every session is seeded with, the feedback prompt
//! used for critiques, and the role labels used when shaping responses.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Identifier of the built-in persona
pub const DEFAULT_PERSONA_ID: &str = "investor";

const TRANSCRIPTION_NOTICE: &str = "Please be aware that human input is being transcribed from audio and as such there may be some errors in the transcription.
You will attempt to account for some words being swapped with similar-sounding words or phrases.";

/// Assistant identity and prompts
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Persona {
    /// Unique identifier
    pub id: String,

    /// Label for the human speaker in shaped responses
    pub user_role: String,

    /// Label for the assistant speaker in shaped responses
    pub assistant_role: String,

    /// System prompt every conversation session is seeded with
    pub conversation_prompt: String,

    /// System prompt for the feedback engine
    pub feedback_prompt: String,

    /// Text placed before the caller's transcript in a feedback request
    #[serde(default = "default_feedback_preamble")]
    pub feedback_preamble: String,
}

fn default_feedback_preamble() -> String {
    "Give feedback on the following conversation:".to_string()
}

impl Default for Persona {
    fn default() -> Self {
        Self::investor()
    }
}

impl Persona {
    /// The built-in startup pitch persona
    #[must_use]
    pub fn investor() -> Self {
        let conversation_prompt = format!(
            "{TRANSCRIPTION_NOTICE}
You must follow ALL these rules in all responses:
- You are the following character and should ALWAYS act as them: An investor attending a startup pitch event.
- The entrepreneur will present their startup idea, and you will ask them questions and provide feedback as an investor.
- Please imagine yourself as an investor and provide realistic responses throughout the pitch.
- Engage in a conversation with the entrepreneur, ask relevant questions, and offer feedback based on the information they provide.
- Remember to maintain the flow of a pitch event, allowing the entrepreneur to respond before proceeding with your next question or comment.
"
        );
        let feedback_prompt = format!(
            "{TRANSCRIPTION_NOTICE}
Give the entrepreneur detailed feedback on their communication skills with the investor.
Format the feedback in a nice way.
"
        );

        Self {
            id: DEFAULT_PERSONA_ID.to_string(),
            user_role: "entrepreneur".to_string(),
            assistant_role: "investor".to_string(),
            conversation_prompt,
            feedback_prompt,
            feedback_preamble: default_feedback_preamble(),
        }
    }

    /// Load a persona from a JSON file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, parsed, or is missing prompts
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Persona(format!("failed to read {}: {e}", path.display()))
        })?;
        let persona = Self::from_json(&content)?;
        tracing::info!(path = %path.display(), persona = %persona.id, "loaded persona file");
        Ok(persona)
    }

    /// Parse a persona from JSON text
    ///
    /// # Errors
    ///
    /// Returns error if the JSON is invalid or a required field is blank
    pub fn from_json(content: &str) -> Result<Self> {
        let persona: Self = serde_json::from_str(content)?;
        persona.validate()?;
        Ok(persona)
    }

    fn validate(&self) -> Result<()> {
        let fields = [
            ("id", &self.id),
            ("userRole", &self.user_role),
            ("assistantRole", &self.assistant_role),
            ("conversationPrompt", &self.conversation_prompt),
            ("feedbackPrompt", &self.feedback_prompt),
        ];
        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(Error::Persona(format!("{name} must not be empty")));
            }
        }
        Ok(())
    }

    /// Build the user message sent to the feedback engine
    #[must_use]
    pub fn feedback_request(&self, transcript: &str) -> String {
        format!("{} {transcript}", self.feedback_preamble)
    }
}

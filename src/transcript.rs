//! Transcript bundles and their wire shapes

use std::str::FromStr;

use serde_json::{Value, json};

use crate::persona::Persona;
use crate::Error;

/// User text and assistant reply from one transcribe request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptBundle {
    pub user: String,
    pub assistant: String,
}

/// JSON layout of a [`TranscriptBundle`] response
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResponseShape {
    /// `[{"<user role>": text}, {"<assistant role>": text}]`, keyed by persona role labels
    #[default]
    RolePairs,
    /// `{"user": text, "assistant": text}`
    Object,
}

impl ResponseShape {
    /// Render `bundle` using `persona`'s role labels where the shape needs them
    #[must_use]
    pub fn render(self, bundle: &TranscriptBundle, persona: &Persona) -> Value {
        match self {
            Self::RolePairs => {
                let mut user = serde_json::Map::new();
                user.insert(persona.user_role.clone(), Value::String(bundle.user.clone()));
                let mut assistant = serde_json::Map::new();
                assistant.insert(
                    persona.assistant_role.clone(),
                    Value::String(bundle.assistant.clone()),
                );
                Value::Array(vec![Value::Object(user), Value::Object(assistant)])
            }
            Self::Object => json!({
                "user": bundle.user,
                "assistant": bundle.assistant,
            }),
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RolePairs => "role-pairs",
            Self::Object => "object",
        }
    }
}

impl FromStr for ResponseShape {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "role-pairs" | "role_pairs" | "pairs" => Ok(Self::RolePairs),
            "object" => Ok(Self::Object),
            other => Err(Error::Config(format!(
                "unknown response shape \"{other}\" (expected \"role-pairs\" or \"object\")"
            ))),
        }
    }
}

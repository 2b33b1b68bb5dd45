//! Conversation sessions and their in-memory store

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, RwLock};

use crate::chat::ChatMessage;

/// Speaker of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One role-tagged utterance
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    fn to_message(&self) -> ChatMessage {
        match self.role {
            Role::User => ChatMessage::user(self.content.clone()),
            Role::Assistant => ChatMessage::assistant(self.content.clone()),
        }
    }
}

/// Observable lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// No turns recorded
    Empty,
    /// At least one turn recorded
    Active,
}

/// One ongoing conversation
///
/// Turns can only be appended or cleared as a whole; their order is the
/// order they were recorded in.
#[derive(Debug)]
pub struct Session {
    id: String,
    persona_prompt: Arc<str>,
    turns: Vec<Turn>,
    max_context_turns: Option<usize>,
}

impl Session {
    /// Create an empty session seeded with `persona_prompt`
    ///
    /// With `max_context_turns` set, only that many of the most recent turns
    /// are sent upstream; the recorded history is never truncated.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        persona_prompt: Arc<str>,
        max_context_turns: Option<usize>,
    ) -> Self {
        Self {
            id: id.into(),
            persona_prompt,
            turns: Vec::new(),
            max_context_turns,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn persona_prompt(&self) -> &str {
        &self.persona_prompt
    }

    /// Recorded turns in append order
    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        if self.turns.is_empty() {
            SessionState::Empty
        } else {
            SessionState::Active
        }
    }

    pub(crate) fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Drop every turn, returning to [`SessionState::Empty`]
    pub fn reset(&mut self) {
        self.turns.clear();
    }

    /// Messages for a completion request: persona prompt, then turns in order
    #[must_use]
    pub fn context(&self) -> Vec<ChatMessage> {
        let start = self
            .max_context_turns
            .map_or(0, |max| self.turns.len().saturating_sub(max));

        std::iter::once(ChatMessage::system(self.persona_prompt.to_string()))
            .chain(self.turns[start..].iter().map(Turn::to_message))
            .collect()
    }
}

/// Handle to a session; holding its lock serializes appends
pub type SharedSession = Arc<Mutex<Session>>;

/// In-memory session map keyed by session ID
#[derive(Debug)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SharedSession>>,
    persona_prompt: Arc<str>,
    max_context_turns: Option<usize>,
}

impl SessionStore {
    /// Create a store whose sessions are seeded with `persona_prompt`
    #[must_use]
    pub fn new(persona_prompt: impl Into<Arc<str>>, max_context_turns: Option<usize>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            persona_prompt: persona_prompt.into(),
            max_context_turns,
        }
    }

    /// Look up a session without creating it
    pub async fn get(&self, id: &str) -> Option<SharedSession> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Look up a session, creating an empty one on first use
    pub async fn get_or_create(&self, id: &str) -> SharedSession {
        if let Some(session) = self.get(id).await {
            return session;
        }

        let mut sessions = self.sessions.write().await;
        sessions
            .entry(id.to_string())
            .or_insert_with(|| {
                tracing::debug!(session = %id, "creating session");
                Arc::new(Mutex::new(Session::new(
                    id,
                    self.persona_prompt.clone(),
                    self.max_context_turns,
                )))
            })
            .clone()
    }

    /// Number of sessions created so far
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

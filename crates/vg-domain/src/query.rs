//! Query entity.

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Session identifier carried across a chat-style conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        Self(format!("sess_{}", Ulid::new()))
    }

    pub fn from_string(s: String) -> Self {
        Self(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

fn default_stream() -> bool {
    true
}

/// A natural-language request into the orchestration core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    #[serde(rename = "query")]
    pub text: String,
    #[serde(default)]
    pub session_id: Option<SessionId>,
    #[serde(default = "default_stream")]
    pub stream: bool,
}

impl Query {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            session_id: None,
            stream: false,
        }
    }
}

//! Canonical request types sent to the upstream completion API.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Model used when a caller convention allows omitting it.
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Role of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A plain-text chat message.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A message in the canonical list.
///
/// Caller-supplied messages that are exactly `{role, content}` with a known
/// role and text content decode as [`ChatMessage::Text`]. Anything richer
/// (tool calls, multi-part content, names, other roles) is kept as raw JSON
/// so it reaches the upstream byte-for-byte as the caller sent it.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ChatMessage {
    Text(Message),
    Raw(Value),
}

impl From<Message> for ChatMessage {
    fn from(message: Message) -> Self {
        ChatMessage::Text(message)
    }
}

/// The normalized request body, independent of which caller convention
/// produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalPayload {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
    /// Passthrough options forwarded to the upstream verbatim.
    ///
    /// Never contains `model`, `messages` or `stream`.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CanonicalPayload {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>, stream: bool) -> Self {
        Self {
            model: model.into(),
            messages,
            stream,
            extra: Map::new(),
        }
    }
}

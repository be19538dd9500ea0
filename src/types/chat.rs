//! Chat message types and their wire mapping.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Message role.
///
/// Roles outside the three standard ones are carried verbatim so callers can
/// target backends with custom role names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Custom(String),
}

impl MessageRole {
    /// Role string sent on the wire.
    pub fn as_wire_str(&self) -> &str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Custom(role) => role,
        }
    }
}

impl From<String> for MessageRole {
    fn from(value: String) -> Self {
        match value.as_str() {
            "system" => Self::System,
            "user" => Self::User,
            "assistant" => Self::Assistant,
            _ => Self::Custom(value),
        }
    }
}

impl From<&str> for MessageRole {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<MessageRole> for String {
    fn from(role: MessageRole) -> Self {
        match role {
            MessageRole::Custom(role) => role,
            other => other.as_wire_str().to_string(),
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire_str())
    }
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<MessageRole>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }
}

/// Wire shape of a message.
#[derive(Debug, Clone, Serialize)]
pub struct WireMessage<'a> {
    pub role: &'a str,
    pub content: &'a str,
}

impl<'a> From<&'a ChatMessage> for WireMessage<'a> {
    fn from(msg: &'a ChatMessage) -> Self {
        Self {
            role: msg.role.as_wire_str(),
            content: &msg.content,
        }
    }
}

/// Routing metadata telling the backend which provider and model to use.
#[derive(Debug, Clone, Serialize)]
pub struct RoutingData<'a> {
    pub provider: &'a str,
    pub model: &'a str,
}

/// Request body of the model streaming call.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequestBody<'a> {
    pub messages: Vec<WireMessage<'a>>,
    pub data: RoutingData<'a>,
}

impl<'a> ChatRequestBody<'a> {
    pub fn new(messages: &'a [ChatMessage], provider: &'a str, model: &'a str) -> Self {
        Self {
            messages: messages.iter().map(WireMessage::from).collect(),
            data: RoutingData { provider, model },
        }
    }
}

//! Common types shared by completion providers.

use std::pin::Pin;

use futures::Stream;
use serde::{Deserialize, Serialize};

use super::error::LLMError;
use crate::auth::BearerToken;

/// A message in a chat conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// The role of a message sender.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// What the relay hands to a provider for a single call.
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    /// Content of the most recent user message.
    pub message: String,
    /// The full conversation as received from the client.
    pub history: Vec<Message>,
    /// Opaque key-value context forwarded to REST upstreams.
    pub context: serde_json::Map<String, serde_json::Value>,
    /// Client-supplied session identifier, if any.
    pub session_id: Option<String>,
    pub authorization: Option<BearerToken>,
}

/// A buffered reply from a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub message: String,
    /// Timestamp reported by the upstream, if it sent one.
    pub timestamp: Option<String>,
}

/// Events produced by a streaming provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A text fragment.
    Token(String),
    /// The upstream finished normally.
    Done,
}

/// A live stream of completion events.
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, LLMError>> + Send>>;

/// A provider's answer: either a buffered message or a live stream.
pub enum Reply {
    Message(Completion),
    Stream(ChatStream),
}

impl std::fmt::Debug for Reply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reply::Message(c) => f.debug_tuple("Message").field(c).finish(),
            Reply::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

//! Core protocol types for chat streaming
//!
//! These are the backend-neutral shapes that flow between the client, the
//! frame parser and the protocol adapters:
//! - conversation turns kept in history
//! - stream events decoded from response lines
//! - fully built outbound requests

use crate::config::redact_by_field_name;
use crate::error::ChatError;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Role of a turn in the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions that steer the assistant
    System,
    /// Something the person said
    User,
    /// A completed answer
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message in the conversation. Immutable once appended to history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    role: Role,
    content: String,
}

impl ConversationTurn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

/// Which part of the answer a delta belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// Text meant for the person (shown and spoken)
    #[default]
    Answer,
    /// Reasoning the model emits before answering
    Thinking,
}

/// An incremental fragment of the streamed answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delta {
    pub text: String,
    pub channel: Channel,
}

impl Delta {
    pub fn answer(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            channel: Channel::Answer,
        }
    }

    pub fn thinking(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            channel: Channel::Thinking,
        }
    }

    pub fn is_thinking(&self) -> bool {
        self.channel == Channel::Thinking
    }
}

/// Application-level event decoded from the response stream
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// A fragment of the answer
    Delta(Delta),
    /// The backend signalled the end of its answer
    Done,
    /// The backend reported an error in-band
    Error(ChatError),
}

impl StreamEvent {
    pub fn answer(text: impl Into<String>) -> Self {
        StreamEvent::Delta(Delta::answer(text))
    }

    pub fn thinking(text: impl Into<String>) -> Self {
        StreamEvent::Delta(Delta::thinking(text))
    }

    /// The delta, if this event carries one
    pub fn as_delta(&self) -> Option<&Delta> {
        match self {
            StreamEvent::Delta(delta) => Some(delta),
            _ => None,
        }
    }
}

/// A fully built outbound request. Created per call, never persisted.
#[derive(Clone)]
pub struct RequestSpec {
    /// Target endpoint
    pub endpoint: Url,

    /// Extra headers required by the backend (auth and the like)
    pub headers: Vec<(String, String)>,

    /// Encoded JSON body
    pub body: Vec<u8>,
}

impl RequestSpec {
    /// Build a request, encoding `payload` as the JSON body
    pub fn json<T: Serialize>(endpoint: Url, payload: &T) -> Result<Self, ChatError> {
        let body = serde_json::to_vec(payload)?;
        Ok(Self {
            endpoint,
            headers: Vec::new(),
            body,
        })
    }

    /// Add a header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Look up a header value by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Decode the body back into JSON, mostly for logging and tests
    pub fn body_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

impl fmt::Debug for RequestSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let headers: Vec<(&str, String)> = self
            .headers
            .iter()
            .map(|(key, value)| (key.as_str(), redact_by_field_name(key, value)))
            .collect();

        f.debug_struct("RequestSpec")
            .field("endpoint", &self.endpoint.as_str())
            .field("headers", &headers)
            .field("body_len", &self.body.len())
            .finish()
    }
}

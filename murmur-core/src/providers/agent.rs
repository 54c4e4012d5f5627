//! Agent-message backend
//!
//! The raw user query goes out as a single field and the answer streams back
//! as server-sent events, one JSON object per `data:` line:
//!
//! ```text
//! data: {"event":"agent_message","answer":"Hi"}
//! event: ping
//! data: {"event":"message_end"}
//! ```

use crate::config::AgentMessageConfig;
use crate::error::{ChatError, ChatResult, LineParseError};
use crate::protocol::{ConversationTurn, RequestSpec, StreamEvent};
use crate::providers::adapter::{parse_endpoint, BackendKind, ProtocolAdapter};
use serde::Serialize;
use serde_json::{Map, Value};

/// SSE fields other than `data` carry nothing the client needs
const IGNORED_SSE_FIELDS: [&str; 3] = ["event:", "id:", "retry:"];

/// Request body for the chat-messages endpoint
#[derive(Debug, Serialize)]
struct AgentMessageRequest<'a> {
    inputs: &'a Map<String, Value>,
    query: &'a str,
    response_mode: &'static str,
    conversation_id: &'a str,
    user: &'a str,
}

/// Adapter for agent-message backends
pub struct AgentMessageAdapter {
    config: AgentMessageConfig,
}

impl AgentMessageAdapter {
    pub fn new(config: AgentMessageConfig) -> Self {
        Self { config }
    }
}

impl ProtocolAdapter for AgentMessageAdapter {
    fn name(&self) -> &str {
        "agent_message"
    }

    fn kind(&self) -> BackendKind {
        BackendKind::AgentMessage
    }

    fn build_request(
        &self,
        _system_prompt: &str,
        _history: &[ConversationTurn],
        new_user_text: &str,
    ) -> ChatResult<RequestSpec> {
        // The agent keeps its own instructions and context server-side
        let endpoint = parse_endpoint(&self.config.endpoint)?;

        let body = AgentMessageRequest {
            inputs: &self.config.inputs,
            query: new_user_text,
            response_mode: "streaming",
            conversation_id: &self.config.conversation_id,
            user: &self.config.user,
        };

        let spec = RequestSpec::json(endpoint, &body)?.with_header(
            "Authorization",
            self.config.api_key.bearer(),
        );
        Ok(spec)
    }

    fn parse_line(&self, line: &str) -> Result<Option<StreamEvent>, LineParseError> {
        let line = line.trim();
        if line.is_empty() || line.starts_with(':') {
            return Ok(None);
        }
        if IGNORED_SSE_FIELDS.iter().any(|field| line.starts_with(field)) {
            return Ok(None);
        }

        let payload = line.strip_prefix("data:").map_or(line, str::trim_start);
        if payload.is_empty() || payload == "[DONE]" {
            return Ok(None);
        }

        let value: Value = serde_json::from_str(payload)?;
        let Some(object) = value.as_object() else {
            return Ok(None);
        };

        let text = |key: &str| {
            object
                .get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
        };

        let event = match object.get("event").and_then(Value::as_str) {
            Some("agent_message") => text("answer").map(StreamEvent::answer),
            Some("agent_thought") => text("thought").map(StreamEvent::thinking),
            Some("message_end") => Some(StreamEvent::Done),
            Some("error") => Some(StreamEvent::Error(ChatError::Backend {
                message: text("message").unwrap_or("unknown backend error").to_string(),
            })),
            _ => None,
        };

        Ok(event)
    }
}

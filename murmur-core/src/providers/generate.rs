//! Generate-style backend
//!
//! The whole conversation is flattened into one role-tagged prompt string and
//! the response arrives as newline-delimited JSON objects:
//!
//! ```text
//! {"model":"deepseek-r1:32b","response":"Hel","done":false}
//! {"model":"deepseek-r1:32b","response":"lo","done":false}
//! {"model":"deepseek-r1:32b","response":"","done":true}
//! ```

use crate::config::GenerateConfig;
use crate::error::{ChatError, ChatResult, LineParseError};
use crate::protocol::{ConversationTurn, RequestSpec, Role, StreamEvent};
use crate::providers::adapter::{parse_endpoint, BackendKind, ProtocolAdapter};
use serde::Serialize;
use serde_json::Value;

/// Request body for the generate endpoint
#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
}

/// Adapter for generate-style backends
pub struct GenerateAdapter {
    config: GenerateConfig,
}

impl GenerateAdapter {
    pub fn new(config: GenerateConfig) -> Self {
        Self { config }
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }
}

/// Flatten the system prompt and history into one role-tagged prompt.
///
/// The new user text is appended only when the history does not already end
/// with it.
pub fn flatten_prompt(
    system_prompt: &str,
    history: &[ConversationTurn],
    new_user_text: &str,
) -> String {
    let mut lines = Vec::with_capacity(history.len() + 2);

    if !system_prompt.is_empty() {
        lines.push(format!("System: {}", system_prompt));
    }

    for turn in history {
        let tag = match turn.role() {
            Role::System => "System",
            Role::User => "Human",
            Role::Assistant => "Assistant",
        };
        lines.push(format!("{}: {}", tag, turn.content()));
    }

    let already_present = history
        .last()
        .is_some_and(|t| t.role() == Role::User && t.content() == new_user_text);
    if !already_present && !new_user_text.is_empty() {
        lines.push(format!("Human: {}", new_user_text));
    }

    lines.join("\n")
}

impl ProtocolAdapter for GenerateAdapter {
    fn name(&self) -> &str {
        "generate"
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Generate
    }

    fn build_request(
        &self,
        system_prompt: &str,
        history: &[ConversationTurn],
        new_user_text: &str,
    ) -> ChatResult<RequestSpec> {
        let endpoint = parse_endpoint(&self.config.endpoint)?;

        let body = GenerateRequest {
            model: &self.config.model,
            prompt: flatten_prompt(system_prompt, history, new_user_text),
            stream: true,
            options: GenerateOptions {
                temperature: self.config.temperature,
            },
        };

        RequestSpec::json(endpoint, &body)
    }

    fn parse_line(&self, line: &str) -> Result<Option<StreamEvent>, LineParseError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let value: Value = serde_json::from_str(line)?;
        let Some(object) = value.as_object() else {
            return Ok(None);
        };

        if let Some(message) = object.get("error").and_then(Value::as_str) {
            return Ok(Some(StreamEvent::Error(ChatError::Backend {
                message: message.to_string(),
            })));
        }

        let text = |key: &str| {
            object
                .get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
        };

        if let Some(response) = text("response") {
            return Ok(Some(StreamEvent::answer(response)));
        }

        if let Some(thinking) = text("thinking") {
            return Ok(Some(StreamEvent::thinking(thinking)));
        }

        if object.get("done").and_then(Value::as_bool) == Some(true) {
            return Ok(Some(StreamEvent::Done));
        }

        Ok(None)
    }
}

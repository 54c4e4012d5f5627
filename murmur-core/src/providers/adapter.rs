//! Protocol adapter trait
//!
//! Defines the strategy that translates between the neutral request/event
//! model and one backend's wire format. The adapter is picked once, when the
//! client is built, from the configured backend kind.

use crate::config::BackendConfig;
use crate::error::{ChatError, ChatResult, LineParseError};
use crate::protocol::{ConversationTurn, RequestSpec, StreamEvent};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use url::Url;

/// Core adapter trait that every backend wire format implements
pub trait ProtocolAdapter: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Which wire format this adapter speaks
    fn kind(&self) -> BackendKind;

    /// Build the outbound request for one call.
    ///
    /// `history` is the snapshot taken after the new user turn was appended.
    fn build_request(
        &self,
        system_prompt: &str,
        history: &[ConversationTurn],
        new_user_text: &str,
    ) -> ChatResult<RequestSpec>;

    /// Interpret one complete response line.
    ///
    /// Returns `Ok(None)` for lines that carry nothing of interest (blank
    /// lines, keep-alives, unrelated events).
    fn parse_line(&self, line: &str) -> Result<Option<StreamEvent>, LineParseError>;
}

/// Supported backend wire formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Flattened prompt in, newline-delimited JSON out
    Generate,
    /// Raw query in, `data:` prefixed JSON events out
    AgentMessage,
}

impl BackendKind {
    /// The kind selected by a backend configuration
    pub fn of(backend: &BackendConfig) -> Self {
        match backend {
            BackendConfig::Generate(_) => BackendKind::Generate,
            BackendConfig::AgentMessage(_) => BackendKind::AgentMessage,
        }
    }
}

/// Create the adapter for a backend configuration
pub fn create_adapter(backend: &BackendConfig) -> Arc<dyn ProtocolAdapter> {
    match backend {
        BackendConfig::Generate(cfg) => Arc::new(super::GenerateAdapter::new(cfg.clone())),
        BackendConfig::AgentMessage(cfg) => {
            Arc::new(super::AgentMessageAdapter::new(cfg.clone()))
        }
    }
}

/// Parse an endpoint string into an http(s) URL
pub fn parse_endpoint(endpoint: &str) -> ChatResult<Url> {
    let url = Url::parse(endpoint).map_err(|e| ChatError::MalformedEndpoint {
        endpoint: endpoint.to_string(),
        reason: e.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(ChatError::MalformedEndpoint {
            endpoint: endpoint.to_string(),
            reason: format!("unsupported scheme '{}'", scheme),
        }),
    }
}

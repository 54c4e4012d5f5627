//! Configuration schema structures with serde support

use super::error::{ValidationError, ValidationErrorKind};
use super::secrets::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Prompt used when the configuration does not provide one
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a dish recommendation assistant. Recommend dishes based on the matched dish list in the context.";

/// Root configuration structure for Murmur
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ChatConfig {
    /// Schema version (required - no default)
    pub version: String,

    /// The backend the client talks to
    pub backend: BackendConfig,

    /// System prompt prepended to every request
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Conversation history settings
    #[serde(default)]
    pub history: HistoryConfig,

    /// Connection settings
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Response stream handling
    #[serde(default)]
    pub stream: StreamConfig,
}

/// Backend selection, tagged by wire protocol
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    /// Generate-style API: flattened prompt, newline-delimited JSON response
    Generate(GenerateConfig),
    /// Agent-message API: raw query, `data:` prefixed event lines
    AgentMessage(AgentMessageConfig),
}

impl BackendConfig {
    /// The configured endpoint
    pub fn endpoint(&self) -> &str {
        match self {
            BackendConfig::Generate(cfg) => &cfg.endpoint,
            BackendConfig::AgentMessage(cfg) => &cfg.endpoint,
        }
    }
}

/// Generate-style backend settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GenerateConfig {
    /// Full URL of the generate endpoint
    pub endpoint: String,

    /// Model identifier (e.g., "deepseek-r1:32b")
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

/// Agent-message backend settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentMessageConfig {
    /// Full URL of the chat-messages endpoint
    pub endpoint: String,

    /// Bearer token (supports environment variable interpolation)
    pub api_key: SecretString,

    /// End-user identifier sent with every request
    #[serde(default = "default_user")]
    pub user: String,

    /// Conversation id sent with every request. Empty starts a new
    /// conversation on each call.
    #[serde(default)]
    pub conversation_id: String,

    /// App input variables
    #[serde(default)]
    pub inputs: Map<String, Value>,
}

/// Conversation history settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HistoryConfig {
    /// Maximum number of turns kept
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
        }
    }
}

/// Connection configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionConfig {
    /// Connection timeout in milliseconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Whole-request timeout in milliseconds. Unset means no timeout.
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,

    /// Maximum idle connections per host
    #[serde(default = "default_max_idle")]
    pub max_idle_per_host: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout(),
            request_timeout_ms: None,
            max_idle_per_host: default_max_idle(),
        }
    }
}

/// Response stream handling
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StreamConfig {
    /// Longest line the parser will buffer while waiting for a newline
    #[serde(default = "default_max_line_bytes")]
    pub max_line_bytes: usize,

    /// Route text inside inline `<think>` tags to the thinking channel
    #[serde(default)]
    pub split_think_tags: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_line_bytes: default_max_line_bytes(),
            split_think_tags: false,
        }
    }
}

// Default value functions for serde
fn default_system_prompt() -> String { DEFAULT_SYSTEM_PROMPT.to_string() }
fn default_temperature() -> f32 { 0.7 }
fn default_user() -> String { "murmur".to_string() }
fn default_capacity() -> usize { crate::history::DEFAULT_HISTORY_CAPACITY }
fn default_connect_timeout() -> u64 { 10000 }
fn default_max_idle() -> usize { 10 }
fn default_max_line_bytes() -> usize { 10 * 1024 * 1024 }

impl ChatConfig {
    /// Build a configuration for a generate-style backend with defaults
    pub fn generate(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self::with_backend(BackendConfig::Generate(GenerateConfig {
            endpoint: endpoint.into(),
            model: model.into(),
            temperature: default_temperature(),
        }))
    }

    /// Build a configuration for an agent-message backend with defaults
    pub fn agent_message(endpoint: impl Into<String>, api_key: impl Into<SecretString>) -> Self {
        Self::with_backend(BackendConfig::AgentMessage(AgentMessageConfig {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            user: default_user(),
            conversation_id: String::new(),
            inputs: Map::new(),
        }))
    }

    fn with_backend(backend: BackendConfig) -> Self {
        Self {
            version: "0.1".to_string(),
            backend,
            system_prompt: default_system_prompt(),
            history: HistoryConfig::default(),
            connection: ConnectionConfig::default(),
            stream: StreamConfig::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.version.is_empty() {
            return Err(ValidationError::required("version"));
        }

        // Currently support only version 0.1
        if self.version != "0.1" {
            return Err(ValidationError::new(
                "version",
                ValidationErrorKind::UnsupportedVersion {
                    expected: "0.1".to_string(),
                    actual: self.version.clone(),
                },
            ));
        }

        match &self.backend {
            BackendConfig::Generate(cfg) => cfg.validate("backend")?,
            BackendConfig::AgentMessage(cfg) => cfg.validate("backend")?,
        }

        if self.history.capacity == 0 {
            return Err(ValidationError::out_of_range(
                "history.capacity",
                "Must be greater than 0",
            ));
        }

        if self.stream.max_line_bytes == 0 {
            return Err(ValidationError::out_of_range(
                "stream.max_line_bytes",
                "Must be greater than 0",
            ));
        }

        Ok(())
    }
}

impl GenerateConfig {
    /// Validate generate backend configuration
    pub fn validate(&self, path: &str) -> Result<(), ValidationError> {
        if self.endpoint.is_empty() {
            return Err(ValidationError::required(format!("{}.endpoint", path)));
        }

        if self.model.is_empty() {
            return Err(ValidationError::required(format!("{}.model", path)));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ValidationError::out_of_range(
                format!("{}.temperature", path),
                "Must be between 0.0 and 2.0",
            ));
        }

        Ok(())
    }
}

impl AgentMessageConfig {
    /// Validate agent-message backend configuration
    pub fn validate(&self, path: &str) -> Result<(), ValidationError> {
        if self.endpoint.is_empty() {
            return Err(ValidationError::required(format!("{}.endpoint", path)));
        }

        if self.api_key.is_empty() {
            return Err(ValidationError::required(format!("{}.api_key", path)));
        }

        if self.user.is_empty() {
            return Err(ValidationError::required(format!("{}.user", path)));
        }

        Ok(())
    }
}

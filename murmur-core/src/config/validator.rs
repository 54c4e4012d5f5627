//! Configuration validation utilities

use super::error::ValidationError;
use super::env::env_var_pattern;
use super::schema::{BackendConfig, ChatConfig};

/// Configuration validator with additional validation rules
#[derive(Debug, Default)]
pub struct ConfigValidator;

impl ConfigValidator {
    /// Create a new validator
    pub fn new() -> Self {
        Self
    }

    /// Validate a configuration with extended rules
    pub fn validate(&self, config: &ChatConfig) -> Result<(), ValidationError> {
        // First run the built-in validation
        config.validate()?;

        self.validate_endpoint(config)?;
        self.validate_no_placeholders(config)?;

        Ok(())
    }

    /// The endpoint must be an absolute http(s) URL with a host
    fn validate_endpoint(&self, config: &ChatConfig) -> Result<(), ValidationError> {
        const FIELD: &str = "backend.endpoint";

        let url = url::Url::parse(config.backend.endpoint())
            .map_err(|e| ValidationError::invalid_url(FIELD, e.to_string()))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(ValidationError::invalid_url(
                FIELD,
                format!("scheme must be http or https, got {}", url.scheme()),
            ));
        }
        if url.host_str().map_or(true, str::is_empty) {
            return Err(ValidationError::invalid_url(FIELD, "no host"));
        }

        Ok(())
    }

    /// Configs built in code skip interpolation, so placeholders can reach here
    fn validate_no_placeholders(&self, config: &ChatConfig) -> Result<(), ValidationError> {
        if let BackendConfig::AgentMessage(cfg) = &config.backend {
            // Name the placeholder, never the key itself
            if let Some(found) = env_var_pattern().find(cfg.api_key.expose_secret()) {
                return Err(ValidationError::unresolved_placeholder(
                    "backend.api_key",
                    found.as_str(),
                ));
            }
        }

        if let Some(found) = env_var_pattern().find(config.backend.endpoint()) {
            return Err(ValidationError::unresolved_placeholder(
                "backend.endpoint",
                found.as_str(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ValidationErrorKind;

    #[test]
    fn test_valid_generate_config() {
        let config = ChatConfig::generate("http://127.0.0.1:11434/api/generate", "qwen2");
        assert!(ConfigValidator::new().validate(&config).is_ok());
    }

    #[test]
    fn test_rejects_non_http_scheme() {
        let config = ChatConfig::generate("ftp://example.com/api/generate", "qwen2");
        let err = ConfigValidator::new().validate(&config).unwrap_err();
        assert_eq!(err.field_path, "backend.endpoint");
        assert!(matches!(err.kind, ValidationErrorKind::InvalidUrl { .. }));
    }

    #[test]
    fn test_rejects_unparseable_endpoint() {
        let config = ChatConfig::generate("not a url", "qwen2");
        let err = ConfigValidator::new().validate(&config).unwrap_err();
        assert_eq!(err.field_path, "backend.endpoint");
    }

    #[test]
    fn test_rejects_leftover_placeholder() {
        let config =
            ChatConfig::agent_message("https://api.dify.ai/v1/chat-messages", "${DIFY_KEY}");
        let err = ConfigValidator::new().validate(&config).unwrap_err();
        assert_eq!(err.field_path, "backend.api_key");
        match err.kind {
            ValidationErrorKind::UnresolvedPlaceholder { placeholder } => {
                assert_eq!(placeholder, "${DIFY_KEY}")
            }
            other => panic!("unexpected kind: {:?}", other),
        }
    }
}

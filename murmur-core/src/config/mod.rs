//! Configuration module for Murmur
//!
//! This module provides the configuration schema, loading and validation for
//! the streaming chat client.

mod env;
mod error;
mod schema;
mod secrets;
mod validator;

pub use env::interpolate_env_vars;
pub use error::{ConfigError, ConfigFormat, ConfigResult, ValidationError, ValidationErrorKind};
pub use schema::{
    AgentMessageConfig, BackendConfig, ChatConfig, ConnectionConfig, GenerateConfig,
    HistoryConfig, StreamConfig, DEFAULT_SYSTEM_PROMPT,
};
pub use secrets::{redact_by_field_name, SecretString};
pub use validator::ConfigValidator;

use std::fs;
use std::path::Path;

/// Load a configuration from a YAML file
pub fn load_from_yaml<P: AsRef<Path>>(path: P) -> ConfigResult<ChatConfig> {
    load_as(path.as_ref(), ConfigFormat::Yaml)
}

/// Load a configuration from a JSON file
pub fn load_from_json<P: AsRef<Path>>(path: P) -> ConfigResult<ChatConfig> {
    load_as(path.as_ref(), ConfigFormat::Json)
}

/// Load a configuration, choosing the format from the file extension.
/// Anything but `.json` is read as YAML.
pub fn load<P: AsRef<Path>>(path: P) -> ConfigResult<ChatConfig> {
    let path = path.as_ref();
    let format = match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => ConfigFormat::Json,
        _ => ConfigFormat::Yaml,
    };
    load_as(path, format)
}

/// Read, interpolate `${VAR}` placeholders, parse and validate
fn load_as(path: &Path, format: ConfigFormat) -> ConfigResult<ChatConfig> {
    let display_path = path.to_string_lossy().to_string();
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: display_path.clone(),
        source,
    })?;

    let interpolated = env::interpolate_env_vars(&content)?;

    let parsed = match format {
        ConfigFormat::Yaml => serde_yaml::from_str::<ChatConfig>(&interpolated).map_err(|e| {
            let location = e.location();
            (
                location.as_ref().map(|l| l.line()),
                location.as_ref().map(|l| l.column()),
                e.to_string(),
            )
        }),
        ConfigFormat::Json => serde_json::from_str::<ChatConfig>(&interpolated)
            .map_err(|e| (Some(e.line()), Some(e.column()), e.to_string())),
    };

    let config = parsed.map_err(|(line, column, message)| ConfigError::Parse {
        path: display_path,
        format,
        line,
        column,
        message,
    })?;

    ConfigValidator::new().validate(&config)?;
    tracing::debug!("Loaded {} config from {}", format, path.display());
    Ok(config)
}

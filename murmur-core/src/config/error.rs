//! Errors raised while loading a chat configuration

use std::fmt;
use thiserror::Error;

/// File format of a configuration document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Json,
}

impl fmt::Display for ConfigFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConfigFormat::Yaml => "YAML",
            ConfigFormat::Json => "JSON",
        })
    }
}

/// Why a configuration could not be loaded
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid {format} in '{path}' at {}:{}: {message}",
            .line.unwrap_or(0), .column.unwrap_or(0))]
    Parse {
        path: String,
        format: ConfigFormat,
        line: Option<usize>,
        column: Option<usize>,
        message: String,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Environment variable '{var}' referenced by the config is not set")]
    MissingEnvVar { var: String },
}

/// A rejected configuration value and where it sits
#[derive(Debug, Error)]
pub struct ValidationError {
    /// Dotted path to the field, e.g. `backend.endpoint`
    pub field_path: String,
    pub kind: ValidationErrorKind,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid config at '{}': {}", self.field_path, self.kind)
    }
}

#[derive(Debug, Error)]
pub enum ValidationErrorKind {
    #[error("value is required")]
    Required,

    #[error("out of range, {message}")]
    OutOfRange { message: String },

    #[error("not a usable endpoint, {message}")]
    InvalidUrl { message: String },

    #[error("schema version {actual} is not supported (expected {expected})")]
    UnsupportedVersion { expected: String, actual: String },

    #[error("placeholder '{placeholder}' was never interpolated")]
    UnresolvedPlaceholder { placeholder: String },
}

impl ValidationError {
    pub fn new(field_path: impl Into<String>, kind: ValidationErrorKind) -> Self {
        Self {
            field_path: field_path.into(),
            kind,
        }
    }

    pub fn required(field_path: impl Into<String>) -> Self {
        Self::new(field_path, ValidationErrorKind::Required)
    }

    pub fn out_of_range(field_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(
            field_path,
            ValidationErrorKind::OutOfRange {
                message: message.into(),
            },
        )
    }

    pub fn invalid_url(field_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(
            field_path,
            ValidationErrorKind::InvalidUrl {
                message: message.into(),
            },
        )
    }

    pub fn unresolved_placeholder(
        field_path: impl Into<String>,
        placeholder: impl Into<String>,
    ) -> Self {
        Self::new(
            field_path,
            ValidationErrorKind::UnresolvedPlaceholder {
                placeholder: placeholder.into(),
            },
        )
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;

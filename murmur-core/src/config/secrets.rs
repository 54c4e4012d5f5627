//! Secrets handling and redaction
//!
//! API keys travel as [`SecretString`], which never prints its value, and
//! header values are redacted by name before they reach a log line.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An API key or similar credential. Serializes as the plain value so
/// configs round-trip, but formats as `[REDACTED]`.
#[derive(Clone, Deserialize, Serialize)]
#[serde(transparent)]
pub struct SecretString {
    value: String,
}

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    /// The raw value. Only for building requests.
    pub fn expose_secret(&self) -> &str {
        &self.value
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// `Authorization` header value for this key
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.value)
    }

    /// Enough of the key to tell two keys apart in a log line
    pub fn partial_redact(&self) -> String {
        if self.value.is_empty() {
            return "[EMPTY]".to_string();
        }

        let chars: Vec<char> = self.value.chars().collect();
        let len = chars.len();
        if len <= 8 {
            // Very short secrets get fully redacted
            "[REDACTED]".to_string()
        } else if self.value.starts_with("app-") {
            // Agent app keys carry a fixed prefix
            let tail: String = chars[len - 4..].iter().collect();
            format!("app-...{}", tail)
        } else {
            let head: String = chars[..2].iter().collect();
            let tail: String = chars[len - 2..].iter().collect();
            format!("{}...{}", head, tail)
        }
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl PartialEq for SecretString {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for SecretString {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Redact a value based on its field or header name
pub fn redact_by_field_name(field_name: &str, value: &str) -> String {
    const SENSITIVE_PATTERNS: [&str; 7] = [
        "api_key",
        "api-key",
        "secret",
        "token",
        "password",
        "credential",
        "auth",
    ];

    let field_lower = field_name.to_lowercase();
    let is_sensitive = SENSITIVE_PATTERNS
        .iter()
        .any(|pattern| field_lower.contains(pattern));

    if is_sensitive {
        "[REDACTED]".to_string()
    } else {
        value.to_string()
    }
}

//! Environment variable interpolation for configuration

use super::error::ConfigError;
use regex::Regex;
use std::env;
use std::sync::OnceLock;

/// Matches `${VAR}` placeholders with uppercase variable names
pub(crate) fn env_var_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("placeholder pattern is valid")
    })
}

/// Interpolate environment variables in a configuration string
pub fn interpolate_env_vars(content: &str) -> Result<String, ConfigError> {
    let mut missing_vars = Vec::new();

    let result = env_var_pattern().replace_all(content, |cap: &regex::Captures<'_>| {
        match env::var(&cap[1]) {
            Ok(value) => value,
            Err(_) => {
                missing_vars.push(cap[1].to_string());
                cap[0].to_string()
            }
        }
    });

    // Report the first missing variable
    if let Some(var) = missing_vars.into_iter().next() {
        return Err(ConfigError::MissingEnvVar { var });
    }

    Ok(result.into_owned())
}

//! HTTP error mapping utilities

use crate::error::TransportError;
use reqwest::StatusCode;
use serde_json::Value;
use uuid::Uuid;

/// Map an HTTP status code and response body to a TransportError
pub fn map_http_error(status: StatusCode, body: Option<String>, request_id: Uuid) -> TransportError {
    let from_json = body
        .as_deref()
        .and_then(|b| serde_json::from_str::<Value>(b).ok())
        .and_then(|v| extract_error_message(&v));

    let error_message = from_json
        .or_else(|| body.filter(|b| !b.trim().is_empty()))
        .unwrap_or_else(|| format!("HTTP error {}", status.as_u16()));

    // Include request ID in error message
    let message_with_id = format!("{} [request_id: {}]", error_message, request_id);

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            TransportError::Authentication(message_with_id)
        }

        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => TransportError::Timeout,

        status => TransportError::Status {
            status: status.as_u16(),
            message: message_with_id,
        },
    }
}

/// Extract an error message from common JSON error bodies
fn extract_error_message(json: &Value) -> Option<String> {
    // Nested format: { "error": { "message": "..." } }
    if let Some(message) = json
        .get("error")
        .and_then(|e| e.get("message"))
        .and_then(Value::as_str)
    {
        return Some(message.to_string());
    }

    // Agent format: { "code": "...", "message": "...", "status": 400 }
    if let Some(message) = json.get("message").and_then(Value::as_str) {
        return Some(message.to_string());
    }

    // Generate format: { "error": "..." }
    json.get("error")
        .and_then(Value::as_str)
        .map(str::to_string)
}

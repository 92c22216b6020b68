//! Error types for the grocery API client.
//!
//! # Design
//! `Unauthorized` gets a dedicated variant because every caller treats a 401
//! as a forced sign-out. All other non-2xx responses land in `Http` with the
//! status and a message extracted from the body. `Validation` and `Forbidden`
//! are raised before any request is dispatched.

use serde_json::Value;

use crate::http::HttpResponse;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// The server returned 401. The session is no longer valid.
    #[error("{message}")]
    Unauthorized { message: String },

    /// The server returned a non-2xx status other than 401.
    #[error("{message}")]
    Http { status: u16, message: String },

    /// No response was received.
    #[error("network error: {0}")]
    Transport(String),

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// The request payload could not be serialized.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// Input rejected before dispatch.
    #[error("{0}")]
    Validation(String),

    /// The current role on the list does not allow the operation.
    #[error("{0}")]
    Forbidden(String),
}

impl ApiError {
    /// Build the error for a non-2xx response.
    pub fn from_response(response: &HttpResponse) -> Self {
        let message = error_message(response);
        if response.status == 401 {
            ApiError::Unauthorized { message }
        } else {
            ApiError::Http {
                status: response.status,
                message,
            }
        }
    }

    /// HTTP status carried by the error, when one exists.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized { .. } => Some(401),
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. })
    }
}

/// Extract a human-readable message from an error response body.
///
/// Prefers a `detail` field (a list of validation entries or a string), then
/// `message`, then the raw body. Falls back to `HTTP <status>`.
pub fn error_message(response: &HttpResponse) -> String {
    let fallback = format!("HTTP {}", response.status);
    let body = response.body.trim();
    if body.is_empty() {
        return fallback;
    }

    let parsed: Option<Value> = serde_json::from_str(body).ok();
    if !response.is_json() && !matches!(parsed, Some(Value::Object(_))) {
        return body.to_string();
    }
    let Some(data) = parsed else {
        return fallback;
    };

    match data.get("detail") {
        Some(Value::Array(entries)) => entries
            .iter()
            .map(detail_entry)
            .collect::<Vec<_>>()
            .join("\n"),
        Some(Value::String(detail)) if !detail.is_empty() => detail.clone(),
        Some(Value::Null) | None => match data.get("message") {
            Some(Value::String(message)) if !message.is_empty() => message.clone(),
            _ => data.to_string(),
        },
        Some(other) => other.to_string(),
    }
}

fn detail_entry(entry: &Value) -> String {
    for key in ["msg", "detail"] {
        if let Some(Value::String(s)) = entry.get(key) {
            return s.clone();
        }
    }
    match entry {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

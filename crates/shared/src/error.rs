//! Shared error types and server error message extraction.

use serde::{Deserialize, Serialize};

/// Error body shapes the backend is known to send.
///
/// Express handlers answer with `{ message }` or `{ error }`; some middleware
/// answers with RFC7807 problem details (`detail` / `title`).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Attempt to pull a user-facing message out of an error response body.
/// Prefers `message`, then `error`, then `detail`, then `title`.
pub fn try_error_message(body: &str) -> Option<String> {
    let parsed = serde_json::from_str::<ErrorBody>(body).ok()?;
    [parsed.message, parsed.error, parsed.detail, parsed.title]
        .into_iter()
        .flatten()
        .find(|text| !text.trim().is_empty())
}

/// Generic message for a status code when the body carries none.
pub fn fallback_message(status: u16) -> &'static str {
    match status {
        400 | 422 => "Please check your input and try again.",
        401 => "Please log in to continue.",
        403 => "You are not allowed to perform this action.",
        404 => "The requested item could not be found.",
        409 => "This conflicts with an existing record.",
        500..=599 => "The server ran into a problem. Please try again later.",
        _ => "Request failed. Please try again.",
    }
}

/// API error type for client-side use
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("Deserialization error: {0}")]
    Deserialize(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Message suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Network(_) => {
                "Could not reach the server. Check your connection and try again.".to_string()
            }
            ApiError::Http { status, body } => {
                try_error_message(body).unwrap_or_else(|| fallback_message(*status).to_string())
            }
            ApiError::Deserialize(_) => "The server sent an unexpected response.".to_string(),
        }
    }
}

/// Realtime packet codec failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("empty packet")]
    Empty,
    #[error("unknown packet type {0:?}")]
    UnknownType(char),
    #[error("unsupported packet: {0}")]
    Unsupported(&'static str),
    #[error("malformed packet: {0}")]
    Malformed(String),
    #[error("invalid {event} payload: {reason}")]
    Payload { event: String, reason: String },
}

/// A rejected field in client-side input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

//! Client-level error types.

use rideshare_shared::{ApiError, ProtocolError, ValidationError};

/// Failures of the realtime channel.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RealtimeError {
    #[error("a user id is required to open the realtime channel")]
    MissingUserId,
    #[error("invalid realtime url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("connection attempt timed out after {0} ms")]
    Timeout(u64),
    #[error("server refused the connection: {0}")]
    Rejected(String),
    #[error("connection closed")]
    Closed,
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("no storage directory available on this platform")]
    NoDirectory,
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Realtime(#[from] RealtimeError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("invalid input: {0}")]
    Validation(#[from] ValidationError),
    #[error("not signed in")]
    NotAuthenticated,
    #[error("notification {0} is not in the store")]
    UnknownNotification(String),
    #[error("cannot {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: &'static str,
    },
}

impl ClientError {
    /// Message suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Api(err) => err.user_message(),
            ClientError::Validation(err) => err.message.clone(),
            ClientError::NotAuthenticated => "Please log in to continue.".to_string(),
            other => other.to_string(),
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

use std::time::Duration;

use thiserror::Error;

use crate::api_client::ApiError;
use crate::storage::StorageError;

/// Client-level error type.
/// `code()` and `user_message()` give UI layers a stable key and display text.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Validation error: {0}")]
    Validation(String),

    /// Grounded feature requested before any grounding exists.
    #[error("{0}")]
    Ungrounded(String),

    #[error("Remote request failed: {0}")]
    Remote(#[from] ApiError),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The identity changed (or the caller cancelled) while the request was in flight.
    #[error("Request superseded before its response was applied")]
    Superseded,

    #[error("A {0} request is already in progress")]
    Busy(&'static str),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Document error: {0}")]
    Document(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ClientError {
    pub fn code(&self) -> &'static str {
        match self {
            ClientError::Validation(_) => "VALIDATION_ERROR",
            ClientError::Ungrounded(_) => "GROUNDING_UNAVAILABLE",
            ClientError::Remote(_) => "REMOTE_ERROR",
            ClientError::Timeout(_) => "TIMEOUT",
            ClientError::Superseded => "SUPERSEDED",
            ClientError::Busy(_) => "BUSY",
            ClientError::Storage(_) => "STORAGE_ERROR",
            ClientError::Document(_) => "DOCUMENT_ERROR",
            ClientError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Text safe to show the user. Failures outside the user's control are
    /// logged here and reduced to a "try again" message.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Validation(msg) | ClientError::Ungrounded(msg) => msg.clone(),
            ClientError::Remote(e) => {
                tracing::error!("Remote error: {e}");
                match e.server_message() {
                    Some(msg) => msg.to_string(),
                    None => "Something went wrong. Please try again.".to_string(),
                }
            }
            ClientError::Timeout(after) => {
                tracing::error!("Request timed out after {after:?}");
                "The server took too long to respond. Please try again.".to_string()
            }
            ClientError::Superseded => "The request was cancelled.".to_string(),
            ClientError::Busy(what) => format!("A {what} request is already in progress."),
            ClientError::Storage(e) => {
                tracing::error!("Storage error: {e}");
                "Could not save your session data. Please try again.".to_string()
            }
            ClientError::Document(msg) => msg.clone(),
            ClientError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                "Something went wrong. Please try again.".to_string()
            }
        }
    }
}

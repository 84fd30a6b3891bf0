//! Failures talking to the Messages API

use std::time::Duration;
use tasklists_core::environment::AssistantError;
use thiserror::Error;

/// A failed Messages API call
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClaudeError {
    /// The request never got an HTTP response
    #[error("Request failed: {0}")]
    Transport(String),

    /// The API answered 200 with a body that is not a message
    #[error("Response parsing failed: {0}")]
    Decode(String),

    /// HTTP 429
    #[error("Rate limited (retry after {retry_after:?})")]
    RateLimited {
        /// The `retry-after` hint, when the API sent one
        retry_after: Option<Duration>,
    },

    /// HTTP 401 or 403: the key is missing, wrong, or revoked
    #[error("API key rejected (status {0})")]
    Unauthorized(u16),

    /// Any other non-success status
    #[error("API error (status {status}): {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body
        message: String,
    },
}

impl From<ClaudeError> for AssistantError {
    fn from(error: ClaudeError) -> Self {
        match error {
            ClaudeError::Unauthorized(_) => Self::Unavailable(error.to_string()),
            ClaudeError::Decode(_) => Self::InvalidResponse(error.to_string()),
            ClaudeError::Transport(_) | ClaudeError::RateLimited { .. } | ClaudeError::Status { .. } => {
                Self::RequestFailed(error.to_string())
            },
        }
    }
}

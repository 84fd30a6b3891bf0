//! HTTP client for the Anthropic Messages API

use crate::{
    error::ClaudeError,
    messages::{MessagesRequest, MessagesResponse},
};
use reqwest::{Client, Response, StatusCode, header::RETRY_AFTER};
use std::time::Duration;

/// Default API root
pub const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1";

/// `anthropic-version` header sent with every request
pub const API_VERSION: &str = "2023-06-01";

/// Anthropic API client. Cloning shares the connection pool.
#[derive(Clone)]
pub struct AnthropicClient {
    http: Client,
    api_key: String,
    api_url: String,
}

impl std::fmt::Debug for AnthropicClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicClient")
            .field("api_url", &self.api_url)
            .finish_non_exhaustive()
    }
}

impl AnthropicClient {
    /// Client for the public API using `api_key`.
    #[must_use]
    pub fn new(api_key: String) -> Self {
        Self {
            http: Client::new(),
            api_key,
            api_url: DEFAULT_API_URL.to_string(),
        }
    }

    /// Builder: point the client at another API root (proxies, tests)
    #[must_use]
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Sends one non-streaming `messages` request.
    ///
    /// # Errors
    ///
    /// [`ClaudeError::Transport`] when no response arrives,
    /// [`ClaudeError::Decode`] for an unreadable success body, and a status
    /// variant for every non-success response.
    pub async fn messages(&self, request: MessagesRequest) -> Result<MessagesResponse, ClaudeError> {
        tracing::debug!(model = %request.model, max_tokens = request.max_tokens, "Sending messages request");

        let response = self
            .http
            .post(format!("{}/messages", self.api_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| ClaudeError::Transport(e.to_string()))?;

        if response.status() == StatusCode::OK {
            return response
                .json::<MessagesResponse>()
                .await
                .map_err(|e| ClaudeError::Decode(e.to_string()));
        }
        Err(status_error(response).await)
    }
}

async fn status_error(response: Response) -> ClaudeError {
    let status = response.status();
    tracing::warn!(status = status.as_u16(), "Messages request rejected");
    match status {
        StatusCode::TOO_MANY_REQUESTS => ClaudeError::RateLimited {
            retry_after: response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.trim().parse().ok())
                .map(Duration::from_secs),
        },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ClaudeError::Unauthorized(status.as_u16()),
        _ => ClaudeError::Status {
            status: status.as_u16(),
            message: response.text().await.unwrap_or_default(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_the_public_api() {
        let client = AnthropicClient::new("test-key".to_string());
        assert_eq!(client.api_url, DEFAULT_API_URL);
    }

    #[test]
    fn api_url_drops_trailing_slash() {
        let client = AnthropicClient::new("k".to_string()).with_api_url("http://localhost:1234/v1/");
        assert_eq!(client.api_url, "http://localhost:1234/v1");
    }

    #[test]
    fn debug_hides_api_key() {
        let client = AnthropicClient::new("secret".to_string());
        assert!(!format!("{client:?}").contains("secret"));
    }
}

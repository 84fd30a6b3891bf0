//! Wire types for the one Messages API exchange the assistant makes: a
//! single user turn under a system prompt, answered with text.

use serde::{Deserialize, Serialize};

/// Model used when none is configured
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5-20250929";

/// Who wrote a message
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The caller
    User,
    /// The model
    Assistant,
}

/// One block of message content. Only text is read; other kinds
/// (thinking, tool use) deserialize to [`ContentBlock::Other`].
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain text
    Text {
        /// The text
        text: String,
    },
    /// Anything else
    #[serde(other)]
    Other,
}

/// A conversation turn
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    /// Author
    pub role: Role,
    /// Content blocks
    pub content: Vec<ContentBlock>,
}

impl Message {
    /// A user turn holding `text`.
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentBlock::Text { text: text.into() }],
        }
    }
}

/// `POST /v1/messages` body
#[derive(Clone, Debug, Serialize)]
pub struct MessagesRequest {
    /// Model name
    pub model: String,
    /// Output token cap
    pub max_tokens: u32,
    /// System prompt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    /// Turns, oldest first
    pub messages: Vec<Message>,
}

impl MessagesRequest {
    /// One user turn under `system`.
    #[must_use]
    pub fn single_turn(
        model: impl Into<String>,
        max_tokens: u32,
        system: impl Into<String>,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            model: model.into(),
            max_tokens,
            system: Some(system.into()),
            messages: vec![Message::user(prompt)],
        }
    }
}

/// Token accounting reported with every response
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct Usage {
    /// Prompt tokens
    pub input_tokens: u32,
    /// Generated tokens
    pub output_tokens: u32,
}

/// `POST /v1/messages` reply
#[derive(Clone, Debug, Deserialize)]
pub struct MessagesResponse {
    /// Message id
    pub id: String,
    /// Model that answered
    pub model: String,
    /// Content blocks
    pub content: Vec<ContentBlock>,
    /// `end_turn`, `max_tokens`, ...
    #[serde(default)]
    pub stop_reason: Option<String>,
    /// Token accounting
    #[serde(default)]
    pub usage: Usage,
}

impl MessagesResponse {
    /// Every text block, concatenated in order.
    #[must_use]
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                ContentBlock::Other => None,
            })
            .collect()
    }

    /// The reply was cut off at the token cap.
    #[must_use]
    pub fn truncated(&self) -> bool {
        self.stop_reason.as_deref() == Some("max_tokens")
    }
}

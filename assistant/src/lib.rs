//! # Task Lists Assistant
//!
//! AI collaborator for Task Lists: list icons and related-task suggestions
//! generated with the Anthropic Messages API.
//!
//! ## Example
//!
//! ```no_run
//! use tasklists_assistant::{AnthropicClient, ClaudeAssistant};
//! use tasklists_core::environment::IconGenerator;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let api_key = std::env::var("ANTHROPIC_API_KEY")?;
//!     let assistant = ClaudeAssistant::new(AnthropicClient::new(api_key));
//!
//!     let icon = assistant.generate_icon("Groceries").await?;
//!     println!("{icon}");
//!     Ok(())
//! }
//! ```
//!
//! Without an API key, [`OfflineAssistant`] fails every request so callers
//! use their fallbacks (the default icon, no suggestions).

pub mod assistant;
pub mod client;
pub mod error;
pub mod messages;

// Re-export main types for convenience
pub use assistant::{ClaudeAssistant, OfflineAssistant, extract_svg, parse_suggestions};
pub use client::AnthropicClient;
pub use error::ClaudeError;
pub use messages::{ContentBlock, Message, MessagesRequest, MessagesResponse, Role, Usage};

//! Configuration for the `tasklists` binary.
//!
//! Loaded from environment variables (after `.env`, if present) with
//! sensible defaults:
//!
//! | Variable | Default |
//! |---|---|
//! | `TASKLISTS_USER_ID` | `local` |
//! | `TASKLISTS_LOG` | `tasklists=info` |
//! | `ANTHROPIC_API_KEY` | unset: AI features fall back offline |
//! | `TASKLISTS_MODEL` | the assistant's default model |
//! | `TASKLISTS_MAX_TOKENS` | `1024` |
//! | `TASKLISTS_SYNC_MAX_RETRIES` | `3` |
//! | `TASKLISTS_SYNC_INITIAL_DELAY_MS` | `100` |
//! | `TASKLISTS_AUTO_ADD_SUGGESTIONS` | `false` |

use std::env;
use std::str::FromStr;
use std::time::Duration;
use tasklists_assistant::messages::DEFAULT_MODEL;
use tasklists_core::ids::UserId;
use tasklists_runtime::RetryPolicy;
use thiserror::Error;

/// Configuration error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable is set but does not parse
    #[error("Invalid value for {var}: {value:?}")]
    InvalidValue {
        /// Variable name
        var: &'static str,
        /// Raw value
        value: String,
    },

    /// Values parse but make no sense together or alone
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Application configuration.
#[derive(Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// User whose lists are opened
    pub user_id: UserId,
    /// `tracing` filter directive
    pub log_filter: String,
    /// Anthropic API key; `None` selects the offline assistant
    pub api_key: Option<String>,
    /// Claude model name
    pub model: String,
    /// Token cap per AI request
    pub max_tokens: u32,
    /// Retries per document write after the first attempt
    pub sync_max_retries: usize,
    /// Delay before the first write retry
    pub sync_initial_delay: Duration,
    /// Add AI suggestions as tasks as soon as they arrive
    pub auto_add_suggestions: bool,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("user_id", &self.user_id)
            .field("log_filter", &self.log_filter)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("sync_max_retries", &self.sync_max_retries)
            .field("sync_initial_delay", &self.sync_initial_delay)
            .field("auto_add_suggestions", &self.auto_add_suggestions)
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            user_id: UserId::new("local"),
            log_filter: "tasklists=info".to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 1024,
            sync_max_retries: 3,
            sync_initial_delay: Duration::from_millis(100),
            auto_add_suggestions: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a variable does not parse or the result
    /// fails [`AppConfig::validate`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Load configuration through `lookup` (a variable name to its value).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a variable does not parse or the result
    /// fails [`AppConfig::validate`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let text = |var: &str| lookup(var).map(|value| value.trim().to_string()).filter(|v| !v.is_empty());

        let config = Self {
            user_id: text("TASKLISTS_USER_ID").map_or(defaults.user_id, UserId::new),
            log_filter: text("TASKLISTS_LOG").unwrap_or(defaults.log_filter),
            api_key: text("ANTHROPIC_API_KEY"),
            model: text("TASKLISTS_MODEL").unwrap_or(defaults.model),
            max_tokens: parse(&lookup, "TASKLISTS_MAX_TOKENS")?.unwrap_or(defaults.max_tokens),
            sync_max_retries: parse(&lookup, "TASKLISTS_SYNC_MAX_RETRIES")?
                .unwrap_or(defaults.sync_max_retries),
            sync_initial_delay: parse(&lookup, "TASKLISTS_SYNC_INITIAL_DELAY_MS")?
                .map_or(defaults.sync_initial_delay, Duration::from_millis),
            auto_add_suggestions: parse(&lookup, "TASKLISTS_AUTO_ADD_SUGGESTIONS")?
                .unwrap_or(defaults.auto_add_suggestions),
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns error if configuration is invalid
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.user_id.as_str().trim().is_empty() {
            return Err(ConfigError::ValidationError("user id cannot be empty".to_string()));
        }
        if self.model.is_empty() {
            return Err(ConfigError::ValidationError("model cannot be empty".to_string()));
        }
        if self.max_tokens == 0 {
            return Err(ConfigError::ValidationError("max_tokens must be > 0".to_string()));
        }
        if self.sync_max_retries > 10 {
            return Err(ConfigError::ValidationError(
                "sync_max_retries must be at most 10".to_string(),
            ));
        }
        Ok(())
    }

    /// Retry policy for document writes.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::builder()
            .max_retries(self.sync_max_retries)
            .initial_delay(self.sync_initial_delay)
            .build()
    }
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError> {
    let Some(value) = lookup(var) else {
        return Ok(None);
    };
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse()
        .map(Some)
        .map_err(|_| ConfigError::InvalidValue { var, value })
}

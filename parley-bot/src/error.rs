//! Unified error types for parley-bot.
//!
//! Every module-specific error converts into [`BotError`]. Configuration
//! errors and rejected platform credentials are fatal; everything else is
//! logged and the bot keeps serving other users.

// ============================================================================
// Main Error Type
// ============================================================================

/// The main error type for parley-bot operations.
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    /// Channel error.
    #[error("channel: {0}")]
    Channel(#[from] ChannelError),

    /// Configuration error.
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    /// Generic internal error.
    #[error("{0}")]
    Internal(String),
}

impl BotError {
    /// Create a config error from a string.
    #[inline]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(ConfigError::Invalid(msg.into()))
    }

    /// Create an internal error.
    #[inline]
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether the error comes from bad configuration or credentials.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::Channel(ChannelError::AuthFailed(_))
        )
    }
}

/// Result type alias for parley-bot operations.
pub type Result<T> = std::result::Result<T, BotError>;

// ============================================================================
// Channel Errors
// ============================================================================

/// Error type for channel operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    /// Failed to start the channel.
    #[error("start failed: {0}")]
    StartFailed(String),

    /// Authentication with the chat platform failed.
    #[error("auth failed: {0}")]
    AuthFailed(String),

    /// Internal error.
    #[error("{0}")]
    Internal(String),
}

impl ChannelError {
    /// Create a start failed error.
    #[inline]
    pub fn start(msg: impl Into<String>) -> Self {
        Self::StartFailed(msg.into())
    }

    /// Create an auth failed error.
    #[inline]
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::AuthFailed(msg.into())
    }

    /// Create an internal error.
    #[inline]
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// Result type for channel operations.
pub type ChannelResult<T> = std::result::Result<T, ChannelError>;

// ============================================================================
// Configuration Errors
// ============================================================================

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is unset or blank.
    #[error("{0} not found in environment variables")]
    Missing(String),

    /// A variable is set but its value is unusable.
    #[error("{name}: {reason} (got {value:?})")]
    InvalidValue {
        /// Variable name.
        name: String,
        /// Raw value.
        value: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Any other invalid configuration.
    #[error("invalid: {0}")]
    Invalid(String),
}

impl ConfigError {
    /// Create a missing variable error.
    #[inline]
    pub fn missing(name: impl Into<String>) -> Self {
        Self::Missing(name.into())
    }

    /// Create an invalid value error.
    #[inline]
    pub fn invalid_value(
        name: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            name: name.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversions() {
        let bot_err: BotError = ChannelError::internal("gateway closed").into();
        assert!(matches!(bot_err, BotError::Channel(_)));
        assert!(!bot_err.is_fatal());

        let bot_err: BotError = ChannelError::auth("invalid token").into();
        assert!(bot_err.is_fatal());

        let bot_err: BotError = ConfigError::missing("DISCORD_TOKEN").into();
        assert!(bot_err.is_fatal());
    }

    #[test]
    fn test_config_error_messages() {
        assert_eq!(
            ConfigError::missing("OPENAI_API_KEY").to_string(),
            "OPENAI_API_KEY not found in environment variables"
        );
        let err = ConfigError::invalid_value("MAX_PROMPT_LENGTH", "abc", "expected a positive integer");
        assert_eq!(
            err.to_string(),
            "MAX_PROMPT_LENGTH: expected a positive integer (got \"abc\")"
        );
    }
}

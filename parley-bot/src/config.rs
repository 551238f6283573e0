//! Environment-driven configuration.
//!
//! Settings are read from process environment variables, after optionally
//! loading a `.env` file from the working directory. Required secrets must be
//! present and non-blank; numeric settings must be positive integers.

use crate::error::{ConfigError, ConfigResult};
use parley::providers::openai::OPENAI_API_BASE_URL;
use std::fmt;
use std::num::{NonZeroU32, NonZeroU64, NonZeroUsize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// System prompt used when `SYSTEM_PROMPT` is not set.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant integrated into Discord.
You provide clear, concise, and accurate responses to user questions.
Be friendly and professional in your interactions.";

/// Default chat model.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Environment variable names.
pub mod vars {
    /// Discord bot token.
    pub const DISCORD_TOKEN: &str = "DISCORD_TOKEN";
    /// Model API key.
    pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
    /// Model API base URL.
    pub const OPENAI_BASE_URL: &str = "OPENAI_BASE_URL";
    /// Model name.
    pub const OPENAI_MODEL: &str = "OPENAI_MODEL";
    /// History cap per user.
    pub const MAX_CONVERSATION_MESSAGES: &str = "MAX_CONVERSATION_MESSAGES";
    /// Output token ceiling.
    pub const MAX_RESPONSE_TOKENS: &str = "MAX_RESPONSE_TOKENS";
    /// Prompt length ceiling in characters.
    pub const MAX_PROMPT_LENGTH: &str = "MAX_PROMPT_LENGTH";
    /// Per-user rate limit (reported only).
    pub const RATE_LIMIT_PER_USER: &str = "RATE_LIMIT_PER_USER";
    /// Completion timeout in seconds.
    pub const REQUEST_TIMEOUT_SECS: &str = "REQUEST_TIMEOUT_SECS";
    /// System prompt override.
    pub const SYSTEM_PROMPT: &str = "SYSTEM_PROMPT";
    /// Log file directory.
    pub const PARLEY_LOG_DIR: &str = "PARLEY_LOG_DIR";

    /// Every variable the bot reads, in display order.
    pub const ALL: &[&str] = &[
        DISCORD_TOKEN,
        OPENAI_API_KEY,
        OPENAI_BASE_URL,
        OPENAI_MODEL,
        MAX_CONVERSATION_MESSAGES,
        MAX_RESPONSE_TOKENS,
        MAX_PROMPT_LENGTH,
        RATE_LIMIT_PER_USER,
        REQUEST_TIMEOUT_SECS,
        SYSTEM_PROMPT,
        PARLEY_LOG_DIR,
    ];
}

/// Resolved bot configuration.
#[derive(Clone)]
pub struct BotConfig {
    /// Discord bot token. Only the Discord channel needs it.
    pub discord_token: Option<String>,
    /// Model API key.
    pub openai_api_key: String,
    /// Base URL of the Chat Completions endpoint.
    pub openai_base_url: String,
    /// Model name sent with every request.
    pub openai_model: String,
    /// Non-system messages kept per user.
    pub max_conversation_messages: NonZeroUsize,
    /// Output token ceiling per completion.
    pub max_response_tokens: NonZeroU32,
    /// Longest accepted prompt, in characters.
    pub max_prompt_length: NonZeroUsize,
    /// Requests per user per minute. Parsed and reported, never enforced.
    pub rate_limit_per_user: NonZeroU32,
    /// Completion timeout.
    pub request_timeout: Duration,
    /// System prompt for new conversations.
    pub system_prompt: String,
    /// Directory for rotated log files.
    pub log_dir: PathBuf,
}

impl fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotConfig")
            .field("discord_token", &self.discord_token.as_ref().map(|_| "[REDACTED]"))
            .field("openai_api_key", &"[REDACTED]")
            .field("openai_base_url", &self.openai_base_url)
            .field("openai_model", &self.openai_model)
            .field("max_conversation_messages", &self.max_conversation_messages)
            .field("max_response_tokens", &self.max_response_tokens)
            .field("max_prompt_length", &self.max_prompt_length)
            .field("rate_limit_per_user", &self.rate_limit_per_user)
            .field("request_timeout", &self.request_timeout)
            .field("log_dir", &self.log_dir)
            .finish_non_exhaustive()
    }
}

impl BotConfig {
    /// Load configuration from the environment, reading `.env` first if
    /// one exists.
    ///
    /// # Errors
    ///
    /// Returns an error if `OPENAI_API_KEY` is missing or any numeric
    /// setting is not a positive integer.
    pub fn from_env() -> ConfigResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Same as [`BotConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let openai_api_key =
            get(vars::OPENAI_API_KEY).ok_or_else(|| ConfigError::missing(vars::OPENAI_API_KEY))?;
        let request_timeout_secs: NonZeroU64 =
            parse_positive(get(vars::REQUEST_TIMEOUT_SECS), vars::REQUEST_TIMEOUT_SECS, 60)?;

        Ok(Self {
            discord_token: get(vars::DISCORD_TOKEN),
            openai_api_key,
            openai_base_url: get(vars::OPENAI_BASE_URL)
                .unwrap_or_else(|| OPENAI_API_BASE_URL.to_string()),
            openai_model: get(vars::OPENAI_MODEL).unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_conversation_messages: parse_positive(
                get(vars::MAX_CONVERSATION_MESSAGES),
                vars::MAX_CONVERSATION_MESSAGES,
                20,
            )?,
            max_response_tokens: parse_positive(
                get(vars::MAX_RESPONSE_TOKENS),
                vars::MAX_RESPONSE_TOKENS,
                1000,
            )?,
            max_prompt_length: parse_positive(
                get(vars::MAX_PROMPT_LENGTH),
                vars::MAX_PROMPT_LENGTH,
                2000,
            )?,
            rate_limit_per_user: parse_positive(
                get(vars::RATE_LIMIT_PER_USER),
                vars::RATE_LIMIT_PER_USER,
                10,
            )?,
            request_timeout: Duration::from_secs(request_timeout_secs.get()),
            system_prompt: get(vars::SYSTEM_PROMPT)
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            log_dir: get(vars::PARLEY_LOG_DIR).map_or_else(|| PathBuf::from("logs"), PathBuf::from),
        })
    }

    /// The Discord token, required to run the Discord channel.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] if `DISCORD_TOKEN` was not set.
    pub fn discord_token(&self) -> ConfigResult<&str> {
        self.discord_token
            .as_deref()
            .ok_or_else(|| ConfigError::missing(vars::DISCORD_TOKEN))
    }
}

/// Log directory to use before the full configuration has been validated.
#[must_use]
pub fn log_dir_from_env() -> PathBuf {
    std::env::var(vars::PARLEY_LOG_DIR)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map_or_else(|| PathBuf::from("logs"), PathBuf::from)
}

/// Parse an optional raw value as a positive integer, falling back to
/// `default` when unset.
fn parse_positive<T>(raw: Option<String>, name: &str, default: u32) -> ConfigResult<T>
where
    T: FromStr + TryFrom<NonZeroU32>,
{
    match raw {
        None => NonZeroU32::new(default)
            .and_then(|d| T::try_from(d).ok())
            .ok_or_else(|| ConfigError::Invalid(format!("{name}: default {default} is not positive"))),
        Some(value) => value.trim().parse::<T>().map_err(|_| {
            ConfigError::invalid_value(name, value.as_str(), "expected a positive integer")
        }),
    }
}

//! Parley Bot - relays Discord direct messages to a chat-completion model.
//!
//! This crate provides the service around the [`parley`] conversation core:
//! transports, command handling, configuration and process lifecycle.
//!
//! # Architecture
//!
//! - **Dispatcher** ([`dispatcher`]) - applies channel and length policy and
//!   runs a prompt turn against the conversation store and the gateway
//! - **Channels** ([`channels`]) - Discord slash commands and a local CLI
//! - **Bot** ([`bot`]) - wires everything together and handles shutdown
//! - **Config** ([`config`]) - environment-driven settings
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use parley_bot::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = BotConfig::from_env()?;
//!     let bot = Bot::builder(config.clone()).build()?;
//!     bot.add_channel(DiscordChannel::new(DiscordChannelConfig::new(
//!         config.discord_token()?,
//!     )))
//!     .await;
//!     bot.run().await
//! }
//! ```
//!
//! # Features
//!
//! - `discord` (default) - Discord support via serenity

pub mod bot;
pub mod channel;
pub mod channels;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod logging;
pub mod util;

/// Prelude module for convenient imports.
pub mod prelude {
    // Error types (centralized)
    pub use crate::error::{
        BotError, ChannelError, ChannelResult, ConfigError, ConfigResult, Result,
    };

    // Bot
    pub use crate::bot::{Bot, BotBuilder, BotStatus};

    // Channel
    pub use crate::channel::{Channel, ChannelBase, ChannelManager, ChannelState, ChannelStatus};
    pub use crate::channels::CliChannel;
    pub use crate::channels::cli::CliChannelConfig;
    #[cfg(feature = "discord")]
    pub use crate::channels::{DiscordChannel, DiscordChannelConfig};

    // Config
    pub use crate::config::BotConfig;

    // Dispatcher
    pub use crate::dispatcher::{
        ChannelKind, Command, CommandDispatcher, DispatcherConfig, Invocation, Reply, ReplyKind,
    };

    // Utilities
    pub use crate::util::{DISCORD_MESSAGE_LIMIT, split_into_chunks, truncate_str};
}

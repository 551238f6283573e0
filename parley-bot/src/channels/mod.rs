//! Channel implementations for the supported chat transports.
//!
//! # Available Channels
//!
//! - [`cli::CliChannel`] - local stdin/stdout session (always available)
//! - [`discord::DiscordChannel`] - Discord slash commands (requires `discord` feature)
//!
//! # Feature Flags
//!
//! - `discord` (default) - Discord support via serenity

pub mod cli;

#[cfg(feature = "discord")]
pub mod discord;

pub use cli::CliChannel;

#[cfg(feature = "discord")]
pub use discord::{DiscordChannel, DiscordChannelConfig};

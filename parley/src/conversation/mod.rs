//! Per-user conversation state.
//!
//! A [`Conversation`] is one user's bounded message history plus the system
//! prompt it was created with. The [`ConversationManager`] maps user ids to
//! conversations, creating them lazily and never removing them.
//!
//! # Design
//!
//! - **Bounded** - a conversation holds at most `max_messages` non-system
//!   messages; each append past the cap evicts exactly the oldest one.
//! - **Fixed prompt** - the system prompt is captured at creation, is never
//!   counted against the cap and is never evicted.
//! - **Sharded** - the manager keeps conversations in a sharded map, so
//!   users on different shards never contend and no lock outlives a call.

mod history;
mod manager;

pub use history::Conversation;
pub use manager::{ConversationManager, UserId};

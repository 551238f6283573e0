#![cfg_attr(docsrs, feature(doc_cfg))]
//! Parley is the conversation core of a chat-relay bot.
//!
//! It owns two things:
//!
//! - **Conversation state** ([`conversation`]) - a per-user, size-bounded
//!   message history with a fixed system prompt, rendered into the ordered
//!   payload a chat-completion request needs.
//! - **Completion gateway** ([`completion`]) - a single-attempt,
//!   timeout-bounded call to a chat-completion provider ([`providers`]) that
//!   yields either text or a typed failure.
//!
//! # Example
//!
//! ```rust,ignore
//! use parley::prelude::*;
//! use std::num::NonZeroUsize;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let store = ConversationManager::new(NonZeroUsize::new(20).unwrap(), "You are helpful.");
//! let client = OpenAIClient::builder().api_key("sk-...").build()?;
//! let gateway = CompletionGateway::new(Arc::new(client), Duration::from_secs(60));
//!
//! store.add_message(42, Role::User, "hi");
//! let reply = gateway.complete(store.render(42), "gpt-4o-mini", 1000).await?;
//! store.add_message(42, Role::Assistant, reply);
//! ```

pub mod completion;
pub mod conversation;
pub mod error;
pub mod message;
pub mod prelude;
pub mod providers;

pub use completion::{CompletionFailure, CompletionGateway};
pub use conversation::{Conversation, ConversationManager, UserId};
pub use error::{LlmError, LlmErrorKind, LlmResult};
pub use message::{Message, Role};

//! Command dispatcher.
//!
//! The dispatcher is the only place that applies user-facing policy:
//! commands other than help are accepted only in direct channels, prompts
//! are length-checked, and each user's turns run one at a time. Channels
//! hand it an [`Invocation`] and deliver whatever [`Reply`] comes back.

mod command;

pub use command::{ChannelKind, Command, Invocation, Reply, ReplyKind};

use crate::config::BotConfig;
use crate::util::truncate_str;
use dashmap::DashMap;
use parley::{CompletionGateway, ConversationManager, Role, UserId};
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument};

/// Rejection for commands issued outside a direct channel.
pub const DIRECT_ONLY_TEXT: &str = "❌ This bot only works in Direct Messages. Please DM me!";

/// Reply when the model call fails.
pub const FAILURE_TEXT: &str =
    "❌ Sorry, I encountered an error while processing your request. Please try again.";

/// Confirmation after a reset.
pub const RESET_TEXT: &str = "✅ Your conversation history has been cleared!";

/// Static help text.
pub const HELP_TEXT: &str = "**Parley Commands** 🤖

`/gpt <prompt>` - Chat with the AI assistant
Send any message or question to get an AI response.

`/reset` - Clear your conversation history
Start fresh with a new conversation.

`/usage` - View your conversation stats
See how many messages are in your current conversation.

`/help` - Show this help message

**Note:** This bot only works in Direct Messages (DMs).";

const PREVIEW_CHARS: usize = 50;

/// Settings the dispatcher needs from the bot configuration.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Model name sent with every completion.
    pub model: String,
    /// Output token ceiling per completion.
    pub max_output_tokens: u32,
    /// Longest accepted prompt, in characters.
    pub max_prompt_length: NonZeroUsize,
}

impl From<&BotConfig> for DispatcherConfig {
    fn from(config: &BotConfig) -> Self {
        Self {
            model: config.openai_model.clone(),
            max_output_tokens: config.max_response_tokens.get(),
            max_prompt_length: config.max_prompt_length,
        }
    }
}

/// Routes commands to the conversation store and the completion gateway.
pub struct CommandDispatcher {
    store: Arc<ConversationManager>,
    gateway: CompletionGateway,
    config: DispatcherConfig,
    turn_locks: DashMap<UserId, Arc<Mutex<()>>>,
}

impl std::fmt::Debug for CommandDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandDispatcher")
            .field("store", &self.store)
            .field("gateway", &self.gateway)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl CommandDispatcher {
    /// Create a dispatcher over a shared store and a gateway.
    #[must_use]
    pub fn new(
        store: Arc<ConversationManager>,
        gateway: CompletionGateway,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            store,
            gateway,
            config,
            turn_locks: DashMap::new(),
        }
    }

    /// The conversation store.
    #[must_use]
    pub const fn store(&self) -> &Arc<ConversationManager> {
        &self.store
    }

    /// The dispatcher settings.
    #[must_use]
    pub const fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Apply channel and length policy without touching any state.
    ///
    /// Returns the rejection to deliver, or `None` if the invocation would
    /// be accepted. Transports that acknowledge slow commands early call
    /// this first so rejections can still be sent privately.
    #[must_use]
    pub fn check(&self, invocation: &Invocation) -> Option<Reply> {
        if invocation.command.requires_direct() && invocation.channel != ChannelKind::Direct {
            debug!(user_id = %invocation.user_id, "rejected command outside direct channel");
            return Some(Reply::rejected(DIRECT_ONLY_TEXT));
        }

        if let Command::Prompt(text) = &invocation.command {
            let max = self.config.max_prompt_length.get();
            if text.chars().count() > max {
                debug!(user_id = %invocation.user_id, max, "rejected prompt over length limit");
                return Some(Reply::rejected(format!(
                    "❌ Prompt too long! Maximum length is {max} characters."
                )));
            }
        }

        None
    }

    /// Handle one invocation and produce the reply to deliver.
    #[instrument(skip(self, invocation), fields(user_id = %invocation.user_id, command = invocation.command.name()))]
    pub async fn dispatch(&self, invocation: Invocation) -> Reply {
        if let Some(rejection) = self.check(&invocation) {
            return rejection;
        }

        let user_id = invocation.user_id;
        match invocation.command {
            Command::Prompt(text) => self.prompt(user_id, &text).await,
            Command::Reset => self.reset(user_id),
            Command::Usage => self.usage(user_id),
            Command::Help => Reply::info(HELP_TEXT),
        }
    }

    async fn prompt(&self, user_id: UserId, text: &str) -> Reply {
        info!(preview = %truncate_str(text, PREVIEW_CHARS), "prompt received");

        let lock = self.turn_lock(user_id);
        let _turn = lock.lock().await;

        self.store.add_message(user_id, Role::User, text);
        let messages = self.store.render(user_id);

        match self
            .gateway
            .complete(messages, &self.config.model, self.config.max_output_tokens)
            .await
        {
            Ok(answer) => {
                self.store.add_message(user_id, Role::Assistant, answer.as_str());
                info!(chars = answer.chars().count(), "response ready");
                Reply::answer(answer)
            }
            Err(failure) => {
                error!(error = %failure, "failed to get response");
                Reply::failed(FAILURE_TEXT)
            }
        }
    }

    fn reset(&self, user_id: UserId) -> Reply {
        self.store.reset(user_id);
        info!("conversation reset");
        Reply::info(RESET_TEXT)
    }

    fn usage(&self, user_id: UserId) -> Reply {
        let size = self.store.size(user_id);
        Reply::info(format!(
            "**Conversation Statistics** 📊\n\n\
             Messages in history: {size}/{max}\n\
             Model: {model}\n\n\
             Your conversation history is maintained across messages.\n\
             Use `/reset` to clear it.",
            max = self.store.max_messages(),
            model = self.config.model,
        ))
    }

    fn turn_lock(&self, user_id: UserId) -> Arc<Mutex<()>> {
        Arc::clone(self.turn_locks.entry(user_id).or_default().value())
    }
}

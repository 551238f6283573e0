//! Bot service that wires every component together.
//!
//! The bot owns the conversation store, the completion gateway, the
//! dispatcher and the channel manager. [`Bot::run`] starts the channels and
//! returns after a shutdown signal once they have been stopped.

use crate::channel::{Channel, ChannelManager, ChannelStatus};
use crate::config::BotConfig;
use crate::dispatcher::{CommandDispatcher, DispatcherConfig};
use crate::error::{BotError, Result};
use parley::providers::{CompletionProvider, HttpClientConfig, OpenAIClient};
use parley::{CompletionGateway, ConversationManager};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info};

/// Bot service.
pub struct Bot {
    store: Arc<ConversationManager>,
    dispatcher: Arc<CommandDispatcher>,
    channel_manager: ChannelManager,
    running: AtomicBool,
}

impl std::fmt::Debug for Bot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bot")
            .field("dispatcher", &self.dispatcher)
            .field("running", &self.running)
            .finish_non_exhaustive()
    }
}

impl Bot {
    /// Start building a bot.
    #[must_use]
    pub fn builder(config: BotConfig) -> BotBuilder {
        BotBuilder::new(config)
    }

    /// The conversation store.
    #[must_use]
    pub const fn store(&self) -> &Arc<ConversationManager> {
        &self.store
    }

    /// The shared dispatcher.
    #[must_use]
    pub const fn dispatcher(&self) -> &Arc<CommandDispatcher> {
        &self.dispatcher
    }

    /// The channel manager.
    #[must_use]
    pub const fn channel_manager(&self) -> &ChannelManager {
        &self.channel_manager
    }

    /// Register a channel.
    pub async fn add_channel(&self, channel: impl Channel + 'static) {
        self.channel_manager.register(channel).await;
    }

    /// Run until Ctrl-C, SIGTERM or a channel finishing on its own.
    ///
    /// # Errors
    ///
    /// Returns an error if every registered channel failed to start or a
    /// channel failed after starting.
    pub async fn run(&self) -> Result<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Run until `shutdown` resolves or a channel finishes on its own.
    ///
    /// # Errors
    ///
    /// Returns an error if every registered channel failed to start or a
    /// channel failed after starting, such as Discord rejecting the token.
    pub async fn run_until(&self, shutdown: impl Future<Output = ()>) -> Result<()> {
        info!("Bot starting...");
        self.running.store(true, Ordering::SeqCst);

        let results = self.channel_manager.start_all().await;
        if !results.is_empty() && results.iter().all(std::result::Result::is_err) {
            self.running.store(false, Ordering::SeqCst);
            let first = results
                .into_iter()
                .find_map(std::result::Result::err)
                .map_or_else(|| BotError::internal("no channel started"), BotError::from);
            return Err(first);
        }

        info!("Bot started. Press Ctrl+C to stop.");
        let outcome = tokio::select! {
            () = shutdown => Ok(()),
            (channel, closed) = self.channel_manager.closed_any() => {
                match &closed {
                    Ok(()) => info!(%channel, "channel finished"),
                    Err(e) => error!(%channel, error = %e, "channel failed"),
                }
                closed.map_err(BotError::from)
            }
        };

        info!("Shutting down bot...");
        self.channel_manager.stop_all().await;
        self.running.store(false, Ordering::SeqCst);
        info!("Bot stopped");
        outcome
    }

    /// Check if the bot is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Status of the bot and its channels.
    pub async fn status(&self) -> BotStatus {
        BotStatus {
            running: self.is_running(),
            conversations: self.store.len(),
            channels: self.channel_manager.status_all().await,
        }
    }
}

/// Bot status information.
#[derive(Debug, Clone, serde::Serialize)]
pub struct BotStatus {
    /// Whether the bot is running.
    pub running: bool,
    /// Number of users with a conversation.
    pub conversations: usize,
    /// Channel statuses.
    pub channels: Vec<ChannelStatus>,
}

/// Builder for creating a [`Bot`].
pub struct BotBuilder {
    config: BotConfig,
    provider: Option<Arc<dyn CompletionProvider>>,
}

impl std::fmt::Debug for BotBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotBuilder")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl BotBuilder {
    /// Create a builder from a resolved configuration.
    #[must_use]
    pub fn new(config: BotConfig) -> Self {
        Self {
            config,
            provider: None,
        }
    }

    /// Use a specific completion provider instead of the `OpenAI` client.
    #[must_use]
    pub fn provider(mut self, provider: Arc<dyn CompletionProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Build the bot.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the `OpenAI` client cannot be built.
    pub fn build(self) -> Result<Bot> {
        let provider = match self.provider {
            Some(provider) => provider,
            None => openai_provider(&self.config)?,
        };

        let store = Arc::new(ConversationManager::new(
            self.config.max_conversation_messages,
            self.config.system_prompt.as_str(),
        ));
        let gateway = CompletionGateway::new(provider, self.config.request_timeout);
        let dispatcher = Arc::new(CommandDispatcher::new(
            Arc::clone(&store),
            gateway,
            DispatcherConfig::from(&self.config),
        ));

        info!(
            model = %self.config.openai_model,
            max_messages = self.config.max_conversation_messages.get(),
            timeout_secs = self.config.request_timeout.as_secs(),
            "bot initialized"
        );

        Ok(Bot {
            store,
            channel_manager: ChannelManager::new(Arc::clone(&dispatcher)),
            dispatcher,
            running: AtomicBool::new(false),
        })
    }
}

/// Build the `OpenAI` provider described by `config`.
///
/// # Errors
///
/// Returns a configuration error if the API key is blank or the HTTP client
/// cannot be built.
pub fn openai_provider(config: &BotConfig) -> Result<Arc<dyn CompletionProvider>> {
    // Leave headroom over the gateway timeout so the gateway reports it.
    let http = HttpClientConfig {
        timeout_secs: Some(config.request_timeout.as_secs().saturating_add(5)),
        ..HttpClientConfig::default()
    };
    let client = OpenAIClient::builder()
        .api_key(config.openai_api_key.as_str())
        .base_url(config.openai_base_url.as_str())
        .http_config(http)
        .build()
        .map_err(|e| BotError::config(e.to_string()))?;
    Ok(Arc::new(client))
}

/// Resolve on Ctrl-C, or SIGTERM on Unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl-C"),
        () = terminate => info!("Received SIGTERM"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{ChannelBase, ChannelState};
    use crate::dispatcher::{Command, Invocation, ReplyKind};
    use crate::error::{ChannelError, ChannelResult};
    use async_trait::async_trait;
    use parley::providers::MockProvider;
    use std::time::Duration;

    fn config() -> BotConfig {
        BotConfig::from_lookup(|name| match name {
            "OPENAI_API_KEY" => Some("sk-test".into()),
            "MAX_CONVERSATION_MESSAGES" => Some("4".into()),
            _ => None,
        })
        .unwrap()
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Behavior {
        Serve,
        FailToStart,
        FailAfterStart,
    }

    #[derive(Debug)]
    struct FakeChannel {
        base: Arc<ChannelBase>,
        behavior: Behavior,
    }

    impl FakeChannel {
        fn new(name: &str, behavior: Behavior) -> Self {
            Self {
                base: Arc::new(ChannelBase::new(name)),
                behavior,
            }
        }
    }

    #[async_trait]
    impl Channel for FakeChannel {
        fn name(&self) -> &str {
            self.base.name()
        }

        async fn start(&self, _dispatcher: Arc<CommandDispatcher>) -> ChannelResult<()> {
            match self.behavior {
                Behavior::FailToStart => return Err(ChannelError::start("no network")),
                Behavior::FailAfterStart => {
                    let base = Arc::clone(&self.base);
                    tokio::spawn(async move {
                        tokio::task::yield_now().await;
                        base.close(Err(ChannelError::auth("invalid token"))).await;
                    });
                }
                Behavior::Serve => {}
            }
            self.base.set_state(ChannelState::Running).await;
            Ok(())
        }

        async fn stop(&self) -> ChannelResult<()> {
            self.base.set_state(ChannelState::Stopped).await;
            Ok(())
        }

        async fn status(&self) -> ChannelStatus {
            self.base.build_status().await
        }

        async fn closed(&self) -> ChannelResult<()> {
            self.base.closed().await
        }
    }

    #[tokio::test]
    async fn test_build_wires_store_and_dispatcher() {
        let bot = Bot::builder(config())
            .provider(Arc::new(MockProvider::new().with_reply("hi")))
            .build()
            .unwrap();

        assert_eq!(bot.store().max_messages().get(), 4);

        let reply = bot
            .dispatcher()
            .dispatch(Invocation::direct(1, Command::Prompt("hello".into())))
            .await;
        assert_eq!(reply.kind, ReplyKind::Answer);
        assert_eq!(bot.store().size(1), 2);
    }

    #[tokio::test]
    async fn test_default_provider_is_openai() {
        let bot = Bot::builder(config()).build().unwrap();
        assert!(format!("{:?}", bot.dispatcher()).contains("openai"));
    }

    #[tokio::test]
    async fn test_run_until_starts_and_stops_channels() {
        let bot = Bot::builder(config())
            .provider(Arc::new(MockProvider::new()))
            .build()
            .unwrap();
        bot.add_channel(FakeChannel::new("fake", Behavior::Serve)).await;

        tokio_test::assert_ok!(bot.run_until(async {}).await);

        let status = bot.status().await;
        assert!(!status.running);
        assert_eq!(status.channels.len(), 1);
        assert_eq!(status.channels[0].state, ChannelState::Stopped);
    }

    #[tokio::test]
    async fn test_run_fails_when_no_channel_starts() {
        let bot = Bot::builder(config())
            .provider(Arc::new(MockProvider::new()))
            .build()
            .unwrap();
        bot.add_channel(FakeChannel::new("broken", Behavior::FailToStart))
            .await;

        let err = bot.run_until(async {}).await.unwrap_err();
        assert!(matches!(err, BotError::Channel(ChannelError::StartFailed(_))));
        assert!(!bot.is_running());
    }

    #[tokio::test]
    async fn test_run_returns_when_channel_fails_after_start() {
        let bot = Bot::builder(config())
            .provider(Arc::new(MockProvider::new()))
            .build()
            .unwrap();
        bot.add_channel(FakeChannel::new("discord", Behavior::FailAfterStart))
            .await;
        bot.add_channel(FakeChannel::new("other", Behavior::Serve))
            .await;

        let err = tokio::time::timeout(
            Duration::from_secs(5),
            bot.run_until(std::future::pending()),
        )
        .await
        .expect("run should end once a channel fails")
        .unwrap_err();

        assert!(matches!(err, BotError::Channel(ChannelError::AuthFailed(_))));
        assert!(err.is_fatal());
        assert!(!bot.is_running());

        let status = bot.status().await;
        assert_eq!(status.channels[1].state, ChannelState::Stopped);
    }
}

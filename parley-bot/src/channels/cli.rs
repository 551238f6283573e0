//! Command-line interface channel implementation.
//!
//! The CLI channel reads lines from standard input, dispatches them as a
//! fixed local user in a direct channel and prints replies to standard
//! output. It is the quickest way to try a model configuration without a
//! Discord application.

use crate::channel::{Channel, ChannelBase, ChannelState, ChannelStatus};
use crate::dispatcher::{Command, CommandDispatcher, Invocation, ReplyKind};
use crate::error::{ChannelError, ChannelResult};
use async_trait::async_trait;
use parley::UserId;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{Mutex, RwLock, watch};
use tracing::{debug, info};

/// CLI channel configuration.
#[derive(Debug, Clone)]
pub struct CliChannelConfig {
    /// Prompt string to display before user input.
    pub prompt: String,
    /// Identity the local user is dispatched as.
    pub user_id: UserId,
}

impl Default for CliChannelConfig {
    fn default() -> Self {
        Self {
            prompt: "You: ".to_string(),
            user_id: 0,
        }
    }
}

impl CliChannelConfig {
    /// Create a new CLI channel config.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the prompt string.
    #[must_use]
    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    /// Set the local user id.
    #[must_use]
    pub const fn user_id(mut self, user_id: UserId) -> Self {
        self.user_id = user_id;
        self
    }
}

/// Line source for a console session.
pub type ConsoleInput = Box<dyn AsyncBufRead + Send + Unpin>;

/// Sink for a console session.
pub type ConsoleOutput = Box<dyn AsyncWrite + Send + Unpin>;

/// Command-line interface channel.
///
/// Reads from stdin and writes to stdout unless other streams are supplied
/// with [`CliChannel::with_io`]. The channel closes itself when the session
/// ends, which ends [`Bot::run`](crate::bot::Bot::run).
pub struct CliChannel {
    base: Arc<ChannelBase>,
    config: CliChannelConfig,
    io: Mutex<Option<(ConsoleInput, ConsoleOutput)>>,
    shutdown_tx: RwLock<Option<watch::Sender<bool>>>,
}

impl std::fmt::Debug for CliChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CliChannel")
            .field("base", &self.base)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl CliChannel {
    /// Create a new CLI channel on stdin/stdout.
    #[must_use]
    pub fn new(config: CliChannelConfig) -> Self {
        Self::with_io(
            config,
            Box::new(BufReader::new(tokio::io::stdin())),
            Box::new(tokio::io::stdout()),
        )
    }

    /// Create a CLI channel over the given streams.
    #[must_use]
    pub fn with_io(config: CliChannelConfig, input: ConsoleInput, output: ConsoleOutput) -> Self {
        Self {
            base: Arc::new(ChannelBase::new("cli")),
            config,
            io: Mutex::new(Some((input, output))),
            shutdown_tx: RwLock::new(None),
        }
    }
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        self.base.name()
    }

    async fn start(&self, dispatcher: Arc<CommandDispatcher>) -> ChannelResult<()> {
        let Some((input, output)) = self.io.lock().await.take() else {
            return Err(ChannelError::start("console session already used"));
        };
        self.base.set_state(ChannelState::Starting).await;

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        *self.shutdown_tx.write().await = Some(shutdown_tx);

        let base = Arc::clone(&self.base);
        let config = self.config.clone();
        tokio::spawn(async move {
            tokio::select! {
                result = run_session(&dispatcher, &config, &base, input, output) => {
                    base.close(result).await;
                }
                _ = shutdown_rx.changed() => {
                    debug!("CLI input handler shutting down");
                }
            }
        });

        self.base.set_state(ChannelState::Running).await;
        info!("CLI channel started");

        Ok(())
    }

    async fn stop(&self) -> ChannelResult<()> {
        self.base.set_state(ChannelState::Stopping).await;

        if let Some(tx) = self.shutdown_tx.write().await.take() {
            let _ = tx.send(true);
        }

        self.base.set_state(ChannelState::Stopped).await;
        info!("CLI channel stopped");

        Ok(())
    }

    async fn status(&self) -> ChannelStatus {
        self.base.build_status().await
    }

    async fn closed(&self) -> ChannelResult<()> {
        self.base.closed().await
    }
}

/// Drive one session over an arbitrary reader and writer.
async fn run_session<R, W>(
    dispatcher: &CommandDispatcher,
    config: &CliChannelConfig,
    base: &ChannelBase,
    reader: R,
    mut writer: W,
) -> ChannelResult<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let io_err = |e: std::io::Error| ChannelError::Internal(e.to_string());
    let mut lines = reader.lines();

    writer.write_all(config.prompt.as_bytes()).await.map_err(io_err)?;
    writer.flush().await.map_err(io_err)?;

    while let Some(line) = lines.next_line().await.map_err(io_err)? {
        let trimmed = line.trim();
        if matches!(trimmed, "exit" | "quit" | "/quit") {
            break;
        }

        if let Some(command) = Command::parse_line(trimmed) {
            base.record_received().await;
            let reply = dispatcher
                .dispatch(Invocation::direct(config.user_id, command))
                .await;

            let label = match reply.kind {
                ReplyKind::Answer => "Bot",
                ReplyKind::Info => "Info",
                ReplyKind::Rejected | ReplyKind::Failed => "Error",
            };
            let text = format!("\n{label}: {}\n\n", reply.content);
            writer.write_all(text.as_bytes()).await.map_err(io_err)?;
            base.record_sent().await;
        }

        writer.write_all(config.prompt.as_bytes()).await.map_err(io_err)?;
        writer.flush().await.map_err(io_err)?;
    }

    writer.write_all(b"\n").await.map_err(io_err)?;
    writer.flush().await.map_err(io_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::DispatcherConfig;
    use parley::providers::{CompletionProvider, MockProvider};
    use parley::{CompletionGateway, ConversationManager};
    use std::num::NonZeroUsize;
    use std::time::Duration;

    fn dispatcher(mock: MockProvider) -> CommandDispatcher {
        let store = Arc::new(ConversationManager::new(
            NonZeroUsize::new(10).unwrap(),
            "sys",
        ));
        let gateway = CompletionGateway::new(
            Arc::new(mock) as Arc<dyn CompletionProvider>,
            Duration::from_secs(5),
        );
        CommandDispatcher::new(
            store,
            gateway,
            DispatcherConfig {
                model: "test-model".into(),
                max_output_tokens: 100,
                max_prompt_length: NonZeroUsize::new(100).unwrap(),
            },
        )
    }

    #[tokio::test]
    async fn test_session_dispatches_lines_until_exit() {
        let dispatcher = dispatcher(MockProvider::new().with_reply("pong"));
        let config = CliChannelConfig::new().prompt("> ").user_id(42);
        let base = ChannelBase::new("cli");
        let input: &[u8] = b"ping\n\n/usage\nexit\n/help\n";
        let mut output = Vec::new();

        run_session(&dispatcher, &config, &base, input, &mut output)
            .await
            .unwrap();

        let output = String::from_utf8(output).unwrap();
        assert!(output.contains("Bot: pong"));
        assert!(output.contains("Messages in history: 2/10"));
        assert!(!output.contains("Parley Commands"));

        let status = base.build_status().await;
        assert_eq!(status.messages_received, 2);
        assert_eq!(status.messages_sent, 2);
        assert_eq!(dispatcher.store().size(42), 2);
    }

    #[tokio::test]
    async fn test_session_reset_and_eof() {
        let dispatcher = dispatcher(MockProvider::new().with_reply("a"));
        let config = CliChannelConfig::new();
        let base = ChannelBase::new("cli");
        let input: &[u8] = b"/gpt hello\n/reset";
        let mut output = Vec::new();

        run_session(&dispatcher, &config, &base, input, &mut output)
            .await
            .unwrap();

        let output = String::from_utf8(output).unwrap();
        assert!(output.contains("Info: ✅ Your conversation history has been cleared!"));
        assert_eq!(dispatcher.store().size(0), 0);
    }

    #[tokio::test]
    async fn test_channel_closes_when_session_ends() {
        let dispatcher = Arc::new(dispatcher(MockProvider::new().with_reply("pong")));
        let input: &'static [u8] = b"ping\nquit\n";
        let channel = CliChannel::with_io(
            CliChannelConfig::new().user_id(5),
            Box::new(input),
            Box::new(tokio::io::sink()),
        );

        channel.start(Arc::clone(&dispatcher)).await.unwrap();
        assert_eq!(channel.closed().await, Ok(()));

        let status = channel.status().await;
        assert_eq!(status.state, ChannelState::Stopped);
        assert_eq!(status.messages_sent, 1);
        assert_eq!(dispatcher.store().size(5), 2);

        // The console streams are consumed by the first start.
        assert!(matches!(
            channel.start(dispatcher).await,
            Err(ChannelError::StartFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_stop_before_start_is_clean() {
        let channel = CliChannel::with_io(
            CliChannelConfig::new(),
            Box::new(tokio::io::empty()),
            Box::new(tokio::io::sink()),
        );
        channel.stop().await.unwrap();
        let status = channel.status().await;
        assert_eq!(status.state, ChannelState::Stopped);
        assert!(!channel.is_running().await);
    }

    #[test]
    fn test_config_builder() {
        let config = CliChannelConfig::new().prompt(">> ").user_id(7);
        assert_eq!(config.prompt, ">> ");
        assert_eq!(config.user_id, 7);
    }
}

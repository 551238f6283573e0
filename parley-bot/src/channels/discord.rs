//! Discord channel implementation using serenity.
//!
//! The bot answers four global slash commands: `/gpt prompt:<text>`,
//! `/reset`, `/usage` and `/help`. Commands are registered once the gateway
//! reports ready. A `/gpt` interaction is deferred before the model call so
//! Discord does not time out the interaction, and long answers are split at
//! Discord's message limit.
//!
//! # Example
//!
//! ```rust,ignore
//! use parley_bot::channels::DiscordChannel;
//!
//! let discord = DiscordChannel::new(DiscordChannelConfig::new(token));
//! discord.start(dispatcher).await?;
//! ```

use crate::channel::{Channel, ChannelBase, ChannelState, ChannelStatus};
use crate::dispatcher::{ChannelKind, Command, CommandDispatcher, Invocation, Reply};
use crate::error::{ChannelError, ChannelResult};
use crate::util::{DISCORD_MESSAGE_LIMIT, split_into_chunks};
use async_trait::async_trait;
use parley::UserId;
use serenity::builder::{
    CreateCommand, CreateCommandOption, CreateInteractionResponse,
    CreateInteractionResponseFollowup, CreateInteractionResponseMessage,
};
use serenity::client::{Client, Context, EventHandler};
use serenity::gateway::ShardManager;
use serenity::gateway::GatewayError;
use serenity::model::application::{
    Command as SlashCommand, CommandInteraction, CommandOptionType, Interaction,
    InteractionContext,
};
use serenity::model::gateway::{GatewayIntents, Ready};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Name of the `/gpt` option carrying the prompt text.
const PROMPT_OPTION: &str = "prompt";

/// Discord channel configuration.
#[derive(Clone)]
pub struct DiscordChannelConfig {
    /// Bot token from the Discord developer portal.
    pub token: String,
}

impl std::fmt::Debug for DiscordChannelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordChannelConfig")
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl DiscordChannelConfig {
    /// Create a config with the given bot token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

/// Discord channel implementation.
pub struct DiscordChannel {
    base: Arc<ChannelBase>,
    config: DiscordChannelConfig,
    shard_manager: RwLock<Option<Arc<ShardManager>>>,
}

impl std::fmt::Debug for DiscordChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordChannel")
            .field("base", &self.base)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl DiscordChannel {
    /// Create a new Discord channel.
    #[must_use]
    pub fn new(config: DiscordChannelConfig) -> Self {
        Self {
            base: Arc::new(ChannelBase::new("discord")),
            config,
            shard_manager: RwLock::new(None),
        }
    }
}

/// Slash commands registered on ready.
fn slash_commands() -> Vec<CreateCommand> {
    vec![
        CreateCommand::new("gpt")
            .description("Chat with GPT AI assistant")
            .add_option(
                CreateCommandOption::new(
                    CommandOptionType::String,
                    PROMPT_OPTION,
                    "Your message to GPT",
                )
                .required(true),
            ),
        CreateCommand::new("reset").description("Clear your conversation history"),
        CreateCommand::new("usage").description("View your conversation statistics"),
        CreateCommand::new("help").description("Show available commands"),
    ]
}

/// Whether an interaction came from the bot's one-to-one DM.
///
/// Group DMs have no guild either, so the interaction context decides when
/// Discord sends it.
fn is_bot_dm(context: Option<InteractionContext>, in_guild: bool) -> bool {
    match context {
        Some(context) => matches!(context, InteractionContext::BotDm),
        None => !in_guild,
    }
}

/// Map a gateway failure after login to a channel error.
fn gateway_failure(err: &serenity::Error) -> ChannelError {
    match err {
        serenity::Error::Gateway(GatewayError::InvalidAuthentication) => {
            ChannelError::auth("discord rejected the bot token")
        }
        other => ChannelError::internal(format!("discord gateway error: {other}")),
    }
}

/// Map a slash command to an invocation.
///
/// Returns `None` for unknown command names or a `/gpt` without its prompt.
fn to_invocation(
    name: &str,
    prompt: Option<&str>,
    user_id: UserId,
    direct: bool,
) -> Option<Invocation> {
    let command = match name {
        "gpt" => Command::Prompt(prompt?.to_string()),
        "reset" => Command::Reset,
        "usage" => Command::Usage,
        "help" => Command::Help,
        _ => return None,
    };
    let channel = if direct {
        ChannelKind::Direct
    } else {
        ChannelKind::Shared
    };
    Some(Invocation::new(user_id, channel, command))
}

struct Handler {
    dispatcher: Arc<CommandDispatcher>,
    base: Arc<ChannelBase>,
}

impl Handler {
    async fn handle_command(&self, ctx: &Context, interaction: &CommandInteraction) {
        let prompt = interaction
            .data
            .options
            .iter()
            .find(|option| option.name == PROMPT_OPTION)
            .and_then(|option| option.value.as_str());

        let Some(invocation) = to_invocation(
            &interaction.data.name,
            prompt,
            interaction.user.id.get(),
            is_bot_dm(interaction.context, interaction.guild_id.is_some()),
        ) else {
            warn!(command = %interaction.data.name, "unknown slash command");
            return;
        };

        self.base.record_received().await;

        if let Some(rejection) = self.dispatcher.check(&invocation) {
            self.respond(ctx, interaction, &rejection).await;
            return;
        }

        if matches!(invocation.command, Command::Prompt(_)) {
            if let Err(e) = interaction.defer(&ctx.http).await {
                self.base
                    .record_error(format!("failed to defer interaction: {e}"))
                    .await;
                return;
            }
            let reply = self.dispatcher.dispatch(invocation).await;
            self.follow_up(ctx, interaction, &reply).await;
        } else {
            let reply = self.dispatcher.dispatch(invocation).await;
            self.respond(ctx, interaction, &reply).await;
        }
    }

    /// Answer an interaction that has not been acknowledged yet.
    async fn respond(&self, ctx: &Context, interaction: &CommandInteraction, reply: &Reply) {
        let mut chunks = split_into_chunks(&reply.content, DISCORD_MESSAGE_LIMIT).into_iter();
        let first = chunks.next().unwrap_or_default();

        let message = CreateInteractionResponseMessage::new()
            .content(first)
            .ephemeral(reply.ephemeral);
        if let Err(e) = interaction
            .create_response(&ctx.http, CreateInteractionResponse::Message(message))
            .await
        {
            self.base
                .record_error(format!("failed to send reply: {e}"))
                .await;
            return;
        }
        self.base.record_sent().await;

        let rest: Vec<String> = chunks.collect();
        if !rest.is_empty() {
            self.send_followups(ctx, interaction, rest, reply.ephemeral)
                .await;
        }
    }

    /// Deliver a reply to an interaction that was deferred.
    async fn follow_up(&self, ctx: &Context, interaction: &CommandInteraction, reply: &Reply) {
        let chunks = split_into_chunks(&reply.content, DISCORD_MESSAGE_LIMIT);
        if self
            .send_followups(ctx, interaction, chunks, reply.ephemeral)
            .await
        {
            self.base.record_sent().await;
        }
    }

    async fn send_followups(
        &self,
        ctx: &Context,
        interaction: &CommandInteraction,
        chunks: Vec<String>,
        ephemeral: bool,
    ) -> bool {
        for chunk in chunks {
            let followup = CreateInteractionResponseFollowup::new()
                .content(chunk)
                .ephemeral(ephemeral);
            if let Err(e) = interaction.create_followup(&ctx.http, followup).await {
                self.base
                    .record_error(format!("failed to send follow-up: {e}"))
                    .await;
                return false;
            }
        }
        true
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!(user = %ready.user.name, id = %ready.user.id, "discord bot is ready");

        match SlashCommand::set_global_commands(&ctx.http, slash_commands()).await {
            Ok(commands) => {
                for command in &commands {
                    info!(command = %format!("/{}", command.name), "registered command");
                }
                self.base.set_state(ChannelState::Running).await;
            }
            Err(e) => {
                self.base
                    .record_error(format!("failed to register slash commands: {e}"))
                    .await;
            }
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command) = interaction {
            debug!(command = %command.data.name, user_id = %command.user.id, "slash command received");
            self.handle_command(&ctx, &command).await;
        }
    }
}

#[async_trait]
impl Channel for DiscordChannel {
    fn name(&self) -> &str {
        self.base.name()
    }

    async fn start(&self, dispatcher: Arc<CommandDispatcher>) -> ChannelResult<()> {
        self.base.set_state(ChannelState::Starting).await;

        let intents = GatewayIntents::GUILDS | GatewayIntents::DIRECT_MESSAGES;
        let handler = Handler {
            dispatcher,
            base: Arc::clone(&self.base),
        };

        let mut client = match Client::builder(&self.config.token, intents)
            .event_handler(handler)
            .await
        {
            Ok(client) => client,
            Err(e) => {
                self.base.set_state(ChannelState::Error).await;
                return Err(ChannelError::start(format!("discord client build failed: {e}")));
            }
        };

        *self.shard_manager.write().await = Some(Arc::clone(&client.shard_manager));

        let base = Arc::clone(&self.base);
        tokio::spawn(async move {
            if let Err(e) = client.start().await {
                base.close(Err(gateway_failure(&e))).await;
            }
        });

        info!("Discord channel started, waiting for gateway");
        Ok(())
    }

    async fn stop(&self) -> ChannelResult<()> {
        self.base.set_state(ChannelState::Stopping).await;

        if let Some(manager) = self.shard_manager.write().await.take() {
            manager.shutdown_all().await;
        }

        self.base.set_state(ChannelState::Stopped).await;
        info!("Discord channel stopped");

        Ok(())
    }

    async fn status(&self) -> ChannelStatus {
        self.base.build_status().await
    }

    async fn closed(&self) -> ChannelResult<()> {
        self.base.closed().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_invocation_maps_commands() {
        let inv = to_invocation("gpt", Some("hello"), 11, true).unwrap();
        assert_eq!(inv.command, Command::Prompt("hello".into()));
        assert_eq!(inv.channel, ChannelKind::Direct);
        assert_eq!(inv.user_id, 11);

        let inv = to_invocation("usage", None, 11, false).unwrap();
        assert_eq!(inv.command, Command::Usage);
        assert_eq!(inv.channel, ChannelKind::Shared);

        assert_eq!(
            to_invocation("reset", None, 1, false).unwrap().command,
            Command::Reset
        );
        assert_eq!(
            to_invocation("help", None, 1, true).unwrap().command,
            Command::Help
        );
    }

    #[test]
    fn test_to_invocation_rejects_unknown_or_incomplete() {
        assert!(to_invocation("gpt", None, 1, true).is_none());
        assert!(to_invocation("ban", None, 1, true).is_none());
    }

    #[test]
    fn test_only_bot_dm_is_direct() {
        assert!(is_bot_dm(Some(InteractionContext::BotDm), false));
        assert!(!is_bot_dm(Some(InteractionContext::PrivateChannel), false));
        assert!(!is_bot_dm(Some(InteractionContext::Guild), true));
        assert!(is_bot_dm(None, false));
        assert!(!is_bot_dm(None, true));
    }

    #[test]
    fn test_rejected_token_is_auth_failure() {
        let err = gateway_failure(&serenity::Error::Gateway(
            GatewayError::InvalidAuthentication,
        ));
        assert!(matches!(err, ChannelError::AuthFailed(_)));

        let err = gateway_failure(&serenity::Error::Gateway(GatewayError::NoAuthentication));
        assert!(matches!(err, ChannelError::Internal(_)));
    }

    #[test]
    fn test_four_commands_registered() {
        assert_eq!(slash_commands().len(), 4);
    }

    #[test]
    fn test_config_debug_redacts_token() {
        let config = DiscordChannelConfig::new("very-secret");
        assert!(!format!("{config:?}").contains("very-secret"));
    }

    #[tokio::test]
    async fn test_new_channel_is_stopped() {
        let channel = DiscordChannel::new(DiscordChannelConfig::new("token"));
        assert_eq!(channel.name(), "discord");
        assert!(!channel.is_running().await);
    }
}

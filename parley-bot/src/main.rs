//! Parley Bot CLI - Discord to chat-completion relay
//!
//! A command-line interface for running the Parley bot.

#![allow(clippy::print_stdout)] // CLI program intentionally uses stdout

use clap::{Args, Parser, Subcommand};
use parley::{CompletionGateway, Message};
use parley_bot::bot::openai_provider;
use parley_bot::config::{log_dir_from_env, vars};
use parley_bot::logging::{self, LogOptions};
use parley_bot::prelude::*;
use std::process::ExitCode;
use std::time::Duration;

/// Parley - relays Discord direct messages to a chat-completion model
#[derive(Parser)]
#[command(name = "parley")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Disable the rotating log file
    #[arg(long, global = true)]
    no_log_file: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to Discord and serve slash commands (default)
    Run,

    /// Start an interactive chat session on this terminal
    Chat(ChatArgs),

    /// Show resolved configuration
    Status,

    /// Send a single prompt to the model and print the answer
    Probe(ProbeArgs),
}

/// Arguments for the chat command
#[derive(Args)]
struct ChatArgs {
    /// Custom prompt prefix
    #[arg(short, long, default_value = "You: ")]
    prompt: String,
}

/// Arguments for the probe command
#[derive(Args)]
struct ProbeArgs {
    /// Prompt to send
    #[arg(short, long, default_value = "hello how are you")]
    prompt: String,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    dotenvy::dotenv().ok();
    let options = LogOptions {
        verbosity: cli.verbose,
        log_dir: (!cli.no_log_file).then(log_dir_from_env),
    };
    // Held until exit so buffered file output is flushed.
    let _log_guard = logging::init(&options).ok();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!(error = %e, "failed to create tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    let result = rt.block_on(run(cli));
    // A console read may still be parked on stdin.
    rt.shutdown_timeout(Duration::from_millis(500));

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is_fatal() => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<()> {
    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => cmd_run().await,
        Commands::Chat(args) => cmd_chat(args).await,
        Commands::Status => cmd_status(),
        Commands::Probe(args) => cmd_probe(args).await,
    }
}

/// Connect to Discord.
#[cfg(feature = "discord")]
async fn cmd_run() -> Result<()> {
    tracing::info!("Starting Parley...");

    let config = BotConfig::from_env()?;
    let token = config.discord_token()?.to_string();

    let bot = Bot::builder(config).build()?;
    bot.add_channel(DiscordChannel::new(DiscordChannelConfig::new(token)))
        .await;

    bot.run().await
}

#[cfg(not(feature = "discord"))]
async fn cmd_run() -> Result<()> {
    Err(BotError::config(
        "built without the `discord` feature; use `parley chat` instead",
    ))
}

/// Start interactive chat.
async fn cmd_chat(args: ChatArgs) -> Result<()> {
    let config = BotConfig::from_env()?;
    let model = config.openai_model.clone();
    let bot = Bot::builder(config).build()?;

    println!("Parley Chat | model {model} | type 'exit' to quit\n");

    let cli_config = CliChannelConfig::new().prompt(args.prompt);
    bot.add_channel(CliChannel::new(cli_config)).await;
    bot.run().await
}

/// Show status.
fn cmd_status() -> Result<()> {
    println!("Parley Status\n");

    println!("Configuration:");
    match BotConfig::from_env() {
        Ok(config) => {
            println!("  Valid: yes");
            println!("{config:#?}");
        }
        Err(e) => println!("  Valid: no ({e})"),
    }

    println!();
    println!("Environment:");
    for name in vars::ALL {
        print_env_status(name);
    }

    Ok(())
}

/// One-shot completion against the configured model.
async fn cmd_probe(args: ProbeArgs) -> Result<()> {
    let config = BotConfig::from_env()?;
    let gateway = CompletionGateway::new(openai_provider(&config)?, config.request_timeout);

    println!("Sending to {}: {}", config.openai_model, args.prompt);

    let messages = vec![
        Message::system(config.system_prompt.as_str()),
        Message::user(args.prompt),
    ];
    let answer = gateway
        .complete(
            messages,
            &config.openai_model,
            config.max_response_tokens.get(),
        )
        .await
        .map_err(|e| BotError::internal(format!("probe failed: {e}")))?;

    println!("\n{answer}");
    Ok(())
}

/// Print environment variable status.
fn print_env_status(name: &str) {
    let status = if std::env::var(name).is_ok_and(|v| !v.trim().is_empty()) {
        "set"
    } else {
        "-"
    };
    println!("  {name}: {status}");
}

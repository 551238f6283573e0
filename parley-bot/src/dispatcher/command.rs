//! Inbound commands and outbound replies.

use parley::UserId;

/// A user operation, independent of the transport it arrived on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Send a prompt to the model.
    Prompt(String),
    /// Clear the caller's history.
    Reset,
    /// Report history size and model.
    Usage,
    /// Show the command list.
    Help,
}

impl Command {
    /// Slash-command name for this command.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Prompt(_) => "gpt",
            Self::Reset => "reset",
            Self::Usage => "usage",
            Self::Help => "help",
        }
    }

    /// Whether the command is only accepted in a direct channel.
    #[must_use]
    pub const fn requires_direct(&self) -> bool {
        !matches!(self, Self::Help)
    }

    /// Parse a line typed into a local console.
    ///
    /// `/reset`, `/usage` and `/help` map to their commands, `/gpt <text>`
    /// and any other non-empty text is a prompt. Returns `None` for blank
    /// input and for `/gpt` without text.
    #[must_use]
    pub fn parse_line(line: &str) -> Option<Self> {
        let trimmed = line.trim();
        match trimmed {
            "" => None,
            "/reset" => Some(Self::Reset),
            "/usage" => Some(Self::Usage),
            "/help" => Some(Self::Help),
            _ => {
                let text = match trimmed.strip_prefix("/gpt") {
                    Some(rest) if rest.is_empty() || rest.starts_with(char::is_whitespace) => {
                        rest.trim()
                    }
                    _ => trimmed,
                };
                (!text.is_empty()).then(|| Self::Prompt(text.to_string()))
            }
        }
    }
}

/// Where a command was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    /// Private one-to-one channel with the bot.
    Direct,
    /// Guild channel or group conversation.
    Shared,
}

/// A command together with who issued it and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Platform identity of the caller.
    pub user_id: UserId,
    /// Channel the command arrived on.
    pub channel: ChannelKind,
    /// The command itself.
    pub command: Command,
}

impl Invocation {
    /// Create an invocation.
    #[must_use]
    pub const fn new(user_id: UserId, channel: ChannelKind, command: Command) -> Self {
        Self {
            user_id,
            channel,
            command,
        }
    }

    /// Create an invocation from a direct channel.
    #[must_use]
    pub const fn direct(user_id: UserId, command: Command) -> Self {
        Self::new(user_id, ChannelKind::Direct, command)
    }
}

/// What a reply represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    /// Model output.
    Answer,
    /// Confirmation, usage or help text.
    Info,
    /// Policy rejection; nothing was changed.
    Rejected,
    /// The request was accepted but could not be completed.
    Failed,
}

/// Text to deliver back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Message body.
    pub content: String,
    /// Only the caller should see it.
    pub ephemeral: bool,
    /// What the reply represents.
    pub kind: ReplyKind,
}

impl Reply {
    /// A model answer.
    #[must_use]
    pub fn answer(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ephemeral: false,
            kind: ReplyKind::Answer,
        }
    }

    /// An informational reply.
    #[must_use]
    pub fn info(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ephemeral: false,
            kind: ReplyKind::Info,
        }
    }

    /// A rejection only the caller sees.
    #[must_use]
    pub fn rejected(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ephemeral: true,
            kind: ReplyKind::Rejected,
        }
    }

    /// A failure notice.
    #[must_use]
    pub fn failed(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ephemeral: false,
            kind: ReplyKind::Failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line() {
        assert_eq!(Command::parse_line("  "), None);
        assert_eq!(Command::parse_line("/reset"), Some(Command::Reset));
        assert_eq!(Command::parse_line(" /usage "), Some(Command::Usage));
        assert_eq!(Command::parse_line("/help"), Some(Command::Help));
        assert_eq!(
            Command::parse_line("/gpt  what is rust?"),
            Some(Command::Prompt("what is rust?".into()))
        );
        assert_eq!(
            Command::parse_line("hello there"),
            Some(Command::Prompt("hello there".into()))
        );
    }

    #[test]
    fn test_parse_line_gpt_without_text() {
        assert_eq!(Command::parse_line("/gpt"), None);
        assert_eq!(Command::parse_line("/gpt    "), None);
        assert_eq!(Command::parse_line("/gpt\tx"), Some(Command::Prompt("x".into())));
        assert_eq!(
            Command::parse_line("/gptx"),
            Some(Command::Prompt("/gptx".into()))
        );
    }

    #[test]
    fn test_only_help_allowed_outside_direct() {
        assert!(!Command::Help.requires_direct());
        assert!(Command::Reset.requires_direct());
        assert!(Command::Usage.requires_direct());
        assert!(Command::Prompt("x".into()).requires_direct());
    }

    #[test]
    fn test_rejections_are_ephemeral() {
        assert!(Reply::rejected("no").ephemeral);
        assert!(!Reply::answer("yes").ephemeral);
        assert_eq!(Reply::failed("oops").kind, ReplyKind::Failed);
    }
}

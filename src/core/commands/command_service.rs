// Bot command service - recognizes commands addressed to the bot and answers them.
//
// This service handles:
// - Filtering the event stream for direct mentions of the bot
// - Mapping command text to a response through a command table
// - The connect-then-poll loop that ties both to a messaging client
//
// NO Slack HTTP or websocket code here - that lives in the infra layer.

use super::command_models::{BotContext, Command, CommandResponse, IdentityError, SlackEvent};
use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Keyword that selects the acknowledgment response.
pub const EXAMPLE_COMMAND: &str = "do";

/// Delay between two reads of the event stream.
pub const DEFAULT_READ_DELAY: Duration = Duration::from_secs(1);

/// A mention at the very start of the text: `<@U123>` followed by anything.
static MENTION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^<@(|[WU].+?)>(.*)").expect("mention regex is a valid literal")
});

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum MessagingError {
    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Not connected")]
    NotConnected,

    #[error("Event stream closed")]
    Disconnected,

    #[error("Slack API error: {0}")]
    Api(String),

    #[error(transparent)]
    Identity(#[from] IdentityError),
}

// ============================================================================
// MESSAGING TRAIT (PORT)
// ============================================================================

/// The real-time messaging system the bot listens on.
#[async_trait]
pub trait MessagingClient: Send + Sync {
    /// Open the real-time connection.
    async fn connect(&self) -> Result<(), MessagingError>;

    /// The bot's own user id.
    async fn resolve_own_identity(&self) -> Result<String, MessagingError>;

    /// Everything received since the last call, in arrival order.
    /// Never waits; returns an empty batch when nothing is pending.
    async fn read_available_events(&self) -> Result<Vec<SlackEvent>, MessagingError>;

    async fn post_message(&self, channel: &str, text: &str) -> Result<(), MessagingError>;
}

// ============================================================================
// MENTION FILTER
// ============================================================================

/// Split a direct mention off the start of `text`.
///
/// Returns the mentioned user id and the rest of the message with surrounding
/// whitespace stripped, or `None` when the text does not start with a mention.
pub fn parse_direct_mention(text: &str) -> Option<(String, String)> {
    let captures = MENTION_REGEX.captures(text)?;
    let user_id = captures.get(1).map_or("", |m| m.as_str());
    let message = captures.get(2).map_or("", |m| m.as_str()).trim();
    Some((user_id.to_string(), message.to_string()))
}

/// Find the first command addressed to `bot_id` in a batch of events.
///
/// Scanning stops at the first match, so a batch yields at most one command.
pub fn parse_bot_commands(events: &[SlackEvent], bot_id: &str) -> Option<Command> {
    for event in events {
        if !event.is_user_message() {
            continue;
        }
        let (Some(text), Some(channel)) = (event.text(), event.channel()) else {
            continue;
        };
        if let Some((user_id, message)) = parse_direct_mention(text) {
            if user_id == bot_id {
                return Some(Command {
                    text: message,
                    channel: channel.to_string(),
                });
            }
        }
    }
    None
}

// ============================================================================
// COMMAND TABLE
// ============================================================================

/// Produces the response text for a command.
pub type CommandHandler = fn(&Command) -> String;

struct CommandRoute {
    prefix: String,
    handler: CommandHandler,
}

/// Maps command prefixes to handlers. Routes are checked in insertion order;
/// the first prefix the command text starts with wins. Unmatched commands get
/// the default response.
pub struct CommandTable {
    routes: Vec<CommandRoute>,
    default_response: String,
}

impl CommandTable {
    pub fn new(default_response: impl Into<String>) -> Self {
        Self {
            routes: Vec::new(),
            default_response: default_response.into(),
        }
    }

    /// The stock table: one trigger word with a placeholder acknowledgment,
    /// and help text pointing at that word for everything else.
    pub fn starter(trigger_word: &str) -> Self {
        Self::new(format!("Not sure what you mean. Try *{}*.", trigger_word))
            .route(trigger_word, acknowledge)
    }

    pub fn route(mut self, prefix: impl Into<String>, handler: CommandHandler) -> Self {
        self.routes.push(CommandRoute {
            prefix: prefix.into(),
            handler,
        });
        self
    }

    /// Build the response for a command, addressed to the command's channel.
    pub fn dispatch(&self, command: &Command) -> CommandResponse {
        let text = self
            .routes
            .iter()
            .find(|route| command.text.starts_with(&route.prefix))
            .map(|route| (route.handler)(command))
            .unwrap_or_else(|| self.default_response.clone());

        CommandResponse {
            channel: command.channel.clone(),
            text,
        }
    }
}

fn acknowledge(_command: &Command) -> String {
    "Sure...write some more code then I can do that!".to_string()
}

// ============================================================================
// COMMAND LOOP
// ============================================================================

/// Connects to the messaging system and answers commands until stopped.
pub struct CommandLoop<M: MessagingClient> {
    client: M,
    context: BotContext,
    commands: CommandTable,
    read_delay: Duration,
}

impl<M: MessagingClient> CommandLoop<M> {
    pub fn new(client: M, context: BotContext, commands: CommandTable) -> Self {
        Self {
            client,
            context,
            commands,
            read_delay: DEFAULT_READ_DELAY,
        }
    }

    pub fn with_read_delay(mut self, read_delay: Duration) -> Self {
        self.read_delay = read_delay;
        self
    }

    pub fn context(&self) -> &BotContext {
        &self.context
    }

    pub fn client(&self) -> &M {
        &self.client
    }

    /// Open the connection and resolve the bot's own id. No retries.
    ///
    /// A loop that already knows its id refuses to connect again.
    pub async fn connect(&self) -> Result<(), MessagingError> {
        if let Some(user_id) = self.context.identity.get() {
            return Err(IdentityError::AlreadySet(user_id.to_string()).into());
        }
        self.client.connect().await?;
        let user_id = self.client.resolve_own_identity().await?;
        self.context.identity.set(user_id)?;
        Ok(())
    }

    /// Connect and report the outcome in the log.
    pub async fn start(&self) -> Result<(), MessagingError> {
        match self.connect().await {
            Ok(()) => {
                tracing::info!("Starter Bot connected and running!");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "Connection failed.");
                Err(e)
            }
        }
    }

    /// One fetch-filter-dispatch pass. Returns the command that was answered, if any.
    pub async fn run_once(&self) -> Result<Option<Command>, MessagingError> {
        let bot_id = self
            .context
            .identity
            .get()
            .ok_or(MessagingError::NotConnected)?;

        let events = self.client.read_available_events().await?;
        if !events.is_empty() {
            tracing::debug!(count = events.len(), "Read events");
        }

        let Some(command) = parse_bot_commands(&events, bot_id) else {
            return Ok(None);
        };
        // A bare mention still uses up the batch
        if command.text.is_empty() {
            tracing::debug!(channel = %command.channel, "Ignoring empty mention");
            return Ok(None);
        }

        tracing::debug!(channel = %command.channel, text = %command.text, "Received command");
        let response = self.commands.dispatch(&command);
        self.client
            .post_message(&response.channel, &response.text)
            .await?;
        tracing::debug!(channel = %response.channel, "Posted response");

        Ok(Some(command))
    }

    /// Poll until `stop` is cancelled. The token is checked between
    /// iterations; a pass that has started always finishes.
    pub async fn run(&self, stop: CancellationToken) -> Result<(), MessagingError> {
        while !stop.is_cancelled() {
            self.run_once().await?;

            tokio::select! {
                _ = stop.cancelled() => break,
                _ = tokio::time::sleep(self.read_delay) => {}
            }
        }

        tracing::info!("Command loop stopped");
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

// Bot command domain models.
//
// `SlackEvent` keeps the raw JSON object because the real-time stream mixes
// many event kinds and the mention filter must not fail on unexpected shapes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::OnceLock;
use thiserror::Error;

/// An inbound event from the real-time stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlackEvent(Map<String, Value>);

impl SlackEvent {
    /// Wrap a JSON value. Anything other than an object is not an event.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn event_type(&self) -> Option<&str> {
        self.0.get("type").and_then(Value::as_str)
    }

    /// Edits, joins and other non-user messages carry a `subtype` key.
    /// Its value does not matter, only whether the key exists.
    pub fn has_subtype(&self) -> bool {
        self.0.contains_key("subtype")
    }

    pub fn text(&self) -> Option<&str> {
        self.0.get("text").and_then(Value::as_str)
    }

    pub fn channel(&self) -> Option<&str> {
        self.0.get("channel").and_then(Value::as_str)
    }

    /// A genuine user message: `type == "message"` and no subtype.
    pub fn is_user_message(&self) -> bool {
        self.event_type() == Some("message") && !self.has_subtype()
    }
}

/// Text addressed to the bot, with the mention stripped off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub text: String,
    pub channel: String,
}

/// What the bot posts back for a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResponse {
    pub channel: String,
    pub text: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("Bot identity already resolved as '{0}'")]
    AlreadySet(String),
}

/// The bot's own user id. Unknown until the connection is up, then set
/// exactly once and read-only.
#[derive(Debug, Default)]
pub struct BotIdentity {
    user_id: OnceLock<String>,
}

impl BotIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, user_id: impl Into<String>) -> Result<(), IdentityError> {
        self.user_id
            .set(user_id.into())
            .map_err(|_| IdentityError::AlreadySet(self.get().unwrap_or_default().to_string()))
    }

    pub fn get(&self) -> Option<&str> {
        self.user_id.get().map(String::as_str)
    }
}

/// State shared by everything running inside the command loop.
#[derive(Debug, Default)]
pub struct BotContext {
    pub identity: BotIdentity,
}

impl BotContext {
    pub fn new() -> Self {
        Self::default()
    }
}

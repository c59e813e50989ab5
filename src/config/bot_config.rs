// Static configuration, read once at process entry and handed to each component.
//
// The file is TOML with three sections:
//
// ```toml
// [auth]
// username = "mod_account"
// password = "..."
// client_id = "..."
// client_secret = "..."
// user_agent = "linux:reddit_slack_bot:v0.1.0 (by /u/mod_account)"
//
// [reddit]
// subreddit = "rust"
// ban_reasons_path = "config/rules.toml"   # optional
//
// [slackbot]
// bot_user_oauth_access_token = "xoxb-..."
// trigger_word = "do"                       # optional
// read_delay_ms = 1000                      # optional
// ```
//
// Secrets can be overridden from the environment (or a `.env` file).

use crate::core::commands::{DEFAULT_READ_DELAY, EXAMPLE_COMMAND};
use crate::core::moderation::{BanReasonTable, RedditCredentials};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "config/bot.toml";
pub const DEFAULT_BAN_REASONS_PATH: &str = "config/rules.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Missing required config key '{0}'")]
    MissingKey(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
struct AuthSection {
    username: Option<String>,
    password: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
    user_agent: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RedditSection {
    subreddit: Option<String>,
    ban_reasons_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct SlackbotSection {
    bot_user_oauth_access_token: Option<String>,
    trigger_word: Option<String>,
    read_delay_ms: Option<u64>,
}

/// The whole configuration file. Sections are validated lazily so each
/// entry point only requires the keys it actually uses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BotConfig {
    #[serde(default)]
    auth: AuthSection,
    #[serde(default)]
    reddit: RedditSection,
    #[serde(default)]
    slackbot: SlackbotSection,
}

/// Everything the moderation client needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedditConfig {
    pub credentials: RedditCredentials,
    pub subreddit: String,
    pub ban_reasons_path: PathBuf,
}

/// Everything the Slack command loop needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlackConfig {
    pub bot_token: String,
    pub trigger_word: String,
    pub read_delay: Duration,
}

impl BotConfig {
    /// Load from `BOT_CONFIG_PATH` (or the default path), with environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("BOT_CONFIG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self::from_path(&path, |key| std::env::var(key).ok())
    }

    pub fn from_path(
        path: &Path,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let contents = read_file(path)?;
        Self::from_toml_str(&contents, env)
    }

    /// Parse a config file body, then apply overrides looked up through `env`.
    pub fn from_toml_str(
        contents: &str,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config: BotConfig = toml::from_str(contents)?;

        if let Some(password) = env("REDDIT_PASSWORD") {
            config.auth.password = Some(password);
        }
        if let Some(secret) = env("REDDIT_CLIENT_SECRET") {
            config.auth.client_secret = Some(secret);
        }
        if let Some(token) = env("SLACK_BOT_TOKEN") {
            config.slackbot.bot_user_oauth_access_token = Some(token);
        }

        Ok(config)
    }

    pub fn reddit(&self) -> Result<RedditConfig, ConfigError> {
        let auth = &self.auth;
        let credentials = RedditCredentials {
            username: required(&auth.username, "auth.username")?,
            password: required(&auth.password, "auth.password")?,
            client_id: required(&auth.client_id, "auth.client_id")?,
            client_secret: required(&auth.client_secret, "auth.client_secret")?,
            user_agent: required(&auth.user_agent, "auth.user_agent")?,
        };

        Ok(RedditConfig {
            credentials,
            subreddit: required(&self.reddit.subreddit, "reddit.subreddit")?,
            ban_reasons_path: self
                .reddit
                .ban_reasons_path
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_BAN_REASONS_PATH)),
        })
    }

    pub fn slack(&self) -> Result<SlackConfig, ConfigError> {
        let slackbot = &self.slackbot;
        Ok(SlackConfig {
            bot_token: required(
                &slackbot.bot_user_oauth_access_token,
                "slackbot.bot_user_oauth_access_token",
            )?,
            trigger_word: slackbot
                .trigger_word
                .clone()
                .filter(|word| !word.trim().is_empty())
                .unwrap_or_else(|| EXAMPLE_COMMAND.to_string()),
            read_delay: slackbot
                .read_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_READ_DELAY),
        })
    }
}

/// Load the ban-reason table from its own TOML file (a `[ban_reasons]` table).
pub fn load_ban_reasons(path: &Path) -> Result<BanReasonTable, ConfigError> {
    let contents = read_file(path)?;
    Ok(toml::from_str(&contents)?)
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn required(value: &Option<String>, key: &str) -> Result<String, ConfigError> {
    value
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .map(str::to_string)
        .ok_or_else(|| ConfigError::MissingKey(key.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const FULL: &str = r#"
[auth]
username = "modbot"
password = "hunter2"
client_id = "abcdefghijklmn"
client_secret = "secret"
user_agent = "linux:reddit_slack_bot:v0.1.0 (by /u/modbot)"

[reddit]
subreddit = "rust"

[slackbot]
bot_user_oauth_access_token = "xoxb-file"
"#;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_full_config_parses_with_defaults() {
        let config = BotConfig::from_toml_str(FULL, no_env).unwrap();

        let reddit = config.reddit().unwrap();
        assert_eq!(reddit.subreddit, "rust");
        assert_eq!(reddit.credentials.username, "modbot");
        assert_eq!(reddit.ban_reasons_path, PathBuf::from(DEFAULT_BAN_REASONS_PATH));

        let slack = config.slack().unwrap();
        assert_eq!(slack.bot_token, "xoxb-file");
        assert_eq!(slack.trigger_word, "do");
        assert_eq!(slack.read_delay, Duration::from_secs(1));
    }

    #[test]
    fn test_env_overrides_secrets() {
        let env = |key: &str| match key {
            "SLACK_BOT_TOKEN" => Some("xoxb-env".to_string()),
            "REDDIT_PASSWORD" => Some("from-env".to_string()),
            _ => None,
        };
        let config = BotConfig::from_toml_str(FULL, env).unwrap();

        assert_eq!(config.slack().unwrap().bot_token, "xoxb-env");
        assert_eq!(config.reddit().unwrap().credentials.password, "from-env");
        assert_eq!(config.reddit().unwrap().credentials.client_secret, "secret");
    }

    #[test]
    fn test_missing_keys_are_reported_per_section() {
        let config = BotConfig::from_toml_str(
            "[slackbot]\nbot_user_oauth_access_token = \"xoxb\"\n",
            no_env,
        )
        .unwrap();

        // The Slack side is complete on its own
        assert!(config.slack().is_ok());
        match config.reddit() {
            Err(ConfigError::MissingKey(key)) => assert_eq!(key, "auth.username"),
            other => panic!("expected missing key, got {other:?}"),
        }
    }

    #[test]
    fn test_blank_value_counts_as_missing() {
        let config =
            BotConfig::from_toml_str("[slackbot]\nbot_user_oauth_access_token = \"  \"\n", no_env)
                .unwrap();

        assert!(matches!(config.slack(), Err(ConfigError::MissingKey(_))));
    }

    #[test]
    fn test_optional_slack_settings() {
        let config = BotConfig::from_toml_str(
            "[slackbot]\nbot_user_oauth_access_token = \"xoxb\"\ntrigger_word = \"run\"\nread_delay_ms = 250\n",
            no_env,
        )
        .unwrap();

        let slack = config.slack().unwrap();
        assert_eq!(slack.trigger_word, "run");
        assert_eq!(slack.read_delay, Duration::from_millis(250));
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        assert!(matches!(
            BotConfig::from_toml_str("[auth\nusername = ", no_env),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_from_path_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");

        assert!(matches!(
            BotConfig::from_path(&missing, no_env),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn test_load_ban_reasons_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[ban_reasons]\nrule1 = \"Rule 1: Be civil\"\nrule3 = \"Rule 3: No spam\""
        )
        .unwrap();

        let table = load_ban_reasons(file.path()).unwrap();

        assert_eq!(table.resolve("rule1"), Some("Rule 1: Be civil"));
        assert_eq!(table.resolve("rule3"), Some("Rule 3: No spam"));
        assert_eq!(table.resolve("rule2"), None);
    }
}

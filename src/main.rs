// Entry point of the Slack bot.
//
// This file's job is to:
// 1. Load configuration
// 2. Build the Slack client and command table (dependency injection)
// 3. Connect once, then poll for commands until Ctrl-C

use anyhow::Context;
use reddit_slack_bot::config::BotConfig;
use reddit_slack_bot::core::commands::{BotContext, CommandLoop, CommandTable};
use reddit_slack_bot::infra::slack::SlackRtmClient;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging so we can see what's happening
    tracing_subscriber::fmt::init();

    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    let config = BotConfig::load().context("Failed to load configuration")?;
    let slack = config.slack().context("Invalid [slackbot] configuration")?;

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================

    let client = SlackRtmClient::new(slack.bot_token);
    let commands = CommandTable::starter(&slack.trigger_word);
    let bot = CommandLoop::new(client, BotContext::new(), commands).with_read_delay(slack.read_delay);

    // One connection attempt; no retry loop
    bot.start().await.context("Could not connect to Slack")?;

    let stop = CancellationToken::new();
    let signal_stop = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Ctrl-C received, stopping after the current pass");
            signal_stop.cancel();
        }
    });

    bot.run(stop).await.context("Command loop failed")?;
    Ok(())
}

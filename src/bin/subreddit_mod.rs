// Moderation actions on the configured subreddit, from the command line.
//
// Reads the [auth] and [reddit] sections of the bot config and the
// ban-reason table, then runs one action and prints the result.

use anyhow::Context;
use clap::{Parser, Subcommand};
use reddit_slack_bot::config::{load_ban_reasons, BotConfig};
use reddit_slack_bot::core::moderation::{BanOptions, ModerationService};
use reddit_slack_bot::infra::reddit::RedditSession;

#[derive(Debug, Parser)]
#[command(
    name = "subreddit_mod",
    about = "Run moderation actions on the configured subreddit",
    after_help = "Examples:\n  subreddit_mod rules\n  subreddit_mod ban spammer rule3 --duration-days 7 --note \"link spam\""
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Ban a user with a reason from the ban-reason table")]
    Ban {
        /// Reddit username to ban
        user: String,
        /// Key into the ban-reason table, usually a rule number
        reason: String,
        #[arg(long, help = "Message sent to the banned user")]
        message: Option<String>,
        #[arg(long, help = "Ban length in days; omit for a permanent ban")]
        duration_days: Option<u32>,
        #[arg(long, help = "Moderator-only note, not sent to the user")]
        note: Option<String>,
    },
    #[command(about = "Print the subreddit rules as JSON")]
    Rules,
    #[command(about = "Print subreddit traffic statistics as JSON")]
    Traffic,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    let config = BotConfig::load().context("Failed to load configuration")?;
    let reddit = config.reddit().context("Invalid [auth]/[reddit] configuration")?;
    let ban_reasons = load_ban_reasons(&reddit.ban_reasons_path)
        .context("Failed to load ban reasons")?;

    let session = RedditSession::new(reddit.credentials, &reddit.subreddit)?;
    let moderation = ModerationService::new(session, ban_reasons);

    match cli.command {
        Command::Ban {
            user,
            reason,
            message,
            duration_days,
            note,
        } => {
            let options = BanOptions {
                ban_message: message,
                duration_days,
                note,
            };
            moderation.ban(&user, &reason, &options).await?;

            let length = if options.is_permanent() {
                "permanently".to_string()
            } else {
                format!("for {} days", options.duration_days.unwrap_or_default())
            };
            println!(
                "Banned u/{} from r/{} {}",
                user,
                moderation.subreddit(),
                length
            );
        }
        Command::Rules => {
            let rules = moderation.rules().await?;
            println!("{}", serde_json::to_string_pretty(&rules)?);
        }
        Command::Traffic => {
            let traffic = moderation.traffic().await?;
            println!("{}", serde_json::to_string_pretty(&traffic)?);
        }
    }

    Ok(())
}

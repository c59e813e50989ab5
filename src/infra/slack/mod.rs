// Slack infra layer.
// - `slack_client.rs` talks to the Slack Web API and reads the RTM socket.

#[path = "slack_client.rs"]
pub mod slack_client;

pub use slack_client::SlackRtmClient;

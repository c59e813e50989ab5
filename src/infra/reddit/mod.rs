// Reddit infra layer.
// - `reddit_client.rs` authenticates and talks to the Reddit OAuth API.

#[path = "reddit_client.rs"]
pub mod reddit_client;

pub use reddit_client::RedditSession;

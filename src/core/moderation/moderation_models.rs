// Moderation domain models - data structures for subreddit moderation.
//
// These are pure domain types with no HTTP dependencies.
// The infra layer maps Reddit's JSON payloads onto them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Credentials for a Reddit "script" application.
///
/// **Two-factor auth is not supported.** The values come from
/// https://www.reddit.com/prefs/apps/ for the account that registered the app.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RedditCredentials {
    pub username: String,
    pub password: String,
    /// The 14 character string listed under "personal use script".
    pub client_id: String,
    /// The 27 character secret listed next to the app.
    pub client_secret: String,
    /// Should name the platform, the app, a version and a contact username.
    pub user_agent: String,
}

/// Fixed mapping from a short reason key (usually a rule number) to the
/// human-readable ban reason. Loaded once and never mutated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BanReasonTable {
    #[serde(default)]
    ban_reasons: BTreeMap<String, String>,
}

impl BanReasonTable {
    pub fn new(ban_reasons: BTreeMap<String, String>) -> Self {
        Self { ban_reasons }
    }

    /// Look up the reason text for a key.
    pub fn resolve(&self, key: &str) -> Option<&str> {
        self.ban_reasons.get(key).map(String::as_str)
    }
}

impl FromIterator<(String, String)> for BanReasonTable {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Optional settings for a ban.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BanOptions {
    /// Message sent to the banned user.
    pub ban_message: Option<String>,
    /// Length of the ban in days. `None` means permanent.
    pub duration_days: Option<u32>,
    /// Moderator-only note, never shown to the user.
    pub note: Option<String>,
}

impl BanOptions {
    pub fn is_permanent(&self) -> bool {
        self.duration_days.is_none()
    }
}

/// A single subreddit rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubredditRule {
    pub short_name: String,
    pub description: String,
    /// What the rule applies to: "link", "comment" or "all".
    pub kind: String,
    pub violation_reason: String,
    pub priority: u32,
    pub created_utc: Option<DateTime<Utc>>,
}

/// The rule set of the bound subreddit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SubredditRules {
    pub rules: Vec<SubredditRule>,
}

/// One bucket of traffic statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrafficPoint {
    pub timestamp: DateTime<Utc>,
    pub uniques: u64,
    pub pageviews: u64,
    /// Only reported for daily buckets.
    pub subscriptions: Option<u64>,
}

/// Traffic statistics keyed by time granularity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TrafficStats {
    pub day: Vec<TrafficPoint>,
    pub hour: Vec<TrafficPoint>,
    pub month: Vec<TrafficPoint>,
}

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::core::moderation::{
    BanOptions, ModerationError, RedditCredentials, SubredditRule, SubredditRules,
    SubredditSession, TrafficPoint, TrafficStats,
};

const TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";
const OAUTH_BASE_URL: &str = "https://oauth.reddit.com";

/// Tokens are refreshed this long before Reddit says they expire.
const TOKEN_EXPIRY_MARGIN_SECS: i64 = 60;

struct AccessToken {
    value: String,
    expires_at: DateTime<Utc>,
}

/// Reddit "script" app session bound to one subreddit.
///
/// Authenticates lazily with the password grant on first use and reuses the
/// bearer token until shortly before it expires.
pub struct RedditSession {
    client: Client,
    credentials: RedditCredentials,
    subreddit: String,
    base_url: String,
    token: Mutex<Option<AccessToken>>,
}

impl RedditSession {
    pub fn new(credentials: RedditCredentials, subreddit: &str) -> Result<Self, ModerationError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&credentials.user_agent)
                .map_err(|e| ModerationError::Reddit(e.to_string()))?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| ModerationError::Reddit(e.to_string()))?;

        Ok(Self {
            client,
            credentials,
            subreddit: subreddit.trim_start_matches("r/").to_string(),
            base_url: OAUTH_BASE_URL.to_string(),
            token: Mutex::new(None),
        })
    }

    async fn access_token(&self) -> Result<String, ModerationError> {
        let mut token = self.token.lock().await;
        if let Some(current) = token.as_ref() {
            if current.expires_at > Utc::now() {
                return Ok(current.value.clone());
            }
        }

        let resp = self
            .client
            .post(TOKEN_URL)
            .basic_auth(
                &self.credentials.client_id,
                Some(&self.credentials.client_secret),
            )
            .form(&[
                ("grant_type", "password"),
                ("username", self.credentials.username.as_str()),
                ("password", self.credentials.password.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ModerationError::Reddit(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(ModerationError::Reddit(format!(
                "Authentication failed: {}",
                resp.status()
            )));
        }

        let body: ApiToken = resp
            .json()
            .await
            .map_err(|e| ModerationError::Reddit(e.to_string()))?;

        // Reddit answers bad credentials with 200 and an `error` field
        let value = match (body.access_token, body.error) {
            (Some(value), _) => value,
            (None, Some(error)) => {
                return Err(ModerationError::Reddit(format!(
                    "Authentication failed: {}",
                    error
                )))
            }
            (None, None) => {
                return Err(ModerationError::Reddit(
                    "Authentication response had no access token".to_string(),
                ))
            }
        };

        let lifetime = body.expires_in.unwrap_or(3600) - TOKEN_EXPIRY_MARGIN_SECS;
        *token = Some(AccessToken {
            value: value.clone(),
            expires_at: Utc::now() + Duration::seconds(lifetime.max(0)),
        });
        tracing::debug!(username = %self.credentials.username, "Authenticated with Reddit");

        Ok(value)
    }

    fn subreddit_url(&self, path: &str) -> String {
        format!("{}/r/{}/{}", self.base_url, self.subreddit, path)
    }

    async fn send_json<T: for<'de> Deserialize<'de>>(
        &self,
        request: RequestBuilder,
        what: &str,
    ) -> Result<T, ModerationError> {
        let token = self.access_token().await?;
        let resp = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ModerationError::Reddit(e.to_string()))?;

        check_status(resp.status(), what)?;

        resp.json()
            .await
            .map_err(|e| ModerationError::Reddit(e.to_string()))
    }
}

fn check_status(status: StatusCode, what: &str) -> Result<(), ModerationError> {
    if status.is_success() {
        return Ok(());
    }

    let message = if status == StatusCode::TOO_MANY_REQUESTS {
        format!("Rate limited while requesting {}", what)
    } else if status == StatusCode::FORBIDDEN {
        format!("Forbidden: the account cannot moderate {}", what)
    } else {
        format!("Reddit returned {} for {}", status, what)
    };
    Err(ModerationError::Reddit(message))
}

/// Form fields for `POST /r/{subreddit}/api/friend` adding a ban.
fn ban_form(user: &str, reason: &str, options: &BanOptions) -> Vec<(&'static str, String)> {
    let mut form = vec![
        ("api_type", "json".to_string()),
        ("type", "banned".to_string()),
        ("name", user.to_string()),
        ("ban_reason", reason.to_string()),
    ];
    if let Some(message) = &options.ban_message {
        form.push(("ban_message", message.clone()));
    }
    if let Some(days) = options.duration_days {
        form.push(("duration", days.to_string()));
    }
    if let Some(note) = &options.note {
        form.push(("note", note.clone()));
    }
    form
}

fn parse_timestamp(seconds: Option<f64>) -> Option<DateTime<Utc>> {
    seconds.and_then(|s| Utc.timestamp_opt(s as i64, 0).single())
}

fn map_rule(api: ApiRule) -> SubredditRule {
    SubredditRule {
        short_name: api.short_name.unwrap_or_default(),
        description: api.description.unwrap_or_default(),
        kind: api.kind.unwrap_or_else(|| "all".to_string()),
        violation_reason: api.violation_reason.unwrap_or_default(),
        priority: api.priority.unwrap_or_default(),
        created_utc: parse_timestamp(api.created_utc),
    }
}

/// Reddit reports traffic as positional arrays: `[timestamp, uniques, pageviews, subscriptions?]`.
fn map_traffic_rows(rows: Vec<Vec<i64>>) -> Vec<TrafficPoint> {
    rows.into_iter()
        .filter_map(|row| {
            let timestamp = Utc.timestamp_opt(*row.first()?, 0).single()?;
            let count = |i: usize| row.get(i).map(|v| (*v).max(0) as u64);
            Some(TrafficPoint {
                timestamp,
                uniques: count(1).unwrap_or_default(),
                pageviews: count(2).unwrap_or_default(),
                subscriptions: count(3),
            })
        })
        .collect()
}

#[async_trait]
impl SubredditSession for RedditSession {
    fn subreddit(&self) -> &str {
        &self.subreddit
    }

    async fn ban_user(
        &self,
        user: &str,
        reason: &str,
        options: &BanOptions,
    ) -> Result<(), ModerationError> {
        let request = self
            .client
            .post(self.subreddit_url("api/friend"))
            .form(&ban_form(user, reason, options));

        let body: ApiJsonResponse = self.send_json(request, "ban").await?;
        let errors = body.json.map(|j| j.errors).unwrap_or_default();
        if let Some(first) = errors.first() {
            let detail = first
                .iter()
                .filter_map(|v| v.as_str())
                .collect::<Vec<_>>()
                .join(": ");
            return Err(ModerationError::Reddit(detail));
        }

        Ok(())
    }

    async fn rules(&self) -> Result<SubredditRules, ModerationError> {
        let request = self.client.get(self.subreddit_url("about/rules"));
        let body: ApiRules = self.send_json(request, "rules").await?;

        Ok(SubredditRules {
            rules: body.rules.into_iter().map(map_rule).collect(),
        })
    }

    async fn traffic(&self) -> Result<TrafficStats, ModerationError> {
        let request = self.client.get(self.subreddit_url("about/traffic"));
        let body: ApiTraffic = self.send_json(request, "traffic").await?;

        Ok(TrafficStats {
            day: map_traffic_rows(body.day),
            hour: map_traffic_rows(body.hour),
            month: map_traffic_rows(body.month),
        })
    }
}

#[derive(Debug, Deserialize)]
struct ApiToken {
    access_token: Option<String>,
    expires_in: Option<i64>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiJsonResponse {
    json: Option<ApiJsonErrors>,
}

#[derive(Debug, Deserialize)]
struct ApiJsonErrors {
    #[serde(default)]
    errors: Vec<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct ApiRules {
    #[serde(default)]
    rules: Vec<ApiRule>,
}

#[derive(Debug, Deserialize)]
struct ApiRule {
    short_name: Option<String>,
    description: Option<String>,
    kind: Option<String>,
    violation_reason: Option<String>,
    priority: Option<u32>,
    created_utc: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ApiTraffic {
    #[serde(default)]
    day: Vec<Vec<i64>>,
    #[serde(default)]
    hour: Vec<Vec<i64>>,
    #[serde(default)]
    month: Vec<Vec<i64>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn credentials() -> RedditCredentials {
        RedditCredentials {
            username: "modbot".to_string(),
            password: "hunter2".to_string(),
            client_id: "abcdefghijklmn".to_string(),
            client_secret: "secret".to_string(),
            user_agent: "test:reddit_slack_bot:v0.1.0".to_string(),
        }
    }

    #[test]
    fn test_session_normalizes_subreddit_name() {
        let session = RedditSession::new(credentials(), "r/rust").unwrap();
        assert_eq!(session.subreddit(), "rust");
        assert_eq!(
            session.subreddit_url("about/rules"),
            "https://oauth.reddit.com/r/rust/about/rules"
        );
    }

    #[test]
    fn test_ban_form_omits_unset_options() {
        let form = ban_form("alice", "Rule 3: No spam", &BanOptions::default());
        let keys: Vec<_> = form.iter().map(|(k, _)| *k).collect();

        assert_eq!(keys, vec!["api_type", "type", "name", "ban_reason"]);
        assert!(form.contains(&("type", "banned".to_string())));
    }

    #[test]
    fn test_ban_form_carries_duration_and_note() {
        let options = BanOptions {
            ban_message: None,
            duration_days: Some(7),
            note: Some("spam".to_string()),
        };
        let form = ban_form("alice", "Rule 3: No spam", &options);

        assert!(form.contains(&("ban_reason", "Rule 3: No spam".to_string())));
        assert!(form.contains(&("duration", "7".to_string())));
        assert!(form.contains(&("note", "spam".to_string())));
        assert!(!form.iter().any(|(k, _)| *k == "ban_message"));
    }

    #[test]
    fn test_traffic_rows_map_positionally() {
        let api: ApiTraffic = serde_json::from_value(json!({
            "day": [[1700006400, 12, 340, 5]],
            "hour": [[1700006400, 3, 10]],
        }))
        .unwrap();

        let day = map_traffic_rows(api.day);
        assert_eq!(day.len(), 1);
        assert_eq!(day[0].timestamp.timestamp(), 1_700_006_400);
        assert_eq!(day[0].uniques, 12);
        assert_eq!(day[0].pageviews, 340);
        assert_eq!(day[0].subscriptions, Some(5));

        let hour = map_traffic_rows(api.hour);
        assert_eq!(hour[0].subscriptions, None);
        assert!(map_traffic_rows(api.month).is_empty());
    }

    #[test]
    fn test_traffic_rows_skip_empty_rows() {
        assert!(map_traffic_rows(vec![vec![]]).is_empty());
    }

    #[test]
    fn test_rules_map_with_defaults() {
        let api: ApiRules = serde_json::from_value(json!({
            "rules": [
                {"short_name": "No spam", "kind": "link", "priority": 2, "created_utc": 1600000000.0},
                {}
            ]
        }))
        .unwrap();

        let rules: Vec<_> = api.rules.into_iter().map(map_rule).collect();
        assert_eq!(rules[0].short_name, "No spam");
        assert_eq!(rules[0].kind, "link");
        assert_eq!(rules[0].priority, 2);
        assert_eq!(rules[0].created_utc.map(|t| t.timestamp()), Some(1_600_000_000));
        assert_eq!(rules[1].kind, "all");
        assert_eq!(rules[1].created_utc, None);
    }

    #[test]
    fn test_status_errors_are_external() {
        assert!(check_status(StatusCode::OK, "rules").is_ok());
        assert!(matches!(
            check_status(StatusCode::TOO_MANY_REQUESTS, "rules"),
            Err(ModerationError::Reddit(msg)) if msg.contains("Rate limited")
        ));
        assert!(matches!(
            check_status(StatusCode::INTERNAL_SERVER_ERROR, "traffic"),
            Err(ModerationError::Reddit(_))
        ));
    }
}

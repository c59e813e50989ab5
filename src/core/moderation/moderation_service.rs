// Subreddit moderation service - the actions a moderator can take.
//
// This service handles:
// - Banning users with a reason looked up from the ban-reason table
// - Reading the subreddit rules
// - Reading subreddit traffic statistics
//
// All network work is delegated to a `SubredditSession`. Nothing here retries.

use super::moderation_models::{BanOptions, BanReasonTable, SubredditRules, TrafficStats};
use async_trait::async_trait;
use thiserror::Error;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum ModerationError {
    /// The reason key is not in the ban-reason table. This is a configuration
    /// problem, raised before anything is sent to Reddit.
    #[error("Configuration error: unknown ban reason '{0}'")]
    UnknownBanReason(String),

    #[error("Reddit API error: {0}")]
    Reddit(String),
}

// ============================================================================
// SESSION TRAIT (PORT)
// ============================================================================

/// An authenticated Reddit identity bound to exactly one subreddit.
#[async_trait]
pub trait SubredditSession: Send + Sync {
    /// Name of the subreddit this session acts on.
    fn subreddit(&self) -> &str;

    /// Add `user` to the subreddit's banned list.
    async fn ban_user(
        &self,
        user: &str,
        reason: &str,
        options: &BanOptions,
    ) -> Result<(), ModerationError>;

    async fn rules(&self) -> Result<SubredditRules, ModerationError>;

    async fn traffic(&self) -> Result<TrafficStats, ModerationError>;
}

// ============================================================================
// CORE SERVICE
// ============================================================================

/// Executes moderation actions on one subreddit through one session.
pub struct ModerationService<S: SubredditSession> {
    session: S,
    ban_reasons: BanReasonTable,
}

impl<S: SubredditSession> ModerationService<S> {
    pub fn new(session: S, ban_reasons: BanReasonTable) -> Self {
        Self {
            session,
            ban_reasons,
        }
    }

    pub fn subreddit(&self) -> &str {
        self.session.subreddit()
    }

    /// Ban `user` from the subreddit.
    ///
    /// `reason_key` must exist in the ban-reason table. Repeated calls re-apply
    /// the ban with whatever semantics Reddit gives them; prior ban state is not
    /// checked.
    pub async fn ban(
        &self,
        user: &str,
        reason_key: &str,
        options: &BanOptions,
    ) -> Result<(), ModerationError> {
        let reason = self
            .ban_reasons
            .resolve(reason_key)
            .ok_or_else(|| ModerationError::UnknownBanReason(reason_key.to_string()))?;

        tracing::info!(
            subreddit = self.session.subreddit(),
            user,
            reason_key,
            duration_days = ?options.duration_days,
            "Banning user"
        );

        self.session.ban_user(user, reason, options).await
    }

    /// Current rule set of the subreddit.
    pub async fn rules(&self) -> Result<SubredditRules, ModerationError> {
        self.session.rules().await
    }

    /// Traffic statistics of the subreddit.
    pub async fn traffic(&self) -> Result<TrafficStats, ModerationError> {
        self.session.traffic().await
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::moderation::{SubredditRule, TrafficPoint};
    use chrono::{TimeZone, Utc};
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    struct BanCall {
        user: String,
        reason: String,
        options: BanOptions,
    }

    /// Session that records ban calls instead of talking to Reddit
    struct MockSession {
        bans: Mutex<Vec<BanCall>>,
        fail_with: Option<String>,
    }

    impl MockSession {
        fn new() -> Self {
            Self {
                bans: Mutex::new(Vec::new()),
                fail_with: None,
            }
        }

        fn failing(message: &str) -> Self {
            Self {
                bans: Mutex::new(Vec::new()),
                fail_with: Some(message.to_string()),
            }
        }
    }

    #[async_trait]
    impl SubredditSession for MockSession {
        fn subreddit(&self) -> &str {
            "rust"
        }

        async fn ban_user(
            &self,
            user: &str,
            reason: &str,
            options: &BanOptions,
        ) -> Result<(), ModerationError> {
            self.bans.lock().unwrap().push(BanCall {
                user: user.to_string(),
                reason: reason.to_string(),
                options: options.clone(),
            });
            match &self.fail_with {
                Some(message) => Err(ModerationError::Reddit(message.clone())),
                None => Ok(()),
            }
        }

        async fn rules(&self) -> Result<SubredditRules, ModerationError> {
            Ok(SubredditRules {
                rules: vec![SubredditRule {
                    short_name: "Be civil".to_string(),
                    description: "No personal attacks".to_string(),
                    kind: "all".to_string(),
                    violation_reason: "Incivility".to_string(),
                    priority: 0,
                    created_utc: None,
                }],
            })
        }

        async fn traffic(&self) -> Result<TrafficStats, ModerationError> {
            Ok(TrafficStats {
                day: vec![TrafficPoint {
                    timestamp: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
                    uniques: 10,
                    pageviews: 42,
                    subscriptions: Some(1),
                }],
                ..Default::default()
            })
        }
    }

    fn reasons() -> BanReasonTable {
        [
            ("rule1".to_string(), "Rule 1: Be civil".to_string()),
            ("rule3".to_string(), "Rule 3: No spam".to_string()),
        ]
        .into_iter()
        .collect()
    }

    #[tokio::test]
    async fn test_unknown_reason_is_config_error_without_session_call() {
        let service = ModerationService::new(MockSession::new(), reasons());

        let err = service
            .ban("alice", "rule9", &BanOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, ModerationError::UnknownBanReason(ref key) if key == "rule9"));
        assert!(service.session.bans.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ban_sends_resolved_reason_and_options() {
        let service = ModerationService::new(MockSession::new(), reasons());
        let options = BanOptions {
            duration_days: Some(7),
            note: Some("spam".to_string()),
            ..Default::default()
        };

        service.ban("alice", "rule3", &options).await.unwrap();

        let bans = service.session.bans.lock().unwrap();
        assert_eq!(bans.len(), 1);
        assert_eq!(bans[0].user, "alice");
        assert_eq!(bans[0].reason, "Rule 3: No spam");
        assert_eq!(bans[0].options.duration_days, Some(7));
        assert_eq!(bans[0].options.note.as_deref(), Some("spam"));
        assert_eq!(bans[0].options.ban_message, None);
    }

    #[tokio::test]
    async fn test_repeated_ban_is_not_deduplicated() {
        let service = ModerationService::new(MockSession::new(), reasons());

        service
            .ban("bob", "rule1", &BanOptions::default())
            .await
            .unwrap();
        service
            .ban("bob", "rule1", &BanOptions::default())
            .await
            .unwrap();

        assert_eq!(service.session.bans.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_session_error_propagates_unchanged() {
        let service = ModerationService::new(MockSession::failing("USER_DOESNT_EXIST"), reasons());

        let err = service
            .ban("ghost", "rule1", &BanOptions::default())
            .await
            .unwrap_err();

        match err {
            ModerationError::Reddit(message) => assert_eq!(message, "USER_DOESNT_EXIST"),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(service.session.bans.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_rules_and_traffic_delegate_to_session() {
        let service = ModerationService::new(MockSession::new(), reasons());

        let rules = service.rules().await.unwrap();
        assert_eq!(rules.rules.len(), 1);
        assert_eq!(rules.rules[0].short_name, "Be civil");

        let traffic = service.traffic().await.unwrap();
        assert_eq!(traffic.day.len(), 1);
        assert_eq!(traffic.day[0].pageviews, 42);
        assert!(traffic.hour.is_empty());
    }

    #[test]
    fn test_ban_options_default_is_permanent() {
        assert!(BanOptions::default().is_permanent());
        let timed = BanOptions {
            duration_days: Some(3),
            ..Default::default()
        };
        assert!(!timed.is_permanent());
    }
}

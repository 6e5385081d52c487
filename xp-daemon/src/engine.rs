//! MalusEngine - entry point for unassignment evaluation.
//!
//! Runs the correlate / collect / classify / charge / sanction pipeline for a
//! single `issues.unassigned` event, start to finish.

use std::sync::Arc;

use bigdecimal::BigDecimal;
use tracing::{debug, error, info};

use crate::collaborators::{filter_collaborators, AuthorizationScope};
use crate::config::Settings;
use crate::error::EngineError;
use crate::event::UnassignedEvent;
use crate::github::{GithubApi, UserRef};
use crate::involvement::get_involved_users;
use crate::malus::{collaborator_multiplier, compute_malus, extract_price};
use crate::sanction::{apply_sanction, MalusReport, SanctionContext, SanctionOutcome};
use crate::timeline::{find_latest_disqualifier_comment, find_latest_unassignment, DEFAULT_DISQUALIFIER_WINDOW_MS};
use xp_ledger::{IssueLocation, Ledger, SaveOutcome, SaveXpRecord, UserXpTotal};

/// Why an evaluation ended without side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    MissingAssignee,
    NoUnassignmentEvent,
    NotBotActor,
    NoDisqualifierComment,
    MissingPriceLabel,
    NonNumericPrice,
}

impl SkipReason {
    pub fn describe(&self) -> &'static str {
        match self {
            SkipReason::MissingAssignee => "No assignee provided for unassigned event",
            SkipReason::NoUnassignmentEvent => "No unassignment timeline event found for assignee",
            SkipReason::NotBotActor => "Unassignment was not performed by a bot",
            SkipReason::NoDisqualifierComment => "No disqualification marker found near unassignment",
            SkipReason::MissingPriceLabel => "No price label found on work item",
            SkipReason::NonNumericPrice => "Price label did not contain a numeric value",
        }
    }
}

/// Everything a completed evaluation did.
#[derive(Debug, Clone)]
pub struct MalusApplication {
    pub assignee: UserRef,
    pub price: BigDecimal,
    pub multiplier: u64,
    pub collaborators: Vec<UserRef>,
    /// Penalty magnitude; the ledger holds its negation
    pub malus: BigDecimal,
    /// Assignee's total after the write
    pub total: BigDecimal,
    pub save: SaveOutcome,
    pub sanction: SanctionOutcome,
}

#[derive(Debug, Clone)]
pub enum EvaluationOutcome {
    Skipped(SkipReason),
    Applied(MalusApplication),
}

/// The disqualification malus engine.
pub struct MalusEngine {
    github: Arc<dyn GithubApi>,
    ledger: Ledger,
    settings: Settings,
    window_ms: i64,
}

impl MalusEngine {
    pub fn new(github: Arc<dyn GithubApi>, ledger: Ledger, settings: Settings) -> Self {
        Self {
            github,
            ledger,
            settings,
            window_ms: DEFAULT_DISQUALIFIER_WINDOW_MS,
        }
    }

    /// Override how far before an unassignment a disqualifier may sit.
    pub fn with_disqualifier_window(mut self, window_ms: i64) -> Self {
        self.window_ms = window_ms;
        self
    }

    /// Read-only balance query shared with `/xp` and the balance lookup.
    pub async fn get_user_total(&self, user_id: i64) -> Result<UserXpTotal, EngineError> {
        Ok(self.ledger.get_user_total(user_id).await?)
    }

    /// Evaluate an `issues.unassigned` event.
    ///
    /// Skip conditions return `Ok(Skipped)` and leave no trace. Errors are
    /// fatal; an error raised after the ledger write leaves that write in
    /// place.
    pub async fn evaluate_unassignment(&self, event: &UnassignedEvent) -> Result<EvaluationOutcome, EngineError> {
        let Some(assignee) = event.assignee.as_ref().map(|a| a.to_user()) else {
            return Ok(skip(SkipReason::MissingAssignee, None));
        };

        let repo = event
            .repository
            .repo_ref()
            .ok_or(EngineError::MissingField("repository"))?;
        let number = event.issue.number.ok_or(EngineError::MissingField("issue.number"))?;

        let timeline = self.github.issue_timeline(&repo, number).await?;
        debug!(issue = number, events = timeline.len(), "Fetched timeline");

        let Some(unassignment) = find_latest_unassignment(&timeline, assignee.id) else {
            return Ok(skip(SkipReason::NoUnassignmentEvent, Some(&assignee)));
        };
        if !crate::actor::is_bot_actor(unassignment.actor) {
            return Ok(skip(SkipReason::NotBotActor, Some(&assignee)));
        }
        if find_latest_disqualifier_comment(&timeline, unassignment.created_at, self.window_ms).is_none() {
            return Ok(skip(SkipReason::NoDisqualifierComment, Some(&assignee)));
        }

        let issue_id = event.issue.ledger_id().ok_or_else(|| {
            error!("Issue ID missing from payload, cannot persist XP entry");
            EngineError::MissingField("issue.id")
        })?;
        let issue_url = event.issue.canonical_url().ok_or_else(|| {
            error!(issue_id, "Issue URL missing from payload, cannot persist XP entry");
            EngineError::MissingField("issue.html_url")
        })?;

        let price = match extract_price(&event.issue.label_names()) {
            Ok(price) => price,
            Err(reason) => return Ok(skip(reason, Some(&assignee))),
        };

        let threshold = self.settings.ban_threshold()?;
        let collaborators = self.resolve_collaborators(event, &repo).await?;
        let multiplier = collaborator_multiplier(collaborators.len());
        let malus = compute_malus(&price, multiplier);
        info!(
            user_id = assignee.id,
            issue_id,
            %price,
            multiplier,
            %malus,
            "Applying disqualification malus"
        );

        let save = self
            .ledger
            .save_record(&SaveXpRecord {
                user_id: assignee.id,
                issue: IssueLocation {
                    issue_id,
                    issue_url: issue_url.to_string(),
                },
                amount: -malus.clone(),
            })
            .await
            .map_err(|e| {
                error!(user_id = assignee.id, issue_id, error = %e, "Failed to save XP record");
                EngineError::from(e)
            })?;

        // The recomputed total already includes the malus just written.
        let total = self.ledger.get_user_total(assignee.id).await?.total;

        let sanction = apply_sanction(
            self.github.as_ref(),
            &SanctionContext {
                target: (&repo, number),
                org: event.organization_login(),
                threshold: &threshold,
                disable_comment_posting: self.settings.disable_comment_posting,
            },
            &MalusReport {
                assignee: &assignee,
                multiplier,
                collaborators: &collaborators,
                malus: &malus,
                total: &total,
            },
        )
        .await?;

        Ok(EvaluationOutcome::Applied(MalusApplication {
            assignee,
            price,
            multiplier,
            collaborators,
            malus,
            total,
            save,
            sanction,
        }))
    }

    async fn resolve_collaborators(
        &self,
        event: &UnassignedEvent,
        repo: &crate::github::RepoRef,
    ) -> Result<Vec<UserRef>, EngineError> {
        let participants = get_involved_users(self.github.as_ref(), event).await?;
        if participants.is_empty() {
            info!("No involved users detected for disqualification event");
            return Ok(Vec::new());
        }

        let scope = AuthorizationScope {
            org: event
                .organization_login()
                .unwrap_or(repo.owner.as_str())
                .to_string(),
            repo: repo.clone(),
        };
        let collaborators = filter_collaborators(self.github.as_ref(), &scope, &participants).await?;
        if collaborators.is_empty() {
            info!("No collaborators among involved users, applying base malus only");
        } else {
            info!(count = collaborators.len(), "Collaborators involved, applying multiplier");
        }
        Ok(collaborators)
    }
}

fn skip(reason: SkipReason, assignee: Option<&UserRef>) -> EvaluationOutcome {
    info!(
        user_id = assignee.map(|a| a.id),
        reason = ?reason,
        "{}. Skipping XP deduction.",
        reason.describe()
    );
    EvaluationOutcome::Skipped(reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::Actor;
    use crate::github::{parse_timestamp, Authored, CommentBody, CommentKind, MockGithub, TimelineEvent};
    use crate::timeline::DISQUALIFIER_MARKER;
    use serde_json::json;
    use std::str::FromStr;
    use xp_ledger::SqliteLedgerStore;

    const ASSIGNEE: i64 = 500;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn event_with_labels(labels: serde_json::Value) -> UnassignedEvent {
        serde_json::from_value(json!({
            "assignee": { "id": ASSIGNEE, "login": "hunter" },
            "issue": {
                "id": 9001,
                "number": 7,
                "html_url": "https://github.com/acme/widgets/issues/7",
                "labels": labels,
                "user": { "id": 1, "login": "author" }
            },
            "repository": { "name": "widgets", "owner": { "login": "acme" } },
            "organization": { "login": "acme" }
        }))
        .unwrap()
    }

    fn priced_event(price: &str) -> UnassignedEvent {
        event_with_labels(json!([{ "name": format!("Price: {} USD", price) }]))
    }

    fn bot() -> Option<Actor> {
        Some(Actor::new("ubiquity-os[bot]", "Bot"))
    }

    fn disqualified_timeline(unassigned_by: Option<Actor>) -> Vec<TimelineEvent> {
        vec![
            TimelineEvent::Comment {
                kind: CommentKind::Commented,
                actor: bot(),
                body: CommentBody::plain(format!("{} @hunter, you have been disqualified.", DISQUALIFIER_MARKER)),
                created_at: parse_timestamp("2024-01-01T11:58:00Z"),
            },
            TimelineEvent::Unassigned {
                actor: unassigned_by,
                assignee: Some(UserRef::new(ASSIGNEE, "hunter")),
                created_at: parse_timestamp("2024-01-01T12:00:00Z"),
            },
        ]
    }

    fn ledger() -> Ledger {
        Ledger::new(Arc::new(SqliteLedgerStore::open_in_memory().unwrap()))
    }

    fn engine(github: Arc<MockGithub>, settings: Settings) -> MalusEngine {
        MalusEngine::new(github, ledger(), settings)
    }

    fn applied(outcome: EvaluationOutcome) -> MalusApplication {
        match outcome {
            EvaluationOutcome::Applied(application) => application,
            other => panic!("expected a malus, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_assignee_skips_without_writing() {
        let github = Arc::new(MockGithub::new().with_timeline(disqualified_timeline(bot())));
        let engine = engine(github.clone(), Settings::default());
        let mut event = priced_event("10");
        event.assignee = None;

        let outcome = engine.evaluate_unassignment(&event).await.unwrap();
        assert!(matches!(outcome, EvaluationOutcome::Skipped(SkipReason::MissingAssignee)));
        assert!(!engine.get_user_total(ASSIGNEE).await.unwrap().has_data());
    }

    #[tokio::test]
    async fn test_human_unassignment_skips() {
        let github = Arc::new(MockGithub::new().with_timeline(disqualified_timeline(Some(Actor::new("maintainer", "User")))));
        let engine = engine(github.clone(), Settings::default());

        let outcome = engine.evaluate_unassignment(&priced_event("10")).await.unwrap();
        assert!(matches!(outcome, EvaluationOutcome::Skipped(SkipReason::NotBotActor)));
        assert!(!engine.get_user_total(ASSIGNEE).await.unwrap().has_data());
        assert!(github.posted_comments().is_empty());
    }

    #[tokio::test]
    async fn test_no_unassignment_or_marker_skips() {
        let github = Arc::new(MockGithub::new());
        let engine = engine(github, Settings::default());
        let outcome = engine.evaluate_unassignment(&priced_event("10")).await.unwrap();
        assert!(matches!(outcome, EvaluationOutcome::Skipped(SkipReason::NoUnassignmentEvent)));

        let mut timeline = disqualified_timeline(bot());
        timeline.remove(0);
        let github = Arc::new(MockGithub::new().with_timeline(timeline));
        let engine = MalusEngine::new(github, ledger(), Settings::default());
        let outcome = engine.evaluate_unassignment(&priced_event("10")).await.unwrap();
        assert!(matches!(outcome, EvaluationOutcome::Skipped(SkipReason::NoDisqualifierComment)));
    }

    #[tokio::test]
    async fn test_disqualifier_window_bounds_marker_search() {
        let github = Arc::new(MockGithub::new().with_timeline(disqualified_timeline(bot())));
        let narrow = engine(github.clone(), Settings::default()).with_disqualifier_window(60_000);
        let outcome = narrow.evaluate_unassignment(&priced_event("10")).await.unwrap();
        assert!(matches!(outcome, EvaluationOutcome::Skipped(SkipReason::NoDisqualifierComment)));
        assert!(!narrow.get_user_total(ASSIGNEE).await.unwrap().has_data());

        let default_window = engine(github, Settings::default());
        let application = applied(default_window.evaluate_unassignment(&priced_event("10")).await.unwrap());
        assert_eq!(application.total, dec("-10"));
    }

    #[tokio::test]
    async fn test_missing_or_bad_price_skips() {
        let github = Arc::new(MockGithub::new().with_timeline(disqualified_timeline(bot())));
        let engine = engine(github.clone(), Settings::default());

        let outcome = engine
            .evaluate_unassignment(&event_with_labels(json!(["Priority: 1"])))
            .await
            .unwrap();
        assert!(matches!(outcome, EvaluationOutcome::Skipped(SkipReason::MissingPriceLabel)));

        let outcome = engine
            .evaluate_unassignment(&event_with_labels(json!(["Price: soon"])))
            .await
            .unwrap();
        assert!(matches!(outcome, EvaluationOutcome::Skipped(SkipReason::NonNumericPrice)));
        assert!(!engine.get_user_total(ASSIGNEE).await.unwrap().has_data());
    }

    #[tokio::test]
    async fn test_base_malus_without_collaborators() {
        let github = Arc::new(MockGithub::new().with_timeline(disqualified_timeline(bot())));
        let engine = engine(github.clone(), Settings::default());

        let application = applied(engine.evaluate_unassignment(&priced_event("42.5")).await.unwrap());
        assert_eq!(application.multiplier, 1);
        assert_eq!(application.malus, dec("42.5"));
        assert_eq!(application.total, dec("-42.5"));
        assert_eq!(application.sanction, SanctionOutcome::Reported);

        let total = engine.get_user_total(ASSIGNEE).await.unwrap();
        assert_eq!(total.total, dec("-42.5"));
        assert_eq!(total.permit_count, 1);

        let posted = github.posted_comments();
        assert_eq!(posted.len(), 1);
        assert!(posted[0].1.contains("| Applied Malus | `-42.5 XP` |"));
        assert!(posted[0].1.contains("| Collaborators | `None` |"));
        assert!(github.blocked_users().is_empty());
    }

    #[tokio::test]
    async fn test_multiplier_counts_privileged_participants() {
        let github = Arc::new(
            MockGithub::new()
                .with_timeline(disqualified_timeline(bot()))
                .with_comments(7, vec![Authored::by(2, "alice"), Authored::by(3, "bob"), Authored::by(4, "random")])
                .with_membership("alice", "active", "admin")
                .with_permission("bob", "write")
                .with_permission("random", "read"),
        );
        let engine = engine(github.clone(), Settings::default());

        let application = applied(engine.evaluate_unassignment(&priced_event("55")).await.unwrap());
        assert_eq!(application.multiplier, 2);
        assert_eq!(application.malus, dec("110"));
        assert_eq!(engine.get_user_total(ASSIGNEE).await.unwrap().total, dec("-110"));
        assert!(github.posted_comments()[0].1.contains("| Collaborators | `alice`, `bob` |"));
    }

    #[tokio::test]
    async fn test_repeat_evaluation_overwrites() {
        let github = Arc::new(MockGithub::new().with_timeline(disqualified_timeline(bot())));
        let engine = engine(github, Settings::default());

        let first = applied(engine.evaluate_unassignment(&priced_event("10")).await.unwrap());
        assert!(matches!(first.save, SaveOutcome::Inserted { .. }));
        let second = applied(engine.evaluate_unassignment(&priced_event("25")).await.unwrap());
        assert!(matches!(second.save, SaveOutcome::Updated { .. }));

        let total = engine.get_user_total(ASSIGNEE).await.unwrap();
        assert_eq!(total.permit_count, 1);
        assert_eq!(total.total, dec("-25"));
    }

    #[tokio::test]
    async fn test_below_threshold_bans_without_report() {
        let github = Arc::new(MockGithub::new().with_timeline(disqualified_timeline(bot())));
        let settings = Settings {
            disqualification_ban_threshold: -100.0,
            ..Settings::default()
        };
        let engine = engine(github.clone(), settings);

        let application = applied(engine.evaluate_unassignment(&priced_event("150")).await.unwrap());
        assert_eq!(application.sanction, SanctionOutcome::Banned { org: "acme".to_string() });
        assert_eq!(github.blocked_users(), vec![("acme".to_string(), "hunter".to_string())]);

        let posted = github.posted_comments();
        assert_eq!(posted.len(), 1);
        assert!(posted[0].1.starts_with("XP total fell below threshold"));
        assert!(!posted[0].1.contains("XP Malus Applied"));
    }

    #[tokio::test]
    async fn test_disabled_comments_suppress_all_posts() {
        let github = Arc::new(MockGithub::new().with_timeline(disqualified_timeline(bot())));
        let settings = Settings {
            disable_comment_posting: true,
            disqualification_ban_threshold: -100.0,
        };
        let engine = engine(github.clone(), settings.clone());

        let application = applied(engine.evaluate_unassignment(&priced_event("10")).await.unwrap());
        assert_eq!(application.sanction, SanctionOutcome::ReportSuppressed);

        let application = applied(engine.evaluate_unassignment(&priced_event("500")).await.unwrap());
        assert!(matches!(application.sanction, SanctionOutcome::Banned { .. }));
        assert!(github.posted_comments().is_empty());
        assert_eq!(github.blocked_users().len(), 1);
    }

    #[tokio::test]
    async fn test_block_failure_is_fatal_after_write() {
        let github = Arc::new(
            MockGithub::new()
                .with_timeline(disqualified_timeline(bot()))
                .with_block_failure(422),
        );
        let settings = Settings {
            disqualification_ban_threshold: 0.0,
            ..Settings::default()
        };
        let engine = engine(github, settings);

        let err = engine.evaluate_unassignment(&priced_event("1")).await.unwrap_err();
        assert!(matches!(err, EngineError::Ban { .. }));
        assert_eq!(engine.get_user_total(ASSIGNEE).await.unwrap().total, dec("-1"));
    }

    #[tokio::test]
    async fn test_indeterminate_authorization_aborts_before_write() {
        let github = Arc::new(
            MockGithub::new()
                .with_timeline(disqualified_timeline(bot()))
                .with_comments(7, vec![Authored::by(2, "alice")])
                .with_membership_error("alice", 500),
        );
        let engine = engine(github.clone(), Settings::default());

        let err = engine.evaluate_unassignment(&priced_event("10")).await.unwrap_err();
        assert!(matches!(err, EngineError::Authorization { .. }));
        assert!(!engine.get_user_total(ASSIGNEE).await.unwrap().has_data());
        assert!(github.posted_comments().is_empty());
    }

    #[tokio::test]
    async fn test_missing_issue_url_is_fatal() {
        let github = Arc::new(MockGithub::new().with_timeline(disqualified_timeline(bot())));
        let engine = engine(github, Settings::default());
        let mut event = priced_event("10");
        event.issue.html_url = None;

        let err = engine.evaluate_unassignment(&event).await.unwrap_err();
        assert!(matches!(err, EngineError::MissingField("issue.html_url")));
    }
}

//! The `/xp` comment command.

use std::sync::Arc;

use tracing::{debug, info};

use crate::actor::{is_bot_actor, Actor};
use crate::error::EngineError;
use crate::event::CommentEvent;
use crate::format::{format_handle, format_xp, sanitize_handle};
use crate::github::{GithubApi, UserRef};
use xp_ledger::Ledger;

const XP_COMMAND: &str = "/xp";

/// A parsed `/xp [user]` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XpCommand {
    /// Explicit target; the sender when `None`
    pub username: Option<String>,
}

/// Parse `/xp` optionally followed by a handle. Anything else is `None`.
pub fn parse_xp_command(body: &str) -> Option<XpCommand> {
    let mut parts = body.split_whitespace();
    let command = parts.next()?;
    if !command.eq_ignore_ascii_case(XP_COMMAND) {
        return None;
    }
    Some(XpCommand {
        username: parts.next().and_then(sanitize_handle),
    })
}

pub fn no_data_reply(login: &str) -> String {
    format!("I don't have XP data for {} yet.", format_handle(login))
}

/// Answers `/xp` comments from the ledger.
pub struct XpCommandHandler {
    github: Arc<dyn GithubApi>,
    ledger: Ledger,
}

impl XpCommandHandler {
    pub fn new(github: Arc<dyn GithubApi>, ledger: Ledger) -> Self {
        Self { github, ledger }
    }

    /// Reply to an `/xp` comment. Returns `false` when the comment is not a
    /// command this handler answers.
    pub async fn handle(&self, event: &CommentEvent) -> Result<bool, EngineError> {
        let Some(command) = event.body().and_then(parse_xp_command) else {
            return Ok(false);
        };

        let sender = event
            .sender
            .as_ref()
            .filter(|s| !s.login.is_empty())
            .ok_or(EngineError::MissingField("sender"))?;
        let sender_actor = Actor {
            login: Some(sender.login.clone()),
            actor_type: sender.user_type.clone(),
        };
        if is_bot_actor(Some(&sender_actor)) {
            info!(login = %sender.login, "Ignoring XP command from bot sender");
            return Ok(false);
        }

        let reply = self.reply_for(&command, sender.to_user()).await?;
        let repo = event
            .repository
            .repo_ref()
            .ok_or(EngineError::MissingField("repository"))?;
        let number = event.number().ok_or(EngineError::MissingField("issue.number"))?;

        info!(issue = number, "{}", reply);
        self.github.post_comment(&repo, number, &reply).await?;
        Ok(true)
    }

    /// Reply text for `command` issued by `sender`.
    pub async fn reply_for(&self, command: &XpCommand, sender: UserRef) -> Result<String, EngineError> {
        let target = match &command.username {
            None => sender,
            Some(username) => match self.github.get_user(username).await? {
                Some(user) => user,
                None => {
                    info!(username = %username, "User not found on the platform");
                    return Ok(no_data_reply(username));
                }
            },
        };

        let total = self.ledger.get_user_total(target.id).await?;
        debug!(user_id = target.id, permit_count = total.permit_count, "Resolved XP total");
        if !total.has_data() {
            return Ok(no_data_reply(&target.login));
        }
        Ok(format!(
            "{} currently has {} XP.",
            format_handle(&target.login),
            format_xp(&total.total)
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::MockGithub;
    use bigdecimal::BigDecimal;
    use serde_json::json;
    use std::str::FromStr;
    use xp_ledger::{IssueLocation, SaveXpRecord, SqliteLedgerStore};

    #[test]
    fn test_parse_xp_command() {
        assert_eq!(parse_xp_command("/xp"), Some(XpCommand { username: None }));
        assert_eq!(
            parse_xp_command("  /XP   @@Alice trailing"),
            Some(XpCommand { username: Some("Alice".to_string()) })
        );
        assert_eq!(parse_xp_command("/xp @"), Some(XpCommand { username: None }));
        assert_eq!(parse_xp_command("/xpx"), None);
        assert_eq!(parse_xp_command("please /xp"), None);
        assert_eq!(parse_xp_command(""), None);
    }

    async fn handler_with(github: Arc<MockGithub>, entries: &[(i64, i64, &str)]) -> XpCommandHandler {
        let ledger = Ledger::new(Arc::new(SqliteLedgerStore::open_in_memory().unwrap()));
        for (user_id, issue_id, amount) in entries {
            ledger
                .save_record(&SaveXpRecord {
                    user_id: *user_id,
                    issue: IssueLocation {
                        issue_id: *issue_id,
                        issue_url: format!("https://github.com/acme/widgets/issues/{}", issue_id),
                    },
                    amount: BigDecimal::from_str(amount).unwrap(),
                })
                .await
                .unwrap();
        }
        XpCommandHandler::new(github, ledger)
    }

    fn comment(body: &str, sender_type: &str) -> CommentEvent {
        serde_json::from_value(json!({
            "comment": { "body": body },
            "sender": { "id": 10, "login": "alice", "type": sender_type },
            "issue": { "number": 3 },
            "repository": { "name": "widgets", "owner": { "login": "acme" } }
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_sender_total_is_posted() {
        let github = Arc::new(MockGithub::new());
        let handler = handler_with(github.clone(), &[(10, 1, "12.345"), (10, 2, "-2")]).await;

        assert!(handler.handle(&comment("/xp", "User")).await.unwrap());
        assert_eq!(github.posted_comments(), vec![(3, "@alice currently has 10.35 XP.".to_string())]);
    }

    #[tokio::test]
    async fn test_named_user_lookup() {
        let github = Arc::new(MockGithub::new().with_user(UserRef::new(20, "Bob")));
        let handler = handler_with(github.clone(), &[(20, 1, "0")]).await;

        assert!(handler.handle(&comment("/xp @bob", "User")).await.unwrap());
        assert_eq!(github.posted_comments()[0].1, "@Bob currently has 0 XP.");
    }

    #[tokio::test]
    async fn test_unknown_or_empty_user_gets_no_data_reply() {
        let github = Arc::new(MockGithub::new().with_user(UserRef::new(30, "carol")));
        let handler = handler_with(github.clone(), &[]).await;

        handler.handle(&comment("/xp ghost", "User")).await.unwrap();
        handler.handle(&comment("/xp carol", "User")).await.unwrap();
        let posted: Vec<String> = github.posted_comments().into_iter().map(|(_, body)| body).collect();
        assert_eq!(
            posted,
            vec![
                "I don't have XP data for @ghost yet.".to_string(),
                "I don't have XP data for @carol yet.".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_bot_sender_and_other_comments_ignored() {
        let github = Arc::new(MockGithub::new());
        let handler = handler_with(github.clone(), &[]).await;

        assert!(!handler.handle(&comment("/xp", "Bot")).await.unwrap());
        assert!(!handler.handle(&comment("looks good", "User")).await.unwrap());
        assert!(github.posted_comments().is_empty());
    }
}

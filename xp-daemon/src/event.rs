//! Webhook payload shapes read by the engine and the XP command.

use serde::Deserialize;

use crate::github::{Author, RepoRef, UserRef};

/// Account block on a payload (`assignee`, `sender`).
#[derive(Debug, Clone, Deserialize)]
pub struct PayloadUser {
    pub id: i64,
    pub login: String,
    #[serde(rename = "type", default)]
    pub user_type: Option<String>,
}

impl PayloadUser {
    pub fn to_user(&self) -> UserRef {
        UserRef::new(self.id, self.login.clone())
    }
}

/// A label, either bare or as an object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Label {
    Name(String),
    Object {
        #[serde(default)]
        name: Option<String>,
    },
}

impl Label {
    pub fn name(&self) -> Option<&str> {
        match self {
            Label::Name(name) => Some(name.as_str()),
            Label::Object { name } => name.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PayloadIssue {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub number: Option<u64>,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(default)]
    pub user: Option<Author>,
    /// Present when the work item is a pull request
    #[serde(default)]
    pub pull_request: Option<serde_json::Value>,
}

impl PayloadIssue {
    /// Ledger key for the work item: its id, else its number.
    pub fn ledger_id(&self) -> Option<i64> {
        self.id
            .or_else(|| self.number.and_then(|n| i64::try_from(n).ok()))
    }

    pub fn canonical_url(&self) -> Option<&str> {
        [self.html_url.as_deref(), self.url.as_deref()]
            .into_iter()
            .flatten()
            .find(|url| !url.is_empty())
    }

    pub fn label_names(&self) -> Vec<String> {
        self.labels
            .iter()
            .filter_map(Label::name)
            .map(str::to_string)
            .collect()
    }

    pub fn is_pull_request(&self) -> bool {
        self.pull_request
            .as_ref()
            .is_some_and(|value| !value.is_null())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PayloadOwner {
    #[serde(default)]
    pub login: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PayloadRepository {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub owner: Option<PayloadOwner>,
}

impl PayloadRepository {
    pub fn owner_login(&self) -> Option<&str> {
        self.owner
            .as_ref()
            .and_then(|o| o.login.as_deref())
            .filter(|login| !login.is_empty())
    }

    pub fn repo_ref(&self) -> Option<RepoRef> {
        let name = self.name.as_deref().filter(|n| !n.is_empty())?;
        Some(RepoRef::new(self.owner_login()?, name))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PayloadOrganization {
    #[serde(default)]
    pub login: Option<String>,
}

/// `issues.unassigned` payload.
#[derive(Debug, Clone, Deserialize)]
pub struct UnassignedEvent {
    #[serde(default)]
    pub assignee: Option<PayloadUser>,
    pub issue: PayloadIssue,
    pub repository: PayloadRepository,
    #[serde(default)]
    pub organization: Option<PayloadOrganization>,
}

impl UnassignedEvent {
    pub fn organization_login(&self) -> Option<&str> {
        self.organization
            .as_ref()
            .and_then(|o| o.login.as_deref())
            .map(str::trim)
            .filter(|login| !login.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PayloadBody {
    #[serde(default)]
    pub body: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PayloadNumber {
    pub number: u64,
}

/// `issue_comment.created`, `pull_request_review_comment.created` or
/// `pull_request_review.submitted` payload.
#[derive(Debug, Clone, Deserialize)]
pub struct CommentEvent {
    #[serde(default)]
    pub comment: Option<PayloadBody>,
    #[serde(default)]
    pub review: Option<PayloadBody>,
    #[serde(default)]
    pub sender: Option<PayloadUser>,
    #[serde(default)]
    pub issue: Option<PayloadNumber>,
    #[serde(default)]
    pub pull_request: Option<PayloadNumber>,
    pub repository: PayloadRepository,
}

impl CommentEvent {
    pub fn body(&self) -> Option<&str> {
        self.comment
            .as_ref()
            .or(self.review.as_ref())
            .and_then(|b| b.body.as_deref())
    }

    /// Number of the conversation the comment was made on.
    pub fn number(&self) -> Option<u64> {
        self.issue
            .as_ref()
            .or(self.pull_request.as_ref())
            .map(|n| n.number)
    }
}

//! Platform data types consumed by the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::actor::Actor;

/// Owner/name pair identifying a repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

/// A pull request, located by its own repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PullRef {
    pub repo: RepoRef,
    pub number: u64,
}

impl PullRef {
    pub fn new(repo: RepoRef, number: u64) -> Self {
        Self { repo, number }
    }
}

/// A platform account with a known id and login (a participant).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserRef {
    pub id: i64,
    pub login: String,
}

impl UserRef {
    pub fn new(id: i64, login: impl Into<String>) -> Self {
        Self {
            id,
            login: login.into(),
        }
    }
}

/// Author block as it appears on comments, reviews and issues.
///
/// Fields are optional because deleted ("ghost") accounts come back partial.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub login: Option<String>,
    #[serde(rename = "type", default)]
    pub author_type: Option<String>,
}

impl Author {
    pub fn new(id: i64, login: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            login: Some(login.into()),
            author_type: Some("User".to_string()),
        }
    }

    /// A participant, if both id and a non-empty login are present.
    pub fn to_user(&self) -> Option<UserRef> {
        match (self.id, self.login.as_deref()) {
            (Some(id), Some(login)) if !login.is_empty() => Some(UserRef::new(id, login)),
            _ => None,
        }
    }
}

/// Anything with an author: issue comments, reviews, review comments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authored {
    #[serde(default)]
    pub user: Option<Author>,
}

impl Authored {
    pub fn by(id: i64, login: impl Into<String>) -> Self {
        Self {
            user: Some(Author::new(id, login)),
        }
    }
}

/// Organization membership record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgMembership {
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

/// Repository collaborator permission level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollaboratorPermission {
    #[serde(default)]
    pub permission: Option<String>,
}

/// Which timeline representation a comment came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentKind {
    Commented,
    TimelineComment,
}

/// The body of a comment in its plain, text and rendered forms.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentBody {
    pub body: Option<String>,
    pub body_text: Option<String>,
    pub body_html: Option<String>,
}

impl CommentBody {
    pub fn plain(body: impl Into<String>) -> Self {
        Self {
            body: Some(body.into()),
            ..Default::default()
        }
    }

    pub fn contains(&self, needle: &str) -> bool {
        [&self.body, &self.body_text, &self.body_html]
            .into_iter()
            .flatten()
            .any(|text| text.contains(needle))
    }
}

/// A work item timeline entry, narrowed to the kinds the engine reasons about.
///
/// `created_at` is `None` when the upstream timestamp was absent or malformed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimelineEvent {
    Unassigned {
        actor: Option<Actor>,
        assignee: Option<UserRef>,
        created_at: Option<DateTime<Utc>>,
    },
    Comment {
        kind: CommentKind,
        actor: Option<Actor>,
        body: CommentBody,
        created_at: Option<DateTime<Utc>>,
    },
    Other {
        event: String,
        created_at: Option<DateTime<Utc>>,
    },
}

/// Loose wire shape of a timeline entry.
#[derive(Debug, Default, Deserialize)]
struct RawTimelineEvent {
    #[serde(default)]
    event: Option<String>,
    #[serde(default)]
    actor: Option<Actor>,
    #[serde(default)]
    assignee: Option<Author>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    body_text: Option<String>,
    #[serde(default)]
    body_html: Option<String>,
}

impl TimelineEvent {
    /// Decode one timeline entry. Entries that do not fit the expected shape
    /// become `Other` so a scan can skip them.
    pub fn from_value(value: serde_json::Value) -> Self {
        let raw: RawTimelineEvent = match serde_json::from_value(value) {
            Ok(raw) => raw,
            Err(_) => {
                return TimelineEvent::Other {
                    event: "unknown".to_string(),
                    created_at: None,
                }
            }
        };

        let created_at = raw.created_at.as_deref().and_then(parse_timestamp);
        let event = raw.event.unwrap_or_default();

        match event.to_ascii_lowercase().as_str() {
            "unassigned" => TimelineEvent::Unassigned {
                actor: raw.actor,
                assignee: raw.assignee.as_ref().and_then(Author::to_user),
                created_at,
            },
            "commented" | "timeline_comment" => TimelineEvent::Comment {
                kind: if event.eq_ignore_ascii_case("commented") {
                    CommentKind::Commented
                } else {
                    CommentKind::TimelineComment
                },
                actor: raw.actor,
                body: CommentBody {
                    body: raw.body,
                    body_text: raw.body_text,
                    body_html: raw.body_html,
                },
                created_at,
            },
            _ => TimelineEvent::Other { event, created_at },
        }
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        match self {
            TimelineEvent::Unassigned { created_at, .. }
            | TimelineEvent::Comment { created_at, .. }
            | TimelineEvent::Other { created_at, .. } => *created_at,
        }
    }
}

/// Parse an RFC 3339 timestamp, `None` when malformed.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

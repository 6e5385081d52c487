//! Actor classification.

use serde::{Deserialize, Serialize};

/// Who performed a platform action, as reported on events and comments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    #[serde(default)]
    pub login: Option<String>,
    #[serde(rename = "type", default)]
    pub actor_type: Option<String>,
}

/// Derived classification of an [`Actor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorKind {
    Bot,
    Human,
    Unknown,
}

impl Actor {
    pub fn new(login: impl Into<String>, actor_type: impl Into<String>) -> Self {
        Self {
            login: Some(login.into()),
            actor_type: Some(actor_type.into()),
        }
    }

    /// Classify by the explicit account type only. Login suffixes such as
    /// `[bot]` are not consulted.
    pub fn kind(&self) -> ActorKind {
        match self.actor_type.as_deref().map(str::to_ascii_lowercase).as_deref() {
            Some("bot") => ActorKind::Bot,
            Some("user") | Some("organization") => ActorKind::Human,
            _ => ActorKind::Unknown,
        }
    }
}

/// True only when the actor's type is `bot` (case-insensitive).
pub fn is_bot_actor(actor: Option<&Actor>) -> bool {
    actor.is_some_and(|a| a.kind() == ActorKind::Bot)
}

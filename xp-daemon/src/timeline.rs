//! Timeline correlation: which unassignment, and which disqualification
//! comment preceded it.

use chrono::{DateTime, Duration, Utc};

use crate::actor::{is_bot_actor, Actor};
use crate::github::{CommentKind, TimelineEvent, UserRef};

/// Marker string carried by automated disqualification comments.
pub const DISQUALIFIER_MARKER: &str = "@ubiquity-os/daemon-disqualifier";

/// How far before an unassignment a disqualification comment may sit.
pub const DEFAULT_DISQUALIFIER_WINDOW_MS: i64 = 5 * 60 * 1000;

/// The unassignment a malus is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unassignment<'a> {
    pub actor: Option<&'a Actor>,
    pub assignee: &'a UserRef,
    pub created_at: DateTime<Utc>,
    /// Position in the timeline
    pub index: usize,
}

/// A bot-authored disqualification comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisqualifierComment<'a> {
    pub kind: CommentKind,
    pub actor: Option<&'a Actor>,
    pub created_at: DateTime<Utc>,
    pub index: usize,
}

/// Latest `unassigned` event for `assignee_id`.
///
/// Events without a valid timestamp are skipped. On equal timestamps the
/// later position in `events` wins.
pub fn find_latest_unassignment(events: &[TimelineEvent], assignee_id: i64) -> Option<Unassignment<'_>> {
    let mut latest: Option<Unassignment<'_>> = None;

    for (index, event) in events.iter().enumerate() {
        let TimelineEvent::Unassigned {
            actor,
            assignee: Some(assignee),
            created_at: Some(created_at),
        } = event
        else {
            continue;
        };
        if assignee.id != assignee_id {
            continue;
        }
        if latest.is_some_and(|l| *created_at < l.created_at) {
            continue;
        }
        latest = Some(Unassignment {
            actor: actor.as_ref(),
            assignee,
            created_at: *created_at,
            index,
        });
    }

    latest
}

/// Latest bot comment carrying [`DISQUALIFIER_MARKER`] posted at most
/// `window_ms` before `unassigned_at` (and not after it).
///
/// On equal timestamps the earlier position in `events` wins.
pub fn find_latest_disqualifier_comment(
    events: &[TimelineEvent],
    unassigned_at: DateTime<Utc>,
    window_ms: i64,
) -> Option<DisqualifierComment<'_>> {
    let window = Duration::milliseconds(window_ms);
    let mut latest: Option<DisqualifierComment<'_>> = None;

    for (index, event) in events.iter().enumerate() {
        let TimelineEvent::Comment {
            kind,
            actor,
            body,
            created_at: Some(created_at),
        } = event
        else {
            continue;
        };
        if !body.contains(DISQUALIFIER_MARKER) || !is_bot_actor(actor.as_ref()) {
            continue;
        }
        let elapsed = unassigned_at - *created_at;
        if elapsed < Duration::zero() || elapsed > window {
            continue;
        }
        if latest.is_some_and(|l| *created_at <= l.created_at) {
            continue;
        }
        latest = Some(DisqualifierComment {
            kind: *kind,
            actor: actor.as_ref(),
            created_at: *created_at,
            index,
        });
    }

    latest
}

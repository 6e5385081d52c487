//! Participant discovery across a work item and the pull requests closing it.

use std::collections::HashSet;

use tracing::debug;

use crate::event::UnassignedEvent;
use crate::github::{Author, Authored, GithubApi, GithubError, RepoRef, UserRef};

/// Distinct participants in insertion order; first occurrence of an id wins.
#[derive(Debug, Default)]
struct Participants {
    seen: HashSet<i64>,
    users: Vec<UserRef>,
}

impl Participants {
    fn add(&mut self, author: Option<&Author>) {
        let Some(user) = author.and_then(Author::to_user) else {
            return;
        };
        if self.seen.insert(user.id) {
            self.users.push(user);
        }
    }

    fn extend(&mut self, items: &[Authored]) {
        for item in items {
            self.add(item.user.as_ref());
        }
    }
}

/// Every distinct human who touched the work item.
///
/// Covers the author, conversation comments and, for each closing pull
/// request, its comments, reviews and review comments, read from the
/// repository the pull request lives in. When the work item is
/// itself a pull request its own reviews and review comments are included.
/// Returns an empty list when the repository or number is missing.
pub async fn get_involved_users(
    github: &dyn GithubApi,
    event: &UnassignedEvent,
) -> Result<Vec<UserRef>, GithubError> {
    let (Some(repo), Some(number)) = (event.repository.repo_ref(), event.issue.number) else {
        debug!("Repository or work item number missing, no participants collected");
        return Ok(Vec::new());
    };

    let mut participants = Participants::default();
    participants.add(event.issue.user.as_ref());
    participants.extend(&github.issue_comments(&repo, number).await?);

    if event.issue.is_pull_request() {
        collect_pull_request(github, &repo, number, &mut participants, false).await?;
    } else {
        let pulls = github.closing_pull_requests(&repo, number).await?;
        debug!(issue = number, pulls = ?pulls, "Closing pull requests");
        for pull in &pulls {
            collect_pull_request(github, &pull.repo, pull.number, &mut participants, true).await?;
        }
    }

    Ok(participants.users)
}

async fn collect_pull_request(
    github: &dyn GithubApi,
    repo: &RepoRef,
    number: u64,
    participants: &mut Participants,
    with_comments: bool,
) -> Result<(), GithubError> {
    let comments = async {
        if with_comments {
            github.issue_comments(repo, number).await
        } else {
            Ok(Vec::new())
        }
    };
    let (comments, reviews, review_comments) = futures::try_join!(
        comments,
        github.pull_reviews(repo, number),
        github.pull_review_comments(repo, number),
    )?;

    participants.extend(&comments);
    participants.extend(&reviews);
    participants.extend(&review_comments);
    Ok(())
}

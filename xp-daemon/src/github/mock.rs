//! Scripted platform for testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::traits::*;
use super::types::*;

/// Mock platform.
///
/// Lists are keyed by work item number. Entries added without a repository
/// answer for any repository; `with_repo_*` entries only for theirs and take
/// precedence. Membership and permission lookups for
/// unknown users answer 404, as the real API does for outsiders.
#[derive(Default)]
pub struct MockGithub {
    timeline: Vec<TimelineEvent>,
    comments: HashMap<ListKey, Vec<Authored>>,
    reviews: HashMap<ListKey, Vec<Authored>>,
    review_comments: HashMap<ListKey, Vec<Authored>>,
    closing_prs: HashMap<u64, Vec<PullRef>>,
    memberships: HashMap<String, Result<OrgMembership, u16>>,
    permissions: HashMap<String, Result<CollaboratorPermission, u16>>,
    users: HashMap<String, UserRef>,
    block_failure: Option<u16>,
    posted: Mutex<Vec<(u64, String)>>,
    blocked: Mutex<Vec<(String, String)>>,
    authorization_calls: AtomicU32,
}

type ListKey = (Option<RepoRef>, u64);

fn list(map: &HashMap<ListKey, Vec<Authored>>, repo: &RepoRef, number: u64) -> Vec<Authored> {
    map.get(&(Some(repo.clone()), number))
        .or_else(|| map.get(&(None, number)))
        .cloned()
        .unwrap_or_default()
}

fn status_error(status: u16) -> GithubError {
    GithubError::Status {
        status,
        message: format!("mock status {}", status),
    }
}

impl MockGithub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeline(mut self, events: Vec<TimelineEvent>) -> Self {
        self.timeline = events;
        self
    }

    pub fn with_comments(mut self, number: u64, comments: Vec<Authored>) -> Self {
        self.comments.insert((None, number), comments);
        self
    }

    pub fn with_reviews(mut self, number: u64, reviews: Vec<Authored>) -> Self {
        self.reviews.insert((None, number), reviews);
        self
    }

    pub fn with_review_comments(mut self, number: u64, comments: Vec<Authored>) -> Self {
        self.review_comments.insert((None, number), comments);
        self
    }

    pub fn with_repo_comments(mut self, repo: &RepoRef, number: u64, comments: Vec<Authored>) -> Self {
        self.comments.insert((Some(repo.clone()), number), comments);
        self
    }

    pub fn with_repo_reviews(mut self, repo: &RepoRef, number: u64, reviews: Vec<Authored>) -> Self {
        self.reviews.insert((Some(repo.clone()), number), reviews);
        self
    }

    pub fn with_repo_review_comments(mut self, repo: &RepoRef, number: u64, comments: Vec<Authored>) -> Self {
        self.review_comments.insert((Some(repo.clone()), number), comments);
        self
    }

    pub fn with_closing_prs(mut self, number: u64, pulls: Vec<PullRef>) -> Self {
        self.closing_prs.insert(number, pulls);
        self
    }

    pub fn with_membership(mut self, login: &str, state: &str, role: &str) -> Self {
        self.memberships.insert(
            login.to_string(),
            Ok(OrgMembership {
                state: Some(state.to_string()),
                role: Some(role.to_string()),
            }),
        );
        self
    }

    pub fn with_membership_error(mut self, login: &str, status: u16) -> Self {
        self.memberships.insert(login.to_string(), Err(status));
        self
    }

    pub fn with_permission(mut self, login: &str, permission: &str) -> Self {
        self.permissions.insert(
            login.to_string(),
            Ok(CollaboratorPermission {
                permission: Some(permission.to_string()),
            }),
        );
        self
    }

    pub fn with_permission_error(mut self, login: &str, status: u16) -> Self {
        self.permissions.insert(login.to_string(), Err(status));
        self
    }

    pub fn with_user(mut self, user: UserRef) -> Self {
        self.users.insert(user.login.to_ascii_lowercase(), user);
        self
    }

    /// Make `block_user` fail with the given status.
    pub fn with_block_failure(mut self, status: u16) -> Self {
        self.block_failure = Some(status);
        self
    }

    /// Comments posted so far, as (work item number, body).
    pub fn posted_comments(&self) -> Vec<(u64, String)> {
        self.posted.lock().map(|p| p.clone()).unwrap_or_default()
    }

    /// Blocks issued so far, as (org, login).
    pub fn blocked_users(&self) -> Vec<(String, String)> {
        self.blocked.lock().map(|b| b.clone()).unwrap_or_default()
    }

    /// Number of membership plus permission lookups served.
    pub fn authorization_calls(&self) -> u32 {
        self.authorization_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GithubApi for MockGithub {
    async fn issue_timeline(&self, _repo: &RepoRef, _number: u64) -> Result<Vec<TimelineEvent>, GithubError> {
        Ok(self.timeline.clone())
    }

    async fn issue_comments(&self, repo: &RepoRef, number: u64) -> Result<Vec<Authored>, GithubError> {
        Ok(list(&self.comments, repo, number))
    }

    async fn pull_reviews(&self, repo: &RepoRef, number: u64) -> Result<Vec<Authored>, GithubError> {
        Ok(list(&self.reviews, repo, number))
    }

    async fn pull_review_comments(&self, repo: &RepoRef, number: u64) -> Result<Vec<Authored>, GithubError> {
        Ok(list(&self.review_comments, repo, number))
    }

    async fn closing_pull_requests(&self, _repo: &RepoRef, number: u64) -> Result<Vec<PullRef>, GithubError> {
        Ok(self.closing_prs.get(&number).cloned().unwrap_or_default())
    }

    async fn org_membership(&self, _org: &str, username: &str) -> Result<OrgMembership, GithubError> {
        self.authorization_calls.fetch_add(1, Ordering::SeqCst);
        match self.memberships.get(username) {
            Some(Ok(membership)) => Ok(membership.clone()),
            Some(Err(status)) => Err(status_error(*status)),
            None => Err(status_error(404)),
        }
    }

    async fn collaborator_permission(
        &self,
        _repo: &RepoRef,
        username: &str,
    ) -> Result<CollaboratorPermission, GithubError> {
        self.authorization_calls.fetch_add(1, Ordering::SeqCst);
        match self.permissions.get(username) {
            Some(Ok(permission)) => Ok(permission.clone()),
            Some(Err(status)) => Err(status_error(*status)),
            None => Err(status_error(404)),
        }
    }

    async fn post_comment(&self, _repo: &RepoRef, number: u64, body: &str) -> Result<(), GithubError> {
        if let Ok(mut posted) = self.posted.lock() {
            posted.push((number, body.to_string()));
        }
        Ok(())
    }

    async fn block_user(&self, org: &str, username: &str) -> Result<(), GithubError> {
        if let Some(status) = self.block_failure {
            return Err(status_error(status));
        }
        if let Ok(mut blocked) = self.blocked.lock() {
            blocked.push((org.to_string(), username.to_string()));
        }
        Ok(())
    }

    async fn get_user(&self, login: &str) -> Result<Option<UserRef>, GithubError> {
        Ok(self.users.get(&login.to_ascii_lowercase()).cloned())
    }
}

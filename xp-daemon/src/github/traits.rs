//! Core trait for the issue-tracking platform.
//!
//! `GithubApi` is the seam between the engine and the platform. The REST
//! client implements it for production; `MockGithub` scripts it for tests.

use async_trait::async_trait;

use super::types::*;

/// Error types for platform calls.
#[derive(Debug, thiserror::Error)]
pub enum GithubError {
    /// The platform answered with a non-success status
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// GraphQL query returned errors
    #[error("GraphQL error: {0}")]
    GraphQl(String),

    /// Network error
    #[error("Network error: {0}")]
    Network(String),

    /// Parsing error
    #[error("Parse error: {0}")]
    Parse(String),
}

impl GithubError {
    pub fn status(&self) -> Option<u16> {
        match self {
            GithubError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// 404, 302 and 403 answer an authorization question with "no".
    pub fn is_definitive_negative(&self) -> bool {
        matches!(self.status(), Some(404) | Some(302) | Some(403))
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

/// Platform operations consumed by the engine and the XP commands.
///
/// List operations return every page.
#[async_trait]
pub trait GithubApi: Send + Sync {
    /// Full timeline of a work item.
    async fn issue_timeline(&self, repo: &RepoRef, number: u64) -> Result<Vec<TimelineEvent>, GithubError>;

    /// Comments on an issue or pull request conversation.
    async fn issue_comments(&self, repo: &RepoRef, number: u64) -> Result<Vec<Authored>, GithubError>;

    /// Reviews on a pull request.
    async fn pull_reviews(&self, repo: &RepoRef, number: u64) -> Result<Vec<Authored>, GithubError>;

    /// Inline review comments on a pull request.
    async fn pull_review_comments(&self, repo: &RepoRef, number: u64) -> Result<Vec<Authored>, GithubError>;

    /// Pull requests that close the given issue, possibly from other repositories.
    async fn closing_pull_requests(&self, repo: &RepoRef, number: u64) -> Result<Vec<PullRef>, GithubError>;

    /// Organization membership of a user.
    async fn org_membership(&self, org: &str, username: &str) -> Result<OrgMembership, GithubError>;

    /// Collaborator permission of a user on a repository.
    async fn collaborator_permission(
        &self,
        repo: &RepoRef,
        username: &str,
    ) -> Result<CollaboratorPermission, GithubError>;

    /// Post a comment on a work item.
    async fn post_comment(&self, repo: &RepoRef, number: u64, body: &str) -> Result<(), GithubError>;

    /// Block a user from an organization.
    async fn block_user(&self, org: &str, username: &str) -> Result<(), GithubError>;

    /// Look up an account by login; `None` when it does not exist.
    async fn get_user(&self, login: &str) -> Result<Option<UserRef>, GithubError>;
}

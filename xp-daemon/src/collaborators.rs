//! Privileged participant classification.
//!
//! A participant is privileged when either check answers yes:
//!
//! 1. active organization membership with role `admin`, `member` or
//!    `billing_manager`
//! 2. repository collaborator permission `admin`, `maintain`, `write` or
//!    `triage`
//!
//! 404, 302 and 403 are definitive negatives. Any other failure means the
//! determination cannot be made and the evaluation must stop.

use futures::future::try_join_all;
use tracing::{debug, error};

use crate::error::EngineError;
use crate::github::{GithubApi, GithubError, RepoRef, UserRef};

const ORG_ROLES: &[&str] = &["admin", "member", "billing_manager"];
const REPO_PERMISSIONS: &[&str] = &["admin", "maintain", "write", "triage"];

/// Where the authorization checks are made.
#[derive(Debug, Clone)]
pub struct AuthorizationScope {
    /// Organization login, or the repository owner when none was given
    pub org: String,
    pub repo: RepoRef,
}

/// The participants holding elevated privileges, in input order.
///
/// Checks for different participants run concurrently; the result is only
/// produced once every check has resolved.
pub async fn filter_collaborators(
    github: &dyn GithubApi,
    scope: &AuthorizationScope,
    participants: &[UserRef],
) -> Result<Vec<UserRef>, EngineError> {
    let checks = participants
        .iter()
        .filter(|user| !user.login.is_empty())
        .map(|user| async move {
            let privileged = is_privileged(github, scope, &user.login).await?;
            Ok::<_, EngineError>(privileged.then(|| user.clone()))
        });

    let collaborators: Vec<UserRef> = try_join_all(checks).await?.into_iter().flatten().collect();
    debug!(
        participants = participants.len(),
        collaborators = collaborators.len(),
        "Collaborator classification complete"
    );
    Ok(collaborators)
}

async fn is_privileged(github: &dyn GithubApi, scope: &AuthorizationScope, login: &str) -> Result<bool, EngineError> {
    if is_org_collaborator(github, &scope.org, login).await? {
        return Ok(true);
    }
    has_repo_permission(github, &scope.repo, login).await
}

async fn is_org_collaborator(github: &dyn GithubApi, org: &str, login: &str) -> Result<bool, EngineError> {
    match github.org_membership(org, login).await {
        Ok(membership) => {
            let active = membership.state.as_deref() == Some("active");
            let role = membership.role.as_deref().unwrap_or_default();
            Ok(active && ORG_ROLES.contains(&role))
        }
        Err(e) => definitive_negative("organization membership", login, e),
    }
}

async fn has_repo_permission(github: &dyn GithubApi, repo: &RepoRef, login: &str) -> Result<bool, EngineError> {
    match github.collaborator_permission(repo, login).await {
        Ok(level) => Ok(level
            .permission
            .map(|p| p.to_ascii_lowercase())
            .is_some_and(|p| REPO_PERMISSIONS.contains(&p.as_str()))),
        Err(e) => definitive_negative("repository permission", login, e),
    }
}

fn definitive_negative(check: &'static str, login: &str, err: GithubError) -> Result<bool, EngineError> {
    if err.is_definitive_negative() {
        debug!(login, check, status = ?err.status(), "Treating as not privileged");
        return Ok(false);
    }
    error!(login, check, error = %err, "Authorization check failed");
    Err(EngineError::Authorization {
        check,
        login: login.to_string(),
        source: err,
    })
}

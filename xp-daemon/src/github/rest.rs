//! REST/GraphQL client for the GitHub API.

use async_trait::async_trait;
use reqwest::{header, redirect, Client, Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::traits::*;
use super::types::*;

/// Public GitHub API.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

const DEFAULT_PER_PAGE: usize = 100;

const CLOSING_PRS_QUERY: &str = r#"
query($owner: String!, $repo: String!, $number: Int!, $after: String) {
  repository(owner: $owner, name: $repo) {
    issue(number: $number) {
      closedByPullRequestsReferences(first: 100, after: $after, includeClosedPrs: true) {
        nodes { number repository { name owner { login } } }
        pageInfo { hasNextPage endCursor }
      }
    }
  }
}
"#;

/// GitHub client over `reqwest`.
///
/// Redirects are not followed: a 302 from a permission endpoint is an answer,
/// not a hop.
pub struct RestGithubClient {
    client: Client,
    base_url: String,
    graphql_url: String,
    token: Option<String>,
    per_page: usize,
}

impl RestGithubClient {
    /// Create a client for the API rooted at `base_url`.
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Result<Self, GithubError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "x-github-api-version",
            header::HeaderValue::from_static("2022-11-28"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .user_agent(concat!("xp-daemon/", env!("CARGO_PKG_VERSION")))
            .redirect(redirect::Policy::none())
            .build()
            .map_err(|e| GithubError::Network(format!("Failed to create HTTP client: {}", e)))?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self {
            graphql_url: format!("{}/graphql", base_url),
            client,
            base_url,
            token,
            per_page: DEFAULT_PER_PAGE,
        })
    }

    /// Client for the public API.
    pub fn github(token: Option<String>) -> Result<Self, GithubError> {
        Self::new(DEFAULT_API_URL, token)
    }

    /// Override the GraphQL endpoint (GitHub Enterprise serves it outside the REST root).
    pub fn with_graphql_url(mut self, url: impl Into<String>) -> Self {
        self.graphql_url = url.into();
        self
    }

    /// Set the page size used by list calls.
    pub fn with_per_page(mut self, per_page: usize) -> Self {
        self.per_page = per_page.clamp(1, 100);
        self
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, GithubError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| GithubError::Network(format!("Invalid base URL {}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| GithubError::Network(format!("Base URL {} cannot carry a path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let request = self.client.request(method, url);
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, GithubError> {
        let response = request
            .send()
            .await
            .map_err(|e| GithubError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response.text().await.unwrap_or_default();
        Err(GithubError::Status {
            status: status.as_u16(),
            message,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, GithubError> {
        let url = self.endpoint(segments)?;
        self.send(self.request(Method::GET, url))
            .await?
            .json()
            .await
            .map_err(|e| GithubError::Parse(e.to_string()))
    }

    /// Walk numbered pages until one comes back short.
    async fn get_paginated<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<Vec<T>, GithubError> {
        let url = self.endpoint(segments)?;
        let mut items = Vec::new();
        let mut page = 1u32;

        loop {
            let request = self
                .request(Method::GET, url.clone())
                .query(&[("per_page", self.per_page.to_string()), ("page", page.to_string())]);
            let batch: Vec<T> = self
                .send(request)
                .await?
                .json()
                .await
                .map_err(|e| GithubError::Parse(e.to_string()))?;

            let fetched = batch.len();
            items.extend(batch);
            if fetched < self.per_page {
                break;
            }
            page += 1;
        }

        debug!(path = %url.path(), count = items.len(), pages = page, "Fetched paginated list");
        Ok(items)
    }
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<ClosingData>,
    #[serde(default)]
    errors: Vec<GraphQlErrorMessage>,
}

#[derive(Debug, Deserialize)]
struct GraphQlErrorMessage {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ClosingData {
    repository: Option<ClosingRepository>,
}

#[derive(Debug, Deserialize)]
struct ClosingRepository {
    issue: Option<ClosingIssue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClosingIssue {
    closed_by_pull_requests_references: ClosingConnection,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClosingConnection {
    #[serde(default)]
    nodes: Vec<Option<ClosingPull>>,
    page_info: PageInfo,
}

#[derive(Debug, Deserialize)]
struct ClosingPull {
    number: u64,
    #[serde(default)]
    repository: Option<ClosingPullRepository>,
}

#[derive(Debug, Deserialize)]
struct ClosingPullRepository {
    name: String,
    owner: ClosingPullOwner,
}

#[derive(Debug, Deserialize)]
struct ClosingPullOwner {
    login: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    has_next_page: bool,
    end_cursor: Option<String>,
}

#[async_trait]
impl GithubApi for RestGithubClient {
    async fn issue_timeline(&self, repo: &RepoRef, number: u64) -> Result<Vec<TimelineEvent>, GithubError> {
        let number = number.to_string();
        let raw: Vec<serde_json::Value> = self
            .get_paginated(&["repos", repo.owner.as_str(), repo.name.as_str(), "issues", number.as_str(), "timeline"])
            .await?;
        Ok(raw.into_iter().map(TimelineEvent::from_value).collect())
    }

    async fn issue_comments(&self, repo: &RepoRef, number: u64) -> Result<Vec<Authored>, GithubError> {
        let number = number.to_string();
        self.get_paginated(&["repos", repo.owner.as_str(), repo.name.as_str(), "issues", number.as_str(), "comments"])
            .await
    }

    async fn pull_reviews(&self, repo: &RepoRef, number: u64) -> Result<Vec<Authored>, GithubError> {
        let number = number.to_string();
        self.get_paginated(&["repos", repo.owner.as_str(), repo.name.as_str(), "pulls", number.as_str(), "reviews"])
            .await
    }

    async fn pull_review_comments(&self, repo: &RepoRef, number: u64) -> Result<Vec<Authored>, GithubError> {
        let number = number.to_string();
        self.get_paginated(&["repos", repo.owner.as_str(), repo.name.as_str(), "pulls", number.as_str(), "comments"])
            .await
    }

    async fn closing_pull_requests(&self, repo: &RepoRef, number: u64) -> Result<Vec<PullRef>, GithubError> {
        let url = Url::parse(&self.graphql_url)
            .map_err(|e| GithubError::Network(format!("Invalid GraphQL URL {}: {}", self.graphql_url, e)))?;
        let mut pulls = Vec::new();
        let mut after: Option<String> = None;

        loop {
            let body = json!({
                "query": CLOSING_PRS_QUERY,
                "variables": {
                    "owner": repo.owner,
                    "repo": repo.name,
                    "number": number,
                    "after": after,
                },
            });
            let response: GraphQlResponse = self
                .send(self.request(Method::POST, url.clone()).json(&body))
                .await?
                .json()
                .await
                .map_err(|e| GithubError::Parse(e.to_string()))?;

            if !response.errors.is_empty() {
                let messages: Vec<String> = response.errors.into_iter().map(|e| e.message).collect();
                return Err(GithubError::GraphQl(messages.join("; ")));
            }

            let Some(connection) = response
                .data
                .and_then(|d| d.repository)
                .and_then(|r| r.issue)
                .map(|i| i.closed_by_pull_requests_references)
            else {
                break;
            };

            pulls.extend(connection.nodes.into_iter().flatten().map(|pull| {
                // A node without its repository is read as living next to the issue.
                let pull_repo = pull
                    .repository
                    .map(|r| RepoRef::new(r.owner.login, r.name))
                    .unwrap_or_else(|| repo.clone());
                PullRef::new(pull_repo, pull.number)
            }));
            match connection.page_info {
                PageInfo { has_next_page: true, end_cursor: Some(cursor) } => after = Some(cursor),
                _ => break,
            }
        }

        Ok(pulls)
    }

    async fn org_membership(&self, org: &str, username: &str) -> Result<OrgMembership, GithubError> {
        self.get_json(&["orgs", org, "memberships", username]).await
    }

    async fn collaborator_permission(
        &self,
        repo: &RepoRef,
        username: &str,
    ) -> Result<CollaboratorPermission, GithubError> {
        self.get_json(&["repos", repo.owner.as_str(), repo.name.as_str(), "collaborators", username, "permission"])
            .await
    }

    async fn post_comment(&self, repo: &RepoRef, number: u64, body: &str) -> Result<(), GithubError> {
        let number = number.to_string();
        let url = self.endpoint(&["repos", repo.owner.as_str(), repo.name.as_str(), "issues", number.as_str(), "comments"])?;
        self.send(self.request(Method::POST, url).json(&json!({ "body": body })))
            .await?;
        Ok(())
    }

    async fn block_user(&self, org: &str, username: &str) -> Result<(), GithubError> {
        let url = self.endpoint(&["orgs", org, "blocks", username])?;
        self.send(self.request(Method::PUT, url)).await?;
        Ok(())
    }

    async fn get_user(&self, login: &str) -> Result<Option<UserRef>, GithubError> {
        #[derive(Deserialize)]
        struct UserBody {
            id: i64,
            login: String,
        }

        match self.get_json::<UserBody>(&["users", login]).await {
            Ok(user) => Ok(Some(UserRef::new(user.id, user.login))),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_segments() {
        let client = RestGithubClient::new("https://ghe.example.com/api/v3/", None).unwrap();
        let url = client.endpoint(&["repos", "acme", "widgets", "issues", "7", "timeline"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://ghe.example.com/api/v3/repos/acme/widgets/issues/7/timeline"
        );
    }

    #[test]
    fn test_default_graphql_url() {
        let client = RestGithubClient::github(None).unwrap();
        assert_eq!(client.graphql_url, "https://api.github.com/graphql");
    }
}

//! RestGithubClient against a fake API server.

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use xp_daemon::github::{GithubApi, PullRef, RepoRef, TimelineEvent, UserRef};
use xp_daemon::RestGithubClient;

fn repo() -> RepoRef {
    RepoRef::new("acme", "widgets")
}

async fn client(server: &MockServer) -> RestGithubClient {
    RestGithubClient::new(server.uri(), Some("test-token".to_string()))
        .unwrap()
        .with_per_page(2)
}

#[tokio::test]
async fn test_comments_follow_pages_until_short() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/issues/7/comments"))
        .and(query_param("page", "1"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "user": { "id": 1, "login": "alice" } },
            { "user": null }
        ])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/issues/7/comments"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "user": { "id": 2, "login": "bob", "type": "User" } }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let comments = client(&server).await.issue_comments(&repo(), 7).await.unwrap();
    assert_eq!(comments.len(), 3);
    assert_eq!(comments[2].user.as_ref().and_then(|u| u.to_user()), Some(UserRef::new(2, "bob")));
}

#[tokio::test]
async fn test_timeline_decodes_events() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/issues/7/timeline"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "event": "unassigned",
                "actor": { "login": "ubiquity-os[bot]", "type": "Bot" },
                "assignee": { "id": 9, "login": "hunter" },
                "created_at": "2024-01-01T12:00:00Z"
            }
        ])))
        .mount(&server)
        .await;

    let timeline = client(&server).await.issue_timeline(&repo(), 7).await.unwrap();
    assert!(matches!(timeline.as_slice(), [TimelineEvent::Unassigned { .. }]));
}

#[tokio::test]
async fn test_authorization_statuses_are_preserved() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/orgs/acme/memberships/alice"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "https://example.com/elsewhere"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/collaborators/alice/permission"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/orgs/acme/memberships/bob"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "state": "active", "role": "admin" })))
        .mount(&server)
        .await;

    let client = client(&server).await;

    let redirect = client.org_membership("acme", "alice").await.unwrap_err();
    assert_eq!(redirect.status(), Some(302));
    assert!(redirect.is_definitive_negative());

    let failure = client.collaborator_permission(&repo(), "alice").await.unwrap_err();
    assert_eq!(failure.status(), Some(500));
    assert!(!failure.is_definitive_negative());

    let membership = client.org_membership("acme", "bob").await.unwrap();
    assert_eq!(membership.role.as_deref(), Some("admin"));
}

#[tokio::test]
async fn test_closing_pull_requests_walks_cursor() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_partial_json(json!({ "variables": { "number": 7, "after": null } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "repository": { "issue": { "closedByPullRequestsReferences": {
                "nodes": [
                    { "number": 20, "repository": { "name": "widgets", "owner": { "login": "acme" } } },
                    null
                ],
                "pageInfo": { "hasNextPage": true, "endCursor": "c1" }
            }}}}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_partial_json(json!({ "variables": { "after": "c1" } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "repository": { "issue": { "closedByPullRequestsReferences": {
                "nodes": [
                    { "number": 21, "repository": { "name": "gears", "owner": { "login": "acme-forks" } } },
                    { "number": 22 }
                ],
                "pageInfo": { "hasNextPage": false, "endCursor": null }
            }}}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let pulls = client(&server).await.closing_pull_requests(&repo(), 7).await.unwrap();
    assert_eq!(
        pulls,
        vec![
            PullRef::new(repo(), 20),
            PullRef::new(RepoRef::new("acme-forks", "gears"), 21),
            PullRef::new(repo(), 22),
        ]
    );
}

#[tokio::test]
async fn test_graphql_errors_surface() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": null,
            "errors": [{ "message": "Could not resolve to a Repository" }]
        })))
        .mount(&server)
        .await;

    let err = client(&server).await.closing_pull_requests(&repo(), 7).await.unwrap_err();
    assert!(err.to_string().contains("Could not resolve"));
}

#[tokio::test]
async fn test_get_user_not_found_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/ghost"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "message": "Not Found" })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users/alice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 1, "login": "Alice" })))
        .mount(&server)
        .await;

    let client = client(&server).await;
    assert_eq!(client.get_user("ghost").await.unwrap(), None);
    assert_eq!(client.get_user("alice").await.unwrap(), Some(UserRef::new(1, "Alice")));
}

#[tokio::test]
async fn test_comment_and_block_calls() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/repos/acme/widgets/issues/7/comments"))
        .and(body_partial_json(json!({ "body": "hello" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 1 })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/orgs/acme/blocks/hunter"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server).await;
    client.post_comment(&repo(), 7, "hello").await.unwrap();
    client.block_user("acme", "hunter").await.unwrap();
}

//! GitHub API client tests against a local mock server.

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use slipway::forge::github::GitHubForge;
use slipway::forge::{
    CheckConclusion, CheckStatus, CreatePrRequest, Forge, ForgeError, MergeMethod, PrState,
};

async fn forge(server: &MockServer) -> GitHubForge {
    GitHubForge::with_api_base("test-token", "octocat", "widget", server.uri())
}

fn pr_json(number: u64, state: &str, merged_at: Option<&str>) -> serde_json::Value {
    json!({
        "number": number,
        "html_url": format!("https://github.com/octocat/widget/pull/{}", number),
        "state": state,
        "merged_at": merged_at,
        "title": "Release v1.2.0",
        "head": { "ref": "develop", "sha": "abc123" },
        "base": { "ref": "main", "sha": "def456" },
    })
}

#[tokio::test]
async fn find_pr_by_head_matches_one() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octocat/widget/pulls"))
        .and(query_param("head", "octocat:develop"))
        .and(query_param("state", "open"))
        .and(header("Authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([pr_json(7, "open", None)])))
        .mount(&server)
        .await;

    let pr = forge(&server)
        .await
        .find_pr_by_head("develop")
        .await
        .unwrap()
        .expect("PR should be found");
    assert_eq!(pr.number, 7);
    assert_eq!(pr.state, PrState::Open);
    assert_eq!(pr.head, "develop");
    assert_eq!(pr.head_sha, "abc123");
    assert_eq!(pr.base, "main");
}

#[tokio::test]
async fn find_pr_by_head_empty_list_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octocat/widget/pulls"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let pr = forge(&server).await.find_pr_by_head("develop").await.unwrap();
    assert!(pr.is_none());
}

#[tokio::test]
async fn merged_at_wins_over_state() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octocat/widget/pulls/7"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(pr_json(7, "closed", Some("2026-08-01T00:00:00Z"))),
        )
        .mount(&server)
        .await;

    let pr = forge(&server).await.get_pr(7).await.unwrap();
    assert_eq!(pr.state, PrState::Merged);
}

#[tokio::test]
async fn create_pr_posts_expected_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/repos/octocat/widget/pulls"))
        .and(body_partial_json(json!({
            "title": "Release v1.2.0",
            "head": "develop",
            "base": "main",
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(pr_json(8, "open", None)))
        .mount(&server)
        .await;

    let pr = forge(&server)
        .await
        .create_pr(CreatePrRequest {
            head: "develop".to_string(),
            base: "main".to_string(),
            title: "Release v1.2.0".to_string(),
            body: Some("## Changes\n\n- fix things\n".to_string()),
        })
        .await
        .unwrap();
    assert_eq!(pr.number, 8);
}

#[tokio::test]
async fn merge_sends_merge_method() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/repos/octocat/widget/pulls/8/merge"))
        .and(body_partial_json(json!({ "merge_method": "squash" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sha": "abc123",
            "merged": true,
            "message": "Pull Request successfully merged",
        })))
        .mount(&server)
        .await;

    forge(&server)
        .await
        .merge_pr(8, MergeMethod::Squash, false)
        .await
        .unwrap();
}

#[tokio::test]
async fn non_mergeable_surfaces_the_status() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/repos/octocat/widget/pulls/8/merge"))
        .respond_with(
            ResponseTemplate::new(405)
                .set_body_json(json!({ "message": "Pull Request is not mergeable" })),
        )
        .mount(&server)
        .await;

    let err = forge(&server)
        .await
        .merge_pr(8, MergeMethod::Squash, false)
        .await
        .unwrap_err();
    match err {
        ForgeError::ApiError { status, message } => {
            assert_eq!(status, 405);
            assert!(message.contains("not mergeable"));
        }
        other => panic!("expected ApiError, got {:?}", other),
    }
}

#[tokio::test]
async fn unauthorized_is_auth_failed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octocat/widget/pulls/1"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "message": "Bad credentials" })),
        )
        .mount(&server)
        .await;

    let err = forge(&server).await.get_pr(1).await.unwrap_err();
    assert!(matches!(err, ForgeError::AuthFailed(m) if m == "Bad credentials"));
}

#[tokio::test]
async fn exhausted_rate_limit_is_classified() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octocat/widget/pulls/1"))
        .respond_with(
            ResponseTemplate::new(403)
                .insert_header("x-ratelimit-remaining", "0")
                .set_body_json(json!({ "message": "API rate limit exceeded" })),
        )
        .mount(&server)
        .await;

    let err = forge(&server).await.get_pr(1).await.unwrap_err();
    assert!(matches!(err, ForgeError::RateLimited));
    assert!(!err.is_propagation_lag());
}

#[tokio::test]
async fn missing_resource_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/repos/octocat/widget/releases"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "message": "Not Found" })))
        .mount(&server)
        .await;

    let err = forge(&server)
        .await
        .create_release("v1.2.0", "v1.2.0", "notes")
        .await
        .unwrap_err();
    assert!(matches!(err, ForgeError::NotFound(_)));
    // The retry loop keys off this classification.
    assert!(err.is_propagation_lag());
}

#[tokio::test]
async fn check_runs_parse_status_and_conclusion() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octocat/widget/commits/abc123/check-runs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total_count": 3,
            "check_runs": [
                { "name": "build", "status": "completed", "conclusion": "success" },
                { "name": "test", "status": "in_progress", "conclusion": null },
                { "name": "lint", "status": "completed", "conclusion": "some_future_state" },
            ],
        })))
        .mount(&server)
        .await;

    let checks = forge(&server).await.list_checks("abc123").await.unwrap();
    assert_eq!(checks.len(), 3);
    assert_eq!(checks[0].conclusion, Some(CheckConclusion::Success));
    assert_eq!(checks[1].status, CheckStatus::InProgress);
    assert_eq!(checks[1].conclusion, None);
    // Unknown conclusions read as failure rather than silently passing.
    assert_eq!(checks[2].conclusion, Some(CheckConclusion::Failure));
}

#[tokio::test]
async fn check_automation_follows_workflow_count() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octocat/widget/actions/workflows"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "total_count": 2, "workflows": [] })),
        )
        .mount(&server)
        .await;
    assert!(forge(&server).await.has_check_automation().await.unwrap());

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octocat/widget/actions/workflows"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "total_count": 0, "workflows": [] })),
        )
        .mount(&server)
        .await;
    assert!(!forge(&server).await.has_check_automation().await.unwrap());
}

#[tokio::test]
async fn create_release_returns_the_record() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/repos/octocat/widget/releases"))
        .and(body_partial_json(json!({
            "tag_name": "v1.2.0",
            "name": "v1.2.0",
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 42,
            "html_url": "https://github.com/octocat/widget/releases/tag/v1.2.0",
            "tag_name": "v1.2.0",
        })))
        .mount(&server)
        .await;

    let record = forge(&server)
        .await
        .create_release("v1.2.0", "v1.2.0", "notes")
        .await
        .unwrap();
    assert_eq!(record.id, 42);
    assert_eq!(record.tag, "v1.2.0");
}

#[tokio::test]
async fn close_milestone_matches_by_title() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octocat/widget/milestones"))
        .and(query_param("state", "open"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "number": 3, "title": "1.1.0" },
            { "number": 4, "title": "1.2.0" },
        ])))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/repos/octocat/widget/milestones/4"))
        .and(body_partial_json(json!({ "state": "closed" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "number": 4,
            "title": "1.2.0",
            "state": "closed",
        })))
        .mount(&server)
        .await;

    assert!(forge(&server).await.close_milestone("1.2.0").await.unwrap());
}

#[tokio::test]
async fn close_milestone_absent_title_is_false() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octocat/widget/milestones"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    assert!(!forge(&server).await.close_milestone("1.2.0").await.unwrap());
}

#[tokio::test]
async fn release_workflow_runs_filter_by_tag() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octocat/widget/actions/runs"))
        .and(query_param("event", "release"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total_count": 2,
            "workflow_runs": [
                { "name": "publish", "status": "completed", "conclusion": "success",
                  "head_branch": "v1.2.0" },
                { "name": "publish", "status": "completed", "conclusion": "success",
                  "head_branch": "v1.1.0" },
            ],
        })))
        .mount(&server)
        .await;

    let runs = forge(&server)
        .await
        .release_workflow_runs("v1.2.0")
        .await
        .unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].name, "publish");
    assert_eq!(runs[0].conclusion, Some(CheckConclusion::Success));
}

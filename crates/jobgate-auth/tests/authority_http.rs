//! HTTP authority clients against a mock server.

use std::time::Duration;

use jobgate_auth::prelude::*;
use jobgate_auth::{HttpRoleAuthority, HttpWorkspaceAuthority};
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TIMEOUT: Duration = Duration::from_secs(5);

fn caller() -> CallerIdentity {
    CallerIdentity::new("alice", "token-abc")
}

async fn workspace_client(server: &MockServer) -> HttpWorkspaceAuthority {
    let url = Url::parse(&format!("{}/ws", server.uri())).unwrap();
    HttpWorkspaceAuthority::new(url, TIMEOUT).unwrap()
}

#[tokio::test]
async fn test_workspace_permissions_request_and_mapping() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/ws"))
        .and(header("Authorization", "token-abc"))
        .and(body_partial_json(json!({
            "method": "Workspace.get_permissions_mass",
            "params": [{"workspaces": [{"id": 1001}]}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "version": "1.1",
            "result": [{"perms": [{"alice": "w", "bob": "r"}]}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = workspace_client(&server).await;
    let level = client
        .get_access_level(&caller(), &WorkspaceId::new("1001"))
        .await
        .unwrap();

    assert_eq!(level, PermissionLevel::Write);
}

#[tokio::test]
async fn test_workspace_public_read() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": [{"perms": [{"*": "r", "bob": "a"}]}]
        })))
        .mount(&server)
        .await;

    let client = workspace_client(&server).await;
    let level = client
        .get_access_level(&caller(), &WorkspaceId::new("7"))
        .await
        .unwrap();

    assert_eq!(level, PermissionLevel::Read);
}

#[tokio::test]
async fn test_workspace_server_error_is_unavailable() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": {"message": "boom"}
        })))
        .mount(&server)
        .await;

    let client = workspace_client(&server).await;
    let err = client
        .get_access_level(&caller(), &WorkspaceId::new("7"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AuthError::AuthorityUnavailable { ref authority, .. } if authority == "workspace"
    ));
}

#[tokio::test]
async fn test_workspace_malformed_body_is_unavailable() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let client = workspace_client(&server).await;
    let err = client
        .get_access_level(&caller(), &WorkspaceId::new("7"))
        .await
        .unwrap_err();

    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_workspace_slow_response_times_out() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"result": [{"perms": [{"alice": "w"}]}]}))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let url = Url::parse(&server.uri()).unwrap();
    let client = HttpWorkspaceAuthority::new(url, Duration::from_millis(200)).unwrap();
    let err = client
        .get_access_level(&caller(), &WorkspaceId::new("7"))
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::AuthorityUnavailable { .. }));
}

#[tokio::test]
async fn test_roles_from_me_endpoint() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/services/auth/api/V2/me"))
        .and(header("Authorization", "token-abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user": "alice",
            "customroles": ["EE2_ADMIN_RO", "DEVELOPER"]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let url = Url::parse(&format!("{}/services/auth", server.uri())).unwrap();
    let client = HttpRoleAuthority::new(url, TIMEOUT).unwrap();
    let roles = client.get_roles(&caller()).await.unwrap();

    assert_eq!(roles.len(), 2);
    assert!(roles.contains("EE2_ADMIN_RO"));
    assert_eq!(
        AdminRoles::default().level_for(&roles),
        PermissionLevel::Read
    );
}

#[tokio::test]
async fn test_roles_unauthorized_is_unavailable() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let url = Url::parse(&server.uri()).unwrap();
    let client = HttpRoleAuthority::new(url, TIMEOUT).unwrap();
    let err = client.get_roles(&caller()).await.unwrap_err();

    assert!(matches!(
        err,
        AuthError::AuthorityUnavailable { ref authority, .. } if authority == "roles"
    ));
}

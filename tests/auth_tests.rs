//! Tests for identity resolution, the authorization resolver and CSRF
//! enforcement on cookie sessions.

mod common;

use axum::http::StatusCode;
use sea_orm::EntityTrait;

use common::{
    ADMIN_PASSWORD, ADMIN_TOKEN, PUBLISH_TOKEN, TestRequest, UPLOAD_TOKEN, body_json,
    create_module_provider, create_namespace, spawn_app,
};
use tfregistry::auth::Identity;
use tfregistry::auth::session::create_session;
use tfregistry::models::audit_history;

#[tokio::test]
async fn anonymous_cannot_mutate() {
    let test = spawn_app().await;

    let response = TestRequest::new("POST", "/v1/terrareg/namespaces")
        .json(serde_json::json!({ "name": "acme" }))
        .send(&test.app)
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn invalid_bearer_token_resolves_to_anonymous() {
    let test = spawn_app().await;

    let response = TestRequest::new("POST", "/v1/terrareg/namespaces")
        .bearer("not-a-real-token")
        .json(serde_json::json!({ "name": "acme" }))
        .send(&test.app)
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn upload_token_can_import_but_not_administer() {
    let test = spawn_app().await;
    create_namespace(&test.app, "acme").await;
    create_module_provider(&test.app, "acme", "network", "aws").await;

    // Import is allowed anywhere for the upload token.
    let response = TestRequest::new("POST", "/v1/terrareg/modules/acme/network/aws/import")
        .bearer(UPLOAD_TOKEN)
        .json(serde_json::json!({ "version": "1.0.0" }))
        .send(&test.app)
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    // Namespace administration is not.
    let response = TestRequest::new("POST", "/v1/terrareg/namespaces")
        .bearer(UPLOAD_TOKEN)
        .json(serde_json::json!({ "name": "other" }))
        .send(&test.app)
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Nor module provider settings.
    let response = TestRequest::new("POST", "/v1/terrareg/modules/acme/network/aws/settings")
        .bearer(UPLOAD_TOKEN)
        .json(serde_json::json!({ "verified": true }))
        .send(&test.app)
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn publish_token_is_namespace_scoped() {
    let test = spawn_app().await;
    create_namespace(&test.app, "acme").await;
    create_namespace(&test.app, "other").await;

    // Allowed in its own namespace.
    let response = TestRequest::new("POST", "/v1/terrareg/modules/acme/network/aws/create")
        .bearer(PUBLISH_TOKEN)
        .json(serde_json::json!({}))
        .send(&test.app)
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    // Rejected elsewhere.
    let response = TestRequest::new("POST", "/v1/terrareg/modules/other/network/aws/create")
        .bearer(PUBLISH_TOKEN)
        .json(serde_json::json!({}))
        .send(&test.app)
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn cookie_session_requires_csrf_for_mutations() {
    let test = spawn_app().await;

    let login = TestRequest::new("POST", "/v1/terrareg/auth/login")
        .json(serde_json::json!({ "username": "admin", "password": ADMIN_PASSWORD }))
        .send(&test.app)
        .await;
    assert_eq!(login.status(), StatusCode::OK);
    let cookie = login
        .headers()
        .get("set-cookie")
        .unwrap()
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string();
    let body = body_json(login).await;
    let csrf = body["csrf_token"].as_str().unwrap().to_string();

    // Without the CSRF header the mutation is rejected.
    let response = TestRequest::new("POST", "/v1/terrareg/namespaces")
        .header("Cookie", &cookie)
        .json(serde_json::json!({ "name": "acme" }))
        .send(&test.app)
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // With it the mutation succeeds.
    let response = TestRequest::new("POST", "/v1/terrareg/namespaces")
        .header("Cookie", &cookie)
        .header("X-CSRF-Token", &csrf)
        .json(serde_json::json!({ "name": "acme" }))
        .send(&test.app)
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    // Reads never need CSRF.
    let response = TestRequest::new("GET", "/v1/terrareg/auth/admin/is_authenticated")
        .header("Cookie", &cookie)
        .send(&test.app)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn login_writes_audit_row_and_logout_invalidates() {
    let test = spawn_app().await;

    let login = TestRequest::new("POST", "/v1/terrareg/auth/login")
        .json(serde_json::json!({ "username": "admin", "password": ADMIN_PASSWORD }))
        .send(&test.app)
        .await;
    assert_eq!(login.status(), StatusCode::OK);
    let session_id = login
        .headers()
        .get("set-cookie")
        .unwrap()
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .split_once('=')
        .unwrap()
        .1
        .to_string();

    let rows = audit_history::Entity::find()
        .all(&test.state.db)
        .await
        .unwrap();
    assert!(rows.iter().any(|r| r.action == "user_login" && r.username == "admin"));

    // Logout via the session header path (no CSRF needed off-cookie).
    let response = TestRequest::new("DELETE", "/v1/terrareg/auth/session")
        .header("X-Terraform-Session", &session_id)
        .send(&test.app)
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let who = body_json(
        TestRequest::new("GET", "/v1/terrareg/auth/admin/is_authenticated")
            .header("X-Terraform-Session", &session_id)
            .send(&test.app)
            .await,
    )
    .await;
    assert_eq!(who["authenticated"], false);
}

#[tokio::test]
async fn bad_password_is_rejected() {
    let test = spawn_app().await;

    let response = TestRequest::new("POST", "/v1/terrareg/auth/login")
        .json(serde_json::json!({ "username": "admin", "password": "wrong" }))
        .send(&test.app)
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let rows = audit_history::Entity::find()
        .all(&test.state.db)
        .await
        .unwrap();
    assert!(rows.is_empty(), "failed login must not write audit rows");
}

#[tokio::test]
async fn federated_group_permissions_govern_mutations() {
    let test = spawn_app().await;
    create_namespace(&test.app, "acme").await;

    // A user group with modify on acme.
    let response = TestRequest::new("POST", "/v1/terrareg/user-groups")
        .bearer(ADMIN_TOKEN)
        .json(serde_json::json!({ "name": "platform-team" }))
        .send(&test.app)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let response = TestRequest::new("PUT", "/v1/terrareg/user-groups/platform-team/permissions/acme")
        .bearer(ADMIN_TOKEN)
        .json(serde_json::json!({ "permission_type": "modify" }))
        .send(&test.app)
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    // An OIDC session for a member of that group.
    let member = Identity::OidcSession {
        username: "jane".to_string(),
        groups: vec!["platform-team".to_string()],
    };
    let member_session = create_session(&test.state.db, &test.state.config, &member)
        .await
        .unwrap();

    // An OIDC session for someone with no mapped groups.
    let outsider = Identity::OidcSession {
        username: "joe".to_string(),
        groups: vec!["unmapped-group".to_string()],
    };
    let outsider_session = create_session(&test.state.db, &test.state.config, &outsider)
        .await
        .unwrap();

    let response = TestRequest::new("POST", "/v1/terrareg/modules/acme/network/aws/create")
        .header("X-Terraform-Session", &member_session.id)
        .json(serde_json::json!({}))
        .send(&test.app)
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = TestRequest::new("POST", "/v1/terrareg/modules/acme/storage/aws/create")
        .header("X-Terraform-Session", &outsider_session.id)
        .json(serde_json::json!({}))
        .send(&test.app)
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Audit usernames reflect the federated identity.
    let rows = audit_history::Entity::find()
        .all(&test.state.db)
        .await
        .unwrap();
    assert!(
        rows.iter()
            .any(|r| r.action == "module_provider_create" && r.username == "jane")
    );
}

#[tokio::test]
async fn site_admin_group_grants_everything() {
    let test = spawn_app().await;

    let response = TestRequest::new("POST", "/v1/terrareg/user-groups")
        .bearer(ADMIN_TOKEN)
        .json(serde_json::json!({ "name": "admins", "site_admin": true }))
        .send(&test.app)
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let admin_member = Identity::OidcSession {
        username: "root-user".to_string(),
        groups: vec!["admins".to_string()],
    };
    let session = create_session(&test.state.db, &test.state.config, &admin_member)
        .await
        .unwrap();

    let response = TestRequest::new("POST", "/v1/terrareg/namespaces")
        .header("X-Terraform-Session", &session.id)
        .json(serde_json::json!({ "name": "acme" }))
        .send(&test.app)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

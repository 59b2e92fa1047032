//! End-to-end tests for the Terraform CLI IdP: authorization-code issuance
//! against a browser session, PKCE-checked exchange, single-use enforcement
//! and bearer authentication with the issued token.

mod common;

use axum::http::StatusCode;
use base64::Engine as _;
use sha2::{Digest, Sha256};

use common::{ADMIN_PASSWORD, TestRequest, body_json, spawn_app};

const REDIRECT_URI: &str = "http://localhost:10003/login";
const CODE_VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";

fn code_challenge() -> String {
    base64::engine::general_purpose::URL_SAFE_NO_PAD
        .encode(Sha256::digest(CODE_VERIFIER.as_bytes()))
}

async fn login_session(app: &axum::Router) -> String {
    let response = TestRequest::new("POST", "/v1/terrareg/auth/login")
        .json(serde_json::json!({
            "username": "admin",
            "password": ADMIN_PASSWORD,
        }))
        .send(app)
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let cookie = response
        .headers()
        .get("set-cookie")
        .expect("login must set a session cookie")
        .to_str()
        .unwrap();
    cookie
        .split(';')
        .next()
        .unwrap()
        .split_once('=')
        .unwrap()
        .1
        .to_string()
}

async fn obtain_code(app: &axum::Router, session_id: &str) -> String {
    let path = format!(
        "/terraform/oauth/authorization?response_type=code&client_id=terraform-cli&redirect_uri={}&state=cli-state&code_challenge={}&code_challenge_method=S256",
        urlencode(REDIRECT_URI),
        code_challenge(),
    );

    let response = TestRequest::new("GET", &path)
        .header("X-Terraform-Session", session_id)
        .send(app)
        .await;
    assert_eq!(response.status(), StatusCode::FOUND);

    let location = response
        .headers()
        .get("location")
        .unwrap()
        .to_str()
        .unwrap();
    assert!(location.starts_with(REDIRECT_URI));
    assert!(location.contains("state=cli-state"));

    let url = url::Url::parse(location).unwrap();
    url.query_pairs()
        .find(|(k, _)| k == "code")
        .map(|(_, v)| v.to_string())
        .expect("redirect must carry a code")
}

fn urlencode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

fn token_form(code: &str, verifier: &str) -> String {
    format!(
        "grant_type=authorization_code&code={}&code_verifier={}&redirect_uri={}",
        urlencode(code),
        urlencode(verifier),
        urlencode(REDIRECT_URI),
    )
}

#[tokio::test]
async fn full_login_flow_issues_usable_token() {
    let test = spawn_app().await;
    let session_id = login_session(&test.app).await;
    let code = obtain_code(&test.app, &session_id).await;

    let response = TestRequest::new("POST", "/terraform/oauth/token")
        .form(&token_form(&code, CODE_VERIFIER))
        .send(&test.app)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["token_type"], "bearer");
    let access_token = body["access_token"].as_str().unwrap().to_string();
    assert!(body["expires_in"].as_i64().unwrap() > 0);

    // The token authenticates API calls as a terraform-oidc identity.
    let who = body_json(
        TestRequest::new("GET", "/v1/terrareg/auth/admin/is_authenticated")
            .bearer(&access_token)
            .send(&test.app)
            .await,
    )
    .await;
    assert_eq!(who["authenticated"], true);
    assert_eq!(who["username"], "admin");
}

#[tokio::test]
async fn authorization_code_is_single_use() {
    let test = spawn_app().await;
    let session_id = login_session(&test.app).await;
    let code = obtain_code(&test.app, &session_id).await;

    let first = TestRequest::new("POST", "/terraform/oauth/token")
        .form(&token_form(&code, CODE_VERIFIER))
        .send(&test.app)
        .await;
    assert_eq!(first.status(), StatusCode::OK);

    let second = TestRequest::new("POST", "/terraform/oauth/token")
        .form(&token_form(&code, CODE_VERIFIER))
        .send(&test.app)
        .await;
    assert_eq!(second.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn wrong_code_verifier_is_rejected() {
    let test = spawn_app().await;
    let session_id = login_session(&test.app).await;
    let code = obtain_code(&test.app, &session_id).await;

    let response = TestRequest::new("POST", "/terraform/oauth/token")
        .form(&token_form(&code, "wrong-verifier-wrong-verifier-wrong-verifi"))
        .send(&test.app)
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // The failed exchange must not have consumed the code.
    let retry = TestRequest::new("POST", "/terraform/oauth/token")
        .form(&token_form(&code, CODE_VERIFIER))
        .send(&test.app)
        .await;
    assert_eq!(retry.status(), StatusCode::OK);
}

#[tokio::test]
async fn authorization_requires_session_and_s256() {
    let test = spawn_app().await;

    // No session at all.
    let response = TestRequest::new(
        "GET",
        "/terraform/oauth/authorization?response_type=code&redirect_uri=http://localhost:10000/x&code_challenge=abc&code_challenge_method=S256",
    )
    .send(&test.app)
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Plain method is refused.
    let session_id = login_session(&test.app).await;
    let response = TestRequest::new(
        "GET",
        "/terraform/oauth/authorization?response_type=code&redirect_uri=http://localhost:10000/x&code_challenge=abc&code_challenge_method=plain",
    )
    .header("X-Terraform-Session", &session_id)
    .send(&test.app)
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Redirects outside the loopback port range are refused.
    let response = TestRequest::new(
        "GET",
        "/terraform/oauth/authorization?response_type=code&redirect_uri=http://localhost:9999/x&code_challenge=abc&code_challenge_method=S256",
    )
    .header("X-Terraform-Session", &session_id)
    .send(&test.app)
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn revoked_token_stops_authenticating() {
    let test = spawn_app().await;
    let session_id = login_session(&test.app).await;
    let code = obtain_code(&test.app, &session_id).await;

    let body = body_json(
        TestRequest::new("POST", "/terraform/oauth/token")
            .form(&token_form(&code, CODE_VERIFIER))
            .send(&test.app)
            .await,
    )
    .await;
    let access_token = body["access_token"].as_str().unwrap().to_string();

    let response = TestRequest::new("POST", "/terraform/oauth/revoke")
        .form(&format!("token={}", urlencode(&access_token)))
        .send(&test.app)
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let who = body_json(
        TestRequest::new("GET", "/v1/terrareg/auth/admin/is_authenticated")
            .bearer(&access_token)
            .send(&test.app)
            .await,
    )
    .await;
    assert_eq!(who["authenticated"], false);
}

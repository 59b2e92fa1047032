//! Shared integration-test harness: in-memory SQLite with migrations applied
//! and a fully wired router driven through `tower::ServiceExt::oneshot`.

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode, header};
use migration::MigratorTrait;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use tower::ServiceExt;

use tfregistry::config::{AnalyticsAuthKey, AppConfig, NamespaceToken};
use tfregistry::server::{AppState, create_app};

pub const ADMIN_TOKEN: &str = "test-admin-token";
pub const UPLOAD_TOKEN: &str = "test-upload-token";
pub const PUBLISH_TOKEN: &str = "test-publish-token";
pub const ANALYTICS_KEY: &str = "test-analytics-key";
pub const EXTRACTION_TOKEN: &str = "test-extraction-token";
pub const ADMIN_PASSWORD: &str = "test-password";

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
}

pub fn test_config() -> AppConfig {
    AppConfig {
        secret_key: Some("integration-test-secret".to_string()),
        admin_password: Some(ADMIN_PASSWORD.to_string()),
        admin_tokens: vec![ADMIN_TOKEN.to_string()],
        upload_tokens: vec![UPLOAD_TOKEN.to_string()],
        publish_tokens: vec![NamespaceToken {
            namespace: "acme".to_string(),
            token: PUBLISH_TOKEN.to_string(),
        }],
        analytics_auth_keys: vec![AnalyticsAuthKey {
            token: ANALYTICS_KEY.to_string(),
            environment: "production".to_string(),
        }],
        internal_extraction_token: Some(EXTRACTION_TOKEN.to_string()),
        trusted_namespaces: vec!["acme".to_string()],
        ..AppConfig::default()
    }
}

pub async fn test_db() -> DatabaseConnection {
    // One pooled connection: every handle must observe the same in-memory
    // database.
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(std::time::Duration::from_secs(3600));

    let db = Database::connect(options)
        .await
        .expect("failed to open in-memory sqlite");
    migration::Migrator::up(&db, None)
        .await
        .expect("migrations failed");
    db
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with_config(test_config()).await
}

pub async fn spawn_app_with_config(config: AppConfig) -> TestApp {
    let db = test_db().await;
    tfregistry::seeds::seed_provider_categories(&db)
        .await
        .expect("seeding failed");
    let state = AppState::new(Arc::new(config), db);
    let app = create_app(state.clone());
    TestApp { app, state }
}

pub struct TestRequest {
    method: &'static str,
    path: String,
    bearer: Option<String>,
    headers: Vec<(String, String)>,
    body: Option<Body>,
    content_type: Option<&'static str>,
}

impl TestRequest {
    pub fn new(method: &'static str, path: &str) -> Self {
        Self {
            method,
            path: path.to_string(),
            bearer: None,
            headers: Vec::new(),
            body: None,
            content_type: None,
        }
    }

    pub fn bearer(mut self, token: &str) -> Self {
        self.bearer = Some(token.to_string());
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(Body::from(body.to_string()));
        self.content_type = Some("application/json");
        self
    }

    pub fn form(mut self, body: &str) -> Self {
        self.body = Some(Body::from(body.to_string()));
        self.content_type = Some("application/x-www-form-urlencoded");
        self
    }

    pub async fn send(self, app: &Router) -> Response<Body> {
        let mut builder = Request::builder().method(self.method).uri(&self.path);
        if let Some(token) = &self.bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        if let Some(content_type) = self.content_type {
            builder = builder.header(header::CONTENT_TYPE, content_type);
        }
        for (name, value) in &self.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let request = builder
            .body(self.body.unwrap_or_else(Body::empty))
            .expect("failed to build request");

        app.clone().oneshot(request).await.expect("request failed")
    }
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read body");
    serde_json::from_slice(&bytes).expect("body is not valid JSON")
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read body")
        .to_vec()
}

/// Create a namespace as the static admin.
pub async fn create_namespace(app: &Router, name: &str) {
    let response = TestRequest::new("POST", "/v1/terrareg/namespaces")
        .bearer(ADMIN_TOKEN)
        .json(serde_json::json!({ "name": name }))
        .send(app)
        .await;
    assert_eq!(response.status(), StatusCode::OK, "namespace create failed");
}

/// Create a module provider with a git clone template.
pub async fn create_module_provider(app: &Router, namespace: &str, module: &str, provider: &str) {
    let response = TestRequest::new(
        "POST",
        &format!("/v1/terrareg/modules/{namespace}/{module}/{provider}/create"),
    )
    .bearer(ADMIN_TOKEN)
    .json(serde_json::json!({
        "repo_clone_url": "ssh://git@git.example.com/{namespace}/{module}.git",
        "git_tag_format": "v{version}",
    }))
    .send(app)
    .await;
    assert_eq!(
        response.status(),
        StatusCode::OK,
        "module provider create failed"
    );
}

/// Import a module version with the upload token.
pub async fn import_version(
    app: &Router,
    namespace: &str,
    module: &str,
    provider: &str,
    version: &str,
    description: Option<&str>,
) {
    let response = TestRequest::new(
        "POST",
        &format!("/v1/terrareg/modules/{namespace}/{module}/{provider}/import"),
    )
    .bearer(UPLOAD_TOKEN)
    .json(serde_json::json!({
        "version": version,
        "description": description,
        "owner": "platform-team",
    }))
    .send(app)
    .await;
    assert_eq!(response.status(), StatusCode::OK, "version import failed");
}

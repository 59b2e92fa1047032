//! End-to-end tests for the module registry protocol: discovery, version
//! listing, latest selection, downloads with analytics extraction, redirects
//! and search scoring.

mod common;

use axum::http::StatusCode;
use sea_orm::EntityTrait;

use common::{
    ADMIN_TOKEN, EXTRACTION_TOKEN, TestRequest, body_json, create_module_provider,
    create_namespace, import_version, spawn_app,
};
use tfregistry::models::{audit_history, module_analytics};

#[tokio::test]
async fn discovery_document_is_served_unauthenticated() {
    let test = spawn_app().await;

    let response = TestRequest::new("GET", "/.well-known/terraform.json")
        .send(&test.app)
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["modules.v1"], "/v1/modules/");
    assert_eq!(body["providers.v1"], "/v1/providers/");
    assert_eq!(body["login.v1"]["grant_types"][0], "authz_code");
}

#[tokio::test]
async fn publish_and_list_excludes_beta_from_latest() {
    let test = spawn_app().await;
    create_namespace(&test.app, "acme").await;
    create_module_provider(&test.app, "acme", "network", "aws").await;
    import_version(&test.app, "acme", "network", "aws", "1.2.0", None).await;
    import_version(&test.app, "acme", "network", "aws", "2.0.0-beta", None).await;

    let response = TestRequest::new("GET", "/v1/modules/acme/network/aws/versions")
        .send(&test.app)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;

    let versions: Vec<&str> = body["modules"][0]["versions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["version"].as_str().unwrap())
        .collect();
    assert_eq!(versions, vec!["2.0.0-beta", "1.2.0"]);

    // Latest download resolves to 1.2.0: beta is excluded from latest.
    let response = TestRequest::new("GET", "/v1/modules/acme/network/aws/download")
        .send(&test.app)
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let source = response
        .headers()
        .get("X-Terraform-Get")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(source.contains("ref=v1.2.0"), "unexpected source: {source}");
    assert!(source.starts_with("git::ssh://git@git.example.com/acme/network.git"));
}

#[tokio::test]
async fn missing_latest_version_is_404() {
    let test = spawn_app().await;
    create_namespace(&test.app, "acme").await;
    create_module_provider(&test.app, "acme", "empty", "aws").await;
    // Only a beta exists, so there is no latest.
    import_version(&test.app, "acme", "empty", "aws", "1.0.0-beta", None).await;

    let response = TestRequest::new("GET", "/v1/modules/acme/empty/aws/download")
        .send(&test.app)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn rename_redirects_old_triple_and_audits() {
    let test = spawn_app().await;
    create_namespace(&test.app, "acme").await;
    create_module_provider(&test.app, "acme", "network", "aws").await;
    import_version(&test.app, "acme", "network", "aws", "1.0.0", None).await;

    let response = TestRequest::new("POST", "/v1/terrareg/modules/acme/network/aws/settings")
        .bearer(ADMIN_TOKEN)
        .json(serde_json::json!({ "module": "net" }))
        .send(&test.app)
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let new_body = body_json(
        TestRequest::new("GET", "/v1/modules/acme/net/aws")
            .send(&test.app)
            .await,
    )
    .await;
    let old_body = body_json(
        TestRequest::new("GET", "/v1/modules/acme/network/aws")
            .send(&test.app)
            .await,
    )
    .await;
    assert_eq!(new_body, old_body);
    assert_eq!(new_body["name"], "net");

    // Case-insensitive resolution also applies to redirects.
    let upper = TestRequest::new("GET", "/v1/modules/ACME/NETWORK/AWS")
        .send(&test.app)
        .await;
    assert_eq!(upper.status(), StatusCode::OK);

    let audit_rows = audit_history::Entity::find()
        .all(&test.state.db)
        .await
        .unwrap();
    let rename_row = audit_rows
        .iter()
        .find(|row| row.action == "module_provider_update_module_name")
        .expect("rename audit row missing");
    assert_eq!(rename_row.old_value.as_deref(), Some("network"));
    assert_eq!(rename_row.new_value.as_deref(), Some("net"));
}

#[tokio::test]
async fn search_ranks_exact_module_match_first() {
    let test = spawn_app().await;
    create_namespace(&test.app, "acme").await;
    create_module_provider(&test.app, "acme", "vpc", "aws").await;
    create_module_provider(&test.app, "acme", "network", "aws").await;
    import_version(&test.app, "acme", "vpc", "aws", "1.0.0", Some("Amazon VPC")).await;
    import_version(&test.app, "acme", "network", "aws", "1.0.0", Some("vpc helpers")).await;

    let response = TestRequest::new("GET", "/v1/modules/search?q=vpc")
        .send(&test.app)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;

    let modules = body["modules"].as_array().unwrap();
    assert_eq!(modules.len(), 2);
    assert_eq!(modules[0]["name"], "vpc");
    assert_eq!(modules[1]["name"], "network");
    assert_eq!(body["meta"]["total_count"], 2);
}

#[tokio::test]
async fn download_with_analytics_segment_records_row() {
    let test = spawn_app().await;
    create_namespace(&test.app, "acme").await;
    create_module_provider(&test.app, "acme", "network", "aws").await;
    import_version(&test.app, "acme", "network", "aws", "1.2.0", None).await;

    let response = TestRequest::new(
        "GET",
        "/v1/modules/acme-__mytoken__dev/network/aws/1.2.0/download",
    )
    .header("X-Terraform-Version", "1.7.5")
    .send(&test.app)
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // The pseudo-segment is stripped from the emitted source.
    let source = response
        .headers()
        .get("X-Terraform-Get")
        .unwrap()
        .to_str()
        .unwrap();
    assert!(!source.contains("mytoken"), "token leaked into {source}");

    let rows = module_analytics::Entity::find()
        .all(&test.state.db)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].analytics_token, "mytoken");
    assert_eq!(rows[0].environment.as_deref(), Some("dev"));
    assert_eq!(rows[0].terraform_version.as_deref(), Some("1.7.5"));
    assert_eq!(rows[0].namespace, "acme");
}

#[tokio::test]
async fn internal_extraction_suppresses_analytics() {
    let test = spawn_app().await;
    create_namespace(&test.app, "acme").await;
    create_module_provider(&test.app, "acme", "network", "aws").await;
    import_version(&test.app, "acme", "network", "aws", "1.2.0", None).await;

    let response = TestRequest::new(
        "GET",
        "/v1/modules/acme-__mytoken__dev/network/aws/1.2.0/download",
    )
    .bearer(EXTRACTION_TOKEN)
    .send(&test.app)
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let rows = module_analytics::Entity::find()
        .all(&test.state.db)
        .await
        .unwrap();
    assert!(rows.is_empty(), "extraction downloads must not be counted");
}

#[tokio::test]
async fn module_metadata_exposes_versions_and_flags() {
    let test = spawn_app().await;
    create_namespace(&test.app, "acme").await;
    create_module_provider(&test.app, "acme", "network", "aws").await;
    import_version(&test.app, "acme", "network", "aws", "1.0.0", Some("First")).await;
    import_version(&test.app, "acme", "network", "aws", "1.1.0", Some("Second")).await;

    let body = body_json(
        TestRequest::new("GET", "/v1/modules/acme/network/aws")
            .send(&test.app)
            .await,
    )
    .await;

    assert_eq!(body["id"], "acme/network/aws/1.1.0");
    assert_eq!(body["version"], "1.1.0");
    assert_eq!(body["description"], "Second");
    // "acme" appears in the trusted namespace config of the test harness.
    assert_eq!(body["trusted"], true);
    let versions: Vec<&str> = body["versions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();
    assert_eq!(versions, vec!["1.1.0", "1.0.0"]);
}

#[tokio::test]
async fn duplicate_version_import_conflicts_without_second_audit_row() {
    let test = spawn_app().await;
    create_namespace(&test.app, "acme").await;
    create_module_provider(&test.app, "acme", "network", "aws").await;
    import_version(&test.app, "acme", "network", "aws", "1.0.0", None).await;

    let response = TestRequest::new("POST", "/v1/terrareg/modules/acme/network/aws/import")
        .bearer(common::UPLOAD_TOKEN)
        .json(serde_json::json!({ "version": "1.0.0" }))
        .send(&test.app)
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let index_rows = audit_history::Entity::find()
        .all(&test.state.db)
        .await
        .unwrap()
        .into_iter()
        .filter(|row| row.action == "module_version_index")
        .count();
    assert_eq!(index_rows, 1, "failed import must not write an audit row");
}

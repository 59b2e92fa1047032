//! Namespace lifecycle and audit-contract tests.

mod common;

use axum::http::StatusCode;
use sea_orm::EntityTrait;

use common::{
    ADMIN_TOKEN, TestRequest, body_json, create_module_provider, create_namespace, import_version,
    spawn_app,
};
use tfregistry::maintenance::MaintenanceSweeper;
use tfregistry::models::{audit_history, namespace, session};

#[tokio::test]
async fn namespace_names_are_validated_and_unique() {
    let test = spawn_app().await;

    let response = TestRequest::new("POST", "/v1/terrareg/namespaces")
        .bearer(ADMIN_TOKEN)
        .json(serde_json::json!({ "name": "-bad-name" }))
        .send(&test.app)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    create_namespace(&test.app, "acme").await;

    // Uniqueness is case-insensitive.
    let response = TestRequest::new("POST", "/v1/terrareg/namespaces")
        .bearer(ADMIN_TOKEN)
        .json(serde_json::json!({ "name": "ACME" }))
        .send(&test.app)
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Failed attempts leave no namespace rows and no audit rows beyond the
    // successful create.
    let namespaces = namespace::Entity::find().all(&test.state.db).await.unwrap();
    assert_eq!(namespaces.len(), 1);
    let audits = audit_history::Entity::find()
        .all(&test.state.db)
        .await
        .unwrap();
    assert_eq!(audits.len(), 1);
    assert_eq!(audits[0].action, "namespace_create");
    assert_eq!(audits[0].username, "admin");
}

#[tokio::test]
async fn non_empty_namespace_cannot_be_deleted() {
    let test = spawn_app().await;
    create_namespace(&test.app, "acme").await;
    create_module_provider(&test.app, "acme", "network", "aws").await;

    let response = TestRequest::new("DELETE", "/v1/terrareg/namespaces/acme")
        .bearer(ADMIN_TOKEN)
        .send(&test.app)
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // After removing the module provider, deletion succeeds.
    let response = TestRequest::new("DELETE", "/v1/terrareg/modules/acme/network/aws/delete")
        .bearer(ADMIN_TOKEN)
        .send(&test.app)
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = TestRequest::new("DELETE", "/v1/terrareg/namespaces/acme")
        .bearer(ADMIN_TOKEN)
        .send(&test.app)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn namespace_rename_keeps_module_paths_resolving() {
    let test = spawn_app().await;
    create_namespace(&test.app, "acme").await;
    create_module_provider(&test.app, "acme", "network", "aws").await;
    import_version(&test.app, "acme", "network", "aws", "1.0.0", None).await;

    let response = TestRequest::new("POST", "/v1/terrareg/namespaces/acme")
        .bearer(ADMIN_TOKEN)
        .json(serde_json::json!({ "name": "acme-corp" }))
        .send(&test.app)
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    // Old and new paths return the same module.
    let old = TestRequest::new("GET", "/v1/modules/acme/network/aws/versions")
        .send(&test.app)
        .await;
    assert_eq!(old.status(), StatusCode::OK);
    let new = TestRequest::new("GET", "/v1/modules/acme-corp/network/aws/versions")
        .send(&test.app)
        .await;
    assert_eq!(new.status(), StatusCode::OK);
    assert_eq!(body_json(old).await, body_json(new).await);

    let audits = audit_history::Entity::find()
        .all(&test.state.db)
        .await
        .unwrap();
    let rename = audits
        .iter()
        .find(|r| r.action == "namespace_modify_name")
        .expect("rename audit row missing");
    assert_eq!(rename.old_value.as_deref(), Some("acme"));
    assert_eq!(rename.new_value.as_deref(), Some("acme-corp"));
}

#[tokio::test]
async fn user_group_permission_lifecycle_is_audited() {
    let test = spawn_app().await;
    create_namespace(&test.app, "acme").await;

    let steps: Vec<(&str, &str, serde_json::Value, &str)> = vec![
        (
            "POST",
            "/v1/terrareg/user-groups",
            serde_json::json!({ "name": "devs" }),
            "user_group_create",
        ),
        (
            "PUT",
            "/v1/terrareg/user-groups/devs/permissions/acme",
            serde_json::json!({ "permission_type": "read" }),
            "user_group_namespace_permission_add",
        ),
        (
            "PUT",
            "/v1/terrareg/user-groups/devs/permissions/acme",
            serde_json::json!({ "permission_type": "full" }),
            "user_group_namespace_permission_modify",
        ),
    ];

    for (method, path, body, expected_action) in steps {
        let response = TestRequest::new(method, path)
            .bearer(ADMIN_TOKEN)
            .json(body)
            .send(&test.app)
            .await;
        assert_eq!(response.status(), StatusCode::OK, "{path}");

        let audits = audit_history::Entity::find()
            .all(&test.state.db)
            .await
            .unwrap();
        assert!(
            audits.iter().any(|r| r.action == expected_action),
            "missing audit action {expected_action}"
        );
    }

    let response = TestRequest::new("DELETE", "/v1/terrareg/user-groups/devs/permissions/acme")
        .bearer(ADMIN_TOKEN)
        .send(&test.app)
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = TestRequest::new("DELETE", "/v1/terrareg/user-groups/devs")
        .bearer(ADMIN_TOKEN)
        .send(&test.app)
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let audits = audit_history::Entity::find()
        .all(&test.state.db)
        .await
        .unwrap();
    assert!(audits.iter().any(|r| r.action == "user_group_namespace_permission_delete"));
    assert!(audits.iter().any(|r| r.action == "user_group_delete"));
}

#[tokio::test]
async fn maintenance_sweep_removes_expired_sessions() {
    let test = spawn_app().await;

    // One expired, one live session inserted directly.
    tfregistry::repositories::SessionRepository::create(
        &test.state.db,
        "expired-session",
        Some("admin".to_string()),
        "admin",
        None,
        None,
        chrono::Utc::now() - chrono::Duration::minutes(5),
    )
    .await
    .unwrap();
    tfregistry::repositories::SessionRepository::create(
        &test.state.db,
        "live-session",
        Some("admin".to_string()),
        "admin",
        None,
        None,
        chrono::Utc::now() + chrono::Duration::minutes(30),
    )
    .await
    .unwrap();

    let sweeper = MaintenanceSweeper::new(
        test.state.config.clone(),
        std::sync::Arc::new(test.state.db.clone()),
    );
    sweeper.tick().await.unwrap();

    let remaining = session::Entity::find().all(&test.state.db).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, "live-session");
}

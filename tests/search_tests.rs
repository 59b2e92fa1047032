//! Search and facet-aggregation tests, including the invariant that facet
//! counts equal unbounded search totals for the same query.

mod common;

use axum::http::StatusCode;

use common::{
    TestRequest, body_json, create_module_provider, create_namespace, import_version, spawn_app,
};

async fn seed_catalog(app: &axum::Router) {
    // "acme" is trusted by the harness config, "community" is not.
    create_namespace(app, "acme").await;
    create_namespace(app, "community").await;

    create_module_provider(app, "acme", "vpc", "aws").await;
    create_module_provider(app, "acme", "network", "aws").await;
    create_module_provider(app, "community", "vpc", "google").await;

    import_version(app, "acme", "vpc", "aws", "1.0.0", Some("Amazon VPC")).await;
    import_version(app, "acme", "network", "aws", "1.0.0", Some("vpc helpers")).await;
    import_version(app, "community", "vpc", "google", "1.0.0", Some("GCP networking")).await;
}

#[tokio::test]
async fn unpublished_modules_are_not_searchable() {
    let test = spawn_app().await;
    create_namespace(&test.app, "acme").await;
    create_module_provider(&test.app, "acme", "hidden", "aws").await;

    // Indexed but not published.
    let response = TestRequest::new("POST", "/v1/terrareg/modules/acme/hidden/aws/import")
        .bearer(common::UPLOAD_TOKEN)
        .json(serde_json::json!({ "version": "1.0.0", "publish": false }))
        .send(&test.app)
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(
        TestRequest::new("GET", "/v1/modules/search?q=hidden")
            .send(&test.app)
            .await,
    )
    .await;
    assert_eq!(body["meta"]["total_count"], 0);
}

#[tokio::test]
async fn trusted_and_contributed_filters() {
    let test = spawn_app().await;
    seed_catalog(&test.app).await;

    let trusted = body_json(
        TestRequest::new("GET", "/v1/modules/search?q=vpc&trusted=true")
            .send(&test.app)
            .await,
    )
    .await;
    let namespaces: Vec<&str> = trusted["modules"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["namespace"].as_str().unwrap())
        .collect();
    assert!(namespaces.iter().all(|ns| *ns == "acme"));

    let contributed = body_json(
        TestRequest::new("GET", "/v1/modules/search?q=vpc&contributed=true")
            .send(&test.app)
            .await,
    )
    .await;
    let namespaces: Vec<&str> = contributed["modules"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["namespace"].as_str().unwrap())
        .collect();
    assert!(namespaces.iter().all(|ns| *ns == "community"));

    // Both filters together OR-combine to everything matching the query.
    let both = body_json(
        TestRequest::new("GET", "/v1/modules/search?q=vpc&trusted=true&contributed=true")
            .send(&test.app)
            .await,
    )
    .await;
    assert_eq!(
        both["meta"]["total_count"].as_u64().unwrap(),
        trusted["meta"]["total_count"].as_u64().unwrap()
            + contributed["meta"]["total_count"].as_u64().unwrap()
    );
}

#[tokio::test]
async fn facet_counts_match_unbounded_search_totals() {
    let test = spawn_app().await;
    seed_catalog(&test.app).await;

    for query in ["vpc", "network", "aws", "helpers", "nomatch"] {
        let search = body_json(
            TestRequest::new("GET", &format!("/v1/modules/search?q={query}&limit=50"))
                .send(&test.app)
                .await,
        )
        .await;
        let facets = body_json(
            TestRequest::new("GET", &format!("/v1/terrareg/search_filters?q={query}"))
                .send(&test.app)
                .await,
        )
        .await;

        let total = search["meta"]["total_count"].as_u64().unwrap();
        let facet_total =
            facets["trusted_namespaces"].as_u64().unwrap() + facets["contributed"].as_u64().unwrap();
        assert_eq!(total, facet_total, "facets disagree with search for {query}");
    }
}

#[tokio::test]
async fn namespace_and_provider_filters_restrict_results() {
    let test = spawn_app().await;
    seed_catalog(&test.app).await;

    let body = body_json(
        TestRequest::new("GET", "/v1/modules/search?q=vpc&providers=google")
            .send(&test.app)
            .await,
    )
    .await;
    let modules = body["modules"].as_array().unwrap();
    assert_eq!(modules.len(), 1);
    assert_eq!(modules[0]["provider"], "google");

    let body = body_json(
        TestRequest::new("GET", "/v1/modules/search?q=vpc&namespaces=acme")
            .send(&test.app)
            .await,
    )
    .await;
    assert!(body["modules"]
        .as_array()
        .unwrap()
        .iter()
        .all(|m| m["namespace"] == "acme"));
}

#[tokio::test]
async fn listing_without_query_orders_by_module_name() {
    let test = spawn_app().await;
    seed_catalog(&test.app).await;

    let body = body_json(
        TestRequest::new("GET", "/v1/modules/search")
            .send(&test.app)
            .await,
    )
    .await;

    let names: Vec<&str> = body["modules"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["name"].as_str().unwrap())
        .collect();
    let mut sorted = names.clone();
    sorted.sort_unstable();
    assert_eq!(names, sorted);
}

#[tokio::test]
async fn pagination_respects_offset_and_limit() {
    let test = spawn_app().await;
    seed_catalog(&test.app).await;

    let page1 = body_json(
        TestRequest::new("GET", "/v1/modules/search?limit=2")
            .send(&test.app)
            .await,
    )
    .await;
    assert_eq!(page1["modules"].as_array().unwrap().len(), 2);
    assert_eq!(page1["meta"]["total_count"], 3);

    let page2 = body_json(
        TestRequest::new("GET", "/v1/modules/search?limit=2&offset=2")
            .send(&test.app)
            .await,
    )
    .await;
    assert_eq!(page2["modules"].as_array().unwrap().len(), 1);
}

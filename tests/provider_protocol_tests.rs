//! End-to-end tests for the provider registry protocol: version indexing
//! with signature verification, the versions document, the download document
//! and byte-exact SHA256SUMS serving.

mod common;

use axum::http::StatusCode;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

use common::{ADMIN_TOKEN, TestRequest, body_bytes, body_json, create_namespace, spawn_app};

/// Test signing key generated for this suite only.
const SIGNER_ARMOR: &str = "-----BEGIN PGP PUBLIC KEY BLOCK-----

mDMEanUtwRYJKwYBBAHaRw8BAQdA65TpWNWfJjVNVSSr61u13DtjhNbrTauJRF7v
3g/9PoO0IFRlc3QgU2lnbmVyIDxzaWduZXJAZXhhbXBsZS5jb20+iJAEExYIADgW
IQTEf2+Z3DQt1QuBU+ZxBSFQl5p+xAUCanUtwQIbAwULCQgHAgYVCgkICwIEFgID
AQIeAQIXgAAKCRBxBSFQl5p+xNOeAQDxqPNsPKYyPS1C40tBLEKUz6CI92Dpevca
VsmTQ6RL5gD/bqgPgffqTWf9+68cadt8WpvOwTVwM+w/EdH87daoDQA=
=nYOA
-----END PGP PUBLIC KEY BLOCK-----
";

const SIGNER_FINGERPRINT: &str = "C47F6F99DC342DD50B8153E671052150979A7EC4";
const SIGNER_KEY_ID: &str = "71052150979A7EC4";

/// Detached signature over [`SHASUMS_DOC`] made by the key above.
const SHASUMS_SIG_B64: &str = "iHUEABYIAB0WIQTEf2+Z3DQt1QuBU+ZxBSFQl5p+xAUCanUtwQAKCRBxBSFQl5p+xGXrAP93Qj0MOytOkXPAoXHiC7qwqWYODNG8CXRM7M+9CLh0JwD/ZdRjoKcsaCj6g/zyEHd0Q6I5gBuJYr2KQhgBJLjvBg8=";

const DARWIN_CHECKSUM: &str = "a7cfa0926d3d3616a7ed857c87273846a39646384d40a5e8fdf7e88f370580db";
const LINUX_CHECKSUM: &str = "3c543ced53cc8f64c9d321828ffb9b129b2a3e6a8f98d6cbec53b8d0d8ad46de";

const SHASUMS_DOC: &str = "a7cfa0926d3d3616a7ed857c87273846a39646384d40a5e8fdf7e88f370580db  terraform-provider-tls_1.0.0_darwin_arm64.zip\n3c543ced53cc8f64c9d321828ffb9b129b2a3e6a8f98d6cbec53b8d0d8ad46de  terraform-provider-tls_1.0.0_linux_amd64.zip\n";

async fn register_signer_key(app: &axum::Router) {
    let response = TestRequest::new("POST", "/v1/terrareg/gpg-keys")
        .bearer(ADMIN_TOKEN)
        .json(serde_json::json!({
            "namespace": "acme",
            "ascii_armor": SIGNER_ARMOR,
        }))
        .send(app)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["fingerprint"], SIGNER_FINGERPRINT);
    assert_eq!(body["key_id"], SIGNER_KEY_ID);
}

async fn create_provider(app: &axum::Router) {
    let response = TestRequest::new("POST", "/v1/terrareg/providers/acme/create")
        .bearer(ADMIN_TOKEN)
        .json(serde_json::json!({
            "name": "tls",
            "description": "TLS utilities",
            "tier": "community",
            "category_slug": "security-authentication",
        }))
        .send(app)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

fn index_payload() -> serde_json::Value {
    serde_json::json!({
        "version": "1.0.0",
        "protocol_versions": ["5.0"],
        "gpg_key_fingerprint": SIGNER_FINGERPRINT,
        "shasums": SHASUMS_DOC,
        "shasums_signature": SHASUMS_SIG_B64,
        "binaries": [
            {
                "os": "linux",
                "arch": "amd64",
                "filename": "terraform-provider-tls_1.0.0_linux_amd64.zip",
                "checksum": LINUX_CHECKSUM,
                "object_url": "https://blobs.example.com/tls/linux_amd64.zip",
            },
            {
                "os": "darwin",
                "arch": "arm64",
                "filename": "terraform-provider-tls_1.0.0_darwin_arm64.zip",
                "checksum": DARWIN_CHECKSUM,
                "object_url": "https://blobs.example.com/tls/darwin_arm64.zip",
            },
        ],
    })
}

async fn index_version(app: &axum::Router) {
    let response = TestRequest::new("POST", "/v1/terrareg/providers/acme/tls/versions")
        .bearer(ADMIN_TOKEN)
        .json(index_payload())
        .send(app)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn provider_versions_document_lists_platforms() {
    let test = spawn_app().await;
    create_namespace(&test.app, "acme").await;
    register_signer_key(&test.app).await;
    create_provider(&test.app).await;
    index_version(&test.app).await;

    let body = body_json(
        TestRequest::new("GET", "/v1/providers/acme/tls/versions")
            .send(&test.app)
            .await,
    )
    .await;

    let versions = body["versions"].as_array().unwrap();
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0]["version"], "1.0.0");
    assert_eq!(versions[0]["protocols"][0], "5.0");

    let platforms = versions[0]["platforms"].as_array().unwrap();
    assert_eq!(platforms.len(), 2);
}

#[tokio::test]
async fn download_document_carries_signing_keys_and_shasum_urls() {
    let test = spawn_app().await;
    create_namespace(&test.app, "acme").await;
    register_signer_key(&test.app).await;
    create_provider(&test.app).await;
    index_version(&test.app).await;

    let body = body_json(
        TestRequest::new("GET", "/v1/providers/acme/tls/1.0.0/download/linux/amd64")
            .send(&test.app)
            .await,
    )
    .await;

    assert_eq!(body["os"], "linux");
    assert_eq!(body["arch"], "amd64");
    assert_eq!(body["filename"], "terraform-provider-tls_1.0.0_linux_amd64.zip");
    assert_eq!(body["shasum"], LINUX_CHECKSUM);
    assert_eq!(
        body["download_url"],
        "https://blobs.example.com/tls/linux_amd64.zip"
    );
    assert!(
        body["shasums_url"]
            .as_str()
            .unwrap()
            .ends_with("/v1/terrareg/providers/acme/tls/1.0.0/shasums")
    );
    assert!(
        body["shasums_signature_url"]
            .as_str()
            .unwrap()
            .ends_with("/v1/terrareg/providers/acme/tls/1.0.0/shasums.sig")
    );

    let key = &body["signing_keys"]["gpg_public_keys"][0];
    assert_eq!(key["key_id"], SIGNER_KEY_ID);
    assert_eq!(key["ascii_armor"].as_str().unwrap(), SIGNER_ARMOR);
}

#[tokio::test]
async fn shasums_served_byte_exact_and_signature_verifies() {
    let test = spawn_app().await;
    create_namespace(&test.app, "acme").await;
    register_signer_key(&test.app).await;
    create_provider(&test.app).await;
    index_version(&test.app).await;

    let shasums = body_bytes(
        TestRequest::new("GET", "/v1/terrareg/providers/acme/tls/1.0.0/shasums")
            .send(&test.app)
            .await,
    )
    .await;
    assert_eq!(shasums, SHASUMS_DOC.as_bytes());

    // Lines are sorted lexicographically by filename.
    let text = String::from_utf8(shasums.clone()).unwrap();
    let filenames: Vec<&str> = text
        .lines()
        .map(|line| line.split("  ").nth(1).unwrap())
        .collect();
    let mut sorted = filenames.clone();
    sorted.sort_unstable();
    assert_eq!(filenames, sorted);

    let signature = body_bytes(
        TestRequest::new("GET", "/v1/terrareg/providers/acme/tls/1.0.0/shasums.sig")
            .send(&test.app)
            .await,
    )
    .await;
    assert_eq!(signature, BASE64.decode(SHASUMS_SIG_B64).unwrap());

    // The served signature verifies against the served key.
    tfregistry::gpg::verify_detached_signature(SIGNER_ARMOR, &signature, &shasums)
        .expect("detached signature must verify");
}

#[tokio::test]
async fn tampered_shasums_signature_is_rejected_at_index_time() {
    let test = spawn_app().await;
    create_namespace(&test.app, "acme").await;
    register_signer_key(&test.app).await;
    create_provider(&test.app).await;

    let mut payload = index_payload();
    payload["shasums"] = serde_json::json!(SHASUMS_DOC.replace('a', "b"));

    let response = TestRequest::new("POST", "/v1/terrareg/providers/acme/tls/versions")
        .bearer(ADMIN_TOKEN)
        .json(payload)
        .send(&test.app)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn duplicate_provider_version_conflicts() {
    let test = spawn_app().await;
    create_namespace(&test.app, "acme").await;
    register_signer_key(&test.app).await;
    create_provider(&test.app).await;
    index_version(&test.app).await;

    let response = TestRequest::new("POST", "/v1/terrareg/providers/acme/tls/versions")
        .bearer(ADMIN_TOKEN)
        .json(index_payload())
        .send(&test.app)
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn provider_search_attaches_download_counts() {
    let test = spawn_app().await;
    create_namespace(&test.app, "acme").await;
    register_signer_key(&test.app).await;
    create_provider(&test.app).await;
    index_version(&test.app).await;

    // Two downloads, then search.
    for _ in 0..2 {
        let response =
            TestRequest::new("GET", "/v1/providers/acme/tls/1.0.0/download/linux/amd64")
                .send(&test.app)
                .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let body = body_json(
        TestRequest::new("GET", "/v1/providers/search?q=tls")
            .send(&test.app)
            .await,
    )
    .await;

    let results = body.as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["name"], "tls");
    assert_eq!(results[0]["downloads"], 2);
    assert_eq!(results[0]["version"], "1.0.0");
    assert_eq!(results[0]["category"], "security-authentication");
}

#[tokio::test]
async fn gpg_key_in_use_cannot_be_deleted() {
    let test = spawn_app().await;
    create_namespace(&test.app, "acme").await;
    register_signer_key(&test.app).await;
    create_provider(&test.app).await;
    index_version(&test.app).await;

    let response = TestRequest::new(
        "DELETE",
        &format!("/v1/terrareg/gpg-keys/acme/{SIGNER_FINGERPRINT}"),
    )
    .bearer(ADMIN_TOKEN)
    .send(&test.app)
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

//! Provider registry protocol handlers.
//!
//! The `/v1/providers` surface Terraform talks to for provider installs:
//! version listing and the per-platform download document with signed
//! SHA256SUMS pointers, plus provider search and the byte-exact shasums
//! endpoints.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::auth::AuthContext;
use crate::error::{ApiError, not_found};
use crate::handlers::csv_values;
use crate::models::provider_version;
use crate::registry::providers as provider_service;
use crate::repositories::{
    AnalyticsRepository, GpgKeyRepository, ProviderRepository, provider::ResolvedProvider,
};
use crate::search::{self, ProviderSearchParams};
use crate::server::AppState;

const TERRAFORM_VERSION_HEADER: &str = "x-terraform-version";

async fn resolve_or_404(
    state: &AppState,
    namespace: &str,
    name: &str,
) -> Result<ResolvedProvider, ApiError> {
    ProviderRepository::resolve(&state.db, namespace, name)
        .await?
        .ok_or_else(|| not_found(format!("provider {namespace}/{name} not found")))
}

async fn version_or_404(
    state: &AppState,
    provider_id: i32,
    version: &str,
) -> Result<provider_version::Model, ApiError> {
    ProviderRepository::get_version(&state.db, provider_id, version)
        .await?
        .ok_or_else(|| not_found(format!("version {version} not found")))
}

/// Provider version listing.
#[utoipa::path(
    get,
    path = "/v1/providers/{namespace}/{name}/versions",
    responses(
        (status = 200, description = "Available versions with platforms"),
        (status = 404, description = "Unknown provider", body = ApiError)
    ),
    tag = "providers"
)]
pub async fn list_versions(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let resolved = resolve_or_404(&state, &namespace, &name).await?;

    let mut versions = Vec::new();
    for version in ProviderRepository::list_versions(&state.db, resolved.provider.id).await? {
        let binaries = ProviderRepository::list_binaries(&state.db, version.id).await?;
        let platforms: Vec<serde_json::Value> = provider_service::platforms(&binaries)
            .into_iter()
            .map(|(os, arch)| serde_json::json!({ "os": os, "arch": arch }))
            .collect();
        versions.push(serde_json::json!({
            "version": version.version,
            "protocols": version.protocols(),
            "platforms": platforms,
        }));
    }

    Ok(Json(serde_json::json!({ "versions": versions })))
}

/// A signing key entry in the download document.
#[derive(Debug, Serialize, ToSchema)]
pub struct GpgPublicKey {
    pub key_id: String,
    pub ascii_armor: String,
    pub trust_signature: String,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
}

/// Per-platform download document.
#[utoipa::path(
    get,
    path = "/v1/providers/{namespace}/{name}/{version}/download/{os}/{arch}",
    responses(
        (status = 200, description = "Download document"),
        (status = 404, description = "Unknown provider, version or platform", body = ApiError)
    ),
    tag = "providers"
)]
pub async fn download(
    State(state): State<AppState>,
    ctx: AuthContext,
    headers: HeaderMap,
    Path((namespace, name, version, os, arch)): Path<(String, String, String, String, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let resolved = resolve_or_404(&state, &namespace, &name).await?;
    let version_row = version_or_404(&state, resolved.provider.id, &version).await?;

    let binary = ProviderRepository::get_binary(&state.db, version_row.id, &os, &arch)
        .await?
        .ok_or_else(|| not_found(format!("no release for {os}/{arch}")))?;

    let download_url = binary
        .object_url
        .clone()
        .ok_or_else(|| not_found("release binary has no download location"))?;

    if !ctx.identity.suppresses_analytics() {
        let terraform_version = headers
            .get(TERRAFORM_VERSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        AnalyticsRepository::record_provider_download(
            &state.db,
            version_row.id,
            terraform_version,
        )
        .await?;
    }

    let signing_keys = match version_row.gpg_key_id {
        Some(key_id) => match GpgKeyRepository::get_by_id(&state.db, key_id).await? {
            Some(key) => vec![GpgPublicKey {
                key_id: key.key_id,
                ascii_armor: key.ascii_armor,
                trust_signature: String::new(),
                source: key.source.unwrap_or_default(),
                source_url: key.source_url,
            }],
            None => Vec::new(),
        },
        None => Vec::new(),
    };

    let base = format!(
        "{}/v1/terrareg/providers/{}/{}/{}",
        state.config.public_url, resolved.namespace.name, resolved.provider.name, version_row.version
    );

    metrics::counter!("provider_downloads").increment(1);

    Ok(Json(serde_json::json!({
        "protocols": version_row.protocols(),
        "os": os,
        "arch": arch,
        "filename": binary.filename,
        "download_url": download_url,
        "shasums_url": format!("{base}/shasums"),
        "shasums_signature_url": format!("{base}/shasums.sig"),
        "shasum": binary.checksum,
        "signing_keys": { "gpg_public_keys": signing_keys },
    })))
}

/// Serve the stored SHA256SUMS document byte-exact.
#[utoipa::path(
    get,
    path = "/v1/terrareg/providers/{namespace}/{name}/{version}/shasums",
    responses(
        (status = 200, description = "SHA256SUMS document"),
        (status = 404, description = "Unknown provider or version", body = ApiError)
    ),
    tag = "providers"
)]
pub async fn shasums(
    State(state): State<AppState>,
    Path((namespace, name, version)): Path<(String, String, String)>,
) -> Result<Response, ApiError> {
    let resolved = resolve_or_404(&state, &namespace, &name).await?;
    let version_row = version_or_404(&state, resolved.provider.id, &version).await?;

    let document = version_row
        .shasums
        .ok_or_else(|| not_found("version has no SHA256SUMS document"))?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        document,
    )
        .into_response())
}

/// Serve the stored detached signature byte-exact.
#[utoipa::path(
    get,
    path = "/v1/terrareg/providers/{namespace}/{name}/{version}/shasums.sig",
    responses(
        (status = 200, description = "Detached GPG signature"),
        (status = 404, description = "Unknown provider or version", body = ApiError)
    ),
    tag = "providers"
)]
pub async fn shasums_signature(
    State(state): State<AppState>,
    Path((namespace, name, version)): Path<(String, String, String)>,
) -> Result<Response, ApiError> {
    let resolved = resolve_or_404(&state, &namespace, &name).await?;
    let version_row = version_or_404(&state, resolved.provider.id, &version).await?;

    let signature = version_row
        .shasums_signature
        .ok_or_else(|| not_found("version has no SHA256SUMS signature"))?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/octet-stream")],
        signature,
    )
        .into_response())
}

/// One provider result in the search response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ProviderListItem {
    pub id: String,
    pub namespace: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub tier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub downloads: u64,
}

/// Query parameters for provider search.
#[derive(Debug, Deserialize, IntoParams)]
pub struct ProviderSearchQuery {
    pub q: Option<String>,
    /// Comma-separated namespace filter.
    pub namespaces: Option<String>,
    /// Comma-separated category slug filter.
    pub categories: Option<String>,
    pub offset: Option<u64>,
    pub limit: Option<u64>,
}

/// Scored provider search with download counts.
#[utoipa::path(
    get,
    path = "/v1/providers/search",
    params(ProviderSearchQuery),
    responses(
        (status = 200, description = "Scored provider results", body = [ProviderListItem])
    ),
    tag = "providers"
)]
pub async fn search_providers(
    State(state): State<AppState>,
    Query(query): Query<ProviderSearchQuery>,
) -> Result<Json<Vec<ProviderListItem>>, ApiError> {
    let params = ProviderSearchParams {
        q: query.q,
        namespaces: csv_values(query.namespaces.as_deref()),
        categories: csv_values(query.categories.as_deref()),
        offset: query.offset,
        limit: query.limit,
    };

    let rows = search::search_providers(&state.db, &params).await?;

    Ok(Json(
        rows.into_iter()
            .map(|row| ProviderListItem {
                id: format!("{}/{}", row.namespace_name, row.provider.name),
                namespace: row.namespace_name,
                name: row.provider.name.clone(),
                description: row.provider.description.clone(),
                tier: row.provider.tier.clone(),
                version: row.latest_version,
                category: row.category_slug,
                downloads: row.downloads,
            })
            .collect(),
    ))
}

//! Module registry protocol handlers.
//!
//! The `/v1/modules` surface Terraform itself talks to: version listing,
//! download with `X-Terraform-Get`, module metadata and search. Namespace
//! path segments may carry the analytics pseudo-segment, which is stripped
//! before redirect resolution.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::auth::AuthContext;
use crate::error::{ApiError, not_found};
use crate::handlers::csv_values;
use crate::models::{SubmoduleKind, module_version, submodule};
use crate::registry::modules as module_service;
use crate::repositories::{
    ModuleProviderRepository, ModuleVersionRepository, module_provider::ResolvedModuleProvider,
};
use crate::search::{self, ModuleSearchParams};
use crate::server::AppState;

/// Header Terraform sets with its own version on protocol requests.
const TERRAFORM_VERSION_HEADER: &str = "x-terraform-version";

/// One module result in the search response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ModuleListItem {
    /// Registry path id, e.g. `acme/network/aws/1.2.0`.
    pub id: String,
    pub namespace: String,
    pub name: String,
    pub provider: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    pub verified: bool,
    pub trusted: bool,
}

impl From<&search::ModuleSearchRow> for ModuleListItem {
    fn from(row: &search::ModuleSearchRow) -> Self {
        Self {
            id: format!(
                "{}/{}/{}/{}",
                row.namespace_name,
                row.module_provider.module,
                row.module_provider.provider,
                row.latest_version
            ),
            namespace: row.namespace_name.clone(),
            name: row.module_provider.module.clone(),
            provider: row.module_provider.provider.clone(),
            version: row.latest_version.clone(),
            description: row.description.clone(),
            owner: row.owner.clone(),
            verified: row.verified,
            trusted: row.trusted,
        }
    }
}

/// Pagination metadata for list endpoints.
#[derive(Debug, Serialize, ToSchema)]
pub struct SearchMeta {
    pub limit: u64,
    pub current_offset: u64,
    pub total_count: u64,
}

/// Module search response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ModuleSearchResponse {
    pub meta: SearchMeta,
    pub modules: Vec<ModuleListItem>,
}

/// Query parameters for module search.
#[derive(Debug, Deserialize, IntoParams)]
pub struct ModuleSearchQuery {
    /// Free-text query, tokenized on whitespace.
    pub q: Option<String>,
    /// Comma-separated namespace filter.
    pub namespaces: Option<String>,
    /// Exact module name filter.
    pub module: Option<String>,
    /// Comma-separated provider filter.
    pub providers: Option<String>,
    pub verified: Option<bool>,
    pub trusted: Option<bool>,
    pub contributed: Option<bool>,
    pub offset: Option<u64>,
    pub limit: Option<u64>,
    pub order_by: Option<String>,
    pub order_dir: Option<String>,
}

impl From<&ModuleSearchQuery> for ModuleSearchParams {
    fn from(query: &ModuleSearchQuery) -> Self {
        ModuleSearchParams {
            q: query.q.clone(),
            namespaces: csv_values(query.namespaces.as_deref()),
            module: query.module.clone(),
            providers: csv_values(query.providers.as_deref()),
            verified: query.verified,
            trusted: query.trusted,
            contributed: query.contributed,
            offset: query.offset,
            limit: query.limit,
            order_by: query.order_by.clone(),
            order_dir: query.order_dir.clone(),
        }
    }
}

/// Scored module search.
#[utoipa::path(
    get,
    path = "/v1/modules/search",
    params(ModuleSearchQuery),
    responses(
        (status = 200, description = "Scored module results", body = ModuleSearchResponse)
    ),
    tag = "modules"
)]
pub async fn search_modules(
    State(state): State<AppState>,
    Query(query): Query<ModuleSearchQuery>,
) -> Result<Json<ModuleSearchResponse>, ApiError> {
    let params = ModuleSearchParams::from(&query);
    let outcome = search::search_modules(&state.db, &state.config, &params).await?;

    metrics::counter!("module_search_requests").increment(1);

    Ok(Json(ModuleSearchResponse {
        meta: SearchMeta {
            limit: params.limit.unwrap_or(10).min(50),
            current_offset: params.offset.unwrap_or(0),
            total_count: outcome.total,
        },
        modules: outcome.rows.iter().map(ModuleListItem::from).collect(),
    }))
}

/// Facet counts for the search UI.
#[utoipa::path(
    get,
    path = "/v1/terrareg/search_filters",
    responses(
        (status = 200, description = "Facet counts for the current query")
    ),
    tag = "modules"
)]
pub async fn search_filters(
    State(state): State<AppState>,
    Query(query): Query<SearchFiltersQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let facets =
        search::module_search_facets(&state.db, &state.config, query.q.as_deref()).await?;
    Ok(Json(serde_json::json!({
        "trusted_namespaces": facets.trusted,
        "contributed": facets.contributed,
        "verified": facets.verified,
        "namespaces": facets.namespaces,
        "providers": facets.providers,
    })))
}

/// Query parameters for search facet counts.
#[derive(Debug, Deserialize, IntoParams)]
pub struct SearchFiltersQuery {
    pub q: Option<String>,
}

/// Version listing entry.
#[derive(Debug, Serialize, ToSchema)]
pub struct VersionItem {
    pub version: String,
}

async fn resolve_or_404(
    state: &AppState,
    namespace: &str,
    module: &str,
    provider: &str,
) -> Result<ResolvedModuleProvider, ApiError> {
    ModuleProviderRepository::resolve(&state.db, namespace, module, provider)
        .await?
        .ok_or_else(|| not_found(format!("module {namespace}/{module}/{provider} not found")))
}

/// Query parameters for the version listing.
#[derive(Debug, Deserialize, IntoParams)]
pub struct ListVersionsQuery {
    /// Include internal and unpublished versions; requires modify permission
    /// on the namespace.
    pub include_internal: Option<bool>,
}

/// List all published, non-internal versions, newest first.
#[utoipa::path(
    get,
    path = "/v1/modules/{namespace}/{module}/{provider}/versions",
    params(ListVersionsQuery),
    responses(
        (status = 200, description = "Available versions"),
        (status = 404, description = "Unknown module", body = ApiError)
    ),
    tag = "modules"
)]
pub async fn list_versions(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path((namespace, module, provider)): Path<(String, String, String)>,
    Query(query): Query<ListVersionsQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (namespace, _) = module_service::split_analytics_segment(&namespace);
    let resolved = resolve_or_404(&state, &namespace, &module, &provider).await?;

    let rows = if query.include_internal.unwrap_or(false) {
        crate::handlers::require_access(
            &state,
            &ctx,
            Some(&resolved.namespace.name),
            crate::authz::RegistryAction::Modify,
        )
        .await?;
        ModuleVersionRepository::list_all(&state.db, resolved.module_provider.id).await?
    } else {
        ModuleVersionRepository::list_public(&state.db, resolved.module_provider.id).await?
    };

    let versions: Vec<serde_json::Value> = rows
        .into_iter()
        .map(|v| serde_json::json!({ "version": v.version }))
        .collect();

    Ok(Json(serde_json::json!({
        "modules": [ { "versions": versions } ]
    })))
}

async fn version_or_404(
    state: &AppState,
    resolved: &ResolvedModuleProvider,
    version: Option<&str>,
) -> Result<module_version::Model, ApiError> {
    let mp = &resolved.module_provider;
    match version {
        Some(version) => ModuleVersionRepository::get(&state.db, mp.id, version)
            .await?
            .filter(|v| v.is_publicly_visible())
            .ok_or_else(|| not_found(format!("version {version} not found"))),
        // No version means the latest published, non-beta, non-internal one.
        None => ModuleVersionRepository::latest(&state.db, mp.id)
            .await?
            .ok_or_else(|| not_found("module has no published versions")),
    }
}

async fn download_response(
    state: &AppState,
    ctx: &AuthContext,
    headers: &HeaderMap,
    namespace_segment: &str,
    module: &str,
    provider: &str,
    version: Option<&str>,
) -> Result<Response, ApiError> {
    let (namespace, analytics) = module_service::split_analytics_segment(namespace_segment);
    let resolved = resolve_or_404(state, &namespace, module, provider).await?;
    let version = version_or_404(state, &resolved, version).await?;

    if let Some(analytics) = analytics {
        let terraform_version = headers
            .get(TERRAFORM_VERSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        module_service::record_download(
            &state.db,
            &ctx.identity,
            &resolved.namespace.name,
            &resolved.module_provider,
            &version,
            analytics,
            terraform_version,
        )
        .await?;
    }

    let source = module_service::build_source_url(
        &state.config,
        &resolved.namespace.name,
        &resolved.module_provider,
        &version,
    )
    .ok_or_else(|| not_found("module version has no downloadable source"))?;

    metrics::counter!("module_downloads").increment(1);

    Ok((StatusCode::NO_CONTENT, [("X-Terraform-Get", source)]).into_response())
}

/// Download a specific version: 204 with `X-Terraform-Get`.
#[utoipa::path(
    get,
    path = "/v1/modules/{namespace}/{module}/{provider}/{version}/download",
    responses(
        (status = 204, description = "Source URL in X-Terraform-Get"),
        (status = 404, description = "Unknown module or version", body = ApiError)
    ),
    tag = "modules"
)]
pub async fn download_version(
    State(state): State<AppState>,
    ctx: AuthContext,
    headers: HeaderMap,
    Path((namespace, module, provider, version)): Path<(String, String, String, String)>,
) -> Result<Response, ApiError> {
    download_response(
        &state,
        &ctx,
        &headers,
        &namespace,
        &module,
        &provider,
        Some(&version),
    )
    .await
}

/// Download the latest non-beta published version.
#[utoipa::path(
    get,
    path = "/v1/modules/{namespace}/{module}/{provider}/download",
    responses(
        (status = 204, description = "Source URL in X-Terraform-Get"),
        (status = 404, description = "Unknown module or no published version", body = ApiError)
    ),
    tag = "modules"
)]
pub async fn download_latest(
    State(state): State<AppState>,
    ctx: AuthContext,
    headers: HeaderMap,
    Path((namespace, module, provider)): Path<(String, String, String)>,
) -> Result<Response, ApiError> {
    download_response(&state, &ctx, &headers, &namespace, &module, &provider, None).await
}

#[derive(Debug, Serialize, ToSchema)]
struct SubmoduleItem {
    path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

impl From<submodule::Model> for SubmoduleItem {
    fn from(model: submodule::Model) -> Self {
        Self {
            path: model.path,
            name: model.name,
        }
    }
}

async fn module_metadata(
    state: &AppState,
    namespace_segment: &str,
    module: &str,
    provider: &str,
    version: Option<&str>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (namespace, _) = module_service::split_analytics_segment(namespace_segment);
    let resolved = resolve_or_404(state, &namespace, module, provider).await?;
    let version = version_or_404(state, &resolved, version).await?;
    let mp = &resolved.module_provider;

    let versions: Vec<String> = ModuleVersionRepository::list_public(&state.db, mp.id)
        .await?
        .into_iter()
        .map(|v| v.version)
        .collect();

    let details = match version.module_details_id {
        Some(id) => ModuleVersionRepository::get_details(&state.db, id).await?,
        None => None,
    };

    let submodules: Vec<SubmoduleItem> = ModuleVersionRepository::list_submodules(
        &state.db,
        version.id,
        SubmoduleKind::Submodule.as_str(),
    )
    .await?
    .into_iter()
    .map(SubmoduleItem::from)
    .collect();
    let examples: Vec<SubmoduleItem> = ModuleVersionRepository::list_submodules(
        &state.db,
        version.id,
        SubmoduleKind::Example.as_str(),
    )
    .await?
    .into_iter()
    .map(SubmoduleItem::from)
    .collect();

    let verified =
        mp.verified || state.config.is_auto_verified_namespace(&resolved.namespace.name);

    let root = serde_json::json!({
        "path": "",
        "readme_content": details
            .as_ref()
            .and_then(|d| d.readme_content.as_ref())
            .map(|bytes| String::from_utf8_lossy(bytes).to_string()),
        "terraform_docs": details.as_ref().and_then(|d| d.terraform_docs.clone()),
        "terraform_modules": details.as_ref().and_then(|d| d.terraform_modules.clone()),
    });

    Ok(Json(serde_json::json!({
        "id": format!("{}/{}/{}/{}", resolved.namespace.name, mp.module, mp.provider, version.version),
        "namespace": resolved.namespace.name,
        "name": mp.module,
        "provider": mp.provider,
        "version": version.version,
        "beta": version.beta,
        "internal": version.internal,
        "description": version.description,
        "owner": version.owner,
        "verified": verified,
        "trusted": state.config.is_trusted_namespace(&resolved.namespace.name),
        "published_at": version.published_at,
        "variable_template": version.variable_template,
        "versions": versions,
        "root": root,
        "submodules": submodules,
        "examples": examples,
    })))
}

/// One example with its source files, served to the UI collaborator.
#[derive(Debug, Serialize, ToSchema)]
pub struct ExampleItem {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub files: Vec<ExampleFileItem>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ExampleFileItem {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// Examples of a version with their source files.
#[utoipa::path(
    get,
    path = "/v1/terrareg/modules/{namespace}/{module}/{provider}/{version}/examples",
    responses(
        (status = 200, description = "Examples with file contents", body = [ExampleItem]),
        (status = 404, description = "Unknown module or version", body = ApiError)
    ),
    tag = "modules"
)]
pub async fn list_examples(
    State(state): State<AppState>,
    Path((namespace, module, provider, version)): Path<(String, String, String, String)>,
) -> Result<Json<Vec<ExampleItem>>, ApiError> {
    let resolved = resolve_or_404(&state, &namespace, &module, &provider).await?;
    let version = version_or_404(&state, &resolved, Some(&version)).await?;

    let mut examples = Vec::new();
    for example in ModuleVersionRepository::list_submodules(
        &state.db,
        version.id,
        SubmoduleKind::Example.as_str(),
    )
    .await?
    {
        let files = ModuleVersionRepository::list_example_files(&state.db, example.id)
            .await?
            .into_iter()
            .map(|f| ExampleFileItem {
                path: f.path,
                content: f
                    .content
                    .map(|bytes| String::from_utf8_lossy(&bytes).to_string()),
            })
            .collect();
        examples.push(ExampleItem {
            path: example.path,
            name: example.name,
            files,
        });
    }

    Ok(Json(examples))
}

/// Full metadata for the latest version.
#[utoipa::path(
    get,
    path = "/v1/modules/{namespace}/{module}/{provider}",
    responses(
        (status = 200, description = "Module metadata"),
        (status = 404, description = "Unknown module", body = ApiError)
    ),
    tag = "modules"
)]
pub async fn get_module(
    State(state): State<AppState>,
    Path((namespace, module, provider)): Path<(String, String, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    module_metadata(&state, &namespace, &module, &provider, None).await
}

/// Full metadata for one version.
#[utoipa::path(
    get,
    path = "/v1/modules/{namespace}/{module}/{provider}/{version}",
    responses(
        (status = 200, description = "Module metadata"),
        (status = 404, description = "Unknown module or version", body = ApiError)
    ),
    tag = "modules"
)]
pub async fn get_module_version(
    State(state): State<AppState>,
    Path((namespace, module, provider, version)): Path<(String, String, String, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    module_metadata(&state, &namespace, &module, &provider, Some(&version)).await
}

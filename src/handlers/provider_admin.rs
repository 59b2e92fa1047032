//! Provider and repository management handlers.
//!
//! Provider creation and deletion, version indexing with the SHA256SUMS
//! signature pipeline, and the repository records backing providers.

use axum::{
    extract::{Path, State},
    response::Json,
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use sea_orm::TransactionTrait;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::audit::{self, AuditAction, AuditEvent};
use crate::auth::AuthContext;
use crate::authz::RegistryAction;
use crate::error::{ApiError, conflict, not_found, validation_error};
use crate::handlers::require_access;
use crate::models::ProviderTier;
use crate::registry::providers as provider_service;
use crate::repositories::{
    GpgKeyRepository, NamespaceRepository, ProviderRepository, RepositoryRepository,
    provider::NewProviderBinary,
};
use crate::semver::Semver;
use crate::server::AppState;
use crate::validation::validate_provider_name;

/// One provider category in list responses.
#[derive(Debug, serde::Serialize, ToSchema)]
pub struct ProviderCategoryItem {
    pub name: String,
    pub slug: String,
    pub user_selectable: bool,
}

/// List provider categories.
#[utoipa::path(
    get,
    path = "/v1/terrareg/provider_categories",
    responses(
        (status = 200, description = "All provider categories", body = [ProviderCategoryItem])
    ),
    tag = "provider-admin"
)]
pub async fn list_provider_categories(
    State(state): State<AppState>,
) -> Result<Json<Vec<ProviderCategoryItem>>, ApiError> {
    let categories = ProviderRepository::list_categories(&state.db).await?;
    Ok(Json(
        categories
            .into_iter()
            .map(|c| ProviderCategoryItem {
                name: c.name,
                slug: c.slug,
                user_selectable: c.user_selectable,
            })
            .collect(),
    ))
}

/// Body for provider creation.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateProviderRequest {
    pub name: String,
    pub description: Option<String>,
    /// One of official / partner / community.
    pub tier: String,
    pub category_slug: Option<String>,
    pub repository_id: Option<i32>,
}

/// Create a provider under a namespace.
#[utoipa::path(
    post,
    path = "/v1/terrareg/providers/{namespace}/create",
    request_body = CreateProviderRequest,
    responses(
        (status = 200, description = "Provider created"),
        (status = 409, description = "Provider already exists", body = ApiError)
    ),
    tag = "provider-admin"
)]
pub async fn create_provider(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(namespace): Path<String>,
    Json(body): Json<CreateProviderRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_access(&state, &ctx, Some(&namespace), RegistryAction::Modify).await?;

    validate_provider_name(&body.name)
        .map_err(|e| validation_error(e.to_string(), serde_json::json!({ "name": "invalid" })))?;
    let tier = ProviderTier::parse(&body.tier).ok_or_else(|| {
        validation_error(
            "invalid provider tier",
            serde_json::json!({ "tier": "must be official, partner or community" }),
        )
    })?;

    let ns = NamespaceRepository::get_by_name(&state.db, &namespace)
        .await?
        .ok_or_else(|| not_found(format!("namespace {namespace} not found")))?;

    let category_id = match body.category_slug.as_deref() {
        Some(slug) => Some(
            ProviderRepository::get_category_by_slug(&state.db, slug)
                .await?
                .ok_or_else(|| {
                    validation_error(
                        "unknown provider category",
                        serde_json::json!({ "category_slug": "unknown" }),
                    )
                })?
                .id,
        ),
        None => None,
    };

    let txn = state.db.begin().await?;

    if ProviderRepository::get(&txn, ns.id, &body.name).await?.is_some() {
        return Err(conflict("provider already exists"));
    }

    let created = ProviderRepository::create(
        &txn,
        ns.id,
        &body.name,
        body.description,
        tier.as_str(),
        category_id,
        body.repository_id,
    )
    .await?;

    audit::record(
        &txn,
        AuditEvent {
            username: &ctx.identity.username(),
            action: AuditAction::ProviderCreate,
            object_type: "Provider",
            object_id: format!("{namespace}/{}", body.name),
            old_value: None,
            new_value: None,
        },
    )
    .await?;

    txn.commit().await?;

    Ok(Json(serde_json::json!({ "id": created.id })))
}

/// Delete a provider and every version under it.
#[utoipa::path(
    delete,
    path = "/v1/terrareg/providers/{namespace}/{name}/delete",
    responses(
        (status = 200, description = "Provider deleted"),
        (status = 404, description = "Unknown provider", body = ApiError)
    ),
    tag = "provider-admin"
)]
pub async fn delete_provider(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path((namespace, name)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_access(&state, &ctx, Some(&namespace), RegistryAction::Full).await?;

    let ns = NamespaceRepository::get_by_name(&state.db, &namespace)
        .await?
        .ok_or_else(|| not_found(format!("namespace {namespace} not found")))?;

    let txn = state.db.begin().await?;

    let provider = ProviderRepository::get(&txn, ns.id, &name)
        .await?
        .ok_or_else(|| not_found("provider not found"))?;

    ProviderRepository::delete(&txn, provider.id).await?;

    audit::record(
        &txn,
        AuditEvent {
            username: &ctx.identity.username(),
            action: AuditAction::ProviderDelete,
            object_type: "Provider",
            object_id: format!("{namespace}/{name}"),
            old_value: None,
            new_value: None,
        },
    )
    .await?;

    txn.commit().await?;

    Ok(Json(serde_json::json!({ "deleted": true })))
}

/// One platform release in the version-index payload.
#[derive(Debug, Deserialize, ToSchema)]
pub struct IndexedBinary {
    pub os: String,
    pub arch: String,
    pub filename: String,
    /// Hex-encoded SHA-256 of the release archive.
    pub checksum: String,
    /// Opaque blob-store URL for the archive.
    pub object_url: String,
}

/// Body for provider version indexing.
#[derive(Debug, Deserialize, ToSchema)]
pub struct IndexProviderVersionRequest {
    pub version: String,
    pub git_tag: Option<String>,
    /// Terraform plugin protocol versions, e.g. `["5.0"]`.
    pub protocol_versions: Vec<String>,
    /// Fingerprint of the namespace GPG key that signed the SHA256SUMS.
    pub gpg_key_fingerprint: String,
    /// The publisher's SHA256SUMS document; generated from the binaries
    /// when omitted.
    pub shasums: Option<String>,
    /// Base64 of the detached signature over the SHA256SUMS bytes.
    pub shasums_signature: String,
    pub binaries: Vec<IndexedBinary>,
}

/// Index a provider version: verify the signature against the namespace key
/// and record platforms, SHA256SUMS and signature for byte-exact serving.
#[utoipa::path(
    post,
    path = "/v1/terrareg/providers/{namespace}/{name}/versions",
    request_body = IndexProviderVersionRequest,
    responses(
        (status = 200, description = "Version indexed"),
        (status = 400, description = "Invalid payload or signature", body = ApiError),
        (status = 409, description = "Version already exists", body = ApiError)
    ),
    tag = "provider-admin"
)]
pub async fn index_provider_version(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path((namespace, name)): Path<(String, String)>,
    Json(body): Json<IndexProviderVersionRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_access(&state, &ctx, Some(&namespace), RegistryAction::Modify).await?;

    let semver = Semver::parse(&body.version).map_err(|e| {
        validation_error(e.to_string(), serde_json::json!({ "version": "invalid semver" }))
    })?;
    if body.binaries.is_empty() {
        return Err(validation_error(
            "a provider version needs at least one platform binary",
            serde_json::json!({ "binaries": "empty" }),
        ));
    }

    let ns = NamespaceRepository::get_by_name(&state.db, &namespace)
        .await?
        .ok_or_else(|| not_found(format!("namespace {namespace} not found")))?;
    let provider = ProviderRepository::get(&state.db, ns.id, &name)
        .await?
        .ok_or_else(|| not_found("provider not found"))?;

    let gpg_key = GpgKeyRepository::get_by_fingerprint(&state.db, &body.gpg_key_fingerprint)
        .await?
        .filter(|key| key.namespace_id == ns.id)
        .ok_or_else(|| {
            validation_error(
                "GPG key not found in this namespace",
                serde_json::json!({ "gpg_key_fingerprint": "unknown" }),
            )
        })?;

    let checksums: Vec<(String, String)> = body
        .binaries
        .iter()
        .map(|b| (b.filename.clone(), b.checksum.clone()))
        .collect();

    let shasums = match &body.shasums {
        Some(document) => {
            provider_service::check_shasums_cover_binaries(document, &checksums).map_err(|e| {
                validation_error(e.to_string(), serde_json::json!({ "shasums": "invalid" }))
            })?;
            document.clone()
        }
        None => provider_service::build_shasums(&checksums),
    };

    let signature = BASE64.decode(body.shasums_signature.trim()).map_err(|_| {
        validation_error(
            "shasums_signature is not valid base64",
            serde_json::json!({ "shasums_signature": "invalid" }),
        )
    })?;

    provider_service::verify_shasums_signature(&gpg_key, &shasums, &signature).map_err(|e| {
        validation_error(e.to_string(), serde_json::json!({ "shasums_signature": "rejected" }))
    })?;

    let txn = state.db.begin().await?;

    if ProviderRepository::get_version(&txn, provider.id, &body.version)
        .await?
        .is_some()
    {
        return Err(conflict(format!("version {} already exists", body.version)));
    }

    let binaries = body
        .binaries
        .into_iter()
        .map(|b| NewProviderBinary {
            os: b.os,
            arch: b.arch,
            filename: b.filename,
            checksum: b.checksum.to_lowercase(),
            object_url: Some(b.object_url),
        })
        .collect();

    let created = ProviderRepository::create_version(
        &txn,
        provider.id,
        &body.version,
        body.git_tag,
        semver.is_beta(),
        serde_json::json!(body.protocol_versions),
        Some(gpg_key.id),
        Some(shasums),
        Some(signature),
        binaries,
    )
    .await?;

    provider_service::refresh_latest_pointer(&txn, provider).await?;

    audit::record(
        &txn,
        AuditEvent {
            username: &ctx.identity.username(),
            action: AuditAction::ProviderVersionIndex,
            object_type: "ProviderVersion",
            object_id: format!("{namespace}/{name}/{}", body.version),
            old_value: None,
            new_value: None,
        },
    )
    .await?;

    txn.commit().await?;

    Ok(Json(serde_json::json!({ "id": created.id, "version": created.version })))
}

/// Delete a provider version.
#[utoipa::path(
    delete,
    path = "/v1/terrareg/providers/{namespace}/{name}/{version}",
    responses(
        (status = 200, description = "Version deleted"),
        (status = 404, description = "Unknown version", body = ApiError)
    ),
    tag = "provider-admin"
)]
pub async fn delete_provider_version(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path((namespace, name, version)): Path<(String, String, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_access(&state, &ctx, Some(&namespace), RegistryAction::Modify).await?;

    let ns = NamespaceRepository::get_by_name(&state.db, &namespace)
        .await?
        .ok_or_else(|| not_found(format!("namespace {namespace} not found")))?;
    let provider = ProviderRepository::get(&state.db, ns.id, &name)
        .await?
        .ok_or_else(|| not_found("provider not found"))?;

    let txn = state.db.begin().await?;

    let row = ProviderRepository::get_version(&txn, provider.id, &version)
        .await?
        .ok_or_else(|| not_found(format!("version {version} not found")))?;

    ProviderRepository::delete_version(&txn, row.id).await?;
    provider_service::refresh_latest_pointer(&txn, provider).await?;

    audit::record(
        &txn,
        AuditEvent {
            username: &ctx.identity.username(),
            action: AuditAction::ProviderVersionDelete,
            object_type: "ProviderVersion",
            object_id: format!("{namespace}/{name}/{version}"),
            old_value: None,
            new_value: None,
        },
    )
    .await?;

    txn.commit().await?;

    Ok(Json(serde_json::json!({ "deleted": true })))
}

/// Body for repository creation and update.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RepositoryRequest {
    pub provider_source: String,
    pub owner: String,
    pub name: String,
    pub description: Option<String>,
    pub clone_url: Option<String>,
    pub logo_url: Option<String>,
}

/// Create a repository record.
#[utoipa::path(
    post,
    path = "/v1/terrareg/repositories",
    request_body = RepositoryRequest,
    responses(
        (status = 200, description = "Repository created"),
        (status = 409, description = "Repository already exists", body = ApiError)
    ),
    tag = "provider-admin"
)]
pub async fn create_repository(
    State(state): State<AppState>,
    ctx: AuthContext,
    Json(body): Json<RepositoryRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_access(&state, &ctx, None, RegistryAction::SiteAdmin).await?;

    let txn = state.db.begin().await?;

    if RepositoryRepository::find(&txn, &body.provider_source, &body.owner, &body.name)
        .await?
        .is_some()
    {
        return Err(conflict("repository already exists"));
    }

    let created = RepositoryRepository::create(
        &txn,
        &body.provider_source,
        &body.owner,
        &body.name,
        body.description,
        body.clone_url,
        body.logo_url,
    )
    .await?;

    audit::record(
        &txn,
        AuditEvent {
            username: &ctx.identity.username(),
            action: AuditAction::RepositoryCreate,
            object_type: "Repository",
            object_id: format!("{}/{}/{}", created.provider_source, created.owner, created.name),
            old_value: None,
            new_value: None,
        },
    )
    .await?;

    txn.commit().await?;

    Ok(Json(serde_json::json!({ "id": created.id })))
}

/// Update a repository record.
#[utoipa::path(
    put,
    path = "/v1/terrareg/repositories/{id}",
    request_body = RepositoryRequest,
    responses(
        (status = 200, description = "Repository updated"),
        (status = 404, description = "Unknown repository", body = ApiError)
    ),
    tag = "provider-admin"
)]
pub async fn update_repository(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<i32>,
    Json(body): Json<RepositoryRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_access(&state, &ctx, None, RegistryAction::SiteAdmin).await?;

    let txn = state.db.begin().await?;

    let existing = RepositoryRepository::get_by_id(&txn, id)
        .await?
        .ok_or_else(|| not_found("repository not found"))?;

    let old_value = serde_json::json!({
        "description": existing.description,
        "clone_url": existing.clone_url,
        "logo_url": existing.logo_url,
    })
    .to_string();

    let updated = RepositoryRepository::update(
        &txn,
        existing,
        body.description,
        body.clone_url,
        body.logo_url,
    )
    .await?;

    let new_value = serde_json::json!({
        "description": updated.description,
        "clone_url": updated.clone_url,
        "logo_url": updated.logo_url,
    })
    .to_string();

    audit::record(
        &txn,
        AuditEvent {
            username: &ctx.identity.username(),
            action: AuditAction::RepositoryUpdate,
            object_type: "Repository",
            object_id: format!("{}/{}/{}", updated.provider_source, updated.owner, updated.name),
            old_value: Some(old_value),
            new_value: Some(new_value),
        },
    )
    .await?;

    txn.commit().await?;

    Ok(Json(serde_json::json!({ "id": updated.id })))
}

/// Delete a repository record.
#[utoipa::path(
    delete,
    path = "/v1/terrareg/repositories/{id}",
    responses(
        (status = 200, description = "Repository deleted"),
        (status = 404, description = "Unknown repository", body = ApiError)
    ),
    tag = "provider-admin"
)]
pub async fn delete_repository(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<i32>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_access(&state, &ctx, None, RegistryAction::SiteAdmin).await?;

    let txn = state.db.begin().await?;

    let existing = RepositoryRepository::get_by_id(&txn, id)
        .await?
        .ok_or_else(|| not_found("repository not found"))?;

    RepositoryRepository::delete(&txn, existing.id).await?;

    audit::record(
        &txn,
        AuditEvent {
            username: &ctx.identity.username(),
            action: AuditAction::RepositoryDelete,
            object_type: "Repository",
            object_id: format!("{}/{}/{}", existing.provider_source, existing.owner, existing.name),
            old_value: None,
            new_value: None,
        },
    )
    .await?;

    txn.commit().await?;

    Ok(Json(serde_json::json!({ "deleted": true })))
}

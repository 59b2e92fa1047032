//! Module management handlers.
//!
//! The mutating `/v1/terrareg/modules` surface: module provider creation,
//! settings updates (one audit row per changed attribute), version import
//! from extracted metadata, publish and delete, plus the analytics read
//! side. Every mutating handler opens exactly one transaction and commits
//! after its audit insert.

use axum::{
    extract::{Path, State},
    response::Json,
};
use sea_orm::TransactionTrait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::audit::{self, AuditAction, AuditEvent};
use crate::auth::AuthContext;
use crate::authz::{self, RegistryAction};
use crate::config::ModuleHostingMode;
use crate::models::SubmoduleKind;
use crate::error::{ApiError, conflict, forbidden, not_found, unauthenticated, validation_error};
use crate::handlers::require_access;
use crate::registry::modules as module_service;
use crate::repositories::{
    AnalyticsRepository, ModuleProviderRepository, ModuleVersionRepository, NamespaceRepository,
    module_version::{NewModuleDetails, NewModuleVersion},
};
use crate::semver::Semver;
use crate::server::AppState;
use crate::validation::{validate_module_name, validate_provider_name};

/// Body for module provider creation.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateModuleProviderRequest {
    pub git_tag_format: Option<String>,
    pub repo_clone_url: Option<String>,
    pub repo_base_url: Option<String>,
    pub repo_browse_url: Option<String>,
    pub git_path: Option<String>,
}

/// Create a module provider triple.
#[utoipa::path(
    post,
    path = "/v1/terrareg/modules/{namespace}/{module}/{provider}/create",
    request_body = CreateModuleProviderRequest,
    responses(
        (status = 200, description = "Module provider created"),
        (status = 409, description = "Triple already exists", body = ApiError)
    ),
    tag = "module-admin"
)]
pub async fn create_module_provider(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path((namespace, module, provider)): Path<(String, String, String)>,
    Json(body): Json<CreateModuleProviderRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_access(&state, &ctx, Some(&namespace), RegistryAction::Modify).await?;

    validate_module_name(&module)
        .map_err(|e| validation_error(e.to_string(), serde_json::json!({ "module": "invalid" })))?;
    validate_provider_name(&provider).map_err(|e| {
        validation_error(e.to_string(), serde_json::json!({ "provider": "invalid" }))
    })?;

    let ns = NamespaceRepository::get_by_name(&state.db, &namespace)
        .await?
        .ok_or_else(|| not_found(format!("namespace {namespace} not found")))?;

    let txn = state.db.begin().await?;

    if ModuleProviderRepository::get(&txn, ns.id, &module, &provider)
        .await?
        .is_some()
    {
        return Err(conflict("module provider already exists"));
    }

    let mut created =
        ModuleProviderRepository::create(&txn, ns.id, &module, &provider, body.git_tag_format)
            .await?;

    if body.repo_clone_url.is_some()
        || body.repo_base_url.is_some()
        || body.repo_browse_url.is_some()
        || body.git_path.is_some()
    {
        let mut active: crate::models::module_provider::ActiveModel = created.into();
        active.repo_clone_url = sea_orm::Set(body.repo_clone_url);
        active.repo_base_url = sea_orm::Set(body.repo_base_url);
        active.repo_browse_url = sea_orm::Set(body.repo_browse_url);
        active.git_path = sea_orm::Set(body.git_path);
        created = ModuleProviderRepository::update(&txn, active).await?;
    }

    audit::record(
        &txn,
        AuditEvent {
            username: &ctx.identity.username(),
            action: AuditAction::ModuleProviderCreate,
            object_type: "ModuleProvider",
            object_id: format!("{namespace}/{module}/{provider}"),
            old_value: None,
            new_value: None,
        },
    )
    .await?;

    txn.commit().await?;

    Ok(Json(serde_json::json!({ "id": created.id })))
}

/// Delete a module provider and every version under it.
#[utoipa::path(
    delete,
    path = "/v1/terrareg/modules/{namespace}/{module}/{provider}/delete",
    responses(
        (status = 200, description = "Module provider deleted"),
        (status = 404, description = "Unknown module provider", body = ApiError)
    ),
    tag = "module-admin"
)]
pub async fn delete_module_provider(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path((namespace, module, provider)): Path<(String, String, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_access(&state, &ctx, Some(&namespace), RegistryAction::Full).await?;

    let ns = NamespaceRepository::get_by_name(&state.db, &namespace)
        .await?
        .ok_or_else(|| not_found(format!("namespace {namespace} not found")))?;

    let txn = state.db.begin().await?;

    let mp = ModuleProviderRepository::get(&txn, ns.id, &module, &provider)
        .await?
        .ok_or_else(|| not_found("module provider not found"))?;

    ModuleProviderRepository::delete(&txn, mp.id).await?;

    audit::record(
        &txn,
        AuditEvent {
            username: &ctx.identity.username(),
            action: AuditAction::ModuleProviderDelete,
            object_type: "ModuleProvider",
            object_id: format!("{namespace}/{module}/{provider}"),
            old_value: None,
            new_value: None,
        },
    )
    .await?;

    txn.commit().await?;

    Ok(Json(serde_json::json!({ "deleted": true })))
}

/// Body for module provider settings updates. Every present field updates
/// one attribute and emits its own audit row.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ModuleProviderSettingsRequest {
    /// Rename the module; the old triple keeps resolving via a redirect.
    pub module: Option<String>,
    /// Rename the provider component.
    pub provider: Option<String>,
    pub git_tag_format: Option<String>,
    pub git_path: Option<String>,
    pub git_provider_id: Option<i32>,
    pub repo_clone_url: Option<String>,
    pub repo_base_url: Option<String>,
    pub repo_browse_url: Option<String>,
    pub verified: Option<bool>,
}

/// Update module provider settings.
#[utoipa::path(
    post,
    path = "/v1/terrareg/modules/{namespace}/{module}/{provider}/settings",
    request_body = ModuleProviderSettingsRequest,
    responses(
        (status = 200, description = "Settings updated"),
        (status = 404, description = "Unknown module provider", body = ApiError)
    ),
    tag = "module-admin"
)]
pub async fn update_module_provider_settings(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path((namespace, module, provider)): Path<(String, String, String)>,
    Json(body): Json<ModuleProviderSettingsRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_access(&state, &ctx, Some(&namespace), RegistryAction::Modify).await?;

    let ns = NamespaceRepository::get_by_name(&state.db, &namespace)
        .await?
        .ok_or_else(|| not_found(format!("namespace {namespace} not found")))?;

    let txn = state.db.begin().await?;

    let mp = ModuleProviderRepository::get(&txn, ns.id, &module, &provider)
        .await?
        .ok_or_else(|| not_found("module provider not found"))?;

    let username = ctx.identity.username();
    let mut current = mp.clone();

    // Renames first: record the redirect before the triple changes.
    if let Some(new_module) = &body.module {
        if new_module != &current.module {
            validate_module_name(new_module).map_err(|e| {
                validation_error(e.to_string(), serde_json::json!({ "module": "invalid" }))
            })?;
            if ModuleProviderRepository::get(&txn, ns.id, new_module, &current.provider)
                .await?
                .is_some()
            {
                return Err(conflict("target module name already exists"));
            }
            ModuleProviderRepository::add_redirect(
                &txn,
                &ns.name,
                &current.module,
                &current.provider,
                current.id,
            )
            .await?;

            let old = current.module.clone();
            let mut active: crate::models::module_provider::ActiveModel = current.into();
            active.module = sea_orm::Set(new_module.clone());
            current = ModuleProviderRepository::update(&txn, active).await?;

            audit::record(
                &txn,
                AuditEvent {
                    username: &username,
                    action: AuditAction::ModuleProviderUpdateModuleName,
                    object_type: "ModuleProvider",
                    object_id: format!("{}/{}/{}", ns.name, current.module, current.provider),
                    old_value: Some(old),
                    new_value: Some(new_module.clone()),
                },
            )
            .await?;
        }
    }

    if let Some(new_provider) = &body.provider {
        if new_provider != &current.provider {
            validate_provider_name(new_provider).map_err(|e| {
                validation_error(e.to_string(), serde_json::json!({ "provider": "invalid" }))
            })?;
            if ModuleProviderRepository::get(&txn, ns.id, &current.module, new_provider)
                .await?
                .is_some()
            {
                return Err(conflict("target provider name already exists"));
            }
            ModuleProviderRepository::add_redirect(
                &txn,
                &ns.name,
                &current.module,
                &current.provider,
                current.id,
            )
            .await?;

            let old = current.provider.clone();
            let mut active: crate::models::module_provider::ActiveModel = current.into();
            active.provider = sea_orm::Set(new_provider.clone());
            current = ModuleProviderRepository::update(&txn, active).await?;

            audit::record(
                &txn,
                AuditEvent {
                    username: &username,
                    action: AuditAction::ModuleProviderUpdateProviderName,
                    object_type: "ModuleProvider",
                    object_id: format!("{}/{}/{}", ns.name, current.module, current.provider),
                    old_value: Some(old),
                    new_value: Some(new_provider.clone()),
                },
            )
            .await?;
        }
    }

    // Scalar attribute updates, one audit row each.
    macro_rules! update_attr {
        ($field:ident, $action:expr, $value:expr) => {
            if let Some(new_value) = $value {
                let old = format!("{:?}", current.$field);
                let new_repr = format!("{:?}", new_value);
                let mut active: crate::models::module_provider::ActiveModel = current.into();
                active.$field = sea_orm::Set(new_value);
                current = ModuleProviderRepository::update(&txn, active).await?;

                audit::record(
                    &txn,
                    AuditEvent {
                        username: &username,
                        action: $action,
                        object_type: "ModuleProvider",
                        object_id: format!("{}/{}/{}", ns.name, current.module, current.provider),
                        old_value: Some(old),
                        new_value: Some(new_repr),
                    },
                )
                .await?;
            }
        };
    }

    update_attr!(
        git_tag_format,
        AuditAction::ModuleProviderUpdateGitTagFormat,
        body.git_tag_format
    );
    update_attr!(
        git_path,
        AuditAction::ModuleProviderUpdateGitPath,
        body.git_path.map(Some)
    );
    update_attr!(
        git_provider_id,
        AuditAction::ModuleProviderUpdateGitProvider,
        body.git_provider_id.map(Some)
    );
    update_attr!(
        repo_clone_url,
        AuditAction::ModuleProviderUpdateRepoCloneUrl,
        body.repo_clone_url.map(Some)
    );
    update_attr!(
        repo_base_url,
        AuditAction::ModuleProviderUpdateRepoBaseUrl,
        body.repo_base_url.map(Some)
    );
    update_attr!(
        repo_browse_url,
        AuditAction::ModuleProviderUpdateRepoBrowseUrl,
        body.repo_browse_url.map(Some)
    );
    update_attr!(
        verified,
        AuditAction::ModuleProviderUpdateVerified,
        body.verified
    );

    txn.commit().await?;

    Ok(Json(serde_json::json!({ "id": current.id })))
}

/// Extracted documentation for a submodule or example.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ImportedDetails {
    pub readme_content: Option<String>,
    pub terraform_docs: Option<serde_json::Value>,
    pub tfsec: Option<serde_json::Value>,
    pub infracost: Option<serde_json::Value>,
    pub terraform_graph: Option<String>,
    pub terraform_modules: Option<serde_json::Value>,
}

impl ImportedDetails {
    fn is_empty(&self) -> bool {
        self.readme_content.is_none()
            && self.terraform_docs.is_none()
            && self.tfsec.is_none()
            && self.infracost.is_none()
            && self.terraform_graph.is_none()
            && self.terraform_modules.is_none()
    }

    fn into_new(self) -> NewModuleDetails {
        NewModuleDetails {
            readme_content: self.readme_content.map(String::into_bytes),
            terraform_docs: self.terraform_docs,
            tfsec: self.tfsec,
            infracost: self.infracost,
            terraform_graph: self.terraform_graph.map(String::into_bytes),
            terraform_modules: self.terraform_modules,
        }
    }
}

/// One submodule or example in the import payload.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ImportedSubmodule {
    pub path: String,
    pub name: Option<String>,
    #[serde(default)]
    pub details: ImportedDetails,
    /// Example source files; ignored for submodules.
    #[serde(default)]
    pub files: Vec<ImportedExampleFile>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ImportedExampleFile {
    pub path: String,
    pub content: Option<String>,
}

/// Body for version import: the already-extracted metadata for one version.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ImportModuleVersionRequest {
    pub version: String,
    pub owner: Option<String>,
    pub description: Option<String>,
    pub variable_template: Option<serde_json::Value>,
    pub extraction_version: Option<i32>,
    #[serde(default)]
    pub internal: bool,
    /// Defaults to true: imported versions are published unless deferred.
    pub publish: Option<bool>,
    pub archive_url: Option<String>,
    #[serde(default)]
    pub details: ImportedDetails,
    #[serde(default)]
    pub submodules: Vec<ImportedSubmodule>,
    #[serde(default)]
    pub examples: Vec<ImportedSubmodule>,
}

/// Index a module version from extracted metadata.
#[utoipa::path(
    post,
    path = "/v1/terrareg/modules/{namespace}/{module}/{provider}/import",
    request_body = ImportModuleVersionRequest,
    responses(
        (status = 200, description = "Version indexed"),
        (status = 400, description = "Invalid version string", body = ApiError),
        (status = 409, description = "Version already exists", body = ApiError)
    ),
    tag = "module-admin"
)]
pub async fn import_module_version(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path((namespace, module, provider)): Path<(String, String, String)>,
    Json(body): Json<ImportModuleVersionRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !authz::can_upload_module_version(&state.db, &ctx.identity, &namespace).await? {
        return Err(if ctx.identity.is_authenticated() {
            forbidden(None)
        } else {
            unauthenticated(None)
        });
    }

    let semver = Semver::parse(&body.version).map_err(|e| {
        validation_error(e.to_string(), serde_json::json!({ "version": "invalid semver" }))
    })?;

    if state.config.allow_module_hosting == ModuleHostingMode::Enforce
        && body.archive_url.is_none()
    {
        return Err(validation_error(
            "module hosting is enforced but no archive URL was supplied",
            serde_json::json!({ "archive_url": "required" }),
        ));
    }

    let ns = NamespaceRepository::get_by_name(&state.db, &namespace)
        .await?
        .ok_or_else(|| not_found(format!("namespace {namespace} not found")))?;
    let mp = ModuleProviderRepository::get(&state.db, ns.id, &module, &provider)
        .await?
        .ok_or_else(|| not_found("module provider not found"))?;

    let txn = state.db.begin().await?;

    if ModuleVersionRepository::get(&txn, mp.id, &body.version)
        .await?
        .is_some()
    {
        return Err(conflict(format!("version {} already exists", body.version)));
    }

    let details_id = if body.details.is_empty() {
        None
    } else {
        Some(
            ModuleVersionRepository::create_details(&txn, body.details.into_new())
                .await?
                .id,
        )
    };

    let publish = body.publish.unwrap_or(true);
    let mut created = ModuleVersionRepository::create(
        &txn,
        mp.id,
        NewModuleVersion {
            version: body.version.clone(),
            beta: semver.is_beta(),
            internal: body.internal,
            owner: body.owner,
            description: body.description,
            variable_template: body.variable_template,
            extraction_version: body.extraction_version,
            archive_url: body.archive_url,
        },
        details_id,
    )
    .await?;

    if publish {
        created = ModuleVersionRepository::set_published(&txn, created).await?;
    }

    for submodule in body.submodules {
        let details_id = if submodule.details.is_empty() {
            None
        } else {
            Some(
                ModuleVersionRepository::create_details(&txn, submodule.details.into_new())
                    .await?
                    .id,
            )
        };
        ModuleVersionRepository::create_submodule(
            &txn,
            created.id,
            SubmoduleKind::Submodule.as_str(),
            &submodule.path,
            submodule.name,
            details_id,
        )
        .await?;
    }

    for example in body.examples {
        let details_id = if example.details.is_empty() {
            None
        } else {
            Some(
                ModuleVersionRepository::create_details(&txn, example.details.into_new())
                    .await?
                    .id,
            )
        };
        let row = ModuleVersionRepository::create_submodule(
            &txn,
            created.id,
            SubmoduleKind::Example.as_str(),
            &example.path,
            example.name,
            details_id,
        )
        .await?;
        for file in example.files {
            ModuleVersionRepository::create_example_file(
                &txn,
                row.id,
                &file.path,
                file.content.map(String::into_bytes),
            )
            .await?;
        }
    }

    module_service::refresh_latest_pointer(&txn, mp).await?;

    audit::record(
        &txn,
        AuditEvent {
            username: &ctx.identity.username(),
            action: AuditAction::ModuleVersionIndex,
            object_type: "ModuleVersion",
            object_id: format!("{namespace}/{module}/{provider}/{}", body.version),
            old_value: None,
            new_value: None,
        },
    )
    .await?;

    txn.commit().await?;

    Ok(Json(serde_json::json!({
        "id": created.id,
        "version": created.version,
        "published": created.published,
    })))
}

/// Publish a previously indexed version.
#[utoipa::path(
    post,
    path = "/v1/terrareg/modules/{namespace}/{module}/{provider}/{version}/publish",
    responses(
        (status = 200, description = "Version published"),
        (status = 409, description = "Already published", body = ApiError)
    ),
    tag = "module-admin"
)]
pub async fn publish_module_version(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path((namespace, module, provider, version)): Path<(String, String, String, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !authz::can_upload_module_version(&state.db, &ctx.identity, &namespace).await? {
        return Err(if ctx.identity.is_authenticated() {
            forbidden(None)
        } else {
            unauthenticated(None)
        });
    }

    let ns = NamespaceRepository::get_by_name(&state.db, &namespace)
        .await?
        .ok_or_else(|| not_found(format!("namespace {namespace} not found")))?;
    let mp = ModuleProviderRepository::get(&state.db, ns.id, &module, &provider)
        .await?
        .ok_or_else(|| not_found("module provider not found"))?;

    let txn = state.db.begin().await?;

    let row = ModuleVersionRepository::get(&txn, mp.id, &version)
        .await?
        .ok_or_else(|| not_found(format!("version {version} not found")))?;

    if row.published {
        return Err(conflict("version is already published"));
    }

    ModuleVersionRepository::set_published(&txn, row).await?;
    module_service::refresh_latest_pointer(&txn, mp).await?;

    audit::record(
        &txn,
        AuditEvent {
            username: &ctx.identity.username(),
            action: AuditAction::ModuleVersionPublish,
            object_type: "ModuleVersion",
            object_id: format!("{namespace}/{module}/{provider}/{version}"),
            old_value: None,
            new_value: None,
        },
    )
    .await?;

    txn.commit().await?;

    Ok(Json(serde_json::json!({ "published": true })))
}

/// Delete a module version.
#[utoipa::path(
    delete,
    path = "/v1/terrareg/modules/{namespace}/{module}/{provider}/{version}",
    responses(
        (status = 200, description = "Version deleted"),
        (status = 404, description = "Unknown version", body = ApiError)
    ),
    tag = "module-admin"
)]
pub async fn delete_module_version(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path((namespace, module, provider, version)): Path<(String, String, String, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_access(&state, &ctx, Some(&namespace), RegistryAction::Modify).await?;

    let ns = NamespaceRepository::get_by_name(&state.db, &namespace)
        .await?
        .ok_or_else(|| not_found(format!("namespace {namespace} not found")))?;
    let mp = ModuleProviderRepository::get(&state.db, ns.id, &module, &provider)
        .await?
        .ok_or_else(|| not_found("module provider not found"))?;

    let txn = state.db.begin().await?;

    let row = ModuleVersionRepository::get(&txn, mp.id, &version)
        .await?
        .ok_or_else(|| not_found(format!("version {version} not found")))?;

    ModuleVersionRepository::delete(&txn, row.id).await?;
    module_service::refresh_latest_pointer(&txn, mp).await?;

    audit::record(
        &txn,
        AuditEvent {
            username: &ctx.identity.username(),
            action: AuditAction::ModuleVersionDelete,
            object_type: "ModuleVersion",
            object_id: format!("{namespace}/{module}/{provider}/{version}"),
            old_value: None,
            new_value: None,
        },
    )
    .await?;

    txn.commit().await?;

    Ok(Json(serde_json::json!({ "deleted": true })))
}

/// Per-token analytics row in the response.
#[derive(Debug, Serialize, ToSchema)]
pub struct TokenVersionItem {
    pub analytics_token: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terraform_version: Option<String>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Latest version seen per analytics token for a module provider.
#[utoipa::path(
    get,
    path = "/v1/terrareg/analytics/{namespace}/{module}/{provider}/token_versions",
    responses(
        (status = 200, description = "Per-token latest downloads", body = [TokenVersionItem]),
        (status = 404, description = "Unknown module provider", body = ApiError)
    ),
    tag = "module-admin"
)]
pub async fn token_versions(
    State(state): State<AppState>,
    Path((namespace, module, provider)): Path<(String, String, String)>,
) -> Result<Json<Vec<TokenVersionItem>>, ApiError> {
    let resolved = ModuleProviderRepository::resolve(&state.db, &namespace, &module, &provider)
        .await?
        .ok_or_else(|| not_found("module provider not found"))?;

    let rows = AnalyticsRepository::token_versions(&state.db, resolved.module_provider.id).await?;

    Ok(Json(
        rows.into_iter()
            .map(|row| TokenVersionItem {
                analytics_token: row.analytics_token,
                version: row.version,
                environment: row.environment,
                terraform_version: row.terraform_version,
                timestamp: row.timestamp,
            })
            .collect(),
    ))
}

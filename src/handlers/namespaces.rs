//! Namespace management handlers.

use axum::{
    extract::{Path, State},
    response::Json,
};
use sea_orm::TransactionTrait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::audit::{self, AuditAction, AuditEvent};
use crate::auth::AuthContext;
use crate::authz::RegistryAction;
use crate::error::{ApiError, conflict, not_found, validation_error};
use crate::handlers::require_access;
use crate::models::NamespaceType;
use crate::repositories::{ModuleProviderRepository, NamespaceRepository};
use crate::server::AppState;
use crate::validation::validate_namespace_name;

/// One namespace in list responses.
#[derive(Debug, Serialize, ToSchema)]
pub struct NamespaceItem {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub namespace_type: String,
    pub trusted: bool,
}

/// List all namespaces.
#[utoipa::path(
    get,
    path = "/v1/terrareg/namespaces",
    responses(
        (status = 200, description = "All namespaces", body = [NamespaceItem])
    ),
    tag = "namespaces"
)]
pub async fn list_namespaces(
    State(state): State<AppState>,
) -> Result<Json<Vec<NamespaceItem>>, ApiError> {
    let namespaces = NamespaceRepository::list(&state.db).await?;
    Ok(Json(
        namespaces
            .into_iter()
            .map(|ns| NamespaceItem {
                trusted: state.config.is_trusted_namespace(&ns.name),
                name: ns.name,
                display_name: ns.display_name,
                namespace_type: ns.namespace_type,
            })
            .collect(),
    ))
}

/// Body for namespace creation.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateNamespaceRequest {
    pub name: String,
    pub display_name: Option<String>,
    /// One of none / github_user / github_org; defaults to none.
    pub namespace_type: Option<String>,
}

/// Create a namespace.
#[utoipa::path(
    post,
    path = "/v1/terrareg/namespaces",
    request_body = CreateNamespaceRequest,
    responses(
        (status = 200, description = "Namespace created"),
        (status = 400, description = "Invalid name", body = ApiError),
        (status = 409, description = "Name already taken", body = ApiError)
    ),
    tag = "namespaces"
)]
pub async fn create_namespace(
    State(state): State<AppState>,
    ctx: AuthContext,
    Json(body): Json<CreateNamespaceRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_access(&state, &ctx, None, RegistryAction::SiteAdmin).await?;

    validate_namespace_name(&body.name)
        .map_err(|e| validation_error(e.to_string(), serde_json::json!({ "name": "invalid" })))?;

    let namespace_type = match body.namespace_type.as_deref() {
        None => NamespaceType::None,
        Some(value) => NamespaceType::parse(value).ok_or_else(|| {
            validation_error(
                "invalid namespace type",
                serde_json::json!({ "namespace_type": "must be none, github_user or github_org" }),
            )
        })?,
    };

    let txn = state.db.begin().await?;

    if NamespaceRepository::get_by_name_ci(&txn, &body.name)
        .await?
        .is_some()
    {
        return Err(conflict("namespace already exists"));
    }

    let created = NamespaceRepository::create(
        &txn,
        &body.name,
        body.display_name,
        namespace_type.as_str(),
    )
    .await?;

    audit::record(
        &txn,
        AuditEvent {
            username: &ctx.identity.username(),
            action: AuditAction::NamespaceCreate,
            object_type: "Namespace",
            object_id: created.name.clone(),
            old_value: None,
            new_value: None,
        },
    )
    .await?;

    txn.commit().await?;

    Ok(Json(serde_json::json!({ "id": created.id, "name": created.name })))
}

/// Body for namespace updates.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateNamespaceRequest {
    /// New name; old module paths keep resolving through redirects.
    pub name: Option<String>,
    pub display_name: Option<String>,
}

/// Rename a namespace or update its display name.
#[utoipa::path(
    post,
    path = "/v1/terrareg/namespaces/{namespace}",
    request_body = UpdateNamespaceRequest,
    responses(
        (status = 200, description = "Namespace updated"),
        (status = 404, description = "Unknown namespace", body = ApiError),
        (status = 409, description = "Target name already taken", body = ApiError)
    ),
    tag = "namespaces"
)]
pub async fn update_namespace(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(namespace): Path<String>,
    Json(body): Json<UpdateNamespaceRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_access(&state, &ctx, Some(&namespace), RegistryAction::Full).await?;

    let txn = state.db.begin().await?;

    let mut ns = NamespaceRepository::get_by_name(&txn, &namespace)
        .await?
        .ok_or_else(|| not_found(format!("namespace {namespace} not found")))?;

    let username = ctx.identity.username();

    if let Some(new_name) = &body.name {
        if new_name != &ns.name {
            validate_namespace_name(new_name).map_err(|e| {
                validation_error(e.to_string(), serde_json::json!({ "name": "invalid" }))
            })?;
            if NamespaceRepository::get_by_name_ci(&txn, new_name)
                .await?
                .is_some()
            {
                return Err(conflict("target namespace name already exists"));
            }

            // Keep every module path under the old name resolving.
            for mp in ModuleProviderRepository::list_by_namespace(&txn, ns.id).await? {
                ModuleProviderRepository::add_redirect(
                    &txn,
                    &ns.name,
                    &mp.module,
                    &mp.provider,
                    mp.id,
                )
                .await?;
            }

            let old = ns.name.clone();
            ns = NamespaceRepository::update_name(&txn, ns, new_name).await?;

            audit::record(
                &txn,
                AuditEvent {
                    username: &username,
                    action: AuditAction::NamespaceModifyName,
                    object_type: "Namespace",
                    object_id: ns.name.clone(),
                    old_value: Some(old),
                    new_value: Some(new_name.clone()),
                },
            )
            .await?;
        }
    }

    if let Some(display_name) = body.display_name {
        let old = ns.display_name.clone();
        let new = Some(display_name.clone()).filter(|s| !s.is_empty());
        ns = NamespaceRepository::update_display_name(&txn, ns, new.clone()).await?;

        audit::record(
            &txn,
            AuditEvent {
                username: &username,
                action: AuditAction::NamespaceModifyDisplayName,
                object_type: "Namespace",
                object_id: ns.name.clone(),
                old_value: old,
                new_value: new,
            },
        )
        .await?;
    }

    txn.commit().await?;

    Ok(Json(serde_json::json!({ "name": ns.name, "display_name": ns.display_name })))
}

/// Delete an empty namespace.
#[utoipa::path(
    delete,
    path = "/v1/terrareg/namespaces/{namespace}",
    responses(
        (status = 200, description = "Namespace deleted"),
        (status = 404, description = "Unknown namespace", body = ApiError),
        (status = 409, description = "Namespace is not empty", body = ApiError)
    ),
    tag = "namespaces"
)]
pub async fn delete_namespace(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(namespace): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_access(&state, &ctx, None, RegistryAction::SiteAdmin).await?;

    let txn = state.db.begin().await?;

    let ns = NamespaceRepository::get_by_name(&txn, &namespace)
        .await?
        .ok_or_else(|| not_found(format!("namespace {namespace} not found")))?;

    if !NamespaceRepository::is_empty(&txn, ns.id).await? {
        return Err(conflict(
            "namespace still contains modules, providers, GPG keys or permissions",
        ));
    }

    NamespaceRepository::delete(&txn, ns.id).await?;

    audit::record(
        &txn,
        AuditEvent {
            username: &ctx.identity.username(),
            action: AuditAction::NamespaceDelete,
            object_type: "Namespace",
            object_id: ns.name.clone(),
            old_value: None,
            new_value: None,
        },
    )
    .await?;

    txn.commit().await?;

    Ok(Json(serde_json::json!({ "deleted": true })))
}

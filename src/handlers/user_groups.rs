//! User group and permission management handlers.

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
use crate::models::PermissionLevel;
use crate::repositories::{NamespaceRepository, UserGroupRepository};
use crate::server::AppState;
use crate::validation::validate_user_group_name;

/// One permission row in the group listing.
#[derive(Debug, Serialize, ToSchema)]
pub struct GroupPermissionItem {
    pub namespace: String,
    pub permission_type: String,
}

/// One user group in list responses.
#[derive(Debug, Serialize, ToSchema)]
pub struct UserGroupItem {
    pub name: String,
    pub site_admin: bool,
    pub namespace_permissions: Vec<GroupPermissionItem>,
}

/// List user groups with their namespace permissions.
#[utoipa::path(
    get,
    path = "/v1/terrareg/user-groups",
    responses(
        (status = 200, description = "All user groups", body = [UserGroupItem])
    ),
    tag = "user-groups"
)]
pub async fn list_user_groups(
    State(state): State<AppState>,
    ctx: AuthContext,
) -> Result<Json<Vec<UserGroupItem>>, ApiError> {
    require_access(&state, &ctx, None, RegistryAction::SiteAdmin).await?;

    let namespaces: std::collections::HashMap<i32, String> =
        NamespaceRepository::list(&state.db)
            .await?
            .into_iter()
            .map(|ns| (ns.id, ns.name))
            .collect();

    let mut items = Vec::new();
    for group in UserGroupRepository::list(&state.db).await? {
        let namespace_permissions =
            UserGroupRepository::list_permissions_by_group(&state.db, group.id)
                .await?
                .into_iter()
                .filter_map(|p| {
                    namespaces.get(&p.namespace_id).map(|name| GroupPermissionItem {
                        namespace: name.clone(),
                        permission_type: p.permission_type,
                    })
                })
                .collect();
        items.push(UserGroupItem {
            name: group.name,
            site_admin: group.site_admin,
            namespace_permissions,
        });
    }

    Ok(Json(items))
}

/// Body for user group creation.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateUserGroupRequest {
    pub name: String,
    #[serde(default)]
    pub site_admin: bool,
}

/// Create a user group.
#[utoipa::path(
    post,
    path = "/v1/terrareg/user-groups",
    request_body = CreateUserGroupRequest,
    responses(
        (status = 200, description = "User group created"),
        (status = 409, description = "Name already taken", body = ApiError)
    ),
    tag = "user-groups"
)]
pub async fn create_user_group(
    State(state): State<AppState>,
    ctx: AuthContext,
    Json(body): Json<CreateUserGroupRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_access(&state, &ctx, None, RegistryAction::SiteAdmin).await?;

    validate_user_group_name(&body.name)
        .map_err(|e| validation_error(e.to_string(), serde_json::json!({ "name": "invalid" })))?;

    let txn = state.db.begin().await?;

    if UserGroupRepository::get_by_name(&txn, &body.name)
        .await?
        .is_some()
    {
        return Err(conflict("user group already exists"));
    }

    let created = UserGroupRepository::create(&txn, &body.name, body.site_admin).await?;

    audit::record(
        &txn,
        AuditEvent {
            username: &ctx.identity.username(),
            action: AuditAction::UserGroupCreate,
            object_type: "UserGroup",
            object_id: created.name.clone(),
            old_value: None,
            new_value: Some(format!("site_admin={}", created.site_admin)),
        },
    )
    .await?;

    txn.commit().await?;

    Ok(Json(serde_json::json!({ "name": created.name, "site_admin": created.site_admin })))
}

/// Delete a user group and its permissions.
#[utoipa::path(
    delete,
    path = "/v1/terrareg/user-groups/{name}",
    responses(
        (status = 200, description = "User group deleted"),
        (status = 404, description = "Unknown user group", body = ApiError)
    ),
    tag = "user-groups"
)]
pub async fn delete_user_group(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_access(&state, &ctx, None, RegistryAction::SiteAdmin).await?;

    let txn = state.db.begin().await?;

    let group = UserGroupRepository::get_by_name(&txn, &name)
        .await?
        .ok_or_else(|| not_found("user group not found"))?;

    UserGroupRepository::delete(&txn, group.id).await?;

    audit::record(
        &txn,
        AuditEvent {
            username: &ctx.identity.username(),
            action: AuditAction::UserGroupDelete,
            object_type: "UserGroup",
            object_id: group.name.clone(),
            old_value: None,
            new_value: None,
        },
    )
    .await?;

    txn.commit().await?;

    Ok(Json(serde_json::json!({ "deleted": true })))
}

/// Body for permission assignment.
#[derive(Debug, Deserialize, ToSchema)]
pub struct PermissionRequest {
    /// One of full / modify / read.
    pub permission_type: String,
}

/// Grant or change a group's permission on a namespace.
#[utoipa::path(
    put,
    path = "/v1/terrareg/user-groups/{name}/permissions/{namespace}",
    request_body = PermissionRequest,
    responses(
        (status = 200, description = "Permission stored"),
        (status = 404, description = "Unknown group or namespace", body = ApiError)
    ),
    tag = "user-groups"
)]
pub async fn set_permission(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path((name, namespace)): Path<(String, String)>,
    Json(body): Json<PermissionRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_access(&state, &ctx, None, RegistryAction::SiteAdmin).await?;

    let level = PermissionLevel::parse(&body.permission_type).ok_or_else(|| {
        validation_error(
            "invalid permission type",
            serde_json::json!({ "permission_type": "must be full, modify or read" }),
        )
    })?;

    let group = UserGroupRepository::get_by_name(&state.db, &name)
        .await?
        .ok_or_else(|| not_found("user group not found"))?;
    let ns = NamespaceRepository::get_by_name(&state.db, &namespace)
        .await?
        .ok_or_else(|| not_found(format!("namespace {namespace} not found")))?;

    let txn = state.db.begin().await?;

    let existing = UserGroupRepository::get_permission(&txn, group.id, ns.id).await?;

    match existing {
        Some(permission) if permission.permission_type == level.as_str() => {
            // No change; nothing to audit.
        }
        Some(permission) => {
            let old = permission.permission_type.clone();
            UserGroupRepository::update_permission(&txn, permission, level.as_str()).await?;
            audit::record(
                &txn,
                AuditEvent {
                    username: &ctx.identity.username(),
                    action: AuditAction::UserGroupNamespacePermissionModify,
                    object_type: "UserGroupNamespacePermission",
                    object_id: format!("{}/{}", group.name, ns.name),
                    old_value: Some(old),
                    new_value: Some(level.as_str().to_string()),
                },
            )
            .await?;
        }
        None => {
            UserGroupRepository::add_permission(&txn, group.id, ns.id, level.as_str()).await?;
            audit::record(
                &txn,
                AuditEvent {
                    username: &ctx.identity.username(),
                    action: AuditAction::UserGroupNamespacePermissionAdd,
                    object_type: "UserGroupNamespacePermission",
                    object_id: format!("{}/{}", group.name, ns.name),
                    old_value: None,
                    new_value: Some(level.as_str().to_string()),
                },
            )
            .await?;
        }
    }

    txn.commit().await?;

    Ok(Json(serde_json::json!({
        "user_group": group.name,
        "namespace": ns.name,
        "permission_type": level.as_str(),
    })))
}

/// Revoke a group's permission on a namespace.
#[utoipa::path(
    delete,
    path = "/v1/terrareg/user-groups/{name}/permissions/{namespace}",
    responses(
        (status = 200, description = "Permission revoked"),
        (status = 404, description = "Unknown permission", body = ApiError)
    ),
    tag = "user-groups"
)]
pub async fn delete_permission(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path((name, namespace)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_access(&state, &ctx, None, RegistryAction::SiteAdmin).await?;

    let group = UserGroupRepository::get_by_name(&state.db, &name)
        .await?
        .ok_or_else(|| not_found("user group not found"))?;
    let ns = NamespaceRepository::get_by_name(&state.db, &namespace)
        .await?
        .ok_or_else(|| not_found(format!("namespace {namespace} not found")))?;

    let txn = state.db.begin().await?;

    let permission = UserGroupRepository::get_permission(&txn, group.id, ns.id)
        .await?
        .ok_or_else(|| not_found("permission not found"))?;

    let old = permission.permission_type.clone();
    UserGroupRepository::delete_permission(&txn, permission.id).await?;

    audit::record(
        &txn,
        AuditEvent {
            username: &ctx.identity.username(),
            action: AuditAction::UserGroupNamespacePermissionDelete,
            object_type: "UserGroupNamespacePermission",
            object_id: format!("{}/{}", group.name, ns.name),
            old_value: Some(old),
            new_value: None,
        },
    )
    .await?;

    txn.commit().await?;

    Ok(Json(serde_json::json!({ "deleted": true })))
}

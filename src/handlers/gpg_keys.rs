//! GPG key management handlers.

use axum::{
    extract::{Path, State},
    response::Json,
};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, TransactionTrait};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::audit::{self, AuditAction, AuditEvent};
use crate::auth::AuthContext;
use crate::authz::RegistryAction;
use crate::error::{ApiError, conflict, not_found, validation_error};
use crate::gpg;
use crate::handlers::require_access;
use crate::models::provider_version;
use crate::repositories::{GpgKeyRepository, NamespaceRepository};
use crate::server::AppState;

/// Body for GPG key creation.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateGpgKeyRequest {
    pub namespace: String,
    /// ASCII-armored public key.
    pub ascii_armor: String,
    pub source: Option<String>,
    pub source_url: Option<String>,
}

/// One GPG key in list responses.
#[derive(Debug, Serialize, ToSchema)]
pub struct GpgKeyItem {
    pub key_id: String,
    pub fingerprint: String,
    pub ascii_armor: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
}

/// List the GPG keys of a namespace.
#[utoipa::path(
    get,
    path = "/v1/terrareg/gpg-keys/{namespace}",
    responses(
        (status = 200, description = "Keys for the namespace", body = [GpgKeyItem]),
        (status = 404, description = "Unknown namespace", body = ApiError)
    ),
    tag = "gpg-keys"
)]
pub async fn list_gpg_keys(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
) -> Result<Json<Vec<GpgKeyItem>>, ApiError> {
    let ns = NamespaceRepository::get_by_name(&state.db, &namespace)
        .await?
        .ok_or_else(|| not_found(format!("namespace {namespace} not found")))?;

    let keys = GpgKeyRepository::list_by_namespace(&state.db, ns.id).await?;

    Ok(Json(
        keys.into_iter()
            .map(|key| GpgKeyItem {
                key_id: key.key_id,
                fingerprint: key.fingerprint,
                ascii_armor: key.ascii_armor,
                source: key.source,
                source_url: key.source_url,
            })
            .collect(),
    ))
}

/// Register a GPG key; key id and fingerprint are derived from the armor,
/// never trusted from the caller.
#[utoipa::path(
    post,
    path = "/v1/terrareg/gpg-keys",
    request_body = CreateGpgKeyRequest,
    responses(
        (status = 200, description = "Key registered"),
        (status = 400, description = "Armor failed to parse", body = ApiError),
        (status = 409, description = "Fingerprint already registered", body = ApiError)
    ),
    tag = "gpg-keys"
)]
pub async fn create_gpg_key(
    State(state): State<AppState>,
    ctx: AuthContext,
    Json(body): Json<CreateGpgKeyRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_access(&state, &ctx, Some(&body.namespace), RegistryAction::Modify).await?;

    let ns = NamespaceRepository::get_by_name(&state.db, &body.namespace)
        .await?
        .ok_or_else(|| not_found(format!("namespace {} not found", body.namespace)))?;

    let parsed = gpg::parse_public_key(&body.ascii_armor).map_err(|e| {
        validation_error(e.to_string(), serde_json::json!({ "ascii_armor": "unparseable" }))
    })?;

    let txn = state.db.begin().await?;

    if GpgKeyRepository::get_by_fingerprint(&txn, &parsed.fingerprint)
        .await?
        .is_some()
    {
        return Err(conflict("a key with this fingerprint is already registered"));
    }

    let created = GpgKeyRepository::create(
        &txn,
        ns.id,
        &parsed.key_id,
        &parsed.fingerprint,
        &body.ascii_armor,
        body.source,
        body.source_url,
    )
    .await?;

    audit::record(
        &txn,
        AuditEvent {
            username: &ctx.identity.username(),
            action: AuditAction::GpgKeyCreate,
            object_type: "GpgKey",
            object_id: created.fingerprint.clone(),
            old_value: None,
            new_value: None,
        },
    )
    .await?;

    txn.commit().await?;

    Ok(Json(serde_json::json!({
        "key_id": created.key_id,
        "fingerprint": created.fingerprint,
    })))
}

/// Delete a GPG key. Keys still referenced by provider versions cannot be
/// removed.
#[utoipa::path(
    delete,
    path = "/v1/terrareg/gpg-keys/{namespace}/{fingerprint}",
    responses(
        (status = 200, description = "Key deleted"),
        (status = 404, description = "Unknown key", body = ApiError),
        (status = 409, description = "Key is still in use", body = ApiError)
    ),
    tag = "gpg-keys"
)]
pub async fn delete_gpg_key(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path((namespace, fingerprint)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_access(&state, &ctx, Some(&namespace), RegistryAction::Modify).await?;

    let ns = NamespaceRepository::get_by_name(&state.db, &namespace)
        .await?
        .ok_or_else(|| not_found(format!("namespace {namespace} not found")))?;

    let txn = state.db.begin().await?;

    let key = GpgKeyRepository::get_by_fingerprint(&txn, &fingerprint)
        .await?
        .filter(|key| key.namespace_id == ns.id)
        .ok_or_else(|| not_found("GPG key not found"))?;

    let references = provider_version::Entity::find()
        .filter(provider_version::Column::GpgKeyId.eq(key.id))
        .count(&txn)
        .await?;
    if references > 0 {
        return Err(conflict("key is referenced by provider versions"));
    }

    GpgKeyRepository::delete(&txn, key.id).await?;

    audit::record(
        &txn,
        AuditEvent {
            username: &ctx.identity.username(),
            action: AuditAction::GpgKeyDelete,
            object_type: "GpgKey",
            object_id: key.fingerprint.clone(),
            old_value: None,
            new_value: None,
        },
    )
    .await?;

    txn.commit().await?;

    Ok(Json(serde_json::json!({ "deleted": true })))
}

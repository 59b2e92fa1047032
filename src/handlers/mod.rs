//! # API Handlers
//!
//! HTTP endpoint handlers for the registry protocols and the management API.

pub mod auth;
pub mod gpg_keys;
pub mod idp;
pub mod module_admin;
pub mod modules;
pub mod namespaces;
pub mod provider_admin;
pub mod providers;
pub mod sso;
pub mod user_groups;

use axum::{extract::State, response::Json};
use serde_json::json;

use crate::auth::AuthContext;
use crate::authz::{self, RegistryAction};
use crate::error::{ApiError, forbidden, unauthenticated, upstream_failure};
use crate::models::ServiceInfo;
use crate::server::AppState;

/// Root handler that returns basic service information
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Service information", body = ServiceInfo)
    ),
    tag = "root"
)]
pub async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo::default())
}

/// Terraform remote-service discovery document.
///
/// The body is contractual: `terraform` reads the `modules.v1`,
/// `providers.v1` and `login.v1` members to find the protocol roots.
#[utoipa::path(
    get,
    path = "/.well-known/terraform.json",
    responses(
        (status = 200, description = "Service discovery document")
    ),
    tag = "discovery"
)]
pub async fn well_known_terraform() -> Json<serde_json::Value> {
    Json(json!({
        "modules.v1": "/v1/modules/",
        "providers.v1": "/v1/providers/",
        "login.v1": {
            "client": "terraform-cli",
            "grant_types": ["authz_code"],
            "authz": "/terraform/oauth/authorization",
            "token": "/terraform/oauth/token",
            "ports": [crate::idp::REDIRECT_PORTS.0, crate::idp::REDIRECT_PORTS.1],
        },
    }))
}

/// Liveness probe including a database round-trip.
#[utoipa::path(
    get,
    path = "/v1/terrareg/health",
    responses(
        (status = 200, description = "Service is healthy"),
        (status = 502, description = "Database unreachable", body = ApiError)
    ),
    tag = "health"
)]
pub async fn health(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    crate::db::health_check(&state.db)
        .await
        .map_err(|e| upstream_failure(format!("database health check failed: {e}")))?;
    Ok(Json(json!({ "status": "ok" })))
}

/// Authorization guard shared by the mutating handlers: resolves to 401 for
/// anonymous callers and 403 for authenticated ones without the permission.
pub(crate) async fn require_access(
    state: &AppState,
    ctx: &AuthContext,
    namespace: Option<&str>,
    action: RegistryAction,
) -> Result<(), ApiError> {
    if authz::is_allowed(&state.db, &ctx.identity, namespace, action).await? {
        return Ok(());
    }
    if ctx.identity.is_authenticated() {
        Err(forbidden(None))
    } else {
        Err(unauthenticated(None))
    }
}

/// Split a comma-separated query value into trimmed entries.
pub(crate) fn csv_values(value: Option<&str>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

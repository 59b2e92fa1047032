//! Session authentication handlers: password login, logout and identity
//! introspection.

use axum::{
    extract::State,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Json, Response},
};
use sea_orm::TransactionTrait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::audit::{self, AuditAction, AuditEvent};
use crate::auth::middleware::SESSION_COOKIE;
use crate::auth::{AuthContext, Identity, session};
use crate::crypto;
use crate::error::{ApiError, unauthenticated};
use crate::repositories::SessionRepository;
use crate::server::AppState;

/// Body for the built-in admin login.
#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Successful login response.
#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub authenticated: bool,
    pub username: String,
    /// Token the client must send in `X-CSRF-Token` on mutating requests.
    pub csrf_token: String,
}

fn session_cookie(session_id: &str, expiry: chrono::DateTime<chrono::Utc>) -> HeaderValue {
    let cookie = format!(
        "{SESSION_COOKIE}={session_id}; Path=/; HttpOnly; SameSite=Lax; Expires={}",
        expiry.format("%a, %d %b %Y %H:%M:%S GMT")
    );
    HeaderValue::from_str(&cookie).expect("cookie value is valid ASCII")
}

fn clear_session_cookie() -> HeaderValue {
    HeaderValue::from_static("tfreg_session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

/// Authenticate with the built-in admin username and password.
#[utoipa::path(
    post,
    path = "/v1/terrareg/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session established", body = LoginResponse),
        (status = 401, description = "Bad credentials", body = ApiError)
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    let Some(expected_password) = state.config.admin_password.as_deref() else {
        return Err(unauthenticated(Some("password login is not configured")));
    };

    let username_ok = crypto::constant_time_eq(
        body.username.as_bytes(),
        state.config.admin_username.as_bytes(),
    );
    let password_ok =
        crypto::constant_time_eq(body.password.as_bytes(), expected_password.as_bytes());
    if !(username_ok && password_ok) {
        return Err(unauthenticated(Some("invalid credentials")));
    }

    let identity = Identity::AdminSession {
        username: state.config.admin_username.clone(),
    };

    let txn = state.db.begin().await?;

    let created = session::create_session(&txn, &state.config, &identity).await?;

    audit::record(
        &txn,
        AuditEvent {
            username: &identity.username(),
            action: AuditAction::UserLogin,
            object_type: "User",
            object_id: identity.username(),
            old_value: None,
            new_value: None,
        },
    )
    .await?;

    txn.commit().await?;

    let body = Json(LoginResponse {
        authenticated: true,
        username: identity.username(),
        csrf_token: created.csrf_token.clone(),
    });

    let mut response = (StatusCode::OK, body).into_response();
    response.headers_mut().insert(
        header::SET_COOKIE,
        session_cookie(&created.id, created.expiry),
    );
    Ok(response)
}

/// Destroy the current session.
#[utoipa::path(
    delete,
    path = "/v1/terrareg/auth/session",
    responses(
        (status = 200, description = "Session destroyed"),
        (status = 401, description = "No session presented", body = ApiError)
    ),
    tag = "auth"
)]
pub async fn logout(
    State(state): State<AppState>,
    ctx: AuthContext,
) -> Result<Response, ApiError> {
    let Some(session_id) = ctx.session_id.as_deref() else {
        return Err(unauthenticated(Some("no active session")));
    };

    SessionRepository::delete(&state.db, session_id).await?;

    let mut response =
        (StatusCode::OK, Json(serde_json::json!({ "authenticated": false }))).into_response();
    response
        .headers_mut()
        .insert(header::SET_COOKIE, clear_session_cookie());
    Ok(response)
}

/// Identity introspection for the UI collaborator.
#[utoipa::path(
    get,
    path = "/v1/terrareg/auth/admin/is_authenticated",
    responses(
        (status = 200, description = "Resolved identity")
    ),
    tag = "auth"
)]
pub async fn is_authenticated(
    State(state): State<AppState>,
    ctx: AuthContext,
) -> Result<Json<serde_json::Value>, ApiError> {
    let site_admin = crate::authz::is_allowed(
        &state.db,
        &ctx.identity,
        None,
        crate::authz::RegistryAction::SiteAdmin,
    )
    .await?;

    Ok(Json(serde_json::json!({
        "authenticated": ctx.identity.is_authenticated(),
        "username": ctx.identity.is_authenticated().then(|| ctx.identity.username()),
        "site_admin": site_admin,
        "auth_method": ctx.identity.session_auth_method(),
    })))
}

//! External SSO handlers: OIDC, GitHub and SAML endpoints.
//!
//! Each login endpoint starts a flow by redirecting the browser to the IdP;
//! each callback consumes the pending state, establishes a session and
//! records a `user_login` audit row in the same transaction.

use axum::{
    extract::{Form, Query, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Json, Response},
};
use sea_orm::TransactionTrait;
use serde::Deserialize;
use utoipa::IntoParams;

use crate::audit::{self, AuditAction, AuditEvent};
use crate::auth::middleware::SESSION_COOKIE;
use crate::auth::{Identity, session};
use crate::error::{ApiError, not_found, validation_error};
use crate::server::AppState;
use crate::sso::FederatedLogin;

fn redirect(location: &str) -> Response {
    (
        StatusCode::SEE_OTHER,
        [(header::LOCATION, location.to_string())],
    )
        .into_response()
}

async fn establish_session(
    state: &AppState,
    identity: Identity,
) -> Result<Response, ApiError> {
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

    let cookie = format!(
        "{SESSION_COOKIE}={}; Path=/; HttpOnly; SameSite=Lax; Expires={}",
        created.id,
        created.expiry.format("%a, %d %b %Y %H:%M:%S GMT")
    );

    let mut response = (
        StatusCode::OK,
        Json(serde_json::json!({
            "authenticated": true,
            "username": identity.username(),
            "csrf_token": created.csrf_token,
        })),
    )
        .into_response();
    response.headers_mut().insert(
        header::SET_COOKIE,
        HeaderValue::from_str(&cookie).expect("cookie value is valid ASCII"),
    );
    Ok(response)
}

/// Query parameters of an OAuth-style callback.
#[derive(Debug, Deserialize, IntoParams)]
pub struct CallbackQuery {
    pub state: Option<String>,
    pub code: Option<String>,
}

fn callback_params(query: CallbackQuery) -> Result<(String, String), ApiError> {
    match (query.state, query.code) {
        (Some(state), Some(code)) => Ok((state, code)),
        _ => Err(validation_error(
            "callback requires state and code",
            serde_json::json!({ "state": "required", "code": "required" }),
        )),
    }
}

/// Start an OIDC login.
#[utoipa::path(
    get,
    path = "/openid/login",
    responses(
        (status = 303, description = "Redirect to the IdP"),
        (status = 404, description = "OIDC is not configured", body = ApiError)
    ),
    tag = "sso"
)]
pub async fn oidc_login(State(state): State<AppState>) -> Result<Response, ApiError> {
    let client = state
        .oidc
        .as_ref()
        .ok_or_else(|| not_found("OIDC login is not configured"))?;
    let location = client.begin_login(&state.db).await?;
    Ok(redirect(&location))
}

/// OIDC callback.
#[utoipa::path(
    get,
    path = "/openid/callback",
    params(CallbackQuery),
    responses(
        (status = 200, description = "Session established"),
        (status = 401, description = "Login rejected", body = ApiError)
    ),
    tag = "sso"
)]
pub async fn oidc_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Result<Response, ApiError> {
    let client = state
        .oidc
        .as_ref()
        .ok_or_else(|| not_found("OIDC login is not configured"))?;
    let (state_param, code) = callback_params(query)?;

    let FederatedLogin { username, groups } =
        client.handle_callback(&state.db, &state_param, &code).await?;

    establish_session(&state, Identity::OidcSession { username, groups }).await
}

/// Start a GitHub login.
#[utoipa::path(
    get,
    path = "/github/login",
    responses(
        (status = 303, description = "Redirect to GitHub"),
        (status = 404, description = "GitHub login is not configured", body = ApiError)
    ),
    tag = "sso"
)]
pub async fn github_login(State(state): State<AppState>) -> Result<Response, ApiError> {
    let client = state
        .github
        .as_ref()
        .ok_or_else(|| not_found("GitHub login is not configured"))?;
    let location = client.begin_login(&state.db).await?;
    Ok(redirect(&location))
}

/// GitHub callback.
#[utoipa::path(
    get,
    path = "/github/callback",
    params(CallbackQuery),
    responses(
        (status = 200, description = "Session established"),
        (status = 401, description = "Login rejected", body = ApiError)
    ),
    tag = "sso"
)]
pub async fn github_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Result<Response, ApiError> {
    let client = state
        .github
        .as_ref()
        .ok_or_else(|| not_found("GitHub login is not configured"))?;
    let (state_param, code) = callback_params(query)?;

    let FederatedLogin { username, groups } =
        client.handle_callback(&state.db, &state_param, &code).await?;

    establish_session(
        &state,
        Identity::GithubSession {
            username,
            organizations: groups,
        },
    )
    .await
}

/// Start a SAML login.
#[utoipa::path(
    get,
    path = "/saml/login",
    responses(
        (status = 303, description = "Redirect to the IdP"),
        (status = 404, description = "SAML is not configured", body = ApiError)
    ),
    tag = "sso"
)]
pub async fn saml_login(State(state): State<AppState>) -> Result<Response, ApiError> {
    let client = state
        .saml
        .as_ref()
        .ok_or_else(|| not_found("SAML login is not configured"))?;
    let location = client.begin_login(&state.db).await?;
    Ok(redirect(&location))
}

/// Service-provider metadata document.
#[utoipa::path(
    get,
    path = "/saml/metadata",
    responses(
        (status = 200, description = "SP metadata XML"),
        (status = 404, description = "SAML is not configured", body = ApiError)
    ),
    tag = "sso"
)]
pub async fn saml_metadata(State(state): State<AppState>) -> Result<Response, ApiError> {
    let client = state
        .saml
        .as_ref()
        .ok_or_else(|| not_found("SAML is not configured"))?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/samlmetadata+xml")],
        client.metadata_xml(),
    )
        .into_response())
}

/// Form posted by the IdP to the assertion consumer service.
#[derive(Debug, Deserialize)]
pub struct AcsForm {
    #[serde(rename = "SAMLResponse")]
    pub saml_response: String,
    #[serde(rename = "RelayState")]
    pub relay_state: Option<String>,
}

/// SAML assertion consumer service.
#[utoipa::path(
    post,
    path = "/saml/acs",
    responses(
        (status = 200, description = "Session established"),
        (status = 401, description = "Assertion rejected", body = ApiError)
    ),
    tag = "sso"
)]
pub async fn saml_acs(
    State(state): State<AppState>,
    Form(form): Form<AcsForm>,
) -> Result<Response, ApiError> {
    let client = state
        .saml
        .as_ref()
        .ok_or_else(|| not_found("SAML is not configured"))?;

    let relay_state = form.relay_state.as_deref().ok_or_else(|| {
        validation_error(
            "missing RelayState",
            serde_json::json!({ "RelayState": "required" }),
        )
    })?;

    let FederatedLogin { username, groups } = client
        .handle_acs(&state.db, relay_state, &form.saml_response)
        .await?;

    establish_session(&state, Identity::SamlSession { username, groups }).await
}

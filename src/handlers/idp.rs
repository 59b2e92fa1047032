//! Terraform CLI IdP handlers: the OAuth2 authorization and token endpoints
//! `terraform login` talks to.

use axum::{
    extract::{Form, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::auth::AuthContext;
use crate::error::{ApiError, unauthenticated, validation_error};
use crate::idp;
use crate::server::AppState;

/// Query parameters of the authorization endpoint.
#[derive(Debug, Deserialize, IntoParams)]
pub struct AuthorizationQuery {
    pub response_type: Option<String>,
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub state: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
}

/// Authorization endpoint: requires an authenticated browser session and
/// redirects back to the CLI's loopback listener with a single-use code.
#[utoipa::path(
    get,
    path = "/terraform/oauth/authorization",
    params(AuthorizationQuery),
    responses(
        (status = 302, description = "Redirect back to the CLI with a code"),
        (status = 400, description = "Malformed authorization request", body = ApiError),
        (status = 401, description = "No authenticated session", body = ApiError)
    ),
    tag = "terraform-idp"
)]
pub async fn authorization(
    State(state): State<AppState>,
    ctx: AuthContext,
    Query(query): Query<AuthorizationQuery>,
) -> Result<Response, ApiError> {
    // Only interactive sessions may mint CLI credentials.
    if ctx.identity.session_auth_method().is_none() {
        return Err(unauthenticated(Some(
            "terraform login requires a signed-in browser session",
        )));
    }

    let redirect_uri = query.redirect_uri.as_deref().ok_or_else(|| {
        validation_error(
            "missing redirect_uri",
            serde_json::json!({ "redirect_uri": "required" }),
        )
    })?;
    let code_challenge = query.code_challenge.as_deref().unwrap_or_default();

    let code = idp::issue_authorization_code(
        &state.db,
        query.response_type.as_deref().unwrap_or_default(),
        code_challenge,
        query.code_challenge_method.as_deref().unwrap_or_default(),
        redirect_uri,
        &ctx.identity.username(),
    )
    .await?;

    let mut location = url::Url::parse(redirect_uri).map_err(|_| {
        validation_error(
            "invalid redirect_uri",
            serde_json::json!({ "redirect_uri": "must be a valid URL" }),
        )
    })?;
    location.query_pairs_mut().append_pair("code", &code);
    if let Some(state_param) = query.state.as_deref() {
        location.query_pairs_mut().append_pair("state", state_param);
    }

    Ok((
        StatusCode::FOUND,
        [(header::LOCATION, location.to_string())],
    )
        .into_response())
}

/// Form posted to the token endpoint.
#[derive(Debug, Deserialize, ToSchema)]
pub struct TokenForm {
    pub grant_type: Option<String>,
    pub code: Option<String>,
    pub code_verifier: Option<String>,
    pub redirect_uri: Option<String>,
}

/// Token endpoint response.
#[derive(Debug, Serialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

/// Token endpoint: exchanges a single-use authorization code (with PKCE
/// verification) for an opaque access token.
#[utoipa::path(
    post,
    path = "/terraform/oauth/token",
    responses(
        (status = 200, description = "Access token issued", body = TokenResponse),
        (status = 400, description = "Malformed exchange", body = ApiError),
        (status = 409, description = "Code already exchanged", body = ApiError)
    ),
    tag = "terraform-idp"
)]
pub async fn token(
    State(state): State<AppState>,
    Form(form): Form<TokenForm>,
) -> Result<Json<TokenResponse>, ApiError> {
    if form.grant_type.as_deref() != Some("authorization_code") {
        return Err(validation_error(
            "unsupported grant_type",
            serde_json::json!({ "grant_type": "must be authorization_code" }),
        ));
    }
    let code = form.code.as_deref().ok_or_else(|| {
        validation_error("missing code", serde_json::json!({ "code": "required" }))
    })?;
    let code_verifier = form.code_verifier.as_deref().ok_or_else(|| {
        validation_error(
            "missing code_verifier",
            serde_json::json!({ "code_verifier": "required" }),
        )
    })?;
    let redirect_uri = form.redirect_uri.as_deref().ok_or_else(|| {
        validation_error(
            "missing redirect_uri",
            serde_json::json!({ "redirect_uri": "required" }),
        )
    })?;

    let issued =
        idp::exchange_code(&state.db, &state.config, code, code_verifier, redirect_uri).await?;

    Ok(Json(TokenResponse {
        access_token: issued.access_token,
        token_type: "bearer",
        expires_in: issued.expires_in_secs,
    }))
}

/// Form posted to the revocation endpoint.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RevokeForm {
    pub token: String,
}

/// Revoke an access token.
#[utoipa::path(
    post,
    path = "/terraform/oauth/revoke",
    responses(
        (status = 200, description = "Token revoked")
    ),
    tag = "terraform-idp"
)]
pub async fn revoke(
    State(state): State<AppState>,
    Form(form): Form<RevokeForm>,
) -> Result<Json<serde_json::Value>, ApiError> {
    idp::revoke_token(&state.db, &form.token).await?;
    Ok(Json(serde_json::json!({ "revoked": true })))
}

//! Identity resolution middleware.
//!
//! Runs the resolvers in a fixed order until one matches: Authorization
//! bearer, `X-Terraform-Session`, cookie session, anonymous. Static tokens
//! are compared in constant time. Mutating requests authenticated by a
//! cookie session additionally require the session's CSRF token.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, Method, header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use crate::auth::{AuthContext, Identity, session};
use crate::config::AppConfig;
use crate::crypto;
use crate::error::{ApiError, unauthenticated};
use crate::repositories::TerraformIdpRepository;
use crate::server::AppState;

/// Cookie holding the session id for browser clients.
pub const SESSION_COOKIE: &str = "tfreg_session";

/// Header carrying the session id for non-cookie clients.
pub const SESSION_HEADER: &str = "x-terraform-session";

/// Header carrying the CSRF token on mutating cookie-session requests.
pub const CSRF_HEADER: &str = "x-csrf-token";

/// Paths where the CSRF check does not apply: pre-login endpoints and IdP
/// callbacks that arrive as cross-site posts by design.
const CSRF_EXEMPT_PREFIXES: &[&str] = &[
    "/v1/terrareg/auth/login",
    "/openid/",
    "/saml/",
    "/github/",
];

enum SessionSource {
    Header,
    Cookie,
}

/// Resolve the request identity and stash it in request extensions.
pub async fn identity_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let headers = request.headers().clone();

    let mut context = AuthContext::anonymous();
    let mut source = None;

    if let Some(token) = bearer_token(&headers) {
        if let Some(identity) = resolve_bearer(&state, token).await? {
            context = AuthContext {
                identity,
                session_id: None,
            };
        }
    }

    if !context.identity.is_authenticated() {
        if let Some(session_id) = headers.get(SESSION_HEADER).and_then(|v| v.to_str().ok()) {
            if let Some((identity, row)) =
                session::resolve_session(&state.db, &state.config, session_id).await?
            {
                context = AuthContext {
                    identity,
                    session_id: Some(row.id),
                };
                source = Some(SessionSource::Header);
            }
        }
    }

    if !context.identity.is_authenticated() {
        if let Some(session_id) = cookie_value(&headers, SESSION_COOKIE) {
            if let Some((identity, row)) =
                session::resolve_session(&state.db, &state.config, &session_id).await?
            {
                context = AuthContext {
                    identity,
                    session_id: Some(row.id),
                };
                source = Some(SessionSource::Cookie);
            }
        }
    }

    if matches!(source, Some(SessionSource::Cookie))
        && is_mutating(request.method())
        && !is_csrf_exempt(request.uri().path())
    {
        let session_id = context
            .session_id
            .as_deref()
            .ok_or_else(|| unauthenticated(None))?;
        let presented = headers.get(CSRF_HEADER).and_then(|v| v.to_str().ok());
        session::check_csrf(&state.db, session_id, presented).await?;
    }

    request.extensions_mut().insert(context);
    Ok(next.run(request).await)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
        .filter(|token| !token.is_empty())
}

async fn resolve_bearer(state: &AppState, token: &str) -> Result<Option<Identity>, ApiError> {
    if let Some(identity) = resolve_static_token(&state.config, token) {
        return Ok(Some(identity));
    }

    // Terraform CLI access tokens are stored hashed.
    let hash = crypto::hash_token(token);
    if let Some(row) = TerraformIdpRepository::find_access_token(&state.db, &hash).await? {
        if row.expires_at > Utc::now() {
            return Ok(Some(Identity::TerraformOidc {
                username: row.subject,
            }));
        }
    }

    Ok(None)
}

fn resolve_static_token(config: &AppConfig, token: &str) -> Option<Identity> {
    let matches = |candidate: &str| crypto::constant_time_eq(token.as_bytes(), candidate.as_bytes());

    if config.admin_tokens.iter().any(|t| matches(t)) {
        return Some(Identity::AdminToken {
            username: config.admin_username.clone(),
        });
    }
    if config.upload_tokens.iter().any(|t| matches(t)) {
        return Some(Identity::UploadToken);
    }
    for entry in &config.publish_tokens {
        if matches(&entry.token) {
            return Some(Identity::PublishToken {
                namespace: entry.namespace.clone(),
            });
        }
    }
    if let Some(internal) = &config.internal_extraction_token {
        if matches(internal) {
            return Some(Identity::TerraformInternalExtraction);
        }
    }
    if config.deployment_tokens.iter().any(|t| matches(t)) {
        return Some(Identity::TerraformDeployment);
    }
    for key in &config.analytics_auth_keys {
        if matches(&key.token) {
            return Some(Identity::TerraformAnalyticsToken {
                environment: key.environment.clone(),
            });
        }
    }

    None
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookies = headers.get("cookie")?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}

fn is_mutating(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

fn is_csrf_exempt(path: &str) -> bool {
    CSRF_EXEMPT_PREFIXES
        .iter()
        .any(|prefix| path.starts_with(prefix))
}

impl<S> FromRequestParts<S> for AuthContext
where
    S: Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or_else(|| unauthenticated(Some("identity resolution did not run")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_parsing_extracts_session() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "cookie",
            "other=1; tfreg_session=abc123; trailing=x".parse().unwrap(),
        );
        assert_eq!(
            cookie_value(&headers, SESSION_COOKIE).as_deref(),
            Some("abc123")
        );
        assert_eq!(cookie_value(&headers, "missing"), None);
    }

    #[test]
    fn static_token_resolution_order() {
        let config = AppConfig {
            admin_tokens: vec!["admin-tok".to_string()],
            upload_tokens: vec!["upload-tok".to_string()],
            publish_tokens: vec![crate::config::NamespaceToken {
                namespace: "acme".to_string(),
                token: "publish-tok".to_string(),
            }],
            analytics_auth_keys: vec![crate::config::AnalyticsAuthKey {
                token: "analytics-tok".to_string(),
                environment: "prod".to_string(),
            }],
            ..AppConfig::default()
        };

        assert!(matches!(
            resolve_static_token(&config, "admin-tok"),
            Some(Identity::AdminToken { .. })
        ));
        assert!(matches!(
            resolve_static_token(&config, "upload-tok"),
            Some(Identity::UploadToken)
        ));
        assert!(matches!(
            resolve_static_token(&config, "publish-tok"),
            Some(Identity::PublishToken { namespace }) if namespace == "acme"
        ));
        assert!(matches!(
            resolve_static_token(&config, "analytics-tok"),
            Some(Identity::TerraformAnalyticsToken { environment }) if environment == "prod"
        ));
        assert!(resolve_static_token(&config, "unknown").is_none());
    }

    #[test]
    fn csrf_exemptions() {
        assert!(is_csrf_exempt("/v1/terrareg/auth/login"));
        assert!(is_csrf_exempt("/saml/acs"));
        assert!(!is_csrf_exempt("/v1/terrareg/namespaces"));
    }
}

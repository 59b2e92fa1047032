//! Session creation and validation.
//!
//! Sessions are opaque 32-byte tokens. The provider-auth data (group
//! memberships from the IdP) is sealed with AES-GCM bound to the session id,
//! so a leaked database dump does not reveal claim contents.

use chrono::{Duration, Utc};
use sea_orm::ConnectionTrait;
use serde::{Deserialize, Serialize};

use crate::auth::Identity;
use crate::config::AppConfig;
use crate::crypto::{self, SecretKey};
use crate::error::{ApiError, internal_error, unauthenticated};
use crate::models::session;
use crate::repositories::SessionRepository;

/// Data sealed into the session's auth blob.
#[derive(Debug, Default, Serialize, Deserialize)]
struct SessionAuthData {
    groups: Vec<String>,
}

/// A freshly created session with the values the client needs.
#[derive(Debug, Clone)]
pub struct CreatedSession {
    pub id: String,
    pub csrf_token: String,
    pub expiry: chrono::DateTime<chrono::Utc>,
}

fn secret_key(config: &AppConfig) -> Result<SecretKey, ApiError> {
    config
        .secret_key
        .as_deref()
        .map(SecretKey::derive)
        .ok_or_else(|| internal_error("TFREG_SECRET_KEY is not configured"))
}

/// Create a session for an authenticated identity. Only identities with a
/// session auth method (admin, saml, oidc, github) can own sessions.
pub async fn create_session<C: ConnectionTrait>(
    conn: &C,
    config: &AppConfig,
    identity: &Identity,
) -> Result<CreatedSession, ApiError> {
    let auth_method = identity
        .session_auth_method()
        .ok_or_else(|| internal_error("identity kind cannot own a session"))?;

    let key = secret_key(config)?;
    let id = crypto::generate_token();
    let csrf_token = crypto::generate_token();
    let expiry = Utc::now() + Duration::minutes(config.session_expiry_mins);

    let auth_data = SessionAuthData {
        groups: identity.groups().to_vec(),
    };
    let blob = serde_json::to_vec(&auth_data)
        .map_err(|e| internal_error(format!("session blob serialization failed: {e}")))?;
    let sealed = crypto::seal_bytes(&key, id.as_bytes(), &blob)
        .map_err(|e| internal_error(format!("session blob sealing failed: {e}")))?;

    SessionRepository::create(
        conn,
        &id,
        Some(identity.username()),
        auth_method,
        Some(csrf_token.clone()),
        Some(sealed),
        expiry,
    )
    .await?;

    Ok(CreatedSession {
        id,
        csrf_token,
        expiry,
    })
}

/// Resolve a session id back into an identity. Expired or unknown sessions
/// resolve to `None`; a blob that fails to open invalidates the session.
pub async fn resolve_session<C: ConnectionTrait>(
    conn: &C,
    config: &AppConfig,
    session_id: &str,
) -> Result<Option<(Identity, session::Model)>, ApiError> {
    let Some(row) = SessionRepository::find_by_id(conn, session_id).await? else {
        return Ok(None);
    };

    if row.is_expired(Utc::now()) {
        return Ok(None);
    }

    let auth_data = match &row.auth_blob {
        Some(sealed) => {
            let key = secret_key(config)?;
            match crypto::open_bytes(&key, row.id.as_bytes(), sealed) {
                Ok(plain) => serde_json::from_slice::<SessionAuthData>(&plain)
                    .unwrap_or_default(),
                Err(_) => {
                    tracing::warn!(session = %row.id, "session auth blob failed to open");
                    return Ok(None);
                }
            }
        }
        None => SessionAuthData::default(),
    };

    let username = row.username.clone().unwrap_or_default();
    let identity = match row.auth_method.as_str() {
        "admin" => Identity::AdminSession { username },
        "saml" => Identity::SamlSession {
            username,
            groups: auth_data.groups,
        },
        "oidc" => Identity::OidcSession {
            username,
            groups: auth_data.groups,
        },
        "github" => Identity::GithubSession {
            username,
            organizations: auth_data.groups,
        },
        other => {
            tracing::warn!(auth_method = other, "unknown session auth method");
            return Ok(None);
        }
    };

    Ok(Some((identity, row)))
}

/// Check the CSRF token presented with a mutating cookie-session request.
pub async fn check_csrf<C: ConnectionTrait>(
    conn: &C,
    session_id: &str,
    presented: Option<&str>,
) -> Result<(), ApiError> {
    let stored = SessionRepository::get_csrf(conn, session_id).await?;
    match (stored, presented) {
        (Some(stored), Some(presented))
            if crypto::constant_time_eq(stored.as_bytes(), presented.as_bytes()) =>
        {
            Ok(())
        }
        _ => Err(unauthenticated(Some("CSRF token missing or invalid"))),
    }
}

//! # Terraform CLI Identity Provider
//!
//! OAuth2 authorization-code flow with mandatory PKCE for `terraform login`.
//! Authorization codes are single-use and bound to an S256 code challenge;
//! access tokens are opaque 128-bit values stored hashed. The (subject,
//! issuer) binding keeps repeated logins stable per user.

use chrono::{Duration, Utc};
use sea_orm::ConnectionTrait;

use crate::config::AppConfig;
use crate::crypto;
use crate::error::{ApiError, conflict, unauthenticated, validation_error};
use crate::repositories::TerraformIdpRepository;

/// Authorization codes are short-lived; clients exchange them immediately.
const CODE_LIFETIME_MINS: i64 = 5;

/// Ports `terraform login` listens on for the redirect.
pub const REDIRECT_PORTS: (u16, u16) = (10000, 10010);

/// A successful exchange: the raw token handed to the client, never stored.
#[derive(Debug)]
pub struct IssuedToken {
    pub access_token: String,
    pub expires_in_secs: i64,
}

/// Validate an authorization request and issue a single-use code for the
/// authenticated subject.
pub async fn issue_authorization_code<C: ConnectionTrait>(
    conn: &C,
    response_type: &str,
    code_challenge: &str,
    code_challenge_method: &str,
    redirect_uri: &str,
    subject: &str,
) -> Result<String, ApiError> {
    if response_type != "code" {
        return Err(validation_error(
            "unsupported response_type",
            serde_json::json!({ "response_type": "must be 'code'" }),
        ));
    }
    if code_challenge_method != "S256" {
        return Err(validation_error(
            "unsupported code_challenge_method",
            serde_json::json!({ "code_challenge_method": "must be 'S256'" }),
        ));
    }
    if code_challenge.is_empty() {
        return Err(validation_error(
            "missing code_challenge",
            serde_json::json!({ "code_challenge": "required" }),
        ));
    }
    validate_redirect_uri(redirect_uri)?;

    let code = crypto::generate_token();
    TerraformIdpRepository::create_authorization_code(
        conn,
        &code,
        code_challenge,
        redirect_uri,
        subject,
        Utc::now() + Duration::minutes(CODE_LIFETIME_MINS),
    )
    .await?;

    Ok(code)
}

/// Exchange an authorization code for an access token. The consume step is
/// atomic: a code exchanges successfully at most once; a second attempt is a
/// conflict.
pub async fn exchange_code<C: ConnectionTrait>(
    conn: &C,
    config: &AppConfig,
    code: &str,
    code_verifier: &str,
    redirect_uri: &str,
) -> Result<IssuedToken, ApiError> {
    let Some(row) = TerraformIdpRepository::find_authorization_code(conn, code).await? else {
        return Err(validation_error(
            "unknown authorization code",
            serde_json::json!({ "code": "unknown" }),
        ));
    };

    if row.expires_at <= Utc::now() {
        return Err(unauthenticated(Some("authorization code has expired")));
    }
    if row.redirect_uri != redirect_uri {
        return Err(validation_error(
            "redirect_uri mismatch",
            serde_json::json!({ "redirect_uri": "does not match the authorization request" }),
        ));
    }
    if !crypto::verify_code_challenge(code_verifier, &row.code_challenge) {
        return Err(unauthenticated(Some("PKCE verification failed")));
    }

    if !TerraformIdpRepository::consume_authorization_code(conn, code).await? {
        return Err(conflict("authorization code has already been exchanged"));
    }

    let access_token = crypto::generate_short_token();
    let expires_in = Duration::minutes(config.terraform_oidc_token_expiry_mins);
    TerraformIdpRepository::create_access_token(
        conn,
        &crypto::hash_token(&access_token),
        &row.subject,
        Utc::now() + expires_in,
    )
    .await?;

    TerraformIdpRepository::upsert_subject(conn, &row.subject, &config.public_url, &row.subject)
        .await?;

    Ok(IssuedToken {
        access_token,
        expires_in_secs: expires_in.num_seconds(),
    })
}

/// Revoke an access token presented by the client.
pub async fn revoke_token<C: ConnectionTrait>(conn: &C, raw_token: &str) -> Result<(), ApiError> {
    TerraformIdpRepository::delete_access_token(conn, &crypto::hash_token(raw_token)).await?;
    Ok(())
}

/// `terraform login` redirects to a loopback listener on a well-known port
/// range.
fn validate_redirect_uri(redirect_uri: &str) -> Result<(), ApiError> {
    let parsed = url::Url::parse(redirect_uri).map_err(|_| {
        validation_error(
            "invalid redirect_uri",
            serde_json::json!({ "redirect_uri": "must be a valid URL" }),
        )
    })?;

    let loopback = matches!(parsed.host_str(), Some("localhost") | Some("127.0.0.1"));
    let port_ok = parsed
        .port()
        .is_some_and(|p| (REDIRECT_PORTS.0..=REDIRECT_PORTS.1).contains(&p));

    if !loopback || !port_ok {
        return Err(validation_error(
            "invalid redirect_uri",
            serde_json::json!({
                "redirect_uri":
                    format!(
                        "must target localhost ports {}-{}",
                        REDIRECT_PORTS.0, REDIRECT_PORTS.1
                    )
            }),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirect_uri_validation() {
        assert!(validate_redirect_uri("http://localhost:10000/login").is_ok());
        assert!(validate_redirect_uri("http://127.0.0.1:10005/login").is_ok());
        assert!(validate_redirect_uri("http://localhost:9999/login").is_err());
        assert!(validate_redirect_uri("http://example.com:10000/login").is_err());
        assert!(validate_redirect_uri("not a url").is_err());
    }
}

//! OIDC login flow.
//!
//! Authorization-code flow with PKCE against a discovered issuer. The
//! `id_token` is verified against the issuer's JWKS before the `userinfo`
//! endpoint is consulted; group memberships come from a single configurable
//! claim of the userinfo response.

use std::num::NonZeroUsize;
use std::sync::Arc;

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use lru::LruCache;
use sea_orm::ConnectionTrait;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use url::Url;

use crate::config::AppConfig;
use crate::crypto;
use crate::error::{ApiError, internal_error, unauthenticated, upstream_failure};
use crate::repositories::SsoStateRepository;
use crate::sso::{FederatedLogin, retry_once};

const PROVIDER: &str = "oidc";

/// OIDC discovery document, reduced to the endpoints the flow needs.
#[derive(Debug, Clone, Deserialize)]
struct DiscoveryDocument {
    issuer: String,
    authorization_endpoint: String,
    token_endpoint: String,
    userinfo_endpoint: String,
    jwks_uri: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    id_token: String,
}

#[derive(Debug, Clone, Deserialize)]
struct JsonWebKey {
    kty: String,
    kid: Option<String>,
    n: Option<String>,
    e: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JwksResponse {
    keys: Vec<JsonWebKey>,
}

/// OIDC client bound to one configured issuer.
pub struct OidcClient {
    issuer_url: String,
    client_id: String,
    client_secret: Option<String>,
    groups_claim: String,
    scopes: String,
    redirect_uri: String,
    http_client: reqwest::Client,
    jwks_cache: Arc<RwLock<LruCache<String, JsonWebKey>>>,
}

impl OidcClient {
    /// Build a client when OIDC login is configured.
    pub fn from_config(config: &AppConfig) -> Option<Self> {
        if !config.oidc_enabled() {
            return None;
        }
        Some(Self {
            issuer_url: config.oidc.issuer_url.clone()?,
            client_id: config.oidc.client_id.clone()?,
            client_secret: config.oidc.client_secret.clone(),
            groups_claim: config.oidc.groups_claim.clone(),
            scopes: config.oidc.scopes.clone(),
            redirect_uri: format!("{}/openid/callback", config.public_url),
            http_client: reqwest::Client::new(),
            jwks_cache: Arc::new(RwLock::new(LruCache::new(
                NonZeroUsize::new(100).expect("cache capacity is non-zero"),
            ))),
        })
    }

    async fn discover(&self) -> Result<DiscoveryDocument, ApiError> {
        let url = format!(
            "{}/.well-known/openid-configuration",
            self.issuer_url.trim_end_matches('/')
        );
        retry_once(|| async {
            let response = self
                .http_client
                .get(&url)
                .send()
                .await
                .map_err(|e| upstream_failure(format!("OIDC discovery failed: {e}")))?;
            if !response.status().is_success() {
                return Err(upstream_failure(format!(
                    "OIDC discovery returned {}",
                    response.status()
                )));
            }
            response
                .json::<DiscoveryDocument>()
                .await
                .map_err(|e| upstream_failure(format!("OIDC discovery parse failed: {e}")))
        })
        .await
    }

    /// Begin a login: persist the pending state and return the redirect URL.
    pub async fn begin_login<C: ConnectionTrait>(&self, conn: &C) -> Result<String, ApiError> {
        let discovery = self.discover().await?;

        let state = crypto::generate_token();
        let nonce = crypto::generate_token();
        let code_verifier = crypto::generate_token();
        let code_challenge = base64_url::encode(&Sha256::digest(code_verifier.as_bytes()));

        SsoStateRepository::create(
            conn,
            &state,
            PROVIDER,
            Some(nonce.clone()),
            Some(code_verifier),
            None,
        )
        .await?;

        let mut url = Url::parse(&discovery.authorization_endpoint)
            .map_err(|e| internal_error(format!("bad authorization endpoint: {e}")))?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("scope", &self.scopes)
            .append_pair("state", &state)
            .append_pair("nonce", &nonce)
            .append_pair("code_challenge", &code_challenge)
            .append_pair("code_challenge_method", "S256");

        Ok(url.to_string())
    }

    /// Complete the flow on callback: consume the state, exchange the code,
    /// verify the id_token and fetch userinfo.
    pub async fn handle_callback<C: ConnectionTrait>(
        &self,
        conn: &C,
        state: &str,
        code: &str,
    ) -> Result<FederatedLogin, ApiError> {
        let Some(pending) = SsoStateRepository::consume(conn, state, PROVIDER).await? else {
            return Err(unauthenticated(Some("unknown or expired login state")));
        };

        let discovery = self.discover().await?;
        let tokens = self
            .exchange_code(&discovery, code, pending.code_verifier.as_deref())
            .await?;

        let id_claims = self
            .verify_id_token(&discovery, &tokens.id_token)
            .await?;

        // The nonce binds the id_token to the pending login.
        let token_nonce = id_claims.get("nonce").and_then(|v| v.as_str());
        if pending.nonce.as_deref() != token_nonce {
            return Err(unauthenticated(Some("id_token nonce mismatch")));
        }

        let userinfo = self
            .fetch_userinfo(&discovery, &tokens.access_token)
            .await?;

        let username = userinfo
            .get("preferred_username")
            .or_else(|| userinfo.get("email"))
            .or_else(|| userinfo.get("sub"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| unauthenticated(Some("userinfo carries no usable identity")))?
            .to_string();

        let groups = userinfo
            .get(&self.groups_claim)
            .and_then(|v| v.as_array())
            .map(|values| {
                values
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        Ok(FederatedLogin { username, groups })
    }

    async fn exchange_code(
        &self,
        discovery: &DiscoveryDocument,
        code: &str,
        code_verifier: Option<&str>,
    ) -> Result<TokenResponse, ApiError> {
        let mut form = vec![
            ("grant_type", "authorization_code".to_string()),
            ("code", code.to_string()),
            ("redirect_uri", self.redirect_uri.clone()),
            ("client_id", self.client_id.clone()),
        ];
        if let Some(secret) = &self.client_secret {
            form.push(("client_secret", secret.clone()));
        }
        if let Some(verifier) = code_verifier {
            form.push(("code_verifier", verifier.to_string()));
        }

        retry_once(|| async {
            let response = self
                .http_client
                .post(&discovery.token_endpoint)
                .form(&form)
                .send()
                .await
                .map_err(|e| upstream_failure(format!("OIDC token exchange failed: {e}")))?;
            if !response.status().is_success() {
                return Err(unauthenticated(Some("OIDC token exchange was rejected")));
            }
            response
                .json::<TokenResponse>()
                .await
                .map_err(|e| upstream_failure(format!("OIDC token response parse failed: {e}")))
        })
        .await
    }

    async fn verify_id_token(
        &self,
        discovery: &DiscoveryDocument,
        id_token: &str,
    ) -> Result<serde_json::Value, ApiError> {
        let header = jsonwebtoken::decode_header(id_token)
            .map_err(|e| unauthenticated(Some(&format!("id_token header invalid: {e}"))))?;
        let kid = header
            .kid
            .ok_or_else(|| unauthenticated(Some("id_token missing kid")))?;

        let jwk = self.verification_key(discovery, &kid).await?;
        let decoding_key = decoding_key_from_jwk(&jwk)?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[&self.client_id]);
        validation.set_issuer(&[&discovery.issuer]);
        validation.validate_exp = true;
        validation.leeway = 60;

        let data = decode::<serde_json::Value>(id_token, &decoding_key, &validation)
            .map_err(|e| unauthenticated(Some(&format!("id_token verification failed: {e}"))))?;

        Ok(data.claims)
    }

    async fn verification_key(
        &self,
        discovery: &DiscoveryDocument,
        kid: &str,
    ) -> Result<JsonWebKey, ApiError> {
        {
            let mut cache = self.jwks_cache.write().await;
            if let Some(jwk) = cache.get(kid) {
                return Ok(jwk.clone());
            }
        }

        let jwks = retry_once(|| async {
            let response = self
                .http_client
                .get(&discovery.jwks_uri)
                .send()
                .await
                .map_err(|e| upstream_failure(format!("JWKS fetch failed: {e}")))?;
            if !response.status().is_success() {
                return Err(upstream_failure(format!(
                    "JWKS fetch returned {}",
                    response.status()
                )));
            }
            response
                .json::<JwksResponse>()
                .await
                .map_err(|e| upstream_failure(format!("JWKS parse failed: {e}")))
        })
        .await?;

        let jwk = jwks
            .keys
            .into_iter()
            .find(|key| key.kid.as_deref() == Some(kid))
            .ok_or_else(|| unauthenticated(Some("id_token kid not present in JWKS")))?;

        {
            let mut cache = self.jwks_cache.write().await;
            cache.put(kid.to_string(), jwk.clone());
        }

        Ok(jwk)
    }

    async fn fetch_userinfo(
        &self,
        discovery: &DiscoveryDocument,
        access_token: &str,
    ) -> Result<serde_json::Value, ApiError> {
        retry_once(|| async {
            let response = self
                .http_client
                .get(&discovery.userinfo_endpoint)
                .bearer_auth(access_token)
                .send()
                .await
                .map_err(|e| upstream_failure(format!("userinfo fetch failed: {e}")))?;
            if !response.status().is_success() {
                return Err(upstream_failure(format!(
                    "userinfo returned {}",
                    response.status()
                )));
            }
            response
                .json::<serde_json::Value>()
                .await
                .map_err(|e| upstream_failure(format!("userinfo parse failed: {e}")))
        })
        .await
    }
}

fn decoding_key_from_jwk(jwk: &JsonWebKey) -> Result<DecodingKey, ApiError> {
    if jwk.kty != "RSA" {
        return Err(unauthenticated(Some(
            "only RSA keys are supported for id_token verification",
        )));
    }
    let n = jwk
        .n
        .as_ref()
        .ok_or_else(|| unauthenticated(Some("JWK missing modulus")))?;
    let e = jwk
        .e
        .as_ref()
        .ok_or_else(|| unauthenticated(Some("JWK missing exponent")))?;
    DecodingKey::from_rsa_components(n, e)
        .map_err(|err| unauthenticated(Some(&format!("JWK rejected: {err}"))))
}

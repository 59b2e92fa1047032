//! GitHub OAuth login flow.
//!
//! Web-application flow against github.com (or an enterprise base URL). The
//! user's organization memberships act as group names for the authorization
//! resolver.

use sea_orm::ConnectionTrait;
use serde::Deserialize;
use url::Url;

use crate::config::AppConfig;
use crate::crypto;
use crate::error::{ApiError, internal_error, unauthenticated, upstream_failure};
use crate::repositories::SsoStateRepository;
use crate::sso::{FederatedLogin, retry_once};

const PROVIDER: &str = "github";

#[derive(Debug, Deserialize)]
struct AccessTokenResponse {
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GithubUser {
    login: String,
}

#[derive(Debug, Deserialize)]
struct GithubOrg {
    login: String,
}

/// GitHub OAuth client.
pub struct GithubClient {
    client_id: String,
    client_secret: String,
    oauth_base: String,
    api_base: String,
    redirect_uri: String,
    http_client: reqwest::Client,
}

impl GithubClient {
    /// Build a client when GitHub login is configured.
    pub fn from_config(config: &AppConfig) -> Option<Self> {
        if !config.github_enabled() {
            return None;
        }
        Some(Self {
            client_id: config.github.client_id.clone()?,
            client_secret: config.github.client_secret.clone()?,
            oauth_base: config.github.oauth_base.trim_end_matches('/').to_string(),
            api_base: config.github.api_base.trim_end_matches('/').to_string(),
            redirect_uri: format!("{}/github/callback", config.public_url),
            http_client: reqwest::Client::new(),
        })
    }

    /// Begin a login: persist the pending state and return the redirect URL.
    pub async fn begin_login<C: ConnectionTrait>(&self, conn: &C) -> Result<String, ApiError> {
        let state = crypto::generate_token();
        SsoStateRepository::create(conn, &state, PROVIDER, None, None, None).await?;

        let mut url = Url::parse(&format!("{}/login/oauth/authorize", self.oauth_base))
            .map_err(|e| internal_error(format!("bad GitHub OAuth base: {e}")))?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("scope", "read:org")
            .append_pair("state", &state);

        Ok(url.to_string())
    }

    /// Complete the flow on callback.
    pub async fn handle_callback<C: ConnectionTrait>(
        &self,
        conn: &C,
        state: &str,
        code: &str,
    ) -> Result<FederatedLogin, ApiError> {
        if SsoStateRepository::consume(conn, state, PROVIDER).await?.is_none() {
            return Err(unauthenticated(Some("unknown or expired login state")));
        }

        let access_token = self.exchange_code(code).await?;
        let user = self.fetch_user(&access_token).await?;
        let organizations = self.fetch_organizations(&access_token).await?;

        Ok(FederatedLogin {
            username: user.login,
            groups: organizations.into_iter().map(|o| o.login).collect(),
        })
    }

    async fn exchange_code(&self, code: &str) -> Result<String, ApiError> {
        let url = format!("{}/login/oauth/access_token", self.oauth_base);
        let form = [
            ("client_id", self.client_id.clone()),
            ("client_secret", self.client_secret.clone()),
            ("code", code.to_string()),
            ("redirect_uri", self.redirect_uri.clone()),
        ];

        let response = retry_once(|| async {
            let response = self
                .http_client
                .post(&url)
                .header("Accept", "application/json")
                .form(&form)
                .send()
                .await
                .map_err(|e| upstream_failure(format!("GitHub token exchange failed: {e}")))?;
            if !response.status().is_success() {
                return Err(upstream_failure(format!(
                    "GitHub token exchange returned {}",
                    response.status()
                )));
            }
            response
                .json::<AccessTokenResponse>()
                .await
                .map_err(|e| upstream_failure(format!("GitHub token parse failed: {e}")))
        })
        .await?;

        response
            .access_token
            .ok_or_else(|| unauthenticated(Some("GitHub rejected the authorization code")))
    }

    async fn fetch_user(&self, access_token: &str) -> Result<GithubUser, ApiError> {
        let url = format!("{}/user", self.api_base);
        retry_once(|| async {
            let response = self
                .http_client
                .get(&url)
                .bearer_auth(access_token)
                .header("Accept", "application/vnd.github.v3+json")
                .header("User-Agent", "tfregistry")
                .send()
                .await
                .map_err(|e| upstream_failure(format!("GitHub user fetch failed: {e}")))?;
            if !response.status().is_success() {
                return Err(upstream_failure(format!(
                    "GitHub user fetch returned {}",
                    response.status()
                )));
            }
            response
                .json::<GithubUser>()
                .await
                .map_err(|e| upstream_failure(format!("GitHub user parse failed: {e}")))
        })
        .await
    }

    async fn fetch_organizations(&self, access_token: &str) -> Result<Vec<GithubOrg>, ApiError> {
        let url = format!("{}/user/orgs", self.api_base);
        retry_once(|| async {
            let response = self
                .http_client
                .get(&url)
                .bearer_auth(access_token)
                .header("Accept", "application/vnd.github.v3+json")
                .header("User-Agent", "tfregistry")
                .send()
                .await
                .map_err(|e| upstream_failure(format!("GitHub orgs fetch failed: {e}")))?;
            if !response.status().is_success() {
                return Err(upstream_failure(format!(
                    "GitHub orgs fetch returned {}",
                    response.status()
                )));
            }
            response
                .json::<Vec<GithubOrg>>()
                .await
                .map_err(|e| upstream_failure(format!("GitHub orgs parse failed: {e}")))
        })
        .await
    }
}

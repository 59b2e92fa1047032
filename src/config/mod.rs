//! Configuration loading for the tfregistry service.
//!
//! Loads layered `.env` files and environment variables prefixed with
//! `TFREG_`, producing a typed [`AppConfig`].

use std::{collections::BTreeMap, env, net::SocketAddr, path::PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How module source archives hosted by the registry itself are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleHostingMode {
    /// Hosted archives are served when present, git sources otherwise.
    Allow,
    /// Version import fails unless a hosted archive is available.
    Enforce,
    /// Always emit the git source template.
    Disallow,
}

impl ModuleHostingMode {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "allow" => Some(Self::Allow),
            "enforce" => Some(Self::Enforce),
            "disallow" => Some(Self::Disallow),
            _ => None,
        }
    }
}

/// A static token scoped to a single namespace (`namespace:token` pairs).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamespaceToken {
    pub namespace: String,
    pub token: String,
}

/// An analytics auth key bound to a deployment environment (`token:environment`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsAuthKey {
    pub token: String,
    pub environment: String,
}

/// OIDC single sign-on settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OidcConfig {
    pub issuer_url: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub groups_claim: String,
    pub scopes: String,
}

/// SAML single sign-on settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SamlConfig {
    pub entity_id: Option<String>,
    pub idp_sso_url: Option<String>,
    pub idp_certificate: Option<String>,
    pub group_attribute: String,
}

/// GitHub OAuth login settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub oauth_base: String,
    pub api_base: String,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            oauth_base: default_github_oauth_base(),
            api_base: default_github_api_base(),
        }
    }
}

/// Application configuration derived from `TFREG_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct AppConfig {
    #[serde(default = "default_profile")]
    pub profile: String,
    #[serde(default = "default_api_bind_addr")]
    pub api_bind_addr: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,
    #[serde(default = "default_db_acquire_timeout_ms")]
    pub db_acquire_timeout_ms: u64,
    #[serde(default = "default_public_url")]
    pub public_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,
    #[serde(default = "default_admin_username")]
    pub admin_username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_password: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub admin_tokens: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub upload_tokens: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub publish_tokens: Vec<NamespaceToken>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub analytics_auth_keys: Vec<AnalyticsAuthKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_extraction_token: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deployment_tokens: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trusted_namespaces: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub verified_module_namespaces: Vec<String>,
    #[serde(default = "default_module_hosting")]
    pub allow_module_hosting: ModuleHostingMode,
    #[serde(default = "default_session_expiry_mins")]
    pub session_expiry_mins: i64,
    #[serde(default = "default_terraform_oidc_token_expiry_mins")]
    pub terraform_oidc_token_expiry_mins: i64,
    #[serde(default = "default_maintenance_interval_seconds")]
    pub maintenance_interval_seconds: u64,
    #[serde(default)]
    pub oidc: OidcConfig,
    #[serde(default)]
    pub saml: SamlConfig,
    #[serde(default)]
    pub github: GithubConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            api_bind_addr: default_api_bind_addr(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            database_url: default_database_url(),
            db_max_connections: default_db_max_connections(),
            db_acquire_timeout_ms: default_db_acquire_timeout_ms(),
            public_url: default_public_url(),
            secret_key: None,
            admin_username: default_admin_username(),
            admin_password: None,
            admin_tokens: Vec::new(),
            upload_tokens: Vec::new(),
            publish_tokens: Vec::new(),
            analytics_auth_keys: Vec::new(),
            internal_extraction_token: None,
            deployment_tokens: Vec::new(),
            trusted_namespaces: Vec::new(),
            verified_module_namespaces: Vec::new(),
            allow_module_hosting: default_module_hosting(),
            session_expiry_mins: default_session_expiry_mins(),
            terraform_oidc_token_expiry_mins: default_terraform_oidc_token_expiry_mins(),
            maintenance_interval_seconds: default_maintenance_interval_seconds(),
            oidc: OidcConfig {
                groups_claim: default_oidc_groups_claim(),
                scopes: default_oidc_scopes(),
                ..OidcConfig::default()
            },
            saml: SamlConfig {
                group_attribute: default_saml_group_attribute(),
                ..SamlConfig::default()
            },
            github: GithubConfig::default(),
        }
    }
}

impl AppConfig {
    /// Returns the configured bind address as a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        self.api_bind_addr.parse()
    }

    /// Whether a namespace name appears in the trusted list.
    pub fn is_trusted_namespace(&self, name: &str) -> bool {
        self.trusted_namespaces.iter().any(|n| n == name)
    }

    /// Whether modules in this namespace present as verified regardless of
    /// their own flag.
    pub fn is_auto_verified_namespace(&self, name: &str) -> bool {
        self.verified_module_namespaces.iter().any(|n| n == name)
    }

    /// Whether OIDC login is configured.
    pub fn oidc_enabled(&self) -> bool {
        self.oidc.issuer_url.is_some() && self.oidc.client_id.is_some()
    }

    /// Whether SAML login is configured.
    pub fn saml_enabled(&self) -> bool {
        self.saml.idp_sso_url.is_some() && self.saml.entity_id.is_some()
    }

    /// Whether GitHub login is configured.
    pub fn github_enabled(&self) -> bool {
        self.github.client_id.is_some() && self.github.client_secret.is_some()
    }

    /// Returns a redacted JSON representation (secrets are redacted).
    pub fn redacted_json(&self) -> serde_json::Result<String> {
        let mut config = self.clone();
        if config.secret_key.is_some() {
            config.secret_key = Some("[REDACTED]".to_string());
        }
        if config.admin_password.is_some() {
            config.admin_password = Some("[REDACTED]".to_string());
        }
        if !config.admin_tokens.is_empty() {
            config.admin_tokens = vec!["[REDACTED]".to_string()];
        }
        if !config.upload_tokens.is_empty() {
            config.upload_tokens = vec!["[REDACTED]".to_string()];
        }
        for entry in &mut config.publish_tokens {
            entry.token = "[REDACTED]".to_string();
        }
        for entry in &mut config.analytics_auth_keys {
            entry.token = "[REDACTED]".to_string();
        }
        if config.internal_extraction_token.is_some() {
            config.internal_extraction_token = Some("[REDACTED]".to_string());
        }
        if !config.deployment_tokens.is_empty() {
            config.deployment_tokens = vec!["[REDACTED]".to_string()];
        }
        if config.oidc.client_secret.is_some() {
            config.oidc.client_secret = Some("[REDACTED]".to_string());
        }
        if config.github.client_secret.is_some() {
            config.github.client_secret = Some("[REDACTED]".to_string());
        }
        serde_json::to_string(&config)
    }
}

fn default_profile() -> String {
    "development".to_string()
}

fn default_api_bind_addr() -> String {
    "127.0.0.1:5000".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_database_url() -> String {
    "sqlite::memory:".to_string()
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_db_acquire_timeout_ms() -> u64 {
    5_000
}

fn default_public_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_admin_username() -> String {
    "admin".to_string()
}

fn default_module_hosting() -> ModuleHostingMode {
    ModuleHostingMode::Allow
}

fn default_session_expiry_mins() -> i64 {
    60
}

fn default_terraform_oidc_token_expiry_mins() -> i64 {
    10
}

fn default_maintenance_interval_seconds() -> u64 {
    60
}

fn default_oidc_groups_claim() -> String {
    "groups".to_string()
}

fn default_oidc_scopes() -> String {
    "openid profile email".to_string()
}

fn default_saml_group_attribute() -> String {
    "groups".to_string()
}

fn default_github_oauth_base() -> String {
    "https://github.com".to_string()
}

fn default_github_api_base() -> String {
    "https://api.github.com".to_string()
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read env file {path}: {source}")]
    EnvFile {
        path: PathBuf,
        source: dotenvy::Error,
    },
    #[error("invalid bind address '{value}': {source}")]
    InvalidBindAddr {
        value: String,
        source: std::net::AddrParseError,
    },
    #[error("invalid module hosting mode '{value}' (expected allow, enforce or disallow)")]
    InvalidModuleHostingMode { value: String },
    #[error("invalid scoped token entry '{value}' (expected '<name>:<value>')")]
    InvalidScopedToken { value: String },
}

/// Loads [`AppConfig`] from layered `.env` files plus the process environment.
pub struct ConfigLoader {
    base_dir: PathBuf,
}

impl ConfigLoader {
    /// Creates a new loader rooted at the current working directory.
    pub fn new() -> Self {
        Self {
            base_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// Creates a loader rooted at the provided directory (useful for tests).
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Loads configuration, later layers winning: `.env`, `.env.local`,
    /// `.env.<profile>`, `.env.<profile>.local`, process environment.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let (mut layered, profile_hint) = self.collect_layered_env()?;

        for (key, value) in env::vars() {
            if let Some(stripped) = key.strip_prefix("TFREG_") {
                layered.insert(stripped.to_string(), value);
            }
        }

        let take = |layered: &mut BTreeMap<String, String>, key: &str| {
            layered.remove(key).filter(|v| !v.trim().is_empty())
        };

        let mut config = AppConfig {
            profile: take(&mut layered, "PROFILE").unwrap_or(profile_hint),
            ..AppConfig::default()
        };

        if let Some(v) = take(&mut layered, "API_BIND_ADDR") {
            config.api_bind_addr = v;
        }
        if let Some(v) = take(&mut layered, "LOG_LEVEL") {
            config.log_level = v;
        }
        if let Some(v) = take(&mut layered, "LOG_FORMAT") {
            config.log_format = v;
        }
        if let Some(v) = take(&mut layered, "DATABASE_URL") {
            config.database_url = v;
        }
        if let Some(v) = take(&mut layered, "DB_MAX_CONNECTIONS") {
            if let Ok(parsed) = v.parse() {
                config.db_max_connections = parsed;
            }
        }
        if let Some(v) = take(&mut layered, "DB_ACQUIRE_TIMEOUT_MS") {
            if let Ok(parsed) = v.parse() {
                config.db_acquire_timeout_ms = parsed;
            }
        }
        if let Some(v) = take(&mut layered, "PUBLIC_URL") {
            config.public_url = v.trim_end_matches('/').to_string();
        }
        config.secret_key = take(&mut layered, "SECRET_KEY");
        if let Some(v) = take(&mut layered, "ADMIN_USERNAME") {
            config.admin_username = v;
        }
        config.admin_password = take(&mut layered, "ADMIN_PASSWORD");
        config.admin_tokens = split_list(take(&mut layered, "ADMIN_TOKENS"));
        config.upload_tokens = split_list(take(&mut layered, "UPLOAD_TOKENS"));
        config.publish_tokens = split_scoped(take(&mut layered, "PUBLISH_TOKENS"))?
            .into_iter()
            .map(|(namespace, token)| NamespaceToken { namespace, token })
            .collect();
        config.analytics_auth_keys = split_scoped(take(&mut layered, "ANALYTICS_AUTH_KEYS"))?
            .into_iter()
            .map(|(token, environment)| AnalyticsAuthKey { token, environment })
            .collect();
        config.internal_extraction_token = take(&mut layered, "INTERNAL_EXTRACTION_TOKEN");
        config.deployment_tokens = split_list(take(&mut layered, "DEPLOYMENT_TOKENS"));
        config.trusted_namespaces = split_list(take(&mut layered, "TRUSTED_NAMESPACES"));
        config.verified_module_namespaces =
            split_list(take(&mut layered, "VERIFIED_MODULE_NAMESPACES"));
        if let Some(v) = take(&mut layered, "ALLOW_MODULE_HOSTING") {
            config.allow_module_hosting = ModuleHostingMode::parse(&v)
                .ok_or(ConfigError::InvalidModuleHostingMode { value: v })?;
        }
        if let Some(v) = take(&mut layered, "SESSION_EXPIRY_MINS") {
            if let Ok(parsed) = v.parse() {
                config.session_expiry_mins = parsed;
            }
        }
        if let Some(v) = take(&mut layered, "TERRAFORM_OIDC_TOKEN_EXPIRY_MINS") {
            if let Ok(parsed) = v.parse() {
                config.terraform_oidc_token_expiry_mins = parsed;
            }
        }
        if let Some(v) = take(&mut layered, "MAINTENANCE_INTERVAL_SECONDS") {
            if let Ok(parsed) = v.parse() {
                config.maintenance_interval_seconds = parsed;
            }
        }

        config.oidc.issuer_url = take(&mut layered, "OIDC_ISSUER_URL");
        config.oidc.client_id = take(&mut layered, "OIDC_CLIENT_ID");
        config.oidc.client_secret = take(&mut layered, "OIDC_CLIENT_SECRET");
        if let Some(v) = take(&mut layered, "OIDC_GROUPS_CLAIM") {
            config.oidc.groups_claim = v;
        }
        if let Some(v) = take(&mut layered, "OIDC_SCOPES") {
            config.oidc.scopes = v;
        }

        config.saml.entity_id = take(&mut layered, "SAML_ENTITY_ID");
        config.saml.idp_sso_url = take(&mut layered, "SAML_IDP_SSO_URL");
        config.saml.idp_certificate = take(&mut layered, "SAML_IDP_CERTIFICATE");
        if let Some(v) = take(&mut layered, "SAML_GROUP_ATTRIBUTE") {
            config.saml.group_attribute = v;
        }

        config.github.client_id = take(&mut layered, "GITHUB_CLIENT_ID");
        config.github.client_secret = take(&mut layered, "GITHUB_CLIENT_SECRET");
        if let Some(v) = take(&mut layered, "GITHUB_OAUTH_BASE") {
            config.github.oauth_base = v;
        }
        if let Some(v) = take(&mut layered, "GITHUB_API_BASE") {
            config.github.api_base = v;
        }

        match config.bind_addr() {
            Ok(_) => Ok(config),
            Err(source) => Err(ConfigError::InvalidBindAddr {
                value: config.api_bind_addr.clone(),
                source,
            }),
        }
    }

    fn collect_layered_env(&self) -> Result<(BTreeMap<String, String>, String), ConfigError> {
        let mut values = BTreeMap::new();

        self.merge_dotenv(self.base_dir.join(".env"), &mut values)?;
        self.merge_dotenv(self.base_dir.join(".env.local"), &mut values)?;

        let profile = env::var("TFREG_PROFILE")
            .ok()
            .or_else(|| values.get("PROFILE").cloned())
            .unwrap_or_else(default_profile);

        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}", &profile)),
            &mut values,
        )?;
        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}.local", &profile)),
            &mut values,
        )?;

        Ok((values, profile))
    }

    fn merge_dotenv(
        &self,
        path: PathBuf,
        values: &mut BTreeMap<String, String>,
    ) -> Result<(), ConfigError> {
        match dotenvy::from_path_iter(&path) {
            Ok(iter) => {
                for item in iter {
                    let (key, value) = item.map_err(|source| ConfigError::EnvFile {
                        path: path.clone(),
                        source,
                    })?;
                    if let Some(stripped) = key.strip_prefix("TFREG_") {
                        values.insert(stripped.to_string(), value);
                    }
                }
                Ok(())
            }
            Err(dotenvy::Error::Io(ref io_err))
                if io_err.kind() == std::io::ErrorKind::NotFound =>
            {
                Ok(())
            }
            Err(err) => Err(ConfigError::EnvFile { path, source: err }),
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn split_list(value: Option<String>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

fn split_scoped(value: Option<String>) -> Result<Vec<(String, String)>, ConfigError> {
    let Some(value) = value else {
        return Ok(Vec::new());
    };
    let mut entries = Vec::new();
    for part in value.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        match part.split_once(':') {
            Some((name, token)) if !name.is_empty() && !token.is_empty() => {
                entries.push((name.to_string(), token.to_string()));
            }
            _ => {
                return Err(ConfigError::InvalidScopedToken {
                    value: part.to_string(),
                });
            }
        }
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_parses_bind_addr() {
        let config = AppConfig::default();
        assert!(config.bind_addr().is_ok());
    }

    #[test]
    fn scoped_token_parsing() {
        let parsed = split_scoped(Some("acme:secret1, infra:secret2".to_string())).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0], ("acme".to_string(), "secret1".to_string()));
        assert_eq!(parsed[1], ("infra".to_string(), "secret2".to_string()));

        assert!(split_scoped(Some("missing-colon".to_string())).is_err());
    }

    #[test]
    fn module_hosting_mode_parsing() {
        assert_eq!(
            ModuleHostingMode::parse("enforce"),
            Some(ModuleHostingMode::Enforce)
        );
        assert_eq!(ModuleHostingMode::parse("bogus"), None);
    }

    #[test]
    fn layered_env_loading() {
        let dir = tempfile_dir();
        std::fs::write(
            dir.path().join(".env"),
            "TFREG_PUBLIC_URL=https://registry.example.com/\nTFREG_TRUSTED_NAMESPACES=acme,infra\n",
        )
        .unwrap();

        let loader = ConfigLoader::with_base_dir(dir.path().to_path_buf());
        let config = loader.load().unwrap();

        assert_eq!(config.public_url, "https://registry.example.com");
        assert!(config.is_trusted_namespace("acme"));
        assert!(!config.is_trusted_namespace("community"));
    }

    #[test]
    fn redacted_json_hides_secrets() {
        let config = AppConfig {
            secret_key: Some("super-secret".to_string()),
            admin_tokens: vec!["token".to_string()],
            ..AppConfig::default()
        };
        let json = config.redacted_json().unwrap();
        assert!(!json.contains("super-secret"));
        assert!(json.contains("[REDACTED]"));
    }

    fn tempfile_dir() -> tempfile::TempDir {
        tempfile::tempdir().expect("failed to create temp dir")
    }
}

//! Module registry protocol service.
//!
//! Builds `X-Terraform-Get` source URLs, extracts analytics pseudo-segments
//! from namespace path components, and maintains the latest-version pointer
//! cached on module providers.

use std::sync::LazyLock;

use regex::Regex;
use sea_orm::{ConnectionTrait, DbErr};

use crate::auth::Identity;
use crate::config::{AppConfig, ModuleHostingMode};
use crate::models::{module_provider, module_version};
use crate::repositories::{
    AnalyticsRepository, ModuleProviderRepository, ModuleVersionRepository,
    analytics::ModuleDownload,
};

/// Analytics pseudo-segment embedded in a namespace path component:
/// `<namespace>-__<token>__<environment>` with an optional environment.
static ANALYTICS_SEGMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<ns>.+?)-__(?P<token>[0-9A-Za-z\-]+)__(?P<env>[0-9A-Za-z\-]*)$")
        .expect("analytics segment regex is valid")
});

/// Analytics data carried by a namespace path segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyticsToken {
    pub token: String,
    pub environment: Option<String>,
}

/// Split a namespace path segment into the live namespace name and the
/// analytics token wrapper, when present. The pseudo-segment never reaches
/// redirect resolution or the emitted source URL.
pub fn split_analytics_segment(segment: &str) -> (String, Option<AnalyticsToken>) {
    match ANALYTICS_SEGMENT_RE.captures(segment) {
        Some(caps) => {
            let namespace = caps["ns"].to_string();
            let token = caps["token"].to_string();
            let environment = match &caps["env"] {
                "" => None,
                env => Some(env.to_string()),
            };
            (
                namespace,
                Some(AnalyticsToken {
                    token,
                    environment,
                }),
            )
        }
        None => (segment.to_string(), None),
    }
}

/// Recompute the cached latest-version pointer after any version mutation.
pub async fn refresh_latest_pointer<C: ConnectionTrait>(
    conn: &C,
    module_provider: module_provider::Model,
) -> Result<module_provider::Model, DbErr> {
    let latest = ModuleVersionRepository::latest(conn, module_provider.id).await?;
    ModuleProviderRepository::set_latest_version_id(conn, module_provider, latest.map(|v| v.id))
        .await
}

/// Build the source URL emitted in `X-Terraform-Get`.
///
/// Hosted archives win when module hosting allows and the version carries an
/// archive URL; registry-relative archive paths are signed with an expiring
/// HMAC so the object endpoint can authenticate the fetch. Otherwise the git
/// clone template is rendered with the version tag.
pub fn build_source_url(
    config: &AppConfig,
    namespace: &str,
    module_provider: &module_provider::Model,
    version: &module_version::Model,
) -> Option<String> {
    let hosted = match config.allow_module_hosting {
        ModuleHostingMode::Disallow => None,
        ModuleHostingMode::Allow | ModuleHostingMode::Enforce => version.archive_url.as_deref(),
    };

    if let Some(archive_url) = hosted {
        if let Some(path) = archive_url.strip_prefix('/') {
            let path = format!("/{path}");
            let expires_at = (chrono::Utc::now() + chrono::Duration::minutes(10)).timestamp();
            let key = config
                .secret_key
                .as_deref()
                .map(crate::crypto::SecretKey::derive)?;
            let signature = crate::crypto::sign_url(&key, &path, expires_at);
            return Some(format!(
                "{}{}?expiry={}&signature={}",
                config.public_url, path, expires_at, signature
            ));
        }
        return Some(archive_url.to_string());
    }

    if config.allow_module_hosting == ModuleHostingMode::Enforce {
        return None;
    }

    let clone_url = module_provider.repo_clone_url.as_deref()?;
    let rendered = clone_url
        .replace("{namespace}", namespace)
        .replace("{module}", &module_provider.module)
        .replace("{provider}", &module_provider.provider);

    let tag = module_provider.tag_for_version(&version.version);
    let mut source = format!("git::{rendered}");
    if let Some(path) = module_provider.git_path.as_deref() {
        let path = path.trim_matches('/');
        if !path.is_empty() {
            source.push_str(&format!("//{path}"));
        }
    }
    source.push_str(&format!("?ref={tag}"));
    Some(source)
}

/// Record an analytics row for a download, honouring identity suppression
/// and the environment override of analytics auth keys.
pub async fn record_download<C: ConnectionTrait>(
    conn: &C,
    identity: &Identity,
    namespace: &str,
    module_provider: &module_provider::Model,
    version: &module_version::Model,
    analytics: AnalyticsToken,
    terraform_version: Option<String>,
) -> Result<(), DbErr> {
    if identity.suppresses_analytics() {
        return Ok(());
    }

    // An authenticated analytics key pins the environment regardless of the
    // pseudo-segment suffix.
    let environment = match identity {
        Identity::TerraformAnalyticsToken { environment } => Some(environment.clone()),
        _ => analytics.environment,
    };

    AnalyticsRepository::record_module_download(
        conn,
        ModuleDownload {
            parent_module_version_id: version.id,
            terraform_version,
            analytics_token: analytics.token,
            environment,
            namespace: namespace.to_string(),
            module: module_provider.module.clone(),
            provider: module_provider.provider.clone(),
        },
    )
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_segment_has_no_token() {
        let (ns, token) = split_analytics_segment("acme");
        assert_eq!(ns, "acme");
        assert!(token.is_none());
    }

    #[test]
    fn wrapped_segment_extracts_token_and_environment() {
        let (ns, token) = split_analytics_segment("acme-__mytoken__prod");
        assert_eq!(ns, "acme");
        assert_eq!(
            token,
            Some(AnalyticsToken {
                token: "mytoken".to_string(),
                environment: Some("prod".to_string()),
            })
        );
    }

    #[test]
    fn wrapped_segment_without_environment() {
        let (ns, token) = split_analytics_segment("acme-__mytoken__");
        assert_eq!(ns, "acme");
        assert_eq!(
            token,
            Some(AnalyticsToken {
                token: "mytoken".to_string(),
                environment: None,
            })
        );
    }

    #[test]
    fn hyphenated_namespace_survives_extraction() {
        let (ns, token) = split_analytics_segment("my-team-__tok__");
        assert_eq!(ns, "my-team");
        assert_eq!(token.unwrap().token, "tok");
    }

    fn sample_provider(clone_url: Option<&str>, git_path: Option<&str>) -> module_provider::Model {
        module_provider::Model {
            id: 1,
            namespace_id: 1,
            module: "network".to_string(),
            provider: "aws".to_string(),
            repo_clone_url: clone_url.map(str::to_string),
            repo_base_url: None,
            repo_browse_url: None,
            git_tag_format: "v{version}".to_string(),
            git_path: git_path.map(str::to_string),
            git_provider_id: None,
            verified: false,
            latest_version_id: None,
            created_at: chrono::Utc::now(),
        }
    }

    fn sample_version(archive_url: Option<&str>) -> module_version::Model {
        module_version::Model {
            id: 1,
            module_provider_id: 1,
            version: "1.2.0".to_string(),
            beta: false,
            internal: false,
            published: true,
            owner: None,
            description: None,
            variable_template: None,
            extraction_version: None,
            module_details_id: None,
            archive_url: archive_url.map(str::to_string),
            published_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn git_source_renders_template_tag_and_path() {
        let config = AppConfig::default();
        let mp = sample_provider(
            Some("ssh://git@github.com/{namespace}/terraform-{provider}-{module}.git"),
            Some("modules/core"),
        );
        let source = build_source_url(&config, "acme", &mp, &sample_version(None)).unwrap();
        assert_eq!(
            source,
            "git::ssh://git@github.com/acme/terraform-aws-network.git//modules/core?ref=v1.2.0"
        );
    }

    #[test]
    fn hosted_archive_is_signed_when_registry_relative() {
        let config = AppConfig {
            secret_key: Some("secret".to_string()),
            ..AppConfig::default()
        };
        let mp = sample_provider(None, None);
        let source =
            build_source_url(&config, "acme", &mp, &sample_version(Some("/v1/terrareg/modules/1/archive.tar.gz")))
                .unwrap();
        assert!(source.starts_with("http://localhost:5000/v1/terrareg/modules/1/archive.tar.gz?expiry="));
        assert!(source.contains("&signature="));
    }

    #[test]
    fn enforce_without_archive_yields_none() {
        let config = AppConfig {
            allow_module_hosting: ModuleHostingMode::Enforce,
            ..AppConfig::default()
        };
        let mp = sample_provider(Some("https://example.com/repo.git"), None);
        assert!(build_source_url(&config, "acme", &mp, &sample_version(None)).is_none());
    }
}

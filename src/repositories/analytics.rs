//! Analytics repository for module and provider download records.

use std::collections::HashMap;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, Set,
};

use crate::models::{module_analytics, module_version, provider_analytics, provider_version};

/// A module download to record against an analytics token.
#[derive(Debug, Clone)]
pub struct ModuleDownload {
    pub parent_module_version_id: i32,
    pub terraform_version: Option<String>,
    pub analytics_token: String,
    pub environment: Option<String>,
    pub namespace: String,
    pub module: String,
    pub provider: String,
}

/// Latest state seen for one analytics token of a module provider.
#[derive(Debug, Clone)]
pub struct TokenVersion {
    pub analytics_token: String,
    pub version: String,
    pub environment: Option<String>,
    pub terraform_version: Option<String>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Repository for analytics rows.
pub struct AnalyticsRepository;

impl AnalyticsRepository {
    pub async fn record_module_download<C: ConnectionTrait>(
        conn: &C,
        download: ModuleDownload,
    ) -> Result<module_analytics::Model, DbErr> {
        module_analytics::ActiveModel {
            parent_module_version_id: Set(download.parent_module_version_id),
            timestamp: Set(chrono::Utc::now()),
            terraform_version: Set(download.terraform_version),
            analytics_token: Set(download.analytics_token),
            environment: Set(download.environment),
            namespace: Set(download.namespace),
            module: Set(download.module),
            provider: Set(download.provider),
            ..Default::default()
        }
        .insert(conn)
        .await
    }

    /// Per-token latest download for a module provider, aggregated over all
    /// of its versions.
    pub async fn token_versions<C: ConnectionTrait>(
        conn: &C,
        module_provider_id: i32,
    ) -> Result<Vec<TokenVersion>, DbErr> {
        let versions = module_version::Entity::find()
            .filter(module_version::Column::ModuleProviderId.eq(module_provider_id))
            .all(conn)
            .await?;
        let version_by_id: HashMap<i32, String> =
            versions.into_iter().map(|v| (v.id, v.version)).collect();

        if version_by_id.is_empty() {
            return Ok(Vec::new());
        }

        let rows = module_analytics::Entity::find()
            .filter(
                module_analytics::Column::ParentModuleVersionId
                    .is_in(version_by_id.keys().copied()),
            )
            .all(conn)
            .await?;

        let mut latest: HashMap<String, TokenVersion> = HashMap::new();
        for row in rows {
            let Some(version) = version_by_id.get(&row.parent_module_version_id) else {
                continue;
            };
            let candidate = TokenVersion {
                analytics_token: row.analytics_token.clone(),
                version: version.clone(),
                environment: row.environment,
                terraform_version: row.terraform_version,
                timestamp: row.timestamp,
            };
            match latest.get(&row.analytics_token) {
                Some(existing) if existing.timestamp >= candidate.timestamp => {}
                _ => {
                    latest.insert(row.analytics_token.clone(), candidate);
                }
            }
        }

        let mut out: Vec<TokenVersion> = latest.into_values().collect();
        out.sort_by(|a, b| a.analytics_token.cmp(&b.analytics_token));
        Ok(out)
    }

    pub async fn record_provider_download<C: ConnectionTrait>(
        conn: &C,
        provider_version_id: i32,
        terraform_version: Option<String>,
    ) -> Result<provider_analytics::Model, DbErr> {
        provider_analytics::ActiveModel {
            provider_version_id: Set(provider_version_id),
            timestamp: Set(chrono::Utc::now()),
            terraform_version: Set(terraform_version),
            ..Default::default()
        }
        .insert(conn)
        .await
    }

    /// Total download count across all versions of a provider.
    pub async fn provider_download_count<C: ConnectionTrait>(
        conn: &C,
        provider_id: i32,
    ) -> Result<u64, DbErr> {
        let version_ids: Vec<i32> = provider_version::Entity::find()
            .filter(provider_version::Column::ProviderId.eq(provider_id))
            .all(conn)
            .await?
            .into_iter()
            .map(|v| v.id)
            .collect();

        if version_ids.is_empty() {
            return Ok(0);
        }

        provider_analytics::Entity::find()
            .filter(provider_analytics::Column::ProviderVersionId.is_in(version_ids))
            .count(conn)
            .await
    }
}

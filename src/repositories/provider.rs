//! Provider repository: providers, versions, binaries and categories.

use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};

use crate::models::{namespace, provider, provider_binary, provider_category, provider_version};
use crate::repositories::NamespaceRepository;
use crate::semver::Semver;

/// The live (namespace, provider) pair a lookup resolved to.
#[derive(Debug, Clone)]
pub struct ResolvedProvider {
    pub namespace: namespace::Model,
    pub provider: provider::Model,
}

/// One platform release of a provider version, as supplied at index time.
#[derive(Debug, Clone)]
pub struct NewProviderBinary {
    pub os: String,
    pub arch: String,
    pub filename: String,
    pub checksum: String,
    pub object_url: Option<String>,
}

/// Repository for provider aggregates.
pub struct ProviderRepository;

impl ProviderRepository {
    pub async fn create<C: ConnectionTrait>(
        conn: &C,
        namespace_id: i32,
        name: &str,
        description: Option<String>,
        tier: &str,
        provider_category_id: Option<i32>,
        repository_id: Option<i32>,
    ) -> Result<provider::Model, DbErr> {
        provider::ActiveModel {
            namespace_id: Set(namespace_id),
            name: Set(name.to_string()),
            description: Set(description),
            tier: Set(tier.to_string()),
            provider_category_id: Set(provider_category_id),
            repository_id: Set(repository_id),
            created_at: Set(chrono::Utc::now()),
            ..Default::default()
        }
        .insert(conn)
        .await
    }

    pub async fn get<C: ConnectionTrait>(
        conn: &C,
        namespace_id: i32,
        name: &str,
    ) -> Result<Option<provider::Model>, DbErr> {
        provider::Entity::find()
            .filter(provider::Column::NamespaceId.eq(namespace_id))
            .filter(provider::Column::Name.eq(name))
            .one(conn)
            .await
    }

    /// Case-insensitive (namespace, name) resolution.
    pub async fn resolve<C: ConnectionTrait>(
        conn: &C,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ResolvedProvider>, DbErr> {
        let Some(ns) = NamespaceRepository::get_by_name_ci(conn, namespace).await? else {
            return Ok(None);
        };

        let found = provider::Entity::find()
            .filter(provider::Column::NamespaceId.eq(ns.id))
            .filter(
                Expr::expr(Func::lower(Expr::col((
                    provider::Entity,
                    provider::Column::Name,
                ))))
                .eq(name.to_lowercase()),
            )
            .one(conn)
            .await?;

        Ok(found.map(|p| ResolvedProvider {
            namespace: ns,
            provider: p,
        }))
    }

    pub async fn list_discoverable<C: ConnectionTrait>(
        conn: &C,
    ) -> Result<Vec<provider::Model>, DbErr> {
        provider::Entity::find()
            .filter(provider::Column::LatestVersionId.is_not_null())
            .order_by_asc(provider::Column::Name)
            .all(conn)
            .await
    }

    pub async fn set_latest_version_id<C: ConnectionTrait>(
        conn: &C,
        model: provider::Model,
        latest_version_id: Option<i32>,
    ) -> Result<provider::Model, DbErr> {
        let mut active: provider::ActiveModel = model.into();
        active.latest_version_id = Set(latest_version_id);
        active.update(conn).await
    }

    pub async fn delete<C: ConnectionTrait>(conn: &C, id: i32) -> Result<(), DbErr> {
        provider::Entity::delete_by_id(id).exec(conn).await?;
        Ok(())
    }

    pub async fn create_version<C: ConnectionTrait>(
        conn: &C,
        provider_id: i32,
        version: &str,
        git_tag: Option<String>,
        beta: bool,
        protocol_versions: serde_json::Value,
        gpg_key_id: Option<i32>,
        shasums: Option<String>,
        shasums_signature: Option<Vec<u8>>,
        binaries: Vec<NewProviderBinary>,
    ) -> Result<provider_version::Model, DbErr> {
        let created = provider_version::ActiveModel {
            provider_id: Set(provider_id),
            version: Set(version.to_string()),
            git_tag: Set(git_tag),
            beta: Set(beta),
            protocol_versions: Set(protocol_versions),
            gpg_key_id: Set(gpg_key_id),
            shasums: Set(shasums),
            shasums_signature: Set(shasums_signature),
            published_at: Set(chrono::Utc::now()),
            ..Default::default()
        }
        .insert(conn)
        .await?;

        for binary in binaries {
            provider_binary::ActiveModel {
                provider_version_id: Set(created.id),
                os: Set(binary.os),
                arch: Set(binary.arch),
                filename: Set(binary.filename),
                checksum: Set(binary.checksum),
                object_url: Set(binary.object_url),
                ..Default::default()
            }
            .insert(conn)
            .await?;
        }

        Ok(created)
    }

    pub async fn get_version<C: ConnectionTrait>(
        conn: &C,
        provider_id: i32,
        version: &str,
    ) -> Result<Option<provider_version::Model>, DbErr> {
        provider_version::Entity::find()
            .filter(provider_version::Column::ProviderId.eq(provider_id))
            .filter(provider_version::Column::Version.eq(version))
            .one(conn)
            .await
    }

    pub async fn get_version_by_id<C: ConnectionTrait>(
        conn: &C,
        id: i32,
    ) -> Result<Option<provider_version::Model>, DbErr> {
        provider_version::Entity::find_by_id(id).one(conn).await
    }

    /// All versions of a provider, newest first under semver order.
    pub async fn list_versions<C: ConnectionTrait>(
        conn: &C,
        provider_id: i32,
    ) -> Result<Vec<provider_version::Model>, DbErr> {
        let mut rows = provider_version::Entity::find()
            .filter(provider_version::Column::ProviderId.eq(provider_id))
            .all(conn)
            .await?;

        rows.sort_by(|a, b| match (Semver::parse(&a.version), Semver::parse(&b.version)) {
            (Ok(va), Ok(vb)) => vb.cmp(&va),
            _ => b.version.cmp(&a.version),
        });
        Ok(rows)
    }

    /// The latest non-beta version, if any.
    pub async fn latest_version<C: ConnectionTrait>(
        conn: &C,
        provider_id: i32,
    ) -> Result<Option<provider_version::Model>, DbErr> {
        let rows = provider_version::Entity::find()
            .filter(provider_version::Column::ProviderId.eq(provider_id))
            .filter(provider_version::Column::Beta.eq(false))
            .all(conn)
            .await?;

        Ok(rows.into_iter().max_by(|a, b| {
            match (Semver::parse(&a.version), Semver::parse(&b.version)) {
                (Ok(va), Ok(vb)) => va.cmp(&vb),
                _ => a.version.cmp(&b.version),
            }
        }))
    }

    pub async fn delete_version<C: ConnectionTrait>(conn: &C, id: i32) -> Result<(), DbErr> {
        provider_version::Entity::delete_by_id(id).exec(conn).await?;
        Ok(())
    }

    pub async fn list_binaries<C: ConnectionTrait>(
        conn: &C,
        provider_version_id: i32,
    ) -> Result<Vec<provider_binary::Model>, DbErr> {
        provider_binary::Entity::find()
            .filter(provider_binary::Column::ProviderVersionId.eq(provider_version_id))
            .order_by_asc(provider_binary::Column::Filename)
            .all(conn)
            .await
    }

    pub async fn get_binary<C: ConnectionTrait>(
        conn: &C,
        provider_version_id: i32,
        os: &str,
        arch: &str,
    ) -> Result<Option<provider_binary::Model>, DbErr> {
        provider_binary::Entity::find()
            .filter(provider_binary::Column::ProviderVersionId.eq(provider_version_id))
            .filter(provider_binary::Column::Os.eq(os))
            .filter(provider_binary::Column::Arch.eq(arch))
            .one(conn)
            .await
    }

    pub async fn list_categories<C: ConnectionTrait>(
        conn: &C,
    ) -> Result<Vec<provider_category::Model>, DbErr> {
        provider_category::Entity::find()
            .order_by_asc(provider_category::Column::Name)
            .all(conn)
            .await
    }

    pub async fn get_category_by_slug<C: ConnectionTrait>(
        conn: &C,
        slug: &str,
    ) -> Result<Option<provider_category::Model>, DbErr> {
        provider_category::Entity::find()
            .filter(provider_category::Column::Slug.eq(slug))
            .one(conn)
            .await
    }

    pub async fn create_category<C: ConnectionTrait>(
        conn: &C,
        name: &str,
        slug: &str,
        user_selectable: bool,
    ) -> Result<provider_category::Model, DbErr> {
        provider_category::ActiveModel {
            name: Set(name.to_string()),
            slug: Set(slug.to_string()),
            user_selectable: Set(user_selectable),
            ..Default::default()
        }
        .insert(conn)
        .await
    }
}

//! Module provider repository, including redirect resolution.

use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};

use crate::models::{module_provider, module_provider_redirect, namespace};
use crate::repositories::NamespaceRepository;

/// The live (namespace, module provider) pair a lookup resolved to.
#[derive(Debug, Clone)]
pub struct ResolvedModuleProvider {
    pub namespace: namespace::Model,
    pub module_provider: module_provider::Model,
}

/// Repository for module provider rows and their redirects.
pub struct ModuleProviderRepository;

impl ModuleProviderRepository {
    pub async fn create<C: ConnectionTrait>(
        conn: &C,
        namespace_id: i32,
        module: &str,
        provider: &str,
        git_tag_format: Option<String>,
    ) -> Result<module_provider::Model, DbErr> {
        module_provider::ActiveModel {
            namespace_id: Set(namespace_id),
            module: Set(module.to_string()),
            provider: Set(provider.to_string()),
            git_tag_format: Set(git_tag_format.unwrap_or_else(|| "{version}".to_string())),
            verified: Set(false),
            created_at: Set(chrono::Utc::now()),
            ..Default::default()
        }
        .insert(conn)
        .await
    }

    pub async fn get_by_id<C: ConnectionTrait>(
        conn: &C,
        id: i32,
    ) -> Result<Option<module_provider::Model>, DbErr> {
        module_provider::Entity::find_by_id(id).one(conn).await
    }

    /// Exact lookup within a namespace.
    pub async fn get<C: ConnectionTrait>(
        conn: &C,
        namespace_id: i32,
        module: &str,
        provider: &str,
    ) -> Result<Option<module_provider::Model>, DbErr> {
        module_provider::Entity::find()
            .filter(module_provider::Column::NamespaceId.eq(namespace_id))
            .filter(module_provider::Column::Module.eq(module))
            .filter(module_provider::Column::Provider.eq(provider))
            .one(conn)
            .await
    }

    /// Case-insensitive lookup within a namespace.
    pub async fn get_ci<C: ConnectionTrait>(
        conn: &C,
        namespace_id: i32,
        module: &str,
        provider: &str,
    ) -> Result<Option<module_provider::Model>, DbErr> {
        module_provider::Entity::find()
            .filter(module_provider::Column::NamespaceId.eq(namespace_id))
            .filter(
                Expr::expr(Func::lower(Expr::col((
                    module_provider::Entity,
                    module_provider::Column::Module,
                ))))
                .eq(module.to_lowercase()),
            )
            .filter(
                Expr::expr(Func::lower(Expr::col((
                    module_provider::Entity,
                    module_provider::Column::Provider,
                ))))
                .eq(provider.to_lowercase()),
            )
            .one(conn)
            .await
    }

    /// Redirect resolution: look up the live triple first, then the redirect
    /// table, both case-insensitively. Returns `None` when neither exists.
    pub async fn resolve<C: ConnectionTrait>(
        conn: &C,
        namespace: &str,
        module: &str,
        provider: &str,
    ) -> Result<Option<ResolvedModuleProvider>, DbErr> {
        if let Some(ns) = NamespaceRepository::get_by_name_ci(conn, namespace).await? {
            if let Some(mp) = Self::get_ci(conn, ns.id, module, provider).await? {
                return Ok(Some(ResolvedModuleProvider {
                    namespace: ns,
                    module_provider: mp,
                }));
            }
        }

        let redirect = module_provider_redirect::Entity::find()
            .filter(
                Expr::expr(Func::lower(Expr::col((
                    module_provider_redirect::Entity,
                    module_provider_redirect::Column::Namespace,
                ))))
                .eq(namespace.to_lowercase()),
            )
            .filter(
                Expr::expr(Func::lower(Expr::col((
                    module_provider_redirect::Entity,
                    module_provider_redirect::Column::Module,
                ))))
                .eq(module.to_lowercase()),
            )
            .filter(
                Expr::expr(Func::lower(Expr::col((
                    module_provider_redirect::Entity,
                    module_provider_redirect::Column::Provider,
                ))))
                .eq(provider.to_lowercase()),
            )
            .one(conn)
            .await?;

        let Some(redirect) = redirect else {
            return Ok(None);
        };

        let Some(mp) = Self::get_by_id(conn, redirect.module_provider_id).await? else {
            return Ok(None);
        };
        let Some(ns) = NamespaceRepository::get_by_id(conn, mp.namespace_id).await? else {
            return Ok(None);
        };

        Ok(Some(ResolvedModuleProvider {
            namespace: ns,
            module_provider: mp,
        }))
    }

    /// Record the historical triple before a rename so old paths keep
    /// resolving.
    pub async fn add_redirect<C: ConnectionTrait>(
        conn: &C,
        namespace: &str,
        module: &str,
        provider: &str,
        module_provider_id: i32,
    ) -> Result<module_provider_redirect::Model, DbErr> {
        module_provider_redirect::ActiveModel {
            namespace: Set(namespace.to_string()),
            module: Set(module.to_string()),
            provider: Set(provider.to_string()),
            module_provider_id: Set(module_provider_id),
            created_at: Set(chrono::Utc::now()),
            ..Default::default()
        }
        .insert(conn)
        .await
    }

    pub async fn list_by_namespace<C: ConnectionTrait>(
        conn: &C,
        namespace_id: i32,
    ) -> Result<Vec<module_provider::Model>, DbErr> {
        module_provider::Entity::find()
            .filter(module_provider::Column::NamespaceId.eq(namespace_id))
            .order_by_asc(module_provider::Column::Module)
            .order_by_asc(module_provider::Column::Provider)
            .all(conn)
            .await
    }

    /// All module providers with a latest published version, i.e. the set
    /// eligible for discovery.
    pub async fn list_discoverable<C: ConnectionTrait>(
        conn: &C,
    ) -> Result<Vec<module_provider::Model>, DbErr> {
        module_provider::Entity::find()
            .filter(module_provider::Column::LatestVersionId.is_not_null())
            .order_by_asc(module_provider::Column::Module)
            .order_by_asc(module_provider::Column::Provider)
            .all(conn)
            .await
    }

    pub async fn update<C: ConnectionTrait>(
        conn: &C,
        active: module_provider::ActiveModel,
    ) -> Result<module_provider::Model, DbErr> {
        active.update(conn).await
    }

    pub async fn set_latest_version_id<C: ConnectionTrait>(
        conn: &C,
        model: module_provider::Model,
        latest_version_id: Option<i32>,
    ) -> Result<module_provider::Model, DbErr> {
        let mut active: module_provider::ActiveModel = model.into();
        active.latest_version_id = Set(latest_version_id);
        active.update(conn).await
    }

    pub async fn delete<C: ConnectionTrait>(conn: &C, id: i32) -> Result<(), DbErr> {
        module_provider::Entity::delete_by_id(id).exec(conn).await?;
        Ok(())
    }
}

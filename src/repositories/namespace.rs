//! Namespace repository.

use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};

use crate::models::{
    gpg_key, module_provider, namespace, provider, user_group_namespace_permission,
};

/// Repository for namespace rows.
pub struct NamespaceRepository;

impl NamespaceRepository {
    pub async fn create<C: ConnectionTrait>(
        conn: &C,
        name: &str,
        display_name: Option<String>,
        namespace_type: &str,
    ) -> Result<namespace::Model, DbErr> {
        namespace::ActiveModel {
            name: Set(name.to_string()),
            display_name: Set(display_name),
            namespace_type: Set(namespace_type.to_string()),
            created_at: Set(chrono::Utc::now()),
            ..Default::default()
        }
        .insert(conn)
        .await
    }

    pub async fn get_by_id<C: ConnectionTrait>(
        conn: &C,
        id: i32,
    ) -> Result<Option<namespace::Model>, DbErr> {
        namespace::Entity::find_by_id(id).one(conn).await
    }

    pub async fn get_by_name<C: ConnectionTrait>(
        conn: &C,
        name: &str,
    ) -> Result<Option<namespace::Model>, DbErr> {
        namespace::Entity::find()
            .filter(namespace::Column::Name.eq(name))
            .one(conn)
            .await
    }

    /// Case-insensitive lookup used during redirect resolution.
    pub async fn get_by_name_ci<C: ConnectionTrait>(
        conn: &C,
        name: &str,
    ) -> Result<Option<namespace::Model>, DbErr> {
        namespace::Entity::find()
            .filter(
                Expr::expr(Func::lower(Expr::col((
                    namespace::Entity,
                    namespace::Column::Name,
                ))))
                .eq(name.to_lowercase()),
            )
            .one(conn)
            .await
    }

    pub async fn list<C: ConnectionTrait>(conn: &C) -> Result<Vec<namespace::Model>, DbErr> {
        namespace::Entity::find()
            .order_by_asc(namespace::Column::Name)
            .all(conn)
            .await
    }

    pub async fn update_name<C: ConnectionTrait>(
        conn: &C,
        model: namespace::Model,
        new_name: &str,
    ) -> Result<namespace::Model, DbErr> {
        let mut active: namespace::ActiveModel = model.into();
        active.name = Set(new_name.to_string());
        active.update(conn).await
    }

    pub async fn update_display_name<C: ConnectionTrait>(
        conn: &C,
        model: namespace::Model,
        display_name: Option<String>,
    ) -> Result<namespace::Model, DbErr> {
        let mut active: namespace::ActiveModel = model.into();
        active.display_name = Set(display_name);
        active.update(conn).await
    }

    pub async fn delete<C: ConnectionTrait>(conn: &C, id: i32) -> Result<(), DbErr> {
        namespace::Entity::delete_by_id(id).exec(conn).await?;
        Ok(())
    }

    /// A namespace may only be deleted when it holds no modules, providers,
    /// GPG keys or group permissions.
    pub async fn is_empty<C: ConnectionTrait>(conn: &C, id: i32) -> Result<bool, DbErr> {
        let modules = module_provider::Entity::find()
            .filter(module_provider::Column::NamespaceId.eq(id))
            .count(conn)
            .await?;
        if modules > 0 {
            return Ok(false);
        }

        let providers = provider::Entity::find()
            .filter(provider::Column::NamespaceId.eq(id))
            .count(conn)
            .await?;
        if providers > 0 {
            return Ok(false);
        }

        let keys = gpg_key::Entity::find()
            .filter(gpg_key::Column::NamespaceId.eq(id))
            .count(conn)
            .await?;
        if keys > 0 {
            return Ok(false);
        }

        let permissions = user_group_namespace_permission::Entity::find()
            .filter(user_group_namespace_permission::Column::NamespaceId.eq(id))
            .count(conn)
            .await?;

        Ok(permissions == 0)
    }
}

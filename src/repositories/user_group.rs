//! User group and namespace permission repository.

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};

use crate::models::{user_group, user_group_namespace_permission};

/// Repository for user groups and their namespace permissions.
pub struct UserGroupRepository;

impl UserGroupRepository {
    pub async fn create<C: ConnectionTrait>(
        conn: &C,
        name: &str,
        site_admin: bool,
    ) -> Result<user_group::Model, DbErr> {
        user_group::ActiveModel {
            name: Set(name.to_string()),
            site_admin: Set(site_admin),
            created_at: Set(chrono::Utc::now()),
            ..Default::default()
        }
        .insert(conn)
        .await
    }

    pub async fn get_by_name<C: ConnectionTrait>(
        conn: &C,
        name: &str,
    ) -> Result<Option<user_group::Model>, DbErr> {
        user_group::Entity::find()
            .filter(user_group::Column::Name.eq(name))
            .one(conn)
            .await
    }

    /// Fetch the group rows matching any of the given names (SSO claims).
    pub async fn find_by_names<C: ConnectionTrait>(
        conn: &C,
        names: &[String],
    ) -> Result<Vec<user_group::Model>, DbErr> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        user_group::Entity::find()
            .filter(user_group::Column::Name.is_in(names.iter().cloned()))
            .all(conn)
            .await
    }

    pub async fn list<C: ConnectionTrait>(conn: &C) -> Result<Vec<user_group::Model>, DbErr> {
        user_group::Entity::find()
            .order_by_asc(user_group::Column::Name)
            .all(conn)
            .await
    }

    pub async fn delete<C: ConnectionTrait>(conn: &C, id: i32) -> Result<(), DbErr> {
        user_group::Entity::delete_by_id(id).exec(conn).await?;
        Ok(())
    }

    pub async fn add_permission<C: ConnectionTrait>(
        conn: &C,
        user_group_id: i32,
        namespace_id: i32,
        permission_type: &str,
    ) -> Result<user_group_namespace_permission::Model, DbErr> {
        user_group_namespace_permission::ActiveModel {
            user_group_id: Set(user_group_id),
            namespace_id: Set(namespace_id),
            permission_type: Set(permission_type.to_string()),
            ..Default::default()
        }
        .insert(conn)
        .await
    }

    pub async fn get_permission<C: ConnectionTrait>(
        conn: &C,
        user_group_id: i32,
        namespace_id: i32,
    ) -> Result<Option<user_group_namespace_permission::Model>, DbErr> {
        user_group_namespace_permission::Entity::find()
            .filter(user_group_namespace_permission::Column::UserGroupId.eq(user_group_id))
            .filter(user_group_namespace_permission::Column::NamespaceId.eq(namespace_id))
            .one(conn)
            .await
    }

    pub async fn update_permission<C: ConnectionTrait>(
        conn: &C,
        model: user_group_namespace_permission::Model,
        permission_type: &str,
    ) -> Result<user_group_namespace_permission::Model, DbErr> {
        let mut active: user_group_namespace_permission::ActiveModel = model.into();
        active.permission_type = Set(permission_type.to_string());
        active.update(conn).await
    }

    pub async fn delete_permission<C: ConnectionTrait>(conn: &C, id: i32) -> Result<(), DbErr> {
        user_group_namespace_permission::Entity::delete_by_id(id)
            .exec(conn)
            .await?;
        Ok(())
    }

    pub async fn list_permissions_by_group<C: ConnectionTrait>(
        conn: &C,
        user_group_id: i32,
    ) -> Result<Vec<user_group_namespace_permission::Model>, DbErr> {
        user_group_namespace_permission::Entity::find()
            .filter(user_group_namespace_permission::Column::UserGroupId.eq(user_group_id))
            .all(conn)
            .await
    }

    /// Permission rows held by any of the given groups on one namespace.
    pub async fn find_permissions<C: ConnectionTrait>(
        conn: &C,
        user_group_ids: &[i32],
        namespace_id: i32,
    ) -> Result<Vec<user_group_namespace_permission::Model>, DbErr> {
        if user_group_ids.is_empty() {
            return Ok(Vec::new());
        }
        user_group_namespace_permission::Entity::find()
            .filter(
                user_group_namespace_permission::Column::UserGroupId
                    .is_in(user_group_ids.iter().copied()),
            )
            .filter(user_group_namespace_permission::Column::NamespaceId.eq(namespace_id))
            .all(conn)
            .await
    }
}

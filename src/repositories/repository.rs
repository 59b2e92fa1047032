//! Source repository records backing providers.

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, Set,
};

use crate::models::repository;

/// Repository for provider source-repository records.
pub struct RepositoryRepository;

impl RepositoryRepository {
    pub async fn create<C: ConnectionTrait>(
        conn: &C,
        provider_source: &str,
        owner: &str,
        name: &str,
        description: Option<String>,
        clone_url: Option<String>,
        logo_url: Option<String>,
    ) -> Result<repository::Model, DbErr> {
        repository::ActiveModel {
            provider_source: Set(provider_source.to_string()),
            owner: Set(owner.to_string()),
            name: Set(name.to_string()),
            description: Set(description),
            clone_url: Set(clone_url),
            logo_url: Set(logo_url),
            created_at: Set(chrono::Utc::now()),
            ..Default::default()
        }
        .insert(conn)
        .await
    }

    pub async fn get_by_id<C: ConnectionTrait>(
        conn: &C,
        id: i32,
    ) -> Result<Option<repository::Model>, DbErr> {
        repository::Entity::find_by_id(id).one(conn).await
    }

    pub async fn find<C: ConnectionTrait>(
        conn: &C,
        provider_source: &str,
        owner: &str,
        name: &str,
    ) -> Result<Option<repository::Model>, DbErr> {
        repository::Entity::find()
            .filter(repository::Column::ProviderSource.eq(provider_source))
            .filter(repository::Column::Owner.eq(owner))
            .filter(repository::Column::Name.eq(name))
            .one(conn)
            .await
    }

    pub async fn update<C: ConnectionTrait>(
        conn: &C,
        model: repository::Model,
        description: Option<String>,
        clone_url: Option<String>,
        logo_url: Option<String>,
    ) -> Result<repository::Model, DbErr> {
        let mut active: repository::ActiveModel = model.into();
        active.description = Set(description);
        active.clone_url = Set(clone_url);
        active.logo_url = Set(logo_url);
        active.update(conn).await
    }

    pub async fn delete<C: ConnectionTrait>(conn: &C, id: i32) -> Result<(), DbErr> {
        repository::Entity::delete_by_id(id).exec(conn).await?;
        Ok(())
    }
}

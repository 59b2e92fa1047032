//! GPG key repository.

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};

use crate::models::gpg_key;

/// Repository for namespace GPG keys.
pub struct GpgKeyRepository;

impl GpgKeyRepository {
    pub async fn create<C: ConnectionTrait>(
        conn: &C,
        namespace_id: i32,
        key_id: &str,
        fingerprint: &str,
        ascii_armor: &str,
        source: Option<String>,
        source_url: Option<String>,
    ) -> Result<gpg_key::Model, DbErr> {
        gpg_key::ActiveModel {
            namespace_id: Set(namespace_id),
            key_id: Set(key_id.to_string()),
            fingerprint: Set(fingerprint.to_string()),
            ascii_armor: Set(ascii_armor.to_string()),
            source: Set(source),
            source_url: Set(source_url),
            created_at: Set(chrono::Utc::now()),
            ..Default::default()
        }
        .insert(conn)
        .await
    }

    pub async fn get_by_id<C: ConnectionTrait>(
        conn: &C,
        id: i32,
    ) -> Result<Option<gpg_key::Model>, DbErr> {
        gpg_key::Entity::find_by_id(id).one(conn).await
    }

    pub async fn get_by_fingerprint<C: ConnectionTrait>(
        conn: &C,
        fingerprint: &str,
    ) -> Result<Option<gpg_key::Model>, DbErr> {
        gpg_key::Entity::find()
            .filter(gpg_key::Column::Fingerprint.eq(fingerprint))
            .one(conn)
            .await
    }

    pub async fn list_by_namespace<C: ConnectionTrait>(
        conn: &C,
        namespace_id: i32,
    ) -> Result<Vec<gpg_key::Model>, DbErr> {
        gpg_key::Entity::find()
            .filter(gpg_key::Column::NamespaceId.eq(namespace_id))
            .order_by_asc(gpg_key::Column::Fingerprint)
            .all(conn)
            .await
    }

    pub async fn delete<C: ConnectionTrait>(conn: &C, id: i32) -> Result<(), DbErr> {
        gpg_key::Entity::delete_by_id(id).exec(conn).await?;
        Ok(())
    }
}

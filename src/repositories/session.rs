//! Session repository.
//!
//! Implements the session-store interface: create, findById, delete,
//! deleteExpired, getCSRF, updateCSRF. SQL-backed so multiple processes can
//! share one session table.

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, Set,
};

use crate::models::session;

/// Repository for session rows.
pub struct SessionRepository;

impl SessionRepository {
    #[allow(clippy::too_many_arguments)]
    pub async fn create<C: ConnectionTrait>(
        conn: &C,
        id: &str,
        username: Option<String>,
        auth_method: &str,
        csrf_token: Option<String>,
        auth_blob: Option<Vec<u8>>,
        expiry: chrono::DateTime<chrono::Utc>,
    ) -> Result<session::Model, DbErr> {
        session::ActiveModel {
            id: Set(id.to_string()),
            username: Set(username),
            auth_method: Set(auth_method.to_string()),
            csrf_token: Set(csrf_token),
            auth_blob: Set(auth_blob),
            expiry: Set(expiry),
            created_at: Set(chrono::Utc::now()),
        }
        .insert(conn)
        .await
    }

    pub async fn find_by_id<C: ConnectionTrait>(
        conn: &C,
        id: &str,
    ) -> Result<Option<session::Model>, DbErr> {
        session::Entity::find_by_id(id.to_string()).one(conn).await
    }

    pub async fn delete<C: ConnectionTrait>(conn: &C, id: &str) -> Result<(), DbErr> {
        session::Entity::delete_by_id(id.to_string())
            .exec(conn)
            .await?;
        Ok(())
    }

    /// Expiry sweep; returns the number of sessions removed.
    pub async fn delete_expired<C: ConnectionTrait>(
        conn: &C,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<u64, DbErr> {
        let result = session::Entity::delete_many()
            .filter(session::Column::Expiry.lte(now))
            .exec(conn)
            .await?;
        Ok(result.rows_affected)
    }

    pub async fn get_csrf<C: ConnectionTrait>(
        conn: &C,
        id: &str,
    ) -> Result<Option<String>, DbErr> {
        Ok(Self::find_by_id(conn, id).await?.and_then(|s| s.csrf_token))
    }

    pub async fn update_csrf<C: ConnectionTrait>(
        conn: &C,
        model: session::Model,
        csrf_token: Option<String>,
    ) -> Result<session::Model, DbErr> {
        let mut active: session::ActiveModel = model.into();
        active.csrf_token = Set(csrf_token);
        active.update(conn).await
    }
}

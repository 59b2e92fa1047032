//! SSO login-state repository.
//!
//! Pending external login flows keyed by the unpredictable `state`
//! parameter. Rows are single-use: completing a flow consumes the row.

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, Set,
};

use crate::models::sso_state;

/// How long a pending login may sit before the state is garbage-collected.
const STATE_LIFETIME_MINS: i64 = 10;

/// Repository for pending SSO login states.
pub struct SsoStateRepository;

impl SsoStateRepository {
    pub async fn create<C: ConnectionTrait>(
        conn: &C,
        state: &str,
        provider: &str,
        nonce: Option<String>,
        code_verifier: Option<String>,
        request_id: Option<String>,
    ) -> Result<sso_state::Model, DbErr> {
        let now = chrono::Utc::now();
        sso_state::ActiveModel {
            state: Set(state.to_string()),
            provider: Set(provider.to_string()),
            nonce: Set(nonce),
            code_verifier: Set(code_verifier),
            request_id: Set(request_id),
            expires_at: Set(now + chrono::Duration::minutes(STATE_LIFETIME_MINS)),
            created_at: Set(now),
        }
        .insert(conn)
        .await
    }

    /// Fetch and delete the pending state in one step; a state can complete
    /// at most one callback.
    pub async fn consume<C: ConnectionTrait>(
        conn: &C,
        state: &str,
        provider: &str,
    ) -> Result<Option<sso_state::Model>, DbErr> {
        let found = sso_state::Entity::find_by_id(state.to_string())
            .filter(sso_state::Column::Provider.eq(provider))
            .one(conn)
            .await?;

        let Some(row) = found else {
            return Ok(None);
        };

        sso_state::Entity::delete_by_id(row.state.clone())
            .exec(conn)
            .await?;

        if row.expires_at <= chrono::Utc::now() {
            return Ok(None);
        }

        Ok(Some(row))
    }

    /// Expiry sweep for abandoned logins; returns rows removed.
    pub async fn delete_expired<C: ConnectionTrait>(
        conn: &C,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<u64, DbErr> {
        let result = sso_state::Entity::delete_many()
            .filter(sso_state::Column::ExpiresAt.lte(now))
            .exec(conn)
            .await?;
        Ok(result.rows_affected)
    }
}

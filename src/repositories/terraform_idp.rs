//! Terraform CLI IdP repository: authorization codes, access tokens and
//! subject bindings.

use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, Set,
};

use crate::models::terraform_idp::{access_token, authorization_code, subject};

/// Repository for the three IdP key/value/expiry tables.
pub struct TerraformIdpRepository;

impl TerraformIdpRepository {
    pub async fn create_authorization_code<C: ConnectionTrait>(
        conn: &C,
        code: &str,
        code_challenge: &str,
        redirect_uri: &str,
        subject: &str,
        expires_at: chrono::DateTime<chrono::Utc>,
    ) -> Result<authorization_code::Model, DbErr> {
        authorization_code::ActiveModel {
            code: Set(code.to_string()),
            code_challenge: Set(code_challenge.to_string()),
            redirect_uri: Set(redirect_uri.to_string()),
            subject: Set(subject.to_string()),
            consumed: Set(false),
            expires_at: Set(expires_at),
        }
        .insert(conn)
        .await
    }

    pub async fn find_authorization_code<C: ConnectionTrait>(
        conn: &C,
        code: &str,
    ) -> Result<Option<authorization_code::Model>, DbErr> {
        authorization_code::Entity::find_by_id(code.to_string())
            .one(conn)
            .await
    }

    /// Atomically mark a code consumed. Returns false when the code was
    /// already consumed, enforcing single use.
    pub async fn consume_authorization_code<C: ConnectionTrait>(
        conn: &C,
        code: &str,
    ) -> Result<bool, DbErr> {
        let result = authorization_code::Entity::update_many()
            .col_expr(authorization_code::Column::Consumed, Expr::value(true))
            .filter(authorization_code::Column::Code.eq(code))
            .filter(authorization_code::Column::Consumed.eq(false))
            .exec(conn)
            .await?;
        Ok(result.rows_affected == 1)
    }

    pub async fn create_access_token<C: ConnectionTrait>(
        conn: &C,
        token_hash: &str,
        subject: &str,
        expires_at: chrono::DateTime<chrono::Utc>,
    ) -> Result<access_token::Model, DbErr> {
        access_token::ActiveModel {
            token_hash: Set(token_hash.to_string()),
            subject: Set(subject.to_string()),
            expires_at: Set(expires_at),
        }
        .insert(conn)
        .await
    }

    pub async fn find_access_token<C: ConnectionTrait>(
        conn: &C,
        token_hash: &str,
    ) -> Result<Option<access_token::Model>, DbErr> {
        access_token::Entity::find_by_id(token_hash.to_string())
            .one(conn)
            .await
    }

    pub async fn delete_access_token<C: ConnectionTrait>(
        conn: &C,
        token_hash: &str,
    ) -> Result<(), DbErr> {
        access_token::Entity::delete_by_id(token_hash.to_string())
            .exec(conn)
            .await?;
        Ok(())
    }

    /// Stable (subject, issuer) → username binding. Creates the row on first
    /// login and returns the existing one afterwards.
    pub async fn upsert_subject<C: ConnectionTrait>(
        conn: &C,
        subject_value: &str,
        issuer: &str,
        username: &str,
    ) -> Result<subject::Model, DbErr> {
        let existing = subject::Entity::find()
            .filter(subject::Column::Subject.eq(subject_value))
            .filter(subject::Column::Issuer.eq(issuer))
            .one(conn)
            .await?;

        if let Some(found) = existing {
            return Ok(found);
        }

        subject::ActiveModel {
            subject: Set(subject_value.to_string()),
            issuer: Set(issuer.to_string()),
            username: Set(username.to_string()),
            created_at: Set(chrono::Utc::now()),
            ..Default::default()
        }
        .insert(conn)
        .await
    }

    /// Expiry sweep over codes and tokens; returns total rows removed.
    pub async fn delete_expired<C: ConnectionTrait>(
        conn: &C,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<u64, DbErr> {
        let codes = authorization_code::Entity::delete_many()
            .filter(authorization_code::Column::ExpiresAt.lte(now))
            .exec(conn)
            .await?;
        let tokens = access_token::Entity::delete_many()
            .filter(access_token::Column::ExpiresAt.lte(now))
            .exec(conn)
            .await?;
        Ok(codes.rows_affected + tokens.rows_affected)
    }
}

//! SSO state entity model.
//!
//! One row per pending external login flow, keyed by the unpredictable state
//! parameter. Expired rows are garbage-collected by the maintenance sweep.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "sso_states")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub state: String,

    /// Which flow owns the state: `oidc`, `github` or `saml`.
    pub provider: String,

    pub nonce: Option<String>,

    pub code_verifier: Option<String>,

    /// SAML AuthnRequest id for InResponseTo validation.
    pub request_id: Option<String>,

    pub expires_at: chrono::DateTime<chrono::Utc>,

    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

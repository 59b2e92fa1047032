//! Session entity model.
//!
//! Sessions are keyed by an opaque 32-byte token (base64url). The
//! provider-auth blob is sealed with AES-GCM before it reaches the row.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "sessions")]
pub struct Model {
    /// Opaque session token.
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub id: String,

    pub username: Option<String>,

    /// Identity kind that established the session, e.g. `oidc` or `admin`.
    pub auth_method: String,

    /// CSRF token required on mutating cookie-session requests.
    pub csrf_token: Option<String>,

    /// Sealed provider-auth data (group memberships, upstream tokens).
    pub auth_blob: Option<Vec<u8>>,

    pub expiry: chrono::DateTime<chrono::Utc>,

    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Model {
    pub fn is_expired(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        self.expiry <= now
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

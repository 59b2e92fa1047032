//! GPG key entity model.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "gpg_keys")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub namespace_id: i32,

    /// Short key id, upper-case hex.
    pub key_id: String,

    /// Full fingerprint, upper-case hex, globally unique.
    pub fingerprint: String,

    /// ASCII-armored public key served to clients for verification.
    pub ascii_armor: String,

    pub source: Option<String>,

    pub source_url: Option<String>,

    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

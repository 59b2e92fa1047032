//! Provider version entity model.
//!
//! Stores the SHA256SUMS document and its detached GPG signature verbatim so
//! serving is byte-exact.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "provider_versions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub provider_id: i32,

    pub version: String,

    pub git_tag: Option<String>,

    pub beta: bool,

    /// Terraform plugin protocol versions, e.g. `["5.0"]`.
    pub protocol_versions: Json,

    pub gpg_key_id: Option<i32>,

    pub shasums: Option<String>,

    pub shasums_signature: Option<Vec<u8>>,

    pub published_at: chrono::DateTime<chrono::Utc>,
}

impl Model {
    /// Protocol versions as strings, tolerating malformed stored data.
    pub fn protocols(&self) -> Vec<String> {
        self.protocol_versions
            .as_array()
            .map(|values| {
                values
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

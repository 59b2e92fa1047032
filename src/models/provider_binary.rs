//! Provider binary entity model.
//!
//! One row per (os, arch) platform of a provider version. The binary itself
//! lives in the blob store; only the opaque object URL is recorded.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "provider_binaries")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub provider_version_id: i32,

    pub os: String,

    pub arch: String,

    pub filename: String,

    /// Hex-encoded SHA-256 of the release archive.
    pub checksum: String,

    pub object_url: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

//! Provider entity model.
//!
//! A provider is a (namespace, name) tuple shipping per-platform binary
//! plugins, as opposed to modules which are Terraform code bundles.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "providers")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub namespace_id: i32,

    pub name: String,

    pub description: Option<String>,

    /// One of official / partner / community.
    pub tier: String,

    pub provider_category_id: Option<i32>,

    pub repository_id: Option<i32>,

    /// Cached id of the latest non-beta version; plain integer to break the
    /// row-level cycle with provider_versions.
    pub latest_version_id: Option<i32>,

    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

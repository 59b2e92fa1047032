//! Module version entity model.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "module_versions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub module_provider_id: i32,

    /// Semver string, unique per module provider.
    pub version: String,

    /// Set when the version carries a pre-release suffix.
    pub beta: bool,

    /// Internal versions are hidden from public listings.
    pub internal: bool,

    /// Only published versions are visible to discovery.
    pub published: bool,

    pub owner: Option<String>,

    pub description: Option<String>,

    /// Rendered variable input template captured at extraction time.
    pub variable_template: Option<Json>,

    pub extraction_version: Option<i32>,

    pub module_details_id: Option<i32>,

    /// Opaque object-store URL of the hosted source archive, if any.
    pub archive_url: Option<String>,

    pub published_at: chrono::DateTime<chrono::Utc>,
}

impl Model {
    /// Whether this version may appear in public discovery output.
    pub fn is_publicly_visible(&self) -> bool {
        self.published && !self.internal
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

//! Namespace entity model.
//!
//! Namespaces are the top-level scope for modules, providers and GPG keys.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "namespaces")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Unique name; redirect lookups compare case-insensitively.
    pub name: String,

    /// Optional human-friendly name shown by the UI.
    pub display_name: Option<String>,

    /// One of none / github_user / github_org.
    pub namespace_type: String,

    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

//! Audit history entity model. Append-only.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "audit_history")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub timestamp: chrono::DateTime<chrono::Utc>,

    /// Resolved identity name of the caller.
    pub username: String,

    /// Member of the closed action enumeration.
    pub action: String,

    pub object_type: String,

    pub object_id: String,

    pub old_value: Option<String>,

    pub new_value: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

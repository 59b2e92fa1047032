//! Module analytics entity model.
//!
//! One row per module download carrying an analytics token; identities doing
//! internal extraction are suppressed before this table is reached.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "module_analytics")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub parent_module_version_id: i32,

    pub timestamp: chrono::DateTime<chrono::Utc>,

    pub terraform_version: Option<String>,

    pub analytics_token: String,

    pub environment: Option<String>,

    pub namespace: String,

    pub module: String,

    pub provider: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

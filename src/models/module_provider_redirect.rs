//! Module provider redirect entity model.
//!
//! Maps a historical (namespace, module, provider) triple to the live module
//! provider it now resolves to. Matched case-insensitively.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "module_provider_redirects")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub namespace: String,

    pub module: String,

    pub provider: String,

    pub module_provider_id: i32,

    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

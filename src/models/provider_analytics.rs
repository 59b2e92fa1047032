//! Provider analytics entity model.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "provider_analytics")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub provider_version_id: i32,

    pub timestamp: chrono::DateTime<chrono::Utc>,

    pub terraform_version: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

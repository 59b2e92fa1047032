//! User group namespace permission entity model.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user_group_namespace_permissions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub user_group_id: i32,

    pub namespace_id: i32,

    /// One of full / modify / read.
    pub permission_type: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

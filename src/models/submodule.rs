//! Submodule entity model.
//!
//! Rows double as submodules and examples, discriminated by `submodule_type`.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "submodules")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub parent_module_version_id: i32,

    /// `submodule` or `example`.
    pub submodule_type: String,

    /// Path within the module source, e.g. `modules/vpc` or `examples/basic`.
    pub path: String,

    pub name: Option<String>,

    pub module_details_id: Option<i32>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

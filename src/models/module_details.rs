//! Module details entity model.
//!
//! Blob of extracted documentation shared by module versions, submodules and
//! examples: README, terraform-docs output, tfsec findings, infracost
//! estimates, dependency graph and nested module list.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "module_details")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub readme_content: Option<Vec<u8>>,

    pub terraform_docs: Option<Json>,

    pub tfsec: Option<Json>,

    pub infracost: Option<Json>,

    pub terraform_graph: Option<Vec<u8>>,

    pub terraform_modules: Option<Json>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

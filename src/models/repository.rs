//! Repository entity model.
//!
//! Source repository record backing a provider; ingest collaborators create
//! these from upstream VCS metadata.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "repositories")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Hosting source, e.g. `github`.
    pub provider_source: String,

    pub owner: String,

    pub name: String,

    pub description: Option<String>,

    pub clone_url: Option<String>,

    pub logo_url: Option<String>,

    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

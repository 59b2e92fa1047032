//! Module provider entity model.
//!
//! The (namespace, module, provider) triple that owns all published module
//! versions and carries the git source templates.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "module_providers")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub namespace_id: i32,

    pub module: String,

    pub provider: String,

    /// Git clone URL template, e.g. `ssh://git@github.com/{namespace}/{module}.git`.
    pub repo_clone_url: Option<String>,

    /// Base URL template for the source host.
    pub repo_base_url: Option<String>,

    /// Browse URL template with `{tag}` and `{path}` placeholders.
    pub repo_browse_url: Option<String>,

    /// Template producing the git tag for a version, default `{version}`.
    pub git_tag_format: String,

    /// Optional subdirectory within the repository holding the module.
    pub git_path: Option<String>,

    /// Reference into the configured git-provider list, if any.
    pub git_provider_id: Option<i32>,

    pub verified: bool,

    /// Cached id of the latest published non-beta non-internal version.
    /// Held as a plain integer to break the row-level cycle.
    pub latest_version_id: Option<i32>,

    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Model {
    /// Render the git tag for a version using the configured tag format.
    pub fn tag_for_version(&self, version: &str) -> String {
        self.git_tag_format.replace("{version}", version)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_format_substitution() {
        let model = Model {
            id: 1,
            namespace_id: 1,
            module: "network".into(),
            provider: "aws".into(),
            repo_clone_url: None,
            repo_base_url: None,
            repo_browse_url: None,
            git_tag_format: "v{version}".into(),
            git_path: None,
            git_provider_id: None,
            verified: false,
            latest_version_id: None,
            created_at: chrono::Utc::now(),
        };
        assert_eq!(model.tag_for_version("1.2.0"), "v1.2.0");
    }
}

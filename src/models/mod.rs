//! # Data Models
//!
//! SeaORM entities for every persisted table, plus the small domain enums
//! that type their string-backed columns.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod audit_history;
pub mod example_file;
pub mod gpg_key;
pub mod module_analytics;
pub mod module_details;
pub mod module_provider;
pub mod module_provider_redirect;
pub mod module_version;
pub mod namespace;
pub mod provider;
pub mod provider_analytics;
pub mod provider_binary;
pub mod provider_category;
pub mod provider_version;
pub mod repository;
pub mod session;
pub mod sso_state;
pub mod submodule;
pub mod terraform_idp;
pub mod user_group;
pub mod user_group_namespace_permission;

pub use audit_history::Entity as AuditHistory;
pub use example_file::Entity as ExampleFile;
pub use gpg_key::Entity as GpgKey;
pub use module_analytics::Entity as ModuleAnalytics;
pub use module_details::Entity as ModuleDetails;
pub use module_provider::Entity as ModuleProvider;
pub use module_provider_redirect::Entity as ModuleProviderRedirect;
pub use module_version::Entity as ModuleVersion;
pub use namespace::Entity as Namespace;
pub use provider::Entity as Provider;
pub use provider_analytics::Entity as ProviderAnalytics;
pub use provider_binary::Entity as ProviderBinary;
pub use provider_category::Entity as ProviderCategory;
pub use provider_version::Entity as ProviderVersion;
pub use repository::Entity as Repository;
pub use session::Entity as Session;
pub use sso_state::Entity as SsoState;
pub use submodule::Entity as Submodule;
pub use user_group::Entity as UserGroup;
pub use user_group_namespace_permission::Entity as UserGroupNamespacePermission;

/// Basic service information response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceInfo {
    /// The name of the service
    pub service: String,
    /// The version of the service
    pub version: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service: "tfregistry".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Kind of a namespace, recorded for UI presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum NamespaceType {
    None,
    GithubUser,
    GithubOrg,
}

impl NamespaceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::GithubUser => "github_user",
            Self::GithubOrg => "github_org",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "none" => Some(Self::None),
            "github_user" => Some(Self::GithubUser),
            "github_org" => Some(Self::GithubOrg),
            _ => None,
        }
    }
}

/// Provider tier used for UI badging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ProviderTier {
    Official,
    Partner,
    Community,
}

impl ProviderTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Official => "official",
            Self::Partner => "partner",
            Self::Community => "community",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "official" => Some(Self::Official),
            "partner" => Some(Self::Partner),
            "community" => Some(Self::Community),
            _ => None,
        }
    }
}

/// Permission level a user group holds on a namespace. `Full > Modify > Read`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PermissionLevel {
    Read,
    Modify,
    Full,
}

impl PermissionLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Modify => "modify",
            Self::Full => "full",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "read" => Some(Self::Read),
            "modify" => Some(Self::Modify),
            "full" => Some(Self::Full),
            _ => None,
        }
    }
}

/// Discriminator for rows in the submodules table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SubmoduleKind {
    Submodule,
    Example,
}

impl SubmoduleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submodule => "submodule",
            Self::Example => "example",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "submodule" => Some(Self::Submodule),
            "example" => Some(Self::Example),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_levels_are_ordered() {
        assert!(PermissionLevel::Full > PermissionLevel::Modify);
        assert!(PermissionLevel::Modify > PermissionLevel::Read);
    }

    #[test]
    fn enum_round_trips() {
        for tier in [
            ProviderTier::Official,
            ProviderTier::Partner,
            ProviderTier::Community,
        ] {
            assert_eq!(ProviderTier::parse(tier.as_str()), Some(tier));
        }
        for level in [
            PermissionLevel::Read,
            PermissionLevel::Modify,
            PermissionLevel::Full,
        ] {
            assert_eq!(PermissionLevel::parse(level.as_str()), Some(level));
        }
        assert_eq!(NamespaceType::parse("github_org"), Some(NamespaceType::GithubOrg));
        assert_eq!(NamespaceType::parse("bogus"), None);
    }
}

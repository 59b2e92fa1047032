//! # Authorization Resolver
//!
//! Maps (identity, namespace, action) to allow/deny. Pure apart from one
//! group-permissions read for federated identities; callers run the check
//! before any audited write.

use sea_orm::{ConnectionTrait, DbErr};

use crate::auth::Identity;
use crate::models::PermissionLevel;
use crate::repositories::{NamespaceRepository, UserGroupRepository};

/// The action a request wants to perform against a namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryAction {
    Read,
    Modify,
    Full,
    SiteAdmin,
}

impl RegistryAction {
    /// The minimum permission level that satisfies this action.
    fn required_level(&self) -> Option<PermissionLevel> {
        match self {
            Self::Read => Some(PermissionLevel::Read),
            Self::Modify => Some(PermissionLevel::Modify),
            Self::Full => Some(PermissionLevel::Full),
            // Site admin is never satisfied by a namespace permission.
            Self::SiteAdmin => None,
        }
    }
}

/// Decide whether `identity` may perform `action` against `namespace`.
///
/// The upload token is deliberately absent from the allow arms here: it only
/// authorizes module-version indexing and publishing, which handlers grant
/// through [`can_upload_module_version`].
pub async fn is_allowed<C: ConnectionTrait>(
    conn: &C,
    identity: &Identity,
    namespace: Option<&str>,
    action: RegistryAction,
) -> Result<bool, DbErr> {
    match identity {
        Identity::AdminToken { .. } | Identity::AdminSession { .. } => Ok(true),

        Identity::Anonymous => Ok(action == RegistryAction::Read),

        Identity::PublishToken { namespace: scoped } => Ok(matches!(
            action,
            RegistryAction::Read | RegistryAction::Modify
        ) && namespace == Some(scoped.as_str())),

        Identity::UploadToken => Ok(action == RegistryAction::Read),

        Identity::SamlSession { .. }
        | Identity::OidcSession { .. }
        | Identity::GithubSession { .. } => {
            federated_allowed(conn, identity.groups(), namespace, action).await
        }

        Identity::TerraformOidc { .. }
        | Identity::TerraformAnalyticsToken { .. }
        | Identity::TerraformInternalExtraction
        | Identity::TerraformDeployment => Ok(action == RegistryAction::Read),
    }
}

/// Whether the identity may index or publish module versions in a namespace.
/// The upload static token may do so anywhere; everyone else needs `modify`.
pub async fn can_upload_module_version<C: ConnectionTrait>(
    conn: &C,
    identity: &Identity,
    namespace: &str,
) -> Result<bool, DbErr> {
    if matches!(identity, Identity::UploadToken) {
        return Ok(true);
    }
    is_allowed(conn, identity, Some(namespace), RegistryAction::Modify).await
}

async fn federated_allowed<C: ConnectionTrait>(
    conn: &C,
    group_names: &[String],
    namespace: Option<&str>,
    action: RegistryAction,
) -> Result<bool, DbErr> {
    let groups = UserGroupRepository::find_by_names(conn, group_names).await?;
    if groups.is_empty() {
        return Ok(false);
    }

    if groups.iter().any(|g| g.site_admin) {
        return Ok(true);
    }

    let Some(required) = action.required_level() else {
        return Ok(false);
    };

    let Some(namespace) = namespace else {
        // Actions without a namespace target need site admin.
        return Ok(false);
    };
    let Some(ns) = NamespaceRepository::get_by_name(conn, namespace).await? else {
        return Ok(false);
    };

    let group_ids: Vec<i32> = groups.iter().map(|g| g.id).collect();
    let permissions = UserGroupRepository::find_permissions(conn, &group_ids, ns.id).await?;

    Ok(permissions
        .iter()
        .filter_map(|p| PermissionLevel::parse(&p.permission_type))
        .any(|level| level >= required))
}

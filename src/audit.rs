//! # Audit Recorder
//!
//! Append-only event log bound to mutating domain operations. The insert
//! happens on the caller's open transaction: a failure in either the domain
//! change or the audit insert rolls back both, so the log can never disagree
//! with state.

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ConnectionTrait, DbErr, Set};

use crate::models::audit_history;

/// Closed enumeration of every auditable action. The string form is what is
/// persisted; adding a variant here is the only way to emit a new action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    NamespaceCreate,
    NamespaceModifyName,
    NamespaceModifyDisplayName,
    NamespaceDelete,
    ModuleProviderCreate,
    ModuleProviderDelete,
    ModuleProviderUpdateModuleName,
    ModuleProviderUpdateProviderName,
    ModuleProviderUpdateNamespace,
    ModuleProviderUpdateGitTagFormat,
    ModuleProviderUpdateGitPath,
    ModuleProviderUpdateGitProvider,
    ModuleProviderUpdateRepoCloneUrl,
    ModuleProviderUpdateRepoBaseUrl,
    ModuleProviderUpdateRepoBrowseUrl,
    ModuleProviderUpdateVerified,
    ModuleVersionIndex,
    ModuleVersionPublish,
    ModuleVersionDelete,
    UserGroupCreate,
    UserGroupDelete,
    UserGroupNamespacePermissionAdd,
    UserGroupNamespacePermissionModify,
    UserGroupNamespacePermissionDelete,
    UserLogin,
    GpgKeyCreate,
    GpgKeyDelete,
    ProviderCreate,
    ProviderDelete,
    ProviderVersionIndex,
    ProviderVersionDelete,
    RepositoryCreate,
    RepositoryUpdate,
    RepositoryDelete,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NamespaceCreate => "namespace_create",
            Self::NamespaceModifyName => "namespace_modify_name",
            Self::NamespaceModifyDisplayName => "namespace_modify_display_name",
            Self::NamespaceDelete => "namespace_delete",
            Self::ModuleProviderCreate => "module_provider_create",
            Self::ModuleProviderDelete => "module_provider_delete",
            Self::ModuleProviderUpdateModuleName => "module_provider_update_module_name",
            Self::ModuleProviderUpdateProviderName => "module_provider_update_provider_name",
            Self::ModuleProviderUpdateNamespace => "module_provider_update_namespace",
            Self::ModuleProviderUpdateGitTagFormat => "module_provider_update_git_tag_format",
            Self::ModuleProviderUpdateGitPath => "module_provider_update_git_path",
            Self::ModuleProviderUpdateGitProvider => "module_provider_update_git_provider",
            Self::ModuleProviderUpdateRepoCloneUrl => "module_provider_update_repo_clone_url",
            Self::ModuleProviderUpdateRepoBaseUrl => "module_provider_update_repo_base_url",
            Self::ModuleProviderUpdateRepoBrowseUrl => "module_provider_update_repo_browse_url",
            Self::ModuleProviderUpdateVerified => "module_provider_update_verified",
            Self::ModuleVersionIndex => "module_version_index",
            Self::ModuleVersionPublish => "module_version_publish",
            Self::ModuleVersionDelete => "module_version_delete",
            Self::UserGroupCreate => "user_group_create",
            Self::UserGroupDelete => "user_group_delete",
            Self::UserGroupNamespacePermissionAdd => "user_group_namespace_permission_add",
            Self::UserGroupNamespacePermissionModify => "user_group_namespace_permission_modify",
            Self::UserGroupNamespacePermissionDelete => "user_group_namespace_permission_delete",
            Self::UserLogin => "user_login",
            Self::GpgKeyCreate => "gpg_key_create",
            Self::GpgKeyDelete => "gpg_key_delete",
            Self::ProviderCreate => "provider_create",
            Self::ProviderDelete => "provider_delete",
            Self::ProviderVersionIndex => "provider_version_index",
            Self::ProviderVersionDelete => "provider_version_delete",
            Self::RepositoryCreate => "repository_create",
            Self::RepositoryUpdate => "repository_update",
            Self::RepositoryDelete => "repository_delete",
        }
    }
}

/// One audit event. `old_value` / `new_value` are short textual
/// representations; multi-field updates serialize as JSON.
pub struct AuditEvent<'a> {
    pub username: &'a str,
    pub action: AuditAction,
    pub object_type: &'a str,
    pub object_id: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

/// Insert an audit row on the caller's connection. Callers run this inside
/// the same transaction as the domain change; the error must propagate so the
/// transaction rolls back.
pub async fn record<C: ConnectionTrait>(conn: &C, event: AuditEvent<'_>) -> Result<(), DbErr> {
    let row = audit_history::ActiveModel {
        timestamp: Set(Utc::now()),
        username: Set(event.username.to_string()),
        action: Set(event.action.as_str().to_string()),
        object_type: Set(event.object_type.to_string()),
        object_id: Set(event.object_id),
        old_value: Set(event.old_value),
        new_value: Set(event.new_value),
        ..Default::default()
    };

    row.insert(conn).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_strings_are_snake_case_and_unique() {
        let actions = [
            AuditAction::NamespaceCreate,
            AuditAction::NamespaceModifyName,
            AuditAction::NamespaceModifyDisplayName,
            AuditAction::NamespaceDelete,
            AuditAction::ModuleProviderCreate,
            AuditAction::ModuleProviderDelete,
            AuditAction::ModuleProviderUpdateModuleName,
            AuditAction::ModuleProviderUpdateProviderName,
            AuditAction::ModuleProviderUpdateNamespace,
            AuditAction::ModuleProviderUpdateGitTagFormat,
            AuditAction::ModuleProviderUpdateGitPath,
            AuditAction::ModuleProviderUpdateGitProvider,
            AuditAction::ModuleProviderUpdateRepoCloneUrl,
            AuditAction::ModuleProviderUpdateRepoBaseUrl,
            AuditAction::ModuleProviderUpdateRepoBrowseUrl,
            AuditAction::ModuleProviderUpdateVerified,
            AuditAction::ModuleVersionIndex,
            AuditAction::ModuleVersionPublish,
            AuditAction::ModuleVersionDelete,
            AuditAction::UserGroupCreate,
            AuditAction::UserGroupDelete,
            AuditAction::UserGroupNamespacePermissionAdd,
            AuditAction::UserGroupNamespacePermissionModify,
            AuditAction::UserGroupNamespacePermissionDelete,
            AuditAction::UserLogin,
            AuditAction::GpgKeyCreate,
            AuditAction::GpgKeyDelete,
            AuditAction::ProviderCreate,
            AuditAction::ProviderDelete,
            AuditAction::ProviderVersionIndex,
            AuditAction::ProviderVersionDelete,
            AuditAction::RepositoryCreate,
            AuditAction::RepositoryUpdate,
            AuditAction::RepositoryDelete,
        ];

        let mut seen = std::collections::HashSet::new();
        for action in actions {
            let s = action.as_str();
            assert!(s.chars().all(|c| c.is_ascii_lowercase() || c == '_'), "{s}");
            assert!(seen.insert(s), "duplicate action string {s}");
        }
    }

    #[test]
    fn rename_action_matches_protocol_contract() {
        assert_eq!(
            AuditAction::ModuleProviderUpdateModuleName.as_str(),
            "module_provider_update_module_name"
        );
    }
}

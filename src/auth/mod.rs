//! # Authentication
//!
//! Identity kinds, the resolver chain that turns request credentials into an
//! [`Identity`], and session management.

pub mod middleware;
pub mod session;

use serde::{Deserialize, Serialize};

/// Every identity kind the registry recognizes. Resolvers run in a fixed
/// order (Authorization bearer, `X-Terraform-Session`, cookie session,
/// anonymous) and the first match wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Identity {
    Anonymous,
    AdminToken {
        username: String,
    },
    UploadToken,
    PublishToken {
        namespace: String,
    },
    AdminSession {
        username: String,
    },
    SamlSession {
        username: String,
        groups: Vec<String>,
    },
    OidcSession {
        username: String,
        groups: Vec<String>,
    },
    GithubSession {
        username: String,
        organizations: Vec<String>,
    },
    TerraformOidc {
        username: String,
    },
    TerraformAnalyticsToken {
        environment: String,
    },
    TerraformInternalExtraction,
    TerraformDeployment,
}

impl Identity {
    /// The name recorded in audit rows for this identity.
    pub fn username(&self) -> String {
        match self {
            Self::Anonymous => "anonymous".to_string(),
            Self::AdminToken { username } | Self::AdminSession { username } => username.clone(),
            Self::UploadToken => "upload-token".to_string(),
            Self::PublishToken { namespace } => format!("publish-token:{namespace}"),
            Self::SamlSession { username, .. }
            | Self::OidcSession { username, .. }
            | Self::GithubSession { username, .. }
            | Self::TerraformOidc { username } => username.clone(),
            Self::TerraformAnalyticsToken { .. } => "terraform-analytics".to_string(),
            Self::TerraformInternalExtraction => "terraform-extraction".to_string(),
            Self::TerraformDeployment => "terraform-deployment".to_string(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        !matches!(self, Self::Anonymous)
    }

    /// Whether this identity is a full administrator.
    pub fn is_admin(&self) -> bool {
        matches!(self, Self::AdminToken { .. } | Self::AdminSession { .. })
    }

    /// Group memberships for federated identities; GitHub organizations act
    /// as groups for permission mapping.
    pub fn groups(&self) -> &[String] {
        match self {
            Self::SamlSession { groups, .. } | Self::OidcSession { groups, .. } => groups,
            Self::GithubSession { organizations, .. } => organizations,
            _ => &[],
        }
    }

    /// Identities that suppress analytics recording on download.
    pub fn suppresses_analytics(&self) -> bool {
        matches!(self, Self::TerraformInternalExtraction)
    }

    /// The string stored in the session row's auth_method column.
    pub fn session_auth_method(&self) -> Option<&'static str> {
        match self {
            Self::AdminSession { .. } => Some("admin"),
            Self::SamlSession { .. } => Some("saml"),
            Self::OidcSession { .. } => Some("oidc"),
            Self::GithubSession { .. } => Some("github"),
            _ => None,
        }
    }
}

/// Request extension carrying the resolved identity plus, for cookie and
/// header sessions, the backing session id.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub identity: Identity,
    pub session_id: Option<String>,
}

impl AuthContext {
    pub fn anonymous() -> Self {
        Self {
            identity: Identity::Anonymous,
            session_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audit_usernames() {
        assert_eq!(
            Identity::AdminToken {
                username: "admin".into()
            }
            .username(),
            "admin"
        );
        assert_eq!(
            Identity::PublishToken {
                namespace: "acme".into()
            }
            .username(),
            "publish-token:acme"
        );
        assert_eq!(Identity::Anonymous.username(), "anonymous");
    }

    #[test]
    fn github_organizations_act_as_groups() {
        let identity = Identity::GithubSession {
            username: "octocat".into(),
            organizations: vec!["acme-org".into()],
        };
        assert_eq!(identity.groups(), ["acme-org".to_string()]);
    }

    #[test]
    fn internal_extraction_suppresses_analytics() {
        assert!(Identity::TerraformInternalExtraction.suppresses_analytics());
        assert!(
            !Identity::TerraformOidc {
                username: "user".into()
            }
            .suppresses_analytics()
        );
    }
}

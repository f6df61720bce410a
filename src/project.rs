//! Remote project snapshots.

/// A project's configuration as reported by the remote service.
///
/// Fetched fresh for every issuance; never cached between passes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteProject {
    /// Project name.
    pub name: String,

    /// Optional human description.
    pub description: Option<String>,

    /// Roles defined on the project.
    pub roles: Vec<ProjectRole>,
}

/// A role defined on a remote project.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectRole {
    /// Role name.
    pub name: String,

    /// Optional human description.
    pub description: Option<String>,

    /// Access policies bound to the role.
    pub policies: Vec<String>,

    /// Identity-provider groups bound to the role.
    pub groups: Vec<String>,

    /// Tokens the remote service has issued for this role.
    pub tokens: Vec<IssuedTokenRecord>,
}

/// Remote bookkeeping for an issued token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IssuedTokenRecord {
    /// Issued-at, Unix seconds. Tokens are revoked by this value.
    pub issued_at: i64,

    /// Expires-at, Unix seconds, absent for tokens that never expire.
    pub expires_at: Option<i64>,
}

impl RemoteProject {
    /// Look up a role by exact, case-sensitive name. The first match wins.
    #[must_use]
    pub fn role(&self, name: &str) -> Option<&ProjectRole> {
        self.roles.iter().find(|role| role.name == name)
    }

    /// Whether a role with exactly this name exists.
    #[must_use]
    pub fn has_role(&self, name: &str) -> bool {
        self.role(name).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project() -> RemoteProject {
        RemoteProject {
            name: "default".to_string(),
            description: None,
            roles: vec![
                ProjectRole {
                    name: "deployer".to_string(),
                    policies: vec!["p, proj:default:deployer, applications, sync, default/*, allow".to_string()],
                    ..ProjectRole::default()
                },
                ProjectRole {
                    name: "deployer".to_string(),
                    description: Some("shadowed".to_string()),
                    ..ProjectRole::default()
                },
            ],
        }
    }

    #[test]
    fn role_lookup_is_exact() {
        let project = project();

        assert!(project.has_role("deployer"));
        assert!(!project.has_role("Deployer"));
        assert!(!project.has_role("deployer "));
        assert!(!project.has_role(""));
    }

    #[test]
    fn first_matching_role_wins() {
        let project = project();

        assert_eq!(
            project.role("deployer").map(|role| role.description.clone()),
            Some(None)
        );
    }
}

//! Roles and role providers.
//!
//! A [`Role`] is a named set of permission strings. Roles reach the access
//! controller through a [`RoleProvider`]; the built-in
//! [`ConfigRoleProvider`] is populated from the `auth.roles` section of the
//! kernel configuration, but a provider backed by a database or directory
//! service plugs in the same way.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// A named set of permissions.
///
/// Deserializes from configuration:
///
/// ```toml
/// [[auth.roles]]
/// name = "operator"
/// permissions = ["kernel.module.enable", "kernel.module.disable"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Role name, unique within a provider.
    pub name: String,

    /// Permissions granted by this role. May contain wildcards (`X.*`).
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl Role {
    /// Creates a role with the given name and permissions.
    #[must_use]
    pub fn new<N, P, S>(name: N, permissions: P) -> Self
    where
        N: Into<String>,
        P: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            permissions: permissions.into_iter().map(Into::into).collect(),
        }
    }
}

/// Source of role definitions.
///
/// Implementations must be cheap to query; the access controller calls
/// [`role`](Self::role) on every provider-mode permission check.
pub trait RoleProvider: Send + Sync {
    /// Resolves a role by name.
    fn role(&self, name: &str) -> Option<Role>;
}

/// Role provider backed by configuration.
///
/// Later definitions with the same name win, matching layered config
/// semantics.
#[derive(Debug, Default)]
pub struct ConfigRoleProvider {
    roles: RwLock<HashMap<String, Role>>,
}

impl ConfigRoleProvider {
    /// Builds a provider from a list of role definitions.
    #[must_use]
    pub fn new(roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            roles: RwLock::new(roles.into_iter().map(|r| (r.name.clone(), r)).collect()),
        }
    }

    /// Replaces every role definition, used on configuration reload.
    pub fn replace(&self, roles: impl IntoIterator<Item = Role>) {
        *self.roles.write() = roles.into_iter().map(|r| (r.name.clone(), r)).collect();
    }
}

impl RoleProvider for ConfigRoleProvider {
    fn role(&self, name: &str) -> Option<Role> {
        self.roles.read().get(name).cloned()
    }
}

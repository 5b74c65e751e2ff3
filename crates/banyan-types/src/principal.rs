//! Principal (actor identity) types.
//!
//! A [`Principal`] represents the actor performing an action, separating
//! "who is acting" from "what they are allowed to do".
//!
//! # Design Rationale
//!
//! Principal lives in `banyan-types` (not `banyan-auth`) because:
//!
//! 1. **Component boundary**: modules and gateways receive a [`Context`]
//!    carrying a Principal without depending on permission logic
//! 2. **No auth logic dependency**: Principal is pure identity
//! 3. **Avoid circular dependency**: Registry -> Auth -> Types would
//!    otherwise loop
//!
//! Permission checking (roles, wildcards) stays in `banyan-auth`.
//!
//! [`Context`]: crate::Context

use serde::{Deserialize, Serialize};

/// The actor performing an action.
///
/// A Principal is identity only, not permission level. Whether a given
/// principal may perform an operation is decided by the access controller
/// from the principal's role names.
///
/// # Kinds
///
/// | Kind | Description | Typical Use |
/// |------|-------------|-------------|
/// | `user` | Human operator | CLI commands |
/// | `module` | A managed module acting on its own behalf | Service lookups |
/// | `gateway` | A managed gateway | Service lookups |
/// | `system` | Internal privileged callers | Plugin loading, dev tooling |
///
/// The kind is an open string rather than an enum so that embedders can
/// introduce their own actor categories without a type change here.
///
/// # Immutability
///
/// A Principal is immutable once constructed; there are no setters. Role
/// order is preserved and duplicates are allowed but semantically
/// irrelevant.
///
/// # Example
///
/// ```
/// use banyan_types::Principal;
///
/// let admin = Principal::new("admin", "user", ["kernel.module.*"]);
/// assert_eq!(admin.id(), "admin");
/// assert_eq!(admin.kind(), "user");
/// assert_eq!(admin.roles(), ["kernel.module.*"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    id: String,
    kind: String,
    roles: Vec<String>,
}

impl Principal {
    /// Creates a new principal with the given identity and role names.
    #[must_use]
    pub fn new<I, K, R, S>(id: I, kind: K, roles: R) -> Self
    where
        I: Into<String>,
        K: Into<String>,
        R: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            kind: kind.into(),
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    /// Creates a system principal holding the `kernel.module.*` wildcard.
    ///
    /// Privileged internal callers (plugin loading, dev tooling) use this
    /// so that module add/remove/enable/disable checks succeed.
    #[must_use]
    pub fn system(id: impl Into<String>) -> Self {
        Self::new(id, "system", ["kernel.module.*"])
    }

    /// Returns the stable unique identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the principal kind (e.g. "user", "module", "system").
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Returns the role names assigned to this principal, in order.
    #[must_use]
    pub fn roles(&self) -> &[String] {
        &self.roles
    }
}

impl std::fmt::Display for Principal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

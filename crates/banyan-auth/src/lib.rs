//! Role-based access control for the Banyan kernel.
//!
//! Permissions are dotted identifier strings (`kernel.module.add`,
//! `service.billing.invoices.access`). A role is a named set of
//! permissions; a principal carries role names; the [`AccessController`]
//! decides whether a principal holds a permission.
//!
//! # Permission Model
//!
//! ```text
//! Principal ──roles──► ["ops", "kernel.module.*"]
//!                          │           │
//!                          │           └── role name as wildcard grant
//!                          ▼
//!                    RoleProvider ──► Role { permissions: [...] }
//! ```
//!
//! A check passes when any of:
//!
//! 1. A role name equals the permission exactly (role-as-permission)
//! 2. A role name is a wildcard `X.*` and the permission starts with `X.`
//! 3. A provider-resolved role contains the permission or a matching
//!    wildcard
//!
//! # Two Modes
//!
//! | Mode | Construction | Behavior |
//! |------|--------------|----------|
//! | Null | [`AccessController::allow_all`] | Every check returns `true` |
//! | Provider | [`AccessController::with_provider`] | Role-based decisions |
//!
//! Null mode exists for development and uncontrolled setups only.
//!
//! # Injection Safety
//!
//! Dynamic permission components (event types, config keys, module names)
//! are sanitized before being embedded into permission strings: any
//! character outside `[A-Za-z0-9.-]` becomes `_`, so user-supplied values
//! cannot smuggle dots or wildcards into a grant. See
//! [`permission::sanitize_component`].

pub mod controller;
pub mod permission;
pub mod role;

pub use controller::AccessController;
pub use permission::{sanitize_component, wildcard_matches};
pub use role::{ConfigRoleProvider, Role, RoleProvider};

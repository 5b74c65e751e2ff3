//! The access controller: permission decisions for privileged operations.

use std::sync::Arc;

use banyan_types::Principal;
use tracing::debug;

use crate::permission::{sanitize_component, wildcard_matches};
use crate::role::RoleProvider;

/// Stateless permission decision engine.
///
/// # Modes
///
/// - **Null mode** ([`allow_all`](Self::allow_all)): no provider, every
///   check returns `true`. Development and uncontrolled setups only.
/// - **Provider mode** ([`with_provider`](Self::with_provider)):
///   [`has_permission`](Self::has_permission) evaluates the principal's
///   role names directly (exact and wildcard) and then the roles resolved
///   by the provider.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use banyan_auth::{AccessController, ConfigRoleProvider, Role};
/// use banyan_types::Principal;
///
/// let provider = ConfigRoleProvider::new([Role::new("ops", ["core.log"])]);
/// let ac = AccessController::with_provider(Arc::new(provider));
///
/// let operator = Principal::new("op-1", "user", ["ops"]);
/// assert!(ac.has_permission(&operator, "core.log"));
/// assert!(!ac.has_permission(&operator, "kernel.module.add"));
///
/// let admin = Principal::new("root", "user", ["kernel.module.*"]);
/// assert!(ac.has_permission(&admin, "kernel.module.add"));
/// ```
#[derive(Clone, Default)]
pub struct AccessController {
    provider: Option<Arc<dyn RoleProvider>>,
}

impl AccessController {
    /// Creates a controller that grants every permission.
    #[must_use]
    pub fn allow_all() -> Self {
        Self { provider: None }
    }

    /// Creates a controller enforcing roles from the given provider.
    #[must_use]
    pub fn with_provider(provider: Arc<dyn RoleProvider>) -> Self {
        Self {
            provider: Some(provider),
        }
    }

    /// Returns `true` when running in null (allow-all) mode.
    #[must_use]
    pub fn is_permissive(&self) -> bool {
        self.provider.is_none()
    }

    /// Checks whether the principal holds the given permission.
    ///
    /// Grants are found in three places, checked in order:
    ///
    /// 1. a role name equal to `permission` (role-as-permission)
    /// 2. a wildcard role name `X.*` with `permission` under `X.`
    /// 3. a provider-resolved role containing `permission` or a covering
    ///    wildcard
    #[must_use]
    pub fn has_permission(&self, principal: &Principal, permission: &str) -> bool {
        let Some(provider) = &self.provider else {
            return true;
        };

        for role_name in principal.roles() {
            if wildcard_matches(role_name, permission) {
                return true;
            }
        }

        for role_name in principal.roles() {
            if let Some(role) = provider.role(role_name) {
                for granted in &role.permissions {
                    if wildcard_matches(granted, permission) {
                        return true;
                    }
                }
            }
        }

        debug!(principal = %principal, permission, "permission denied");
        false
    }

    /// Whether the principal may emit log entries.
    #[must_use]
    pub fn can_log(&self, principal: &Principal) -> bool {
        self.has_permission(principal, "core.log")
    }

    /// Whether the principal may access or modify metrics.
    #[must_use]
    pub fn can_access_metrics(&self, principal: &Principal) -> bool {
        self.has_permission(principal, "core.metrics.access")
    }

    /// Whether the principal may publish events of the given type.
    #[must_use]
    pub fn can_publish_event(&self, principal: &Principal, event_type: &str) -> bool {
        let perm = format!("core.events.publish.{}", sanitize_component(event_type));
        self.has_permission(principal, &perm)
    }

    /// Whether the principal may subscribe to events of the given type.
    #[must_use]
    pub fn can_subscribe_event(&self, principal: &Principal, event_type: &str) -> bool {
        let perm = format!("core.events.subscribe.{}", sanitize_component(event_type));
        self.has_permission(principal, &perm)
    }

    /// Whether the principal may read the given configuration key.
    #[must_use]
    pub fn can_access_config(&self, principal: &Principal, config_key: &str) -> bool {
        let perm = format!("core.config.access.{}", sanitize_component(config_key));
        self.has_permission(principal, &perm)
    }

    /// Whether the principal may trigger a reload of the given module.
    #[must_use]
    pub fn can_reload_module(&self, principal: &Principal, module: &str) -> bool {
        let perm = format!("core.module.reload.{}", sanitize_component(module));
        self.has_permission(principal, &perm)
    }
}

impl std::fmt::Debug for AccessController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessController")
            .field("mode", if self.is_permissive() { &"allow-all" } else { &"provider" })
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::role::{ConfigRoleProvider, Role};

    fn provider_controller(roles: Vec<Role>) -> AccessController {
        AccessController::with_provider(Arc::new(ConfigRoleProvider::new(roles)))
    }

    #[test]
    fn allow_all_grants_everything() {
        let ac = AccessController::allow_all();
        let nobody = Principal::new("x", "user", Vec::<String>::new());

        assert!(ac.is_permissive());
        assert!(ac.has_permission(&nobody, "kernel.module.add"));
        assert!(ac.can_log(&nobody));
        assert!(ac.can_reload_module(&nobody, "anything"));
    }

    #[test]
    fn role_as_permission() {
        let ac = provider_controller(vec![]);
        let p = Principal::new("x", "user", ["kernel.module.add"]);

        assert!(ac.has_permission(&p, "kernel.module.add"));
        assert!(!ac.has_permission(&p, "kernel.module.remove"));
    }

    #[test]
    fn wildcard_role_name() {
        let ac = provider_controller(vec![]);
        let p = Principal::new("x", "system", ["kernel.module.*"]);

        assert!(ac.has_permission(&p, "kernel.module.add"));
        assert!(ac.has_permission(&p, "kernel.module.remove"));
        assert!(ac.has_permission(&p, "kernel.module.enable"));
        assert!(!ac.has_permission(&p, "kernel.gateway.add"));
    }

    #[test]
    fn provider_role_grants() {
        let ac = provider_controller(vec![Role::new("ops", ["core.log", "core.events.*"])]);
        let p = Principal::new("x", "user", ["ops"]);

        assert!(ac.has_permission(&p, "core.log"));
        assert!(ac.has_permission(&p, "core.events.publish.test"));
        assert!(!ac.has_permission(&p, "core.metrics.access"));
    }

    #[test]
    fn unknown_role_grants_nothing() {
        let ac = provider_controller(vec![]);
        let p = Principal::new("x", "user", ["ghost-role"]);

        assert!(!ac.has_permission(&p, "core.log"));
    }

    #[test]
    fn helpers_derive_documented_permissions() {
        let ac = provider_controller(vec![Role::new(
            "granular",
            [
                "core.log",
                "core.metrics.access",
                "core.events.publish.user.login",
                "core.events.subscribe.user.login",
                "core.config.access.db-url",
                "core.module.reload.billing",
            ],
        )]);
        let p = Principal::new("x", "user", ["granular"]);

        assert!(ac.can_log(&p));
        assert!(ac.can_access_metrics(&p));
        assert!(ac.can_publish_event(&p, "user.login"));
        assert!(ac.can_subscribe_event(&p, "user.login"));
        assert!(ac.can_access_config(&p, "db-url"));
        assert!(ac.can_reload_module(&p, "billing"));

        assert!(!ac.can_publish_event(&p, "user.logout"));
        assert!(!ac.can_reload_module(&p, "payments"));
    }

    #[test]
    fn dynamic_components_are_sanitized() {
        // A grant on the sanitized form matches the raw input, and a raw
        // wildcard suffix cannot widen the check.
        let ac = provider_controller(vec![Role::new(
            "ops",
            ["core.events.publish.weird_topic"],
        )]);
        let p = Principal::new("x", "user", ["ops"]);

        assert!(ac.can_publish_event(&p, "weird topic"));
        assert!(ac.can_publish_event(&p, "weird_topic"));
        assert!(!ac.can_publish_event(&p, "weird.*"));
    }

    #[test]
    fn sanitization_decision_is_stable() {
        let ac = provider_controller(vec![Role::new("ops", ["core.config.access.a_b"])]);
        let p = Principal::new("x", "user", ["ops"]);

        let raw = "a b";
        let pre_sanitized = sanitize_component(raw);
        assert_eq!(
            ac.can_access_config(&p, raw),
            ac.can_access_config(&p, &pre_sanitized)
        );
    }
}

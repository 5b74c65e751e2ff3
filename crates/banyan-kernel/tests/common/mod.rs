//! Shared helpers for kernel integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use banyan_auth::AccessController;
use banyan_kernel::{Kernel, KernelConfig};
use banyan_types::{Context, Principal};

/// Context carrying a system principal with the `kernel.module.*` wildcard.
pub fn system_ctx() -> Context {
    Context::new().with_principal(Principal::system("test"))
}

/// Context carrying a user principal with the given role names.
pub fn user_ctx(roles: &[&str]) -> Context {
    Context::new().with_principal(Principal::new("tester", "user", roles.to_vec()))
}

/// Kernel with an allow-all controller and the given TOML configuration.
pub fn kernel_with_config(toml: &str) -> Kernel {
    Kernel::new(KernelConfig::from_toml(toml).expect("valid test config"))
}

/// Kernel enforcing the roles declared in the given TOML configuration.
pub fn rbac_kernel(toml: &str) -> Kernel {
    let config = KernelConfig::from_toml(toml).expect("valid test config");
    let provider = Arc::new(config.role_provider());
    Kernel::with_access(config, Arc::new(AccessController::with_provider(provider)))
}

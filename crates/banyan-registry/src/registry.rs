//! The service registry implementation.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use banyan_auth::AccessController;
use banyan_types::Context;
use parking_lot::RwLock;
use tracing::warn;

use crate::RegistryError;

/// Opaque registered value; callers downcast to the expected type.
pub type ServiceValue = Arc<dyn Any + Send + Sync>;

#[derive(Clone)]
struct Entry {
    value: ServiceValue,
    owner: String,
}

#[derive(Default)]
struct Maps {
    services: HashMap<String, Entry>,
    gateways: HashMap<String, Entry>,
}

/// Name → value mapping for services and gateway handles.
///
/// Registration is unauthenticated (only the kernel and starting modules
/// hold a reference at registration time); lookup requires a principal in
/// the context and the corresponding access permission.
pub struct ServiceRegistry {
    access: Arc<AccessController>,
    maps: RwLock<Maps>,
}

impl ServiceRegistry {
    /// Creates a registry enforcing lookups with the given controller.
    #[must_use]
    pub fn new(access: Arc<AccessController>) -> Self {
        Self {
            access,
            maps: RwLock::new(Maps::default()),
        }
    }

    /// Registers a service under a unique name, recording the owning module.
    ///
    /// # Errors
    ///
    /// [`RegistryError::DuplicateService`] if the name is taken.
    pub fn register_service(
        &self,
        name: &str,
        value: ServiceValue,
        owner: &str,
    ) -> Result<(), RegistryError> {
        let mut maps = self.maps.write();
        if maps.services.contains_key(name) {
            return Err(RegistryError::DuplicateService(name.to_string()));
        }
        maps.services.insert(
            name.to_string(),
            Entry {
                value,
                owner: owner.to_string(),
            },
        );
        Ok(())
    }

    /// Registers a gateway handle under the gateway's name.
    ///
    /// Gateways own themselves: the owner recorded for a gateway entry is
    /// its own name.
    ///
    /// # Errors
    ///
    /// [`RegistryError::DuplicateGateway`] if the name is taken.
    pub fn register_gateway(&self, name: &str, value: ServiceValue) -> Result<(), RegistryError> {
        let mut maps = self.maps.write();
        if maps.gateways.contains_key(name) {
            return Err(RegistryError::DuplicateGateway(name.to_string()));
        }
        maps.gateways.insert(
            name.to_string(),
            Entry {
                value,
                owner: name.to_string(),
            },
        );
        Ok(())
    }

    /// Looks up a service, enforcing `service.<owner>.<name>.access`.
    ///
    /// # Errors
    ///
    /// [`RegistryError::ServiceNotFound`] for unknown names,
    /// [`RegistryError::MissingPrincipal`] when the context carries no
    /// identity, [`RegistryError::Unauthorized`] when the permission check
    /// fails.
    pub fn get_service(&self, ctx: &Context, name: &str) -> Result<ServiceValue, RegistryError> {
        let entry = {
            let maps = self.maps.read();
            maps.services.get(name).cloned()
        };
        let Some(entry) = entry else {
            return Err(RegistryError::ServiceNotFound(name.to_string()));
        };

        let Some(principal) = ctx.principal() else {
            return Err(RegistryError::MissingPrincipal {
                name: name.to_string(),
            });
        };

        let permission = format!("service.{}.{}.access", entry.owner, name);
        if !self.access.has_permission(principal, &permission) {
            warn!(service = name, principal = %principal, %permission, "service access denied");
            return Err(RegistryError::Unauthorized {
                principal: principal.to_string(),
                name: name.to_string(),
                permission,
            });
        }

        Ok(entry.value)
    }

    /// Looks up a gateway handle, enforcing `gateway.<name>.access`.
    ///
    /// # Errors
    ///
    /// Analogous to [`get_service`](Self::get_service).
    pub fn get_gateway(&self, ctx: &Context, name: &str) -> Result<ServiceValue, RegistryError> {
        let entry = {
            let maps = self.maps.read();
            maps.gateways.get(name).cloned()
        };
        let Some(entry) = entry else {
            return Err(RegistryError::GatewayNotFound(name.to_string()));
        };

        let Some(principal) = ctx.principal() else {
            return Err(RegistryError::MissingPrincipal {
                name: name.to_string(),
            });
        };

        let permission = format!("gateway.{name}.access");
        if !self.access.has_permission(principal, &permission) {
            warn!(gateway = name, principal = %principal, %permission, "gateway access denied");
            return Err(RegistryError::Unauthorized {
                principal: principal.to_string(),
                name: name.to_string(),
                permission,
            });
        }

        Ok(entry.value)
    }

    /// Removes a service entry. Idempotent.
    pub fn unregister_service(&self, name: &str) {
        self.maps.write().services.remove(name);
    }

    /// Removes a gateway entry. Idempotent.
    pub fn unregister_gateway(&self, name: &str) {
        self.maps.write().gateways.remove(name);
    }

    /// Removes every service (and gateway entry) owned by a module.
    pub fn unregister_services_by_module(&self, module: &str) {
        let mut maps = self.maps.write();
        maps.services.retain(|_, entry| entry.owner != module);
        maps.gateways.retain(|_, entry| entry.owner != module);
    }

    /// Returns whether a service entry exists, without an access check.
    ///
    /// Diagnostic only; holders of a registry reference can already
    /// enumerate registrations.
    #[must_use]
    pub fn contains_service(&self, name: &str) -> bool {
        self.maps.read().services.contains_key(name)
    }

    /// Returns whether a gateway entry exists, without an access check.
    #[must_use]
    pub fn contains_gateway(&self, name: &str) -> bool {
        self.maps.read().gateways.contains_key(name)
    }

    /// Registered service names in lexicographic order.
    #[must_use]
    pub fn service_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.maps.read().services.keys().cloned().collect();
        names.sort();
        names
    }
}

//! Registry layer errors.
//!
//! # Error Code Convention
//!
//! All registry errors use the `REGISTRY_` prefix:
//!
//! | Error | Code | Recoverable |
//! |-------|------|-------------|
//! | [`DuplicateService`](RegistryError::DuplicateService) | `REGISTRY_DUPLICATE_SERVICE` | No |
//! | [`DuplicateGateway`](RegistryError::DuplicateGateway) | `REGISTRY_DUPLICATE_GATEWAY` | No |
//! | [`ServiceNotFound`](RegistryError::ServiceNotFound) | `REGISTRY_SERVICE_NOT_FOUND` | Yes |
//! | [`GatewayNotFound`](RegistryError::GatewayNotFound) | `REGISTRY_GATEWAY_NOT_FOUND` | Yes |
//! | [`MissingPrincipal`](RegistryError::MissingPrincipal) | `REGISTRY_MISSING_PRINCIPAL` | No |
//! | [`Unauthorized`](RegistryError::Unauthorized) | `REGISTRY_UNAUTHORIZED` | No |
//!
//! Not-found errors are recoverable because the target may be registered
//! by the time the caller retries (e.g. while its owning module is still
//! starting).

use banyan_types::ErrorCode;
use thiserror::Error;

/// Registry layer error.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// A service with this name is already registered.
    #[error("service '{0}' already registered")]
    DuplicateService(String),

    /// A gateway with this name is already registered.
    #[error("gateway '{0}' already registered")]
    DuplicateGateway(String),

    /// No service registered under this name.
    #[error("service '{0}' not found")]
    ServiceNotFound(String),

    /// No gateway registered under this name.
    #[error("gateway '{0}' not found")]
    GatewayNotFound(String),

    /// The lookup context carried no principal.
    ///
    /// Lookups without identity are always denied; there is no anonymous
    /// fallback.
    #[error("no principal in context for access check on '{name}'")]
    MissingPrincipal {
        /// Name of the service or gateway being looked up.
        name: String,
    },

    /// The principal lacks the permission guarding this entry.
    #[error("principal {principal} is not authorized for '{name}' (missing permission: {permission})")]
    Unauthorized {
        /// Display form of the denied principal.
        principal: String,
        /// Name of the service or gateway.
        name: String,
        /// The permission that was required.
        permission: String,
    },
}

impl ErrorCode for RegistryError {
    fn code(&self) -> &'static str {
        match self {
            Self::DuplicateService(_) => "REGISTRY_DUPLICATE_SERVICE",
            Self::DuplicateGateway(_) => "REGISTRY_DUPLICATE_GATEWAY",
            Self::ServiceNotFound(_) => "REGISTRY_SERVICE_NOT_FOUND",
            Self::GatewayNotFound(_) => "REGISTRY_GATEWAY_NOT_FOUND",
            Self::MissingPrincipal { .. } => "REGISTRY_MISSING_PRINCIPAL",
            Self::Unauthorized { .. } => "REGISTRY_UNAUTHORIZED",
        }
    }

    fn is_recoverable(&self) -> bool {
        matches!(self, Self::ServiceNotFound(_) | Self::GatewayNotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use banyan_types::assert_error_codes;

    fn all_variants() -> Vec<RegistryError> {
        vec![
            RegistryError::DuplicateService("x".into()),
            RegistryError::DuplicateGateway("x".into()),
            RegistryError::ServiceNotFound("x".into()),
            RegistryError::GatewayNotFound("x".into()),
            RegistryError::MissingPrincipal { name: "x".into() },
            RegistryError::Unauthorized {
                principal: "user:x".into(),
                name: "x".into(),
                permission: "p".into(),
            },
        ]
    }

    #[test]
    fn all_error_codes_valid() {
        assert_error_codes(&all_variants(), "REGISTRY_");
    }

    #[test]
    fn unauthorized_names_the_permission() {
        let err = RegistryError::Unauthorized {
            principal: "user:bob".into(),
            name: "billing".into(),
            permission: "service.billing.invoices.access".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("user:bob"));
        assert!(msg.contains("service.billing.invoices.access"));
    }

    #[test]
    fn recoverability() {
        assert!(RegistryError::ServiceNotFound("x".into()).is_recoverable());
        assert!(!RegistryError::MissingPrincipal { name: "x".into() }.is_recoverable());
    }
}

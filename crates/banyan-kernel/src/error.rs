//! Kernel layer errors.
//!
//! Every failure surfaced by the kernel is wrapped with enough context to
//! identify the component, the operation, and (for security errors) the
//! principal involved. The kernel itself never panics: component panics
//! are trapped and converted into [`KernelError::Panic`].
//!
//! # Error Code Convention
//!
//! All kernel errors use the `KERNEL_` prefix:
//!
//! | Error | Code | Recoverable |
//! |-------|------|-------------|
//! | [`EmptyName`](KernelError::EmptyName) | `KERNEL_EMPTY_NAME` | No |
//! | [`Duplicate`](KernelError::Duplicate) | `KERNEL_DUPLICATE` | No |
//! | [`NotFound`](KernelError::NotFound) | `KERNEL_NOT_FOUND` | No |
//! | [`AlreadyRunning`](KernelError::AlreadyRunning) | `KERNEL_ALREADY_RUNNING` | No |
//! | [`NotRunning`](KernelError::NotRunning) | `KERNEL_NOT_RUNNING` | No |
//! | [`MissingPrincipal`](KernelError::MissingPrincipal) | `KERNEL_MISSING_PRINCIPAL` | No |
//! | [`PermissionDenied`](KernelError::PermissionDenied) | `KERNEL_PERMISSION_DENIED` | No |
//! | [`Dependency`](KernelError::Dependency) | `KERNEL_DEPENDENCY` | No |
//! | [`Lifecycle`](KernelError::Lifecycle) | `KERNEL_LIFECYCLE` | Yes |
//! | [`Panic`](KernelError::Panic) | `KERNEL_PANIC` | No |
//! | [`Timeout`](KernelError::Timeout) | `KERNEL_TIMEOUT` | Yes |
//! | [`Registry`](KernelError::Registry) | `KERNEL_REGISTRY` | No |
//! | [`Rollback`](KernelError::Rollback) | `KERNEL_ROLLBACK` | No |
//! | [`Cancelled`](KernelError::Cancelled) | `KERNEL_CANCELLED` | No |

use std::time::Duration;

use banyan_component::ComponentError;
use banyan_registry::RegistryError;
use banyan_types::ErrorCode;
use thiserror::Error;

use crate::DependencyError;

/// Which kind of component an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentKind {
    /// A managed module.
    Module,
    /// A managed gateway.
    Gateway,
}

impl std::fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Module => write!(f, "module"),
            Self::Gateway => write!(f, "gateway"),
        }
    }
}

/// Failure surfaced by a kernel operation.
#[derive(Debug, Error)]
pub enum KernelError {
    /// A component reported an empty name.
    #[error("{kind} name is empty")]
    EmptyName {
        /// Component kind.
        kind: ComponentKind,
    },

    /// A component with this name is already registered.
    #[error("{kind} {name}: duplicate name")]
    Duplicate {
        /// Component kind.
        kind: ComponentKind,
        /// The duplicated name.
        name: String,
    },

    /// No component with this name is registered.
    #[error("{kind} {name}: not found")]
    NotFound {
        /// Component kind.
        kind: ComponentKind,
        /// The unknown name.
        name: String,
    },

    /// `start` was called on a running kernel.
    #[error("kernel already running")]
    AlreadyRunning,

    /// `stop` was called on a kernel that is not running.
    #[error("kernel not running")]
    NotRunning,

    /// A privileged operation found no principal in the context.
    #[error("security violation: no principal in context for {operation}")]
    MissingPrincipal {
        /// The guarded operation.
        operation: String,
    },

    /// The principal lacks the permission guarding the operation.
    #[error("access denied: principal {principal} lacks {permission} for {operation}")]
    PermissionDenied {
        /// Display form of the denied principal.
        principal: String,
        /// The required permission.
        permission: String,
        /// The guarded operation.
        operation: String,
    },

    /// Dependency analysis failed during startup or shutdown planning.
    #[error("module startup order: {0}")]
    Dependency(#[from] DependencyError),

    /// A component lifecycle callback returned an error.
    #[error("{kind} {name} {operation}: {source}")]
    Lifecycle {
        /// Component kind.
        kind: ComponentKind,
        /// Component name.
        name: String,
        /// The lifecycle operation that failed.
        operation: &'static str,
        /// The component's own error.
        source: ComponentError,
    },

    /// A component panicked inside a lifecycle callback.
    #[error("panic in {kind} {name} during {operation}: {message}")]
    Panic {
        /// Component kind.
        kind: ComponentKind,
        /// Component name.
        name: String,
        /// The lifecycle operation that panicked.
        operation: &'static str,
        /// Rendered panic payload.
        message: String,
    },

    /// A bounded lifecycle call exceeded its deadline.
    #[error("{kind} {name} {operation}: timed out after {timeout:?}")]
    Timeout {
        /// Component kind.
        kind: ComponentKind,
        /// Component name.
        name: String,
        /// The lifecycle operation that timed out.
        operation: &'static str,
        /// The applied bound.
        timeout: Duration,
    },

    /// A registry operation performed on a component's behalf failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// An operation failed and the subsequent rollback failed too.
    #[error("{error}; rollback failed: {rollback}")]
    Rollback {
        /// The original failure.
        error: Box<KernelError>,
        /// The failure encountered while rolling back.
        rollback: Box<KernelError>,
    },

    /// The operation's context was cancelled.
    #[error("operation cancelled")]
    Cancelled,
}

impl ErrorCode for KernelError {
    fn code(&self) -> &'static str {
        match self {
            Self::EmptyName { .. } => "KERNEL_EMPTY_NAME",
            Self::Duplicate { .. } => "KERNEL_DUPLICATE",
            Self::NotFound { .. } => "KERNEL_NOT_FOUND",
            Self::AlreadyRunning => "KERNEL_ALREADY_RUNNING",
            Self::NotRunning => "KERNEL_NOT_RUNNING",
            Self::MissingPrincipal { .. } => "KERNEL_MISSING_PRINCIPAL",
            Self::PermissionDenied { .. } => "KERNEL_PERMISSION_DENIED",
            Self::Dependency(_) => "KERNEL_DEPENDENCY",
            Self::Lifecycle { .. } => "KERNEL_LIFECYCLE",
            Self::Panic { .. } => "KERNEL_PANIC",
            Self::Timeout { .. } => "KERNEL_TIMEOUT",
            Self::Registry(_) => "KERNEL_REGISTRY",
            Self::Rollback { .. } => "KERNEL_ROLLBACK",
            Self::Cancelled => "KERNEL_CANCELLED",
        }
    }

    fn is_recoverable(&self) -> bool {
        matches!(self, Self::Lifecycle { .. } | Self::Timeout { .. })
    }
}

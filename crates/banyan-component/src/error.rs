//! Component layer errors.
//!
//! Errors returned by module and gateway lifecycle callbacks. The kernel
//! wraps them with component identity and operation before surfacing.
//!
//! # Error Code Convention
//!
//! All component errors use the `COMPONENT_` prefix:
//!
//! | Error | Code | Recoverable |
//! |-------|------|-------------|
//! | [`Config`](ComponentError::Config) | `COMPONENT_CONFIG` | No |
//! | [`Start`](ComponentError::Start) | `COMPONENT_START` | Yes |
//! | [`Stop`](ComponentError::Stop) | `COMPONENT_STOP` | Yes |
//! | [`Registration`](ComponentError::Registration) | `COMPONENT_REGISTRATION` | No |
//! | [`NotReady`](ComponentError::NotReady) | `COMPONENT_NOT_READY` | Yes |
//! | [`Internal`](ComponentError::Internal) | `COMPONENT_INTERNAL` | No |

use banyan_types::ErrorCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure reported by a module or gateway lifecycle callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum ComponentError {
    /// The configuration slice was rejected.
    ///
    /// **Not recoverable** with the same configuration.
    #[error("configuration rejected: {0}")]
    Config(String),

    /// `start` failed before the component became ready.
    ///
    /// **Recoverable** - the cause may be transient (port in use, peer
    /// not yet reachable).
    #[error("start failed: {0}")]
    Start(String),

    /// Graceful shutdown failed or was cut short.
    ///
    /// **Recoverable** - a retry or harder stop may succeed.
    #[error("stop failed: {0}")]
    Stop(String),

    /// Publishing services into the registry failed.
    ///
    /// Typically a name collision; **not recoverable** without a rename.
    #[error("service registration failed: {0}")]
    Registration(String),

    /// `on_ready` found a dependency in an unusable state.
    ///
    /// **Recoverable** - dependencies may settle.
    #[error("not ready: {0}")]
    NotReady(String),

    /// Any other component-internal failure.
    ///
    /// **Not recoverable** from the kernel's point of view.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ErrorCode for ComponentError {
    fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "COMPONENT_CONFIG",
            Self::Start(_) => "COMPONENT_START",
            Self::Stop(_) => "COMPONENT_STOP",
            Self::Registration(_) => "COMPONENT_REGISTRATION",
            Self::NotReady(_) => "COMPONENT_NOT_READY",
            Self::Internal(_) => "COMPONENT_INTERNAL",
        }
    }

    fn is_recoverable(&self) -> bool {
        matches!(self, Self::Start(_) | Self::Stop(_) | Self::NotReady(_))
    }
}

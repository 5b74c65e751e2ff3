//! Kernel-published event types.
//!
//! The kernel publishes a small fixed vocabulary of lifecycle events on
//! the bus; each payload carries the affected component's name.
//!
//! | Topic | Published when |
//! |-------|----------------|
//! | [`MODULE_ADDED`] | a module is registered |
//! | [`MODULE_STARTED`] | a module's `start` succeeds |
//! | [`MODULE_STOPPED`] | a module's `stop` succeeds |
//! | [`GATEWAY_ADDED`] | a gateway is registered |
//! | [`GATEWAY_STARTED`] | a gateway's `start` succeeds |
//! | [`GATEWAY_STOPPED`] | a gateway's `stop` succeeds |

use banyan_event::TypedEvent;

/// Topic for module registration events.
pub const MODULE_ADDED: &str = "module.added";
/// Topic for module start events.
pub const MODULE_STARTED: &str = "module.started";
/// Topic for module stop events.
pub const MODULE_STOPPED: &str = "module.stopped";
/// Topic for gateway registration events.
pub const GATEWAY_ADDED: &str = "gateway.added";
/// Topic for gateway start events.
pub const GATEWAY_STARTED: &str = "gateway.started";
/// Topic for gateway stop events.
pub const GATEWAY_STOPPED: &str = "gateway.stopped";

macro_rules! kernel_event {
    ($(#[$doc:meta])* $name:ident, $field:ident, $topic:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name {
            /// Name of the affected component.
            pub $field: String,
        }

        impl $name {
            /// Creates the event for the named component.
            #[must_use]
            pub fn new($field: impl Into<String>) -> Self {
                Self {
                    $field: $field.into(),
                }
            }
        }

        impl TypedEvent for $name {
            fn event_type(&self) -> &str {
                $topic
            }
        }
    };
}

kernel_event!(
    /// A module was registered with the kernel.
    ModuleAdded,
    module,
    MODULE_ADDED
);
kernel_event!(
    /// A module started successfully.
    ModuleStarted,
    module,
    MODULE_STARTED
);
kernel_event!(
    /// A module stopped successfully.
    ModuleStopped,
    module,
    MODULE_STOPPED
);
kernel_event!(
    /// A gateway was registered with the kernel.
    GatewayAdded,
    gateway,
    GATEWAY_ADDED
);
kernel_event!(
    /// A gateway started successfully.
    GatewayStarted,
    gateway,
    GATEWAY_STARTED
);
kernel_event!(
    /// A gateway stopped successfully.
    GatewayStopped,
    gateway,
    GATEWAY_STOPPED
);

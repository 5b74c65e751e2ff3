//! Module and gateway contracts for the Banyan kernel.
//!
//! Components are the functional units the kernel drives through a fixed
//! lifecycle. They communicate with peers through the service registry and
//! the event bus, both injected by the kernel at registration time.
//!
//! # Component Hierarchy
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                     Kernel (coordinator)                  │
//! │  - dependency-ordered start/stop                          │
//! │  - config distribution, panic isolation, timeouts         │
//! └───────────────────────────────────────────────────────────┘
//!          │                                   │
//!          ▼                                   ▼
//!   ┌─────────────┐                     ┌─────────────┐
//!   │   Module    │ ──register──►       │   Gateway   │
//!   │ (feature)   │   services          │ (traffic)   │
//!   └─────────────┘                     └─────────────┘
//!          │    ▲                              │
//!          ▼    │ lookup                       ▼
//!     EventBus  ServiceRegistry          external clients
//! ```
//!
//! # Module vs Gateway
//!
//! | Aspect | Module | Gateway |
//! |--------|--------|---------|
//! | Declares dependencies | Yes (semver constraints) | No |
//! | Registers services | Yes | No (registered by the kernel) |
//! | Start order | Topological | After all modules |
//! | Stop order | Reverse topological | Before any module |
//!
//! # Lifecycle
//!
//! ```text
//! absent → loaded (on_load) → configured (configure) → started (start)
//!        → services-registered (register_services) → ready (on_ready)
//!        → stopped (stop) → absent
//! ```
//!
//! Every callback runs under a kernel-applied timeout and panic trap; a
//! panicking component produces an error, never a kernel crash.

pub mod error;
pub mod gateway;
pub mod health;
pub mod module;
pub mod testing;

pub use error::ComponentError;
pub use gateway::Gateway;
pub use health::{HealthState, HealthStatus};
pub use module::Module;

/// Opaque per-component configuration slice.
///
/// The kernel pre-splits the configuration document and hands each
/// component its own subtree; components deserialize it into their own
/// typed config struct (`ConfigValue::try_into`).
pub type ConfigValue = toml::Value;

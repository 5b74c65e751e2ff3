//! Lifecycle coordinator for Banyan modules and gateways.
//!
//! The [`Kernel`] is the central coordinator of a Banyan application. It
//! owns the event bus and the service registry, injects both into every
//! component at registration time, validates privileged callers against
//! the access controller, and drives components through a fixed lifecycle.
//!
//! # Startup / Shutdown Order
//!
//! ```text
//! start:  modules (dependency order) → register_services → on_ready → gateways
//! stop:   gateways → modules (reverse dependency order)
//! ```
//!
//! Module order is a topological sort of the declared dependency graph
//! (Kahn's algorithm over semver-validated edges); gateways start strictly
//! after the last module and stop strictly before the first.
//!
//! # Fault Containment
//!
//! Every lifecycle call runs under a timeout and a panic trap. A
//! misbehaving component produces a [`KernelError`]; it never crashes the
//! kernel. Partial failures roll back: a failed start stops
//! already-started components in reverse order, a failed add/remove
//! restores the prior entry, and [`Kernel::reload_module`] reinstates the
//! old instance when the replacement cannot be configured or started.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use banyan_component::testing::ProbeModule;
//! use banyan_kernel::{Kernel, KernelConfig};
//! use banyan_types::{Context, Principal};
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let kernel = Kernel::new(KernelConfig::default());
//! let ctx = Context::new().with_principal(Principal::system("dev"));
//!
//! kernel
//!     .add_module(&ctx, Arc::new(ProbeModule::new("demo")))
//!     .await
//!     .unwrap();
//!
//! kernel.start(&ctx).await.unwrap();
//! assert!(kernel.running());
//! kernel.stop(&ctx).await.unwrap();
//! # });
//! ```

pub mod config;
pub mod depgraph;
pub mod error;
pub mod events;
pub mod kernel;

pub use config::{ConfigError, Environment, KernelConfig, TimeoutsConfig};
pub use depgraph::DependencyError;
pub use error::{ComponentKind, KernelError};
pub use kernel::{DevOptions, Kernel};

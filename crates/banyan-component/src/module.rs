//! The Module trait: the contract between a feature unit and the kernel.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use banyan_event::EventBus;
use banyan_registry::ServiceRegistry;
use banyan_types::Context;

use crate::{ComponentError, ConfigValue, HealthStatus};

/// A self-contained feature managed by the kernel.
///
/// Implementations are shared (`Arc<dyn Module>`) and must be
/// concurrency-safe: lifecycle methods take `&self` and use interior
/// mutability for state. `start` blocks until the module is ready to do
/// work; `stop` must be a graceful shutdown honoring cancellation and
/// idempotent with respect to repeated calls in the not-started state.
///
/// # Call Sequence
///
/// After [`add_module`] the kernel calls, exactly once and in order:
/// `set_event_bus`, `set_registry`, `on_load`, `configure` (when a config
/// slice exists). On kernel start (or immediately, when already running):
/// `start`, `register_services`, `on_ready`; `on_ready` only runs after
/// every dependency of this module has started and registered its
/// services. On shutdown: `stop`, in reverse dependency order.
///
/// # Dependencies
///
/// [`dependencies`](Self::dependencies) maps module names to semver
/// constraint strings (`"^1.0.0"`, `">=2.1.0, <3.0.0"`). Every declared
/// dependency must be present *and enabled* with a satisfying version or
/// kernel startup fails.
///
/// # Enable / Disable
///
/// A disabled module keeps its registration but is skipped by start/stop.
/// Re-enabling a previously stopped module re-runs `start` only: the
/// kernel does not re-invoke `register_services` or `on_ready`, and it
/// does not force-unregister services on disable. Whether services survive
/// a `stop` is this module's own choice via
/// [`unregister_services`](Self::unregister_services).
///
/// [`add_module`]: https://docs.rs/banyan-kernel
#[async_trait]
pub trait Module: Send + Sync {
    /// Unique module name.
    fn name(&self) -> &str;

    /// Semantic version of this module (`MAJOR.MINOR.PATCH`).
    fn version(&self) -> &str;

    /// Declared dependencies: module name → semver constraint.
    fn dependencies(&self) -> HashMap<String, String> {
        HashMap::new()
    }

    /// Receives the kernel's event bus. Called once after registration,
    /// before any lifecycle callback.
    fn set_event_bus(&self, bus: EventBus);

    /// Receives the kernel's service registry. Called once after
    /// registration, before any lifecycle callback.
    fn set_registry(&self, registry: Arc<ServiceRegistry>);

    /// First lifecycle call; setup that needs no peers.
    async fn on_load(&self, _ctx: &Context) -> Result<(), ComponentError> {
        Ok(())
    }

    /// Receives this module's configuration slice.
    ///
    /// Called after `on_load`, and again on every configuration reload.
    async fn configure(&self, _config: &ConfigValue) -> Result<(), ComponentError> {
        Ok(())
    }

    /// Starts the module; blocks until it is ready to do work.
    async fn start(&self, ctx: &Context) -> Result<(), ComponentError>;

    /// Publishes exported services under chosen names.
    ///
    /// Called after every enabled module has started. A failure here is
    /// fatal to kernel startup.
    fn register_services(&self, _registry: &ServiceRegistry) -> Result<(), ComponentError> {
        Ok(())
    }

    /// Called after every dependency of this module has started and
    /// registered its services.
    async fn on_ready(&self, _ctx: &Context) -> Result<(), ComponentError> {
        Ok(())
    }

    /// Gracefully shuts the module down, honoring cancellation.
    ///
    /// Must be idempotent when the module is already stopped.
    async fn stop(&self, ctx: &Context) -> Result<(), ComponentError>;

    /// Called on a running module when configuration is reloaded, with the
    /// module's new slice (`None` when the new document has no entry).
    async fn on_config_changed(
        &self,
        _ctx: &Context,
        _config: Option<&ConfigValue>,
    ) -> Result<(), ComponentError> {
        Ok(())
    }

    /// Bound on `stop`. A non-positive duration means "use the kernel's
    /// configured default".
    fn shutdown_timeout(&self) -> Duration {
        Duration::ZERO
    }

    /// Removes any services this module published.
    fn unregister_services(&self, _registry: &ServiceRegistry) {}

    /// Optional health report; `None` means "no reporter" and the kernel
    /// substitutes a presumed-healthy status.
    async fn health(&self, _ctx: &Context) -> Option<HealthStatus> {
        None
    }
}

impl fmt::Debug for dyn Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.name())
            .field("version", &self.version())
            .finish()
    }
}

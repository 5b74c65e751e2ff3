//! The Gateway trait: protocol endpoints managed by the kernel.

use std::time::Duration;

use async_trait::async_trait;
use banyan_event::EventBus;
use banyan_types::Context;

use crate::{ComponentError, ConfigValue, HealthStatus};

/// A network- or protocol-facing component.
///
/// Gateways accept external traffic and call into module-exposed services;
/// they declare no dependencies. The kernel starts every gateway strictly
/// after the last module finishes startup (lexicographic name order) and
/// stops them strictly before the first module begins shutdown, so modules
/// are reachable for the whole time a gateway accepts traffic.
///
/// Like modules, gateways are shared (`Arc<dyn Gateway>`): methods take
/// `&self` and use interior mutability.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Unique gateway name.
    fn name(&self) -> &str;

    /// Receives the kernel's event bus. Called once after registration.
    fn set_event_bus(&self, bus: EventBus);

    /// Receives this gateway's configuration slice.
    ///
    /// Called before `start` and again on every configuration reload.
    async fn configure(&self, _config: &ConfigValue) -> Result<(), ComponentError> {
        Ok(())
    }

    /// Starts the gateway; blocks until it is ready to accept traffic.
    async fn start(&self, ctx: &Context) -> Result<(), ComponentError>;

    /// Gracefully shuts the gateway down, honoring cancellation.
    async fn stop(&self, ctx: &Context) -> Result<(), ComponentError>;

    /// Bound on `stop`. A non-positive duration means "use the kernel's
    /// configured default".
    fn shutdown_timeout(&self) -> Duration {
        Duration::ZERO
    }

    /// Optional health report; `None` means "no reporter".
    async fn health(&self, _ctx: &Context) -> Option<HealthStatus> {
        None
    }
}

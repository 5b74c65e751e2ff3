//! Testing support: scriptable probe components.
//!
//! [`ProbeModule`] and [`ProbeGateway`] are fully scriptable stand-ins for
//! real components. They record every lifecycle invocation into a shared
//! [`CallLog`], inject failures or panics into chosen operations, and
//! delay operations to exercise timeout handling: everything kernel tests
//! need without real feature code.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use banyan_component::testing::{CallLog, ProbeModule};
//! use banyan_component::Module;
//! use banyan_types::Context;
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let log = CallLog::new();
//! let module = Arc::new(ProbeModule::new("billing").with_log(log.clone()));
//!
//! module.start(&Context::new()).await.unwrap();
//! assert_eq!(log.entries(), ["billing.start"]);
//! assert!(module.is_started());
//! # });
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use banyan_event::EventBus;
use banyan_registry::ServiceRegistry;
use banyan_types::Context;
use parking_lot::Mutex;

use crate::{ComponentError, ConfigValue, Gateway, HealthStatus, Module};

/// Shared, ordered record of lifecycle invocations.
///
/// Clones share storage, so one log can observe several components and
/// assert cross-component ordering.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl CallLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry.
    pub fn record(&self, entry: impl Into<String>) {
        self.entries.lock().push(entry.into());
    }

    /// Returns a snapshot of all entries in record order.
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    /// Returns the index of the first occurrence of `entry`.
    #[must_use]
    pub fn position(&self, entry: &str) -> Option<usize> {
        self.entries.lock().iter().position(|e| e == entry)
    }

    /// Returns `true` if `entry` was recorded.
    #[must_use]
    pub fn contains(&self, entry: &str) -> bool {
        self.position(entry).is_some()
    }

    /// Asserts that `earlier` was recorded before `later`.
    ///
    /// # Panics
    ///
    /// Panics with the full log when either entry is missing or the order
    /// is violated.
    pub fn assert_before(&self, earlier: &str, later: &str) {
        let entries = self.entries();
        let a = entries.iter().position(|e| e == earlier);
        let b = entries.iter().position(|e| e == later);
        match (a, b) {
            (Some(a), Some(b)) if a < b => {}
            _ => panic!("expected '{earlier}' before '{later}' in {entries:?}"),
        }
    }

    /// Removes all entries.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

/// Service value registered by [`ProbeModule`]; tests downcast to it.
#[derive(Debug)]
pub struct ProbeService {
    /// Name of the owning module.
    pub module: String,
}

/// Scriptable module for kernel tests.
///
/// Builder methods configure identity, dependencies, exported services,
/// and fault injection. Operations eligible for `failing` / `panicking` /
/// `delaying`: `on_load`, `configure`, `start`, `register_services`,
/// `on_ready`, `stop`, `on_config_changed`.
pub struct ProbeModule {
    name: String,
    version: String,
    dependencies: HashMap<String, String>,
    services: Vec<String>,
    shutdown_timeout: Duration,
    log: CallLog,
    fail_ops: HashSet<&'static str>,
    panic_ops: HashSet<&'static str>,
    delays: HashMap<&'static str, Duration>,
    unregister_on_stop: bool,
    health: Mutex<Option<HealthStatus>>,
    bus: Mutex<Option<EventBus>>,
    registry: Mutex<Option<Arc<ServiceRegistry>>>,
    last_config: Mutex<Option<ConfigValue>>,
    started: AtomicBool,
}

impl ProbeModule {
    /// Creates a probe module with version `1.0.0` and no dependencies.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: "1.0.0".to_string(),
            dependencies: HashMap::new(),
            services: Vec::new(),
            shutdown_timeout: Duration::ZERO,
            log: CallLog::new(),
            fail_ops: HashSet::new(),
            panic_ops: HashSet::new(),
            delays: HashMap::new(),
            unregister_on_stop: false,
            health: Mutex::new(None),
            bus: Mutex::new(None),
            registry: Mutex::new(None),
            last_config: Mutex::new(None),
            started: AtomicBool::new(false),
        }
    }

    /// Sets the module version.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Declares a dependency with a semver constraint.
    #[must_use]
    pub fn with_dependency(
        mut self,
        name: impl Into<String>,
        constraint: impl Into<String>,
    ) -> Self {
        self.dependencies.insert(name.into(), constraint.into());
        self
    }

    /// Adds a service name to register during `register_services`.
    #[must_use]
    pub fn with_service(mut self, name: impl Into<String>) -> Self {
        self.services.push(name.into());
        self
    }

    /// Shares an external call log.
    #[must_use]
    pub fn with_log(mut self, log: CallLog) -> Self {
        self.log = log;
        self
    }

    /// Sets the per-module shutdown timeout.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Makes the named operation return an error.
    #[must_use]
    pub fn failing(mut self, op: &'static str) -> Self {
        self.fail_ops.insert(op);
        self
    }

    /// Makes the named operation panic.
    #[must_use]
    pub fn panicking(mut self, op: &'static str) -> Self {
        self.panic_ops.insert(op);
        self
    }

    /// Makes the named operation sleep before completing.
    #[must_use]
    pub fn delaying(mut self, op: &'static str, delay: Duration) -> Self {
        self.delays.insert(op, delay);
        self
    }

    /// Unregisters the module's services during `stop`.
    #[must_use]
    pub fn unregistering_on_stop(mut self) -> Self {
        self.unregister_on_stop = true;
        self
    }

    /// Sets a fixed health report.
    #[must_use]
    pub fn with_health(self, status: HealthStatus) -> Self {
        *self.health.lock() = Some(status);
        self
    }

    /// Returns the shared call log.
    #[must_use]
    pub fn log(&self) -> &CallLog {
        &self.log
    }

    /// Whether `start` has run more recently than `stop`.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// The config slice most recently passed to `configure`.
    #[must_use]
    pub fn last_config(&self) -> Option<ConfigValue> {
        self.last_config.lock().clone()
    }

    /// The event bus injected by the kernel, if any.
    #[must_use]
    pub fn event_bus(&self) -> Option<EventBus> {
        self.bus.lock().clone()
    }

    async fn run_op(&self, op: &'static str, err: fn(String) -> ComponentError) -> Result<(), ComponentError> {
        if let Some(delay) = self.delays.get(op) {
            tokio::time::sleep(*delay).await;
        }
        self.log.record(format!("{}.{}", self.name, op));
        if self.panic_ops.contains(op) {
            panic!("injected panic in {op}");
        }
        if self.fail_ops.contains(op) {
            return Err(err(format!("injected failure in {op}")));
        }
        Ok(())
    }
}

#[async_trait]
impl Module for ProbeModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn dependencies(&self) -> HashMap<String, String> {
        self.dependencies.clone()
    }

    fn set_event_bus(&self, bus: EventBus) {
        *self.bus.lock() = Some(bus);
    }

    fn set_registry(&self, registry: Arc<ServiceRegistry>) {
        *self.registry.lock() = Some(registry);
    }

    async fn on_load(&self, _ctx: &Context) -> Result<(), ComponentError> {
        self.run_op("on_load", ComponentError::Internal).await
    }

    async fn configure(&self, config: &ConfigValue) -> Result<(), ComponentError> {
        *self.last_config.lock() = Some(config.clone());
        self.run_op("configure", ComponentError::Config).await
    }

    async fn start(&self, _ctx: &Context) -> Result<(), ComponentError> {
        self.run_op("start", ComponentError::Start).await?;
        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn register_services(&self, registry: &ServiceRegistry) -> Result<(), ComponentError> {
        self.log.record(format!("{}.register_services", self.name));
        if self.panic_ops.contains("register_services") {
            panic!("injected panic in register_services");
        }
        if self.fail_ops.contains("register_services") {
            return Err(ComponentError::Registration(
                "injected failure in register_services".to_string(),
            ));
        }
        for service in &self.services {
            registry
                .register_service(
                    service,
                    Arc::new(ProbeService {
                        module: self.name.clone(),
                    }),
                    &self.name,
                )
                .map_err(|e| ComponentError::Registration(e.to_string()))?;
        }
        Ok(())
    }

    async fn on_ready(&self, _ctx: &Context) -> Result<(), ComponentError> {
        self.run_op("on_ready", ComponentError::NotReady).await
    }

    async fn stop(&self, _ctx: &Context) -> Result<(), ComponentError> {
        self.run_op("stop", ComponentError::Stop).await?;
        self.started.store(false, Ordering::SeqCst);
        if self.unregister_on_stop {
            if let Some(registry) = self.registry.lock().clone() {
                self.unregister_services(&registry);
            }
        }
        Ok(())
    }

    async fn on_config_changed(
        &self,
        _ctx: &Context,
        config: Option<&ConfigValue>,
    ) -> Result<(), ComponentError> {
        if let Some(config) = config {
            *self.last_config.lock() = Some(config.clone());
        }
        self.run_op("on_config_changed", ComponentError::Config).await
    }

    fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }

    fn unregister_services(&self, registry: &ServiceRegistry) {
        self.log.record(format!("{}.unregister_services", self.name));
        for service in &self.services {
            registry.unregister_service(service);
        }
    }

    async fn health(&self, _ctx: &Context) -> Option<HealthStatus> {
        self.health.lock().clone()
    }
}

/// Scriptable gateway for kernel tests.
///
/// Same fault-injection surface as [`ProbeModule`], minus dependencies and
/// services. Operations: `configure`, `start`, `stop`.
pub struct ProbeGateway {
    name: String,
    shutdown_timeout: Duration,
    log: CallLog,
    fail_ops: HashSet<&'static str>,
    panic_ops: HashSet<&'static str>,
    delays: HashMap<&'static str, Duration>,
    health: Mutex<Option<HealthStatus>>,
    bus: Mutex<Option<EventBus>>,
    last_config: Mutex<Option<ConfigValue>>,
    started: AtomicBool,
}

impl ProbeGateway {
    /// Creates a probe gateway.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shutdown_timeout: Duration::ZERO,
            log: CallLog::new(),
            fail_ops: HashSet::new(),
            panic_ops: HashSet::new(),
            delays: HashMap::new(),
            health: Mutex::new(None),
            bus: Mutex::new(None),
            last_config: Mutex::new(None),
            started: AtomicBool::new(false),
        }
    }

    /// Shares an external call log.
    #[must_use]
    pub fn with_log(mut self, log: CallLog) -> Self {
        self.log = log;
        self
    }

    /// Sets the per-gateway shutdown timeout.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Makes the named operation return an error.
    #[must_use]
    pub fn failing(mut self, op: &'static str) -> Self {
        self.fail_ops.insert(op);
        self
    }

    /// Makes the named operation panic.
    #[must_use]
    pub fn panicking(mut self, op: &'static str) -> Self {
        self.panic_ops.insert(op);
        self
    }

    /// Makes the named operation sleep before completing.
    #[must_use]
    pub fn delaying(mut self, op: &'static str, delay: Duration) -> Self {
        self.delays.insert(op, delay);
        self
    }

    /// Sets a fixed health report.
    #[must_use]
    pub fn with_health(self, status: HealthStatus) -> Self {
        *self.health.lock() = Some(status);
        self
    }

    /// Whether `start` has run more recently than `stop`.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// The config slice most recently passed to `configure`.
    #[must_use]
    pub fn last_config(&self) -> Option<ConfigValue> {
        self.last_config.lock().clone()
    }

    async fn run_op(&self, op: &'static str, err: fn(String) -> ComponentError) -> Result<(), ComponentError> {
        if let Some(delay) = self.delays.get(op) {
            tokio::time::sleep(*delay).await;
        }
        self.log.record(format!("{}.{}", self.name, op));
        if self.panic_ops.contains(op) {
            panic!("injected panic in {op}");
        }
        if self.fail_ops.contains(op) {
            return Err(err(format!("injected failure in {op}")));
        }
        Ok(())
    }
}

#[async_trait]
impl Gateway for ProbeGateway {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_event_bus(&self, bus: EventBus) {
        *self.bus.lock() = Some(bus);
    }

    async fn configure(&self, config: &ConfigValue) -> Result<(), ComponentError> {
        *self.last_config.lock() = Some(config.clone());
        self.run_op("configure", ComponentError::Config).await
    }

    async fn start(&self, _ctx: &Context) -> Result<(), ComponentError> {
        self.run_op("start", ComponentError::Start).await?;
        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self, _ctx: &Context) -> Result<(), ComponentError> {
        self.run_op("stop", ComponentError::Stop).await?;
        self.started.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }

    async fn health(&self, _ctx: &Context) -> Option<HealthStatus> {
        self.health.lock().clone()
    }
}

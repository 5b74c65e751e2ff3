//! The lifecycle coordinator.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use banyan_auth::AccessController;
use banyan_component::{ComponentError, Gateway, HealthStatus, Module};
use banyan_event::EventBus;
use banyan_registry::ServiceRegistry;
use banyan_types::{Context, Principal};
use futures::FutureExt;
use parking_lot::RwLock;
use tracing::{debug, error, info, warn};

use crate::config::{KernelConfig, TimeoutsConfig};
use crate::error::{ComponentKind, KernelError};
use crate::{depgraph, events};

/// Options for the controlled development tick loop.
///
/// `ticks == 0` means "run until the context is cancelled".
pub struct DevOptions {
    /// Number of ticks to run; `0` runs until cancellation.
    pub ticks: u64,

    /// Invoked once per tick with a 1-based index.
    pub on_tick: Option<Box<dyn Fn(u64) + Send + Sync>>,

    /// Sleep between ticks.
    pub delay: Duration,
}

impl DevOptions {
    /// Runs exactly `ticks` ticks with no delay and no callback.
    #[must_use]
    pub fn ticks(ticks: u64) -> Self {
        Self {
            ticks,
            on_tick: None,
            delay: Duration::ZERO,
        }
    }

    /// Sets the inter-tick delay.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Sets the per-tick callback.
    #[must_use]
    pub fn with_on_tick(mut self, on_tick: impl Fn(u64) + Send + Sync + 'static) -> Self {
        self.on_tick = Some(Box::new(on_tick));
        self
    }
}

impl Default for DevOptions {
    fn default() -> Self {
        Self::ticks(0)
    }
}

#[derive(Default)]
struct KernelState {
    modules: HashMap<String, Arc<dyn Module>>,
    gateways: HashMap<String, Arc<dyn Gateway>>,
    enabled: HashMap<String, bool>,
    running: bool,
}

/// The central coordinator managing module and gateway lifecycles.
///
/// The kernel owns the event bus and the service registry and injects both
/// into every component at registration time. Privileged operations
/// (module add/remove/enable/disable) validate the caller's principal
/// against the access controller.
///
/// # Locking
///
/// One readers-writer lock guards the component maps and the running flag.
/// The lock is never held across a component call: every path snapshots
/// what it needs, releases, then calls out.
///
/// # Dynamic Changes
///
/// Adding or enabling a module while the kernel runs starts it immediately
/// but does not re-evaluate the full dependency graph against the running
/// set; a full re-plan requires a kernel restart.
pub struct Kernel {
    config: RwLock<KernelConfig>,
    state: RwLock<KernelState>,
    access: Arc<AccessController>,
    registry: Arc<ServiceRegistry>,
    bus: EventBus,
}

impl Kernel {
    /// Creates a kernel with an allow-all access controller.
    ///
    /// Suitable for development and for setups where auth is not a
    /// concern; production deployments should use
    /// [`with_access`](Self::with_access).
    #[must_use]
    pub fn new(config: KernelConfig) -> Self {
        Self::with_access(config, Arc::new(AccessController::allow_all()))
    }

    /// Creates a kernel enforcing permissions with the given controller.
    ///
    /// The service registry shares the same controller for its lookup
    /// checks.
    #[must_use]
    pub fn with_access(config: KernelConfig, access: Arc<AccessController>) -> Self {
        let registry = Arc::new(ServiceRegistry::new(Arc::clone(&access)));
        Self {
            config: RwLock::new(config),
            state: RwLock::new(KernelState::default()),
            access,
            registry,
            bus: EventBus::new(),
        }
    }

    /// Returns the kernel's service registry.
    #[must_use]
    pub fn registry(&self) -> Arc<ServiceRegistry> {
        Arc::clone(&self.registry)
    }

    /// Returns a handle to the kernel's event bus.
    #[must_use]
    pub fn event_bus(&self) -> EventBus {
        self.bus.clone()
    }

    /// Returns a snapshot of the current configuration.
    #[must_use]
    pub fn current_config(&self) -> KernelConfig {
        self.config.read().clone()
    }

    /// Returns `true` while the kernel is running.
    #[must_use]
    pub fn running(&self) -> bool {
        self.state.read().running
    }

    /// Registers a module; on a running kernel the module is also started.
    ///
    /// Calls, in order: `set_event_bus`, `set_registry`, `on_load`,
    /// `configure` (when a config slice exists), and, when already
    /// running, also `start`, `register_services`, `on_ready`. Failures before
    /// `start` remove the half-added entry. Dependencies of a module added
    /// to a running kernel are not re-evaluated against the running set.
    ///
    /// # Errors
    ///
    /// Security errors when the context lacks a principal holding
    /// `kernel.module.add`; [`KernelError::Duplicate`] on a name clash;
    /// wrapped lifecycle failures otherwise.
    pub async fn add_module(
        &self,
        ctx: &Context,
        module: Arc<dyn Module>,
    ) -> Result<(), KernelError> {
        let name = module.name().to_string();
        if name.is_empty() {
            return Err(KernelError::EmptyName {
                kind: ComponentKind::Module,
            });
        }
        let principal = self.authorize(ctx, "kernel.module.add", "add_module")?;

        let running = {
            let mut state = self.state.write();
            if state.modules.contains_key(&name) {
                warn!(module = %name, "attempted to add duplicate module");
                return Err(KernelError::Duplicate {
                    kind: ComponentKind::Module,
                    name,
                });
            }
            state.modules.insert(name.clone(), Arc::clone(&module));
            state.enabled.insert(name.clone(), true);
            state.running
        };

        module.set_event_bus(self.bus.clone());
        module.set_registry(Arc::clone(&self.registry));

        let timeouts = self.timeouts();
        if let Err(err) = guarded(
            ComponentKind::Module,
            &name,
            "on_load",
            timeouts.module_operation(),
            module.on_load(ctx),
        )
        .await
        {
            self.discard_module(&name);
            error!(module = %name, error = %err, "on_load failed for new module");
            return Err(err);
        }

        let slice = self.config.read().module_config(&name).cloned();
        if let Some(slice) = slice {
            if let Err(err) = guarded(
                ComponentKind::Module,
                &name,
                "configure",
                timeouts.module_operation(),
                module.configure(&slice),
            )
            .await
            {
                self.discard_module(&name);
                error!(module = %name, error = %err, "failed to configure new module");
                return Err(err);
            }
        }

        info!(module = %name, principal = %principal, "module added");
        self.bus.publish(
            ctx,
            events::MODULE_ADDED,
            Arc::new(events::ModuleAdded::new(&name)),
        );

        if running {
            info!(module = %name, "kernel is running, starting newly added module");
            if let Err(err) = guarded(
                ComponentKind::Module,
                &name,
                "start",
                timeouts.module_operation(),
                module.start(ctx),
            )
            .await
            {
                self.discard_module(&name);
                error!(module = %name, error = %err, "failed to start module after adding");
                return Err(err);
            }
            self.bus.publish(
                ctx,
                events::MODULE_STARTED,
                Arc::new(events::ModuleStarted::new(&name)),
            );

            let registry = Arc::clone(&self.registry);
            if let Err(err) = guarded(
                ComponentKind::Module,
                &name,
                "register_services",
                timeouts.module_operation(),
                async { module.register_services(&registry) },
            )
            .await
            {
                error!(module = %name, error = %err, "register_services failed for newly added module");
            }

            if let Err(err) = guarded(
                ComponentKind::Module,
                &name,
                "on_ready",
                timeouts.module_operation(),
                module.on_ready(ctx),
            )
            .await
            {
                error!(module = %name, error = %err, "on_ready failed for newly added module");
            }
        }
        Ok(())
    }

    /// Unregisters a module; on a running kernel the module is stopped.
    ///
    /// All services owned by the module are removed. If `stop` fails the
    /// module is restored into the kernel (services stay unregistered).
    ///
    /// # Errors
    ///
    /// Security errors for a missing `kernel.module.remove` grant;
    /// [`KernelError::NotFound`]; wrapped stop failures.
    pub async fn remove_module(&self, ctx: &Context, name: &str) -> Result<(), KernelError> {
        if name.is_empty() {
            return Err(KernelError::EmptyName {
                kind: ComponentKind::Module,
            });
        }
        let principal = self.authorize(ctx, "kernel.module.remove", "remove_module")?;

        let (module, running) = {
            let mut state = self.state.write();
            let Some(module) = state.modules.remove(name) else {
                warn!(module = %name, "attempted to remove non-existent module");
                return Err(KernelError::NotFound {
                    kind: ComponentKind::Module,
                    name: name.to_string(),
                });
            };
            state.enabled.remove(name);
            (module, state.running)
        };

        info!(module = %name, principal = %principal, "module removed");
        module.unregister_services(&self.registry);
        self.registry.unregister_services_by_module(name);

        if running {
            let timeout =
                stop_timeout(module.shutdown_timeout(), self.timeouts().module_operation());
            if let Err(err) = guarded(
                ComponentKind::Module,
                name,
                "stop",
                timeout,
                module.stop(ctx),
            )
            .await
            {
                let mut state = self.state.write();
                state.modules.insert(name.to_string(), module);
                state.enabled.insert(name.to_string(), true);
                drop(state);
                error!(module = %name, error = %err, "failed to stop module during removal");
                return Err(err);
            }
            self.bus.publish(
                ctx,
                events::MODULE_STOPPED,
                Arc::new(events::ModuleStopped::new(name)),
            );
        }
        Ok(())
    }

    /// Retrieves a module by name.
    #[must_use]
    pub fn get_module(&self, name: &str) -> Option<Arc<dyn Module>> {
        self.state.read().modules.get(name).cloned()
    }

    /// Registered module names in lexicographic order.
    #[must_use]
    pub fn list_modules(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.read().modules.keys().cloned().collect();
        names.sort();
        names
    }

    /// Marks a module as enabled; on a running kernel the module is started.
    ///
    /// Re-enabling re-runs `start` only: services registered before the
    /// preceding stop remain registered unless the module unregistered
    /// them itself, and `on_ready` is not re-invoked. Dependencies are not
    /// re-evaluated against the running set.
    ///
    /// # Errors
    ///
    /// Security errors for a missing `kernel.module.enable` grant;
    /// [`KernelError::NotFound`]; wrapped start failures.
    pub async fn enable_module(&self, ctx: &Context, name: &str) -> Result<(), KernelError> {
        let principal = self.authorize(ctx, "kernel.module.enable", "enable_module")?;

        let (module, running) = {
            let mut state = self.state.write();
            let Some(module) = state.modules.get(name).cloned() else {
                warn!(module = %name, "attempted to enable non-existent module");
                return Err(KernelError::NotFound {
                    kind: ComponentKind::Module,
                    name: name.to_string(),
                });
            };
            state.enabled.insert(name.to_string(), true);
            (module, state.running)
        };
        info!(module = %name, principal = %principal, "module marked as enabled");

        if running {
            if let Err(err) = guarded(
                ComponentKind::Module,
                name,
                "start",
                self.timeouts().module_operation(),
                module.start(ctx),
            )
            .await
            {
                error!(module = %name, error = %err, "failed to start enabled module");
                return Err(err);
            }
            self.bus.publish(
                ctx,
                events::MODULE_STARTED,
                Arc::new(events::ModuleStarted::new(name)),
            );
        }
        Ok(())
    }

    /// Marks a module as disabled; on a running kernel the module is stopped.
    ///
    /// Services are not force-unregistered; see
    /// [`enable_module`](Self::enable_module).
    ///
    /// # Errors
    ///
    /// Security errors for a missing `kernel.module.disable` grant;
    /// [`KernelError::NotFound`]; wrapped stop failures.
    pub async fn disable_module(&self, ctx: &Context, name: &str) -> Result<(), KernelError> {
        let principal = self.authorize(ctx, "kernel.module.disable", "disable_module")?;

        let (module, running) = {
            let mut state = self.state.write();
            let Some(module) = state.modules.get(name).cloned() else {
                warn!(module = %name, "attempted to disable non-existent module");
                return Err(KernelError::NotFound {
                    kind: ComponentKind::Module,
                    name: name.to_string(),
                });
            };
            state.enabled.insert(name.to_string(), false);
            (module, state.running)
        };
        info!(module = %name, principal = %principal, "module marked as disabled");

        if running {
            let timeout =
                stop_timeout(module.shutdown_timeout(), self.timeouts().module_operation());
            if let Err(err) = guarded(
                ComponentKind::Module,
                name,
                "stop",
                timeout,
                module.stop(ctx),
            )
            .await
            {
                error!(module = %name, error = %err, "failed to stop disabled module");
                return Err(err);
            }
            self.bus.publish(
                ctx,
                events::MODULE_STOPPED,
                Arc::new(events::ModuleStopped::new(name)),
            );
        }
        Ok(())
    }

    /// Replaces a module instance: stop old, install new, configure, start.
    ///
    /// If configuring or starting the replacement fails, the previous
    /// instance is reinstalled and restarted; when that restart also fails
    /// both errors are reported via [`KernelError::Rollback`]. An
    /// `on_ready` failure on the replacement is logged only.
    ///
    /// # Errors
    ///
    /// [`KernelError::NotFound`] when no module with this name exists;
    /// wrapped stop/configure/start failures.
    pub async fn reload_module(&self, module: Arc<dyn Module>) -> Result<(), KernelError> {
        let name = module.name().to_string();
        if name.is_empty() {
            return Err(KernelError::EmptyName {
                kind: ComponentKind::Module,
            });
        }

        let old = self.state.read().modules.get(&name).cloned();
        let Some(old) = old else {
            warn!(module = %name, "attempted to reload non-existent module");
            return Err(KernelError::NotFound {
                kind: ComponentKind::Module,
                name,
            });
        };

        info!(module = %name, "reloading module");
        let ctx = Context::new();
        let timeouts = self.timeouts();

        let timeout = stop_timeout(old.shutdown_timeout(), timeouts.module_operation());
        if let Err(err) = guarded(ComponentKind::Module, &name, "stop", timeout, old.stop(&ctx))
            .await
        {
            error!(module = %name, error = %err, "failed to stop old module during reload");
            return Err(err);
        }

        self.state
            .write()
            .modules
            .insert(name.clone(), Arc::clone(&module));
        module.set_event_bus(self.bus.clone());
        module.set_registry(Arc::clone(&self.registry));

        let slice = self.config.read().module_config(&name).cloned();
        if let Some(slice) = slice {
            if let Err(err) = guarded(
                ComponentKind::Module,
                &name,
                "configure",
                timeouts.module_operation(),
                module.configure(&slice),
            )
            .await
            {
                error!(module = %name, error = %err, "failed to configure replacement during reload");
                return self.rollback_reload(&name, &old, err).await;
            }
        }

        if let Err(err) = guarded(
            ComponentKind::Module,
            &name,
            "start",
            timeouts.module_operation(),
            module.start(&ctx),
        )
        .await
        {
            error!(module = %name, error = %err, "failed to start replacement during reload");
            return self.rollback_reload(&name, &old, err).await;
        }
        self.bus.publish(
            &ctx,
            events::MODULE_STARTED,
            Arc::new(events::ModuleStarted::new(&name)),
        );

        if let Err(err) = guarded(
            ComponentKind::Module,
            &name,
            "on_ready",
            timeouts.module_operation(),
            module.on_ready(&ctx),
        )
        .await
        {
            error!(module = %name, error = %err, "on_ready failed for reloaded module");
        }

        info!(module = %name, "module reloaded");
        Ok(())
    }

    /// Reinstalls and restarts the previous instance after a failed reload.
    async fn rollback_reload(
        &self,
        name: &str,
        old: &Arc<dyn Module>,
        err: KernelError,
    ) -> Result<(), KernelError> {
        self.state
            .write()
            .modules
            .insert(name.to_string(), Arc::clone(old));

        info!(module = %name, "attempting rollback to previous module instance");
        let ctx = Context::new();
        match guarded(
            ComponentKind::Module,
            name,
            "start",
            self.timeouts().module_operation(),
            old.start(&ctx),
        )
        .await
        {
            Ok(()) => {
                info!(module = %name, "rollback to previous module instance succeeded");
                Err(err)
            }
            Err(rollback) => {
                error!(module = %name, error = %rollback, "rollback to previous module instance failed");
                Err(KernelError::Rollback {
                    error: Box::new(err),
                    rollback: Box::new(rollback),
                })
            }
        }
    }

    /// Registers a gateway; on a running kernel the gateway is also started.
    ///
    /// The gateway is configured from its config slice, registered with
    /// the service registry under `gateway.<name>.access`, and handed the
    /// event bus. Configure/start failures remove the half-added entry and
    /// its registry registration.
    ///
    /// # Errors
    ///
    /// [`KernelError::Duplicate`], [`KernelError::EmptyName`], wrapped
    /// configure/start failures.
    pub async fn add_gateway(&self, gateway: Arc<dyn Gateway>) -> Result<(), KernelError> {
        let name = gateway.name().to_string();
        if name.is_empty() {
            return Err(KernelError::EmptyName {
                kind: ComponentKind::Gateway,
            });
        }

        let running = {
            let mut state = self.state.write();
            if state.gateways.contains_key(&name) {
                warn!(gateway = %name, "attempted to add duplicate gateway");
                return Err(KernelError::Duplicate {
                    kind: ComponentKind::Gateway,
                    name,
                });
            }
            state.gateways.insert(name.clone(), Arc::clone(&gateway));
            state.running
        };

        gateway.set_event_bus(self.bus.clone());

        let ctx = Context::new();
        let timeouts = self.timeouts();
        let slice = self.config.read().gateway_config(&name).cloned();
        if let Some(slice) = slice {
            if let Err(err) = guarded(
                ComponentKind::Gateway,
                &name,
                "configure",
                timeouts.gateway_operation(),
                gateway.configure(&slice),
            )
            .await
            {
                self.discard_gateway(&name);
                error!(gateway = %name, error = %err, "failed to configure gateway");
                return Err(err);
            }
        }

        if let Err(err) = self
            .registry
            .register_gateway(&name, Arc::new(Arc::clone(&gateway)))
        {
            self.discard_gateway(&name);
            error!(gateway = %name, error = %err, "failed to register gateway with registry");
            return Err(err.into());
        }

        info!(gateway = %name, "gateway added and registered");
        self.bus.publish(
            &ctx,
            events::GATEWAY_ADDED,
            Arc::new(events::GatewayAdded::new(&name)),
        );

        if running {
            if let Err(err) = guarded(
                ComponentKind::Gateway,
                &name,
                "start",
                timeouts.gateway_operation(),
                gateway.start(&ctx),
            )
            .await
            {
                self.discard_gateway(&name);
                self.registry.unregister_gateway(&name);
                error!(gateway = %name, error = %err, "failed to start gateway after adding");
                return Err(err);
            }
            self.bus.publish(
                &ctx,
                events::GATEWAY_STARTED,
                Arc::new(events::GatewayStarted::new(&name)),
            );
        }
        Ok(())
    }

    /// Unregisters a gateway; on a running kernel the gateway is stopped.
    ///
    /// If `stop` fails the entry (and its registry registration) is
    /// restored.
    ///
    /// # Errors
    ///
    /// [`KernelError::NotFound`]; wrapped stop failures.
    pub async fn remove_gateway(&self, name: &str) -> Result<(), KernelError> {
        if name.is_empty() {
            return Err(KernelError::EmptyName {
                kind: ComponentKind::Gateway,
            });
        }

        let (gateway, running) = {
            let mut state = self.state.write();
            let Some(gateway) = state.gateways.remove(name) else {
                warn!(gateway = %name, "attempted to remove non-existent gateway");
                return Err(KernelError::NotFound {
                    kind: ComponentKind::Gateway,
                    name: name.to_string(),
                });
            };
            (gateway, state.running)
        };

        self.registry.unregister_gateway(name);
        info!(gateway = %name, "gateway removed and unregistered");

        if running {
            let ctx = Context::new();
            let timeout =
                stop_timeout(gateway.shutdown_timeout(), self.timeouts().gateway_operation());
            if let Err(err) = guarded(
                ComponentKind::Gateway,
                name,
                "stop",
                timeout,
                gateway.stop(&ctx),
            )
            .await
            {
                self.state
                    .write()
                    .gateways
                    .insert(name.to_string(), Arc::clone(&gateway));
                if let Err(re) = self
                    .registry
                    .register_gateway(name, Arc::new(Arc::clone(&gateway)))
                {
                    warn!(gateway = %name, error = %re, "failed to re-register gateway after stop failure");
                }
                error!(gateway = %name, error = %err, "failed to stop gateway during removal");
                return Err(err);
            }
            self.bus.publish(
                &ctx,
                events::GATEWAY_STOPPED,
                Arc::new(events::GatewayStopped::new(name)),
            );
        }
        Ok(())
    }

    /// Retrieves a gateway by name.
    #[must_use]
    pub fn get_gateway(&self, name: &str) -> Option<Arc<dyn Gateway>> {
        self.state.read().gateways.get(name).cloned()
    }

    /// Registered gateway names in lexicographic order.
    #[must_use]
    pub fn list_gateways(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.read().gateways.keys().cloned().collect();
        names.sort();
        names
    }

    /// Starts the kernel: modules in dependency order, then gateways.
    ///
    /// The full sequence is: dependency analysis over enabled modules,
    /// `start` per module, a `register_services` pass, an `on_ready` pass,
    /// then gateway starts in lexicographic order. A module start or
    /// `register_services` failure aborts startup and stops everything
    /// already started, in reverse order; an `on_ready` failure stops only
    /// the offending module and startup proceeds.
    ///
    /// # Errors
    ///
    /// [`KernelError::AlreadyRunning`] (state is not mutated),
    /// [`KernelError::Dependency`] on graph/version problems, or the first
    /// component failure after best-effort rollback.
    pub async fn start(&self, ctx: &Context) -> Result<(), KernelError> {
        let (enabled, gateways) = {
            let mut state = self.state.write();
            if state.running {
                warn!("kernel already running, cannot start again");
                return Err(KernelError::AlreadyRunning);
            }
            state.running = true;
            (snapshot_enabled(&state), snapshot_gateways(&state))
        };

        info!("starting kernel");
        let timeouts = self.timeouts();

        let order = match depgraph::startup_order(&enabled) {
            Ok(order) => order,
            Err(err) => {
                error!(error = %err, "failed to determine module startup order");
                self.set_running(false);
                return Err(err.into());
            }
        };

        let mut started: Vec<Arc<dyn Module>> = Vec::with_capacity(order.len());
        for module in &order {
            let name = module.name().to_string();
            if let Err(err) = guarded(
                ComponentKind::Module,
                &name,
                "start",
                timeouts.module_operation(),
                module.start(ctx),
            )
            .await
            {
                error!(module = %name, error = %err, "failed to start module");
                self.set_running(false);
                self.stop_modules_reverse(&started, &timeouts).await;
                return Err(err);
            }
            info!(module = %name, "module started");
            self.bus.publish(
                ctx,
                events::MODULE_STARTED,
                Arc::new(events::ModuleStarted::new(&name)),
            );
            started.push(Arc::clone(module));
        }

        for module in &order {
            let name = module.name().to_string();
            let registry = Arc::clone(&self.registry);
            if let Err(err) = guarded(
                ComponentKind::Module,
                &name,
                "register_services",
                timeouts.module_operation(),
                async { module.register_services(&registry) },
            )
            .await
            {
                error!(module = %name, error = %err, "register_services failed, halting kernel startup");
                self.set_running(false);
                self.stop_modules_reverse(&order, &timeouts).await;
                return Err(err);
            }
        }

        for module in &order {
            let name = module.name().to_string();
            if let Err(err) = guarded(
                ComponentKind::Module,
                &name,
                "on_ready",
                timeouts.module_operation(),
                module.on_ready(ctx),
            )
            .await
            {
                // Not fatal to the kernel: stop the offending module and
                // keep going.
                error!(module = %name, error = %err, "on_ready failed, stopping module");
                let timeout =
                    stop_timeout(module.shutdown_timeout(), timeouts.module_operation());
                if let Err(stop_err) = guarded(
                    ComponentKind::Module,
                    &name,
                    "stop",
                    timeout,
                    module.stop(ctx),
                )
                .await
                {
                    error!(module = %name, error = %stop_err, "failed to stop module after on_ready failure");
                }
            }
        }

        let mut started_gateways: Vec<(String, Arc<dyn Gateway>)> = Vec::new();
        for (name, gateway) in &gateways {
            if let Err(err) = guarded(
                ComponentKind::Gateway,
                name,
                "start",
                timeouts.gateway_operation(),
                gateway.start(ctx),
            )
            .await
            {
                error!(gateway = %name, error = %err, "failed to start gateway");
                self.set_running(false);
                for (peer_name, peer) in started_gateways.iter().rev() {
                    let timeout =
                        stop_timeout(peer.shutdown_timeout(), timeouts.gateway_operation());
                    if let Err(stop_err) = guarded(
                        ComponentKind::Gateway,
                        peer_name,
                        "stop",
                        timeout,
                        peer.stop(ctx),
                    )
                    .await
                    {
                        warn!(gateway = %peer_name, error = %stop_err, "best-effort gateway stop failed during rollback");
                    }
                }
                self.stop_modules_reverse(&order, &timeouts).await;
                return Err(err);
            }
            info!(gateway = %name, "gateway started");
            self.bus.publish(
                ctx,
                events::GATEWAY_STARTED,
                Arc::new(events::GatewayStarted::new(name)),
            );
            started_gateways.push((name.clone(), Arc::clone(gateway)));
        }

        info!("kernel started");
        Ok(())
    }

    /// Stops the kernel: gateways first, then modules in reverse
    /// dependency order.
    ///
    /// Stop failures are collected; the first is returned after every
    /// component has been attempted. A stop exceeding its bound is
    /// abandoned with a warning and shutdown proceeds.
    ///
    /// # Errors
    ///
    /// [`KernelError::NotRunning`] (state is not mutated), else the first
    /// recorded stop failure.
    pub async fn stop(&self, ctx: &Context) -> Result<(), KernelError> {
        let (enabled, gateways) = {
            let mut state = self.state.write();
            if !state.running {
                warn!("kernel not running, cannot stop");
                return Err(KernelError::NotRunning);
            }
            state.running = false;
            (snapshot_enabled(&state), snapshot_gateways(&state))
        };

        info!("stopping kernel");
        let timeouts = self.timeouts();

        let order = match depgraph::shutdown_order(&enabled) {
            Ok(order) => order,
            Err(err) => {
                // A module mutated after startup can poison the graph;
                // shut down in reverse name order instead of not at all.
                warn!(error = %err, "failed to determine module shutdown order, using reverse name order");
                enabled.values().rev().cloned().collect()
            }
        };

        let mut first_err: Option<KernelError> = None;

        for (name, gateway) in &gateways {
            let timeout = stop_timeout(gateway.shutdown_timeout(), timeouts.gateway_operation());
            match guarded(
                ComponentKind::Gateway,
                name,
                "stop",
                timeout,
                gateway.stop(ctx),
            )
            .await
            {
                Ok(()) => {
                    info!(gateway = %name, "gateway stopped");
                    self.bus.publish(
                        ctx,
                        events::GATEWAY_STOPPED,
                        Arc::new(events::GatewayStopped::new(name)),
                    );
                }
                Err(err) => {
                    error!(gateway = %name, error = %err, "failed to stop gateway");
                    first_err.get_or_insert(err);
                }
            }
        }

        for module in &order {
            let name = module.name().to_string();
            let timeout = stop_timeout(module.shutdown_timeout(), timeouts.module_operation());
            match guarded(
                ComponentKind::Module,
                &name,
                "stop",
                timeout,
                module.stop(ctx),
            )
            .await
            {
                Ok(()) => {
                    info!(module = %name, "module stopped");
                    self.bus.publish(
                        ctx,
                        events::MODULE_STOPPED,
                        Arc::new(events::ModuleStopped::new(&name)),
                    );
                }
                Err(err) => {
                    error!(module = %name, error = %err, "failed to stop module");
                    first_err.get_or_insert(err);
                }
            }
        }

        info!("kernel stopped");
        match first_err {
            None => Ok(()),
            Some(err) => Err(err),
        }
    }

    /// Aggregated health of every registered component.
    ///
    /// Keys are `module:<name>` / `gateway:<name>`. Components without a
    /// health reporter are presumed healthy, with an explanatory message.
    pub async fn health(&self, ctx: &Context) -> BTreeMap<String, HealthStatus> {
        let (modules, gateways) = {
            let state = self.state.read();
            let modules: Vec<(String, Arc<dyn Module>)> = state
                .modules
                .iter()
                .map(|(n, m)| (n.clone(), Arc::clone(m)))
                .collect();
            let gateways: Vec<(String, Arc<dyn Gateway>)> = state
                .gateways
                .iter()
                .map(|(n, g)| (n.clone(), Arc::clone(g)))
                .collect();
            (modules, gateways)
        };

        let mut report = BTreeMap::new();
        for (name, module) in modules {
            let status = module.health(ctx).await.unwrap_or_else(|| {
                HealthStatus::healthy_with_message("no health reporter implemented")
            });
            report.insert(format!("module:{name}"), status);
        }
        for (name, gateway) in gateways {
            let status = gateway.health(ctx).await.unwrap_or_else(|| {
                HealthStatus::healthy_with_message("no health reporter implemented")
            });
            report.insert(format!("gateway:{name}"), status);
        }
        report
    }

    /// Runs a controlled development/testing cycle.
    ///
    /// Starts the kernel when it is not already running, invokes
    /// `on_tick` with a 1-based index per tick, sleeps `delay` between
    /// ticks, and stops the kernel on exit iff it was started here. With
    /// `ticks == 0` the loop runs until `ctx` is cancelled.
    ///
    /// # Errors
    ///
    /// Propagates start/stop failures and reports cancellation as
    /// [`KernelError::Cancelled`].
    pub async fn run_dev(&self, ctx: &Context, opts: DevOptions) -> Result<(), KernelError> {
        let started_here = if self.running() {
            debug!("run_dev: kernel already running");
            false
        } else {
            info!("run_dev: kernel not running, starting now");
            self.start(ctx).await?;
            true
        };

        if opts.ticks == 0 {
            let mut tick: u64 = 0;
            loop {
                tick += 1;
                debug!(tick, "run_dev tick");
                if let Some(on_tick) = &opts.on_tick {
                    on_tick(tick);
                }
                tokio::select! {
                    _ = ctx.cancelled() => {
                        info!("run_dev: context cancelled, stopping");
                        if started_here {
                            let _ = self.stop(ctx).await;
                        }
                        return Err(KernelError::Cancelled);
                    }
                    _ = tokio::time::sleep(opts.delay) => {}
                }
            }
        }

        for tick in 1..=opts.ticks {
            debug!(tick, "run_dev tick");
            if let Some(on_tick) = &opts.on_tick {
                on_tick(tick);
            }
            // No delay needed after the last tick.
            if opts.delay > Duration::ZERO && tick != opts.ticks {
                tokio::select! {
                    _ = ctx.cancelled() => {
                        info!("run_dev: cancelled during delay, stopping");
                        if started_here {
                            let _ = self.stop(ctx).await;
                        }
                        return Err(KernelError::Cancelled);
                    }
                    _ = tokio::time::sleep(opts.delay) => {}
                }
            }
        }

        if started_here {
            info!("run_dev: stopping kernel after ticks");
            return self.stop(ctx).await;
        }
        debug!("run_dev: finished ticks, kernel remains running");
        Ok(())
    }

    /// Applies a reloaded configuration document.
    ///
    /// Swaps the stored config, then fans out `on_config_changed` to
    /// every registered module (with its new slice) and re-invokes
    /// `configure` on every gateway, each call bounded by the new
    /// config-change timeout. Failures are logged and do not abort
    /// propagation to the remaining components; no rollback is performed.
    pub async fn apply_config_change(&self, new_config: KernelConfig) {
        let timeout = new_config.timeouts.config_change();
        *self.config.write() = new_config.clone();

        let (modules, gateways) = {
            let state = self.state.read();
            let modules: Vec<(String, Arc<dyn Module>)> = state
                .modules
                .iter()
                .map(|(n, m)| (n.clone(), Arc::clone(m)))
                .collect();
            let gateways: Vec<(String, Arc<dyn Gateway>)> = state
                .gateways
                .iter()
                .map(|(n, g)| (n.clone(), Arc::clone(g)))
                .collect();
            (modules, gateways)
        };

        info!(environment = %new_config.environment, "propagating configuration change");
        let ctx = Context::new();

        for (name, module) in modules {
            let slice = new_config.module_config(&name);
            if let Err(err) = guarded(
                ComponentKind::Module,
                &name,
                "on_config_changed",
                timeout,
                module.on_config_changed(&ctx, slice),
            )
            .await
            {
                error!(module = %name, error = %err, "module failed to handle config change");
            }
        }

        for (name, gateway) in gateways {
            match new_config.gateway_config(&name) {
                Some(slice) => {
                    if let Err(err) = guarded(
                        ComponentKind::Gateway,
                        &name,
                        "configure",
                        timeout,
                        gateway.configure(slice),
                    )
                    .await
                    {
                        error!(gateway = %name, error = %err, "gateway failed to re-configure on config change");
                    }
                }
                None => {
                    warn!(gateway = %name, "no configuration found for gateway during config change");
                }
            }
        }
    }

    fn authorize(
        &self,
        ctx: &Context,
        permission: &str,
        operation: &str,
    ) -> Result<Principal, KernelError> {
        let Some(principal) = ctx.principal() else {
            error!(operation, "no principal in context");
            return Err(KernelError::MissingPrincipal {
                operation: operation.to_string(),
            });
        };
        if !self.access.has_permission(principal, permission) {
            error!(operation, principal = %principal, permission, "access denied");
            return Err(KernelError::PermissionDenied {
                principal: principal.to_string(),
                permission: permission.to_string(),
                operation: operation.to_string(),
            });
        }
        Ok(principal.clone())
    }

    fn timeouts(&self) -> TimeoutsConfig {
        self.config.read().timeouts
    }

    fn set_running(&self, running: bool) {
        self.state.write().running = running;
    }

    fn discard_module(&self, name: &str) {
        let mut state = self.state.write();
        state.modules.remove(name);
        state.enabled.remove(name);
    }

    fn discard_gateway(&self, name: &str) {
        self.state.write().gateways.remove(name);
    }

    async fn stop_modules_reverse(&self, started: &[Arc<dyn Module>], timeouts: &TimeoutsConfig) {
        let ctx = Context::new();
        for module in started.iter().rev() {
            let name = module.name().to_string();
            let timeout = stop_timeout(module.shutdown_timeout(), timeouts.module_operation());
            if let Err(err) = guarded(
                ComponentKind::Module,
                &name,
                "stop",
                timeout,
                module.stop(&ctx),
            )
            .await
            {
                warn!(module = %name, error = %err, "best-effort module stop failed during rollback");
            }
        }
    }
}

/// Effective stop bound: the component's own positive timeout, else the
/// configured default.
fn stop_timeout(component: Duration, default: Duration) -> Duration {
    if component > Duration::ZERO {
        component
    } else {
        default
    }
}

/// Runs one lifecycle call under a deadline and a panic trap.
///
/// A panic inside the callback is logged with component identity and
/// converted into [`KernelError::Panic`]; exceeding `timeout` abandons the
/// call and yields [`KernelError::Timeout`].
async fn guarded<F>(
    kind: ComponentKind,
    name: &str,
    operation: &'static str,
    timeout: Duration,
    fut: F,
) -> Result<(), KernelError>
where
    F: Future<Output = Result<(), ComponentError>>,
{
    match tokio::time::timeout(timeout, AssertUnwindSafe(fut).catch_unwind()).await {
        Err(_elapsed) => {
            warn!(component = name, %kind, operation, ?timeout, "lifecycle call timed out, abandoning");
            Err(KernelError::Timeout {
                kind,
                name: name.to_string(),
                operation,
                timeout,
            })
        }
        Ok(Err(payload)) => {
            let message = panic_message(payload.as_ref());
            error!(component = name, %kind, operation, %message, "panic recovered in component");
            Err(KernelError::Panic {
                kind,
                name: name.to_string(),
                operation,
                message,
            })
        }
        Ok(Ok(Err(source))) => Err(KernelError::Lifecycle {
            kind,
            name: name.to_string(),
            operation,
            source,
        }),
        Ok(Ok(Ok(()))) => Ok(()),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn snapshot_enabled(state: &KernelState) -> BTreeMap<String, Arc<dyn Module>> {
    state
        .modules
        .iter()
        .filter(|(name, _)| state.enabled.get(*name).copied().unwrap_or(false))
        .map(|(name, module)| (name.clone(), Arc::clone(module)))
        .collect()
}

fn snapshot_gateways(state: &KernelState) -> Vec<(String, Arc<dyn Gateway>)> {
    let mut gateways: Vec<(String, Arc<dyn Gateway>)> = state
        .gateways
        .iter()
        .map(|(name, gateway)| (name.clone(), Arc::clone(gateway)))
        .collect();
    gateways.sort_by(|a, b| a.0.cmp(&b.0));
    gateways
}

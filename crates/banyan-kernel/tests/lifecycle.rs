//! End-to-end lifecycle scenarios driving a real kernel with probe
//! components.

mod common;

use std::sync::Arc;
use std::time::Duration;

use banyan_component::testing::{CallLog, ProbeGateway, ProbeModule};
use banyan_component::{HealthState, HealthStatus};
use banyan_kernel::{events, DevOptions, Kernel, KernelConfig, KernelError};
use common::{kernel_with_config, system_ctx};

#[tokio::test]
async fn basic_callback_order() {
    let kernel = kernel_with_config(
        r#"
[modules.m]
message = "hi"

[gateways.g]
listen = ":0"
"#,
    );
    let ctx = system_ctx();
    let log = CallLog::new();
    let module = Arc::new(ProbeModule::new("m").with_log(log.clone()));
    let gateway = Arc::new(ProbeGateway::new("g").with_log(log.clone()));

    kernel.add_module(&ctx, module.clone()).await.unwrap();
    kernel.add_gateway(gateway.clone()).await.unwrap();

    kernel.start(&ctx).await.unwrap();
    assert_eq!(
        log.entries(),
        [
            "m.on_load",
            "m.configure",
            "g.configure",
            "m.start",
            "m.register_services",
            "m.on_ready",
            "g.start",
        ]
    );
    assert!(kernel.running());
    assert!(module.is_started());
    assert!(gateway.is_started());

    kernel.stop(&ctx).await.unwrap();
    let entries = log.entries();
    assert_eq!(&entries[entries.len() - 2..], ["g.stop", "m.stop"]);
    assert!(!kernel.running());
}

#[tokio::test]
async fn dependency_ordering() {
    let kernel = Kernel::new(KernelConfig::default());
    let ctx = system_ctx();
    let log = CallLog::new();

    let a = Arc::new(ProbeModule::new("a").with_log(log.clone()));
    let b = Arc::new(
        ProbeModule::new("b")
            .with_dependency("a", "^1.0.0")
            .with_log(log.clone()),
    );
    let c = Arc::new(
        ProbeModule::new("c")
            .with_dependency("b", "^1.0.0")
            .with_dependency("a", "^1.0.0")
            .with_log(log.clone()),
    );

    // Registration order is irrelevant; dependency order decides.
    kernel.add_module(&ctx, c).await.unwrap();
    kernel.add_module(&ctx, a).await.unwrap();
    kernel.add_module(&ctx, b).await.unwrap();

    kernel.start(&ctx).await.unwrap();
    log.assert_before("a.start", "b.start");
    log.assert_before("b.start", "c.start");

    kernel.stop(&ctx).await.unwrap();
    log.assert_before("c.stop", "b.stop");
    log.assert_before("b.stop", "a.stop");
}

#[tokio::test]
async fn version_mismatch_fails_startup() {
    let kernel = Kernel::new(KernelConfig::default());
    let ctx = system_ctx();

    kernel
        .add_module(&ctx, Arc::new(ProbeModule::new("y").with_version("1.5.0")))
        .await
        .unwrap();
    kernel
        .add_module(
            &ctx,
            Arc::new(ProbeModule::new("x").with_dependency("y", "^2.0.0")),
        )
        .await
        .unwrap();

    let err = kernel.start(&ctx).await.expect_err("version conflict");
    let msg = err.to_string();
    assert!(msg.contains('x'), "names the dependent: {msg}");
    assert!(msg.contains('y'), "names the dependency: {msg}");
    assert!(msg.contains("^2.0.0"), "names the constraint: {msg}");
    assert!(msg.contains("1.5.0"), "names the found version: {msg}");
    assert!(!kernel.running());
}

#[tokio::test]
async fn disabled_dependency_fails_until_enabled() {
    let kernel = Kernel::new(KernelConfig::default());
    let ctx = system_ctx();

    kernel
        .add_module(&ctx, Arc::new(ProbeModule::new("base")))
        .await
        .unwrap();
    kernel
        .add_module(
            &ctx,
            Arc::new(ProbeModule::new("feature").with_dependency("base", "^1.0.0")),
        )
        .await
        .unwrap();

    kernel.disable_module(&ctx, "base").await.unwrap();
    let err = kernel.start(&ctx).await.expect_err("disabled dependency");
    assert!(matches!(err, KernelError::Dependency(_)));
    assert!(!kernel.running());

    kernel.enable_module(&ctx, "base").await.unwrap();
    kernel.start(&ctx).await.unwrap();
    kernel.stop(&ctx).await.unwrap();
}

#[tokio::test]
async fn dependency_cycle_fails_startup() {
    let kernel = Kernel::new(KernelConfig::default());
    let ctx = system_ctx();

    kernel
        .add_module(
            &ctx,
            Arc::new(ProbeModule::new("a").with_dependency("b", "^1.0.0")),
        )
        .await
        .unwrap();
    kernel
        .add_module(
            &ctx,
            Arc::new(ProbeModule::new("b").with_dependency("a", "^1.0.0")),
        )
        .await
        .unwrap();

    let err = kernel.start(&ctx).await.expect_err("cycle");
    assert!(err.to_string().contains("circular dependency"));
    assert!(!kernel.running());
}

#[tokio::test]
async fn module_start_failure_rolls_back_started_modules() {
    let kernel = Kernel::new(KernelConfig::default());
    let ctx = system_ctx();
    let log = CallLog::new();

    let ok = Arc::new(ProbeModule::new("alpha").with_log(log.clone()));
    let bad = Arc::new(
        ProbeModule::new("beta")
            .with_dependency("alpha", "^1.0.0")
            .failing("start")
            .with_log(log.clone()),
    );

    kernel.add_module(&ctx, ok.clone()).await.unwrap();
    kernel.add_module(&ctx, bad).await.unwrap();

    let err = kernel.start(&ctx).await.expect_err("start failure");
    assert!(matches!(err, KernelError::Lifecycle { .. }));
    assert!(!kernel.running());
    // The already-started module was stopped again, in reverse order.
    assert!(!ok.is_started());
    log.assert_before("beta.start", "alpha.stop");
}

#[tokio::test]
async fn register_services_failure_is_fatal() {
    let kernel = Kernel::new(KernelConfig::default());
    let ctx = system_ctx();

    let ok = Arc::new(ProbeModule::new("good").with_service("good_service"));
    let bad = Arc::new(ProbeModule::new("bad").failing("register_services"));

    kernel.add_module(&ctx, ok.clone()).await.unwrap();
    kernel.add_module(&ctx, bad.clone()).await.unwrap();

    let err = kernel.start(&ctx).await.expect_err("registration failure");
    assert!(matches!(
        err,
        KernelError::Lifecycle {
            operation: "register_services",
            ..
        }
    ));
    assert!(!kernel.running());
    assert!(!ok.is_started());
    assert!(!bad.is_started());
}

#[tokio::test]
async fn on_ready_failure_stops_only_offender() {
    let kernel = Kernel::new(KernelConfig::default());
    let ctx = system_ctx();

    let healthy = Arc::new(ProbeModule::new("healthy"));
    let flaky = Arc::new(ProbeModule::new("flaky").failing("on_ready"));

    kernel.add_module(&ctx, healthy.clone()).await.unwrap();
    kernel.add_module(&ctx, flaky.clone()).await.unwrap();

    kernel.start(&ctx).await.expect("startup proceeds");
    assert!(kernel.running());
    assert!(healthy.is_started());
    assert!(!flaky.is_started());

    kernel.stop(&ctx).await.unwrap();
}

#[tokio::test]
async fn gateways_start_after_modules_and_stop_before() {
    let kernel = Kernel::new(KernelConfig::default());
    let ctx = system_ctx();
    let log = CallLog::new();

    kernel
        .add_module(&ctx, Arc::new(ProbeModule::new("m1").with_log(log.clone())))
        .await
        .unwrap();
    kernel
        .add_module(&ctx, Arc::new(ProbeModule::new("m2").with_log(log.clone())))
        .await
        .unwrap();
    kernel
        .add_gateway(Arc::new(ProbeGateway::new("gw-b").with_log(log.clone())))
        .await
        .unwrap();
    kernel
        .add_gateway(Arc::new(ProbeGateway::new("gw-a").with_log(log.clone())))
        .await
        .unwrap();

    kernel.start(&ctx).await.unwrap();
    log.assert_before("m1.start", "gw-a.start");
    log.assert_before("m2.start", "gw-a.start");
    log.assert_before("m1.start", "gw-b.start");
    // Gateway order is frozen to lexicographic for determinism.
    log.assert_before("gw-a.start", "gw-b.start");

    kernel.stop(&ctx).await.unwrap();
    log.assert_before("gw-a.stop", "m1.stop");
    log.assert_before("gw-b.stop", "m2.stop");
}

#[tokio::test]
async fn gateway_start_failure_unwinds_everything() {
    let kernel = Kernel::new(KernelConfig::default());
    let ctx = system_ctx();

    let module = Arc::new(ProbeModule::new("m"));
    let good_gw = Arc::new(ProbeGateway::new("a-good"));
    let bad_gw = Arc::new(ProbeGateway::new("b-bad").failing("start"));

    kernel.add_module(&ctx, module.clone()).await.unwrap();
    kernel.add_gateway(good_gw.clone()).await.unwrap();
    kernel.add_gateway(bad_gw).await.unwrap();

    let err = kernel.start(&ctx).await.expect_err("gateway failure");
    assert!(matches!(err, KernelError::Lifecycle { .. }));
    assert!(!kernel.running());
    assert!(!good_gw.is_started());
    assert!(!module.is_started());
}

#[tokio::test]
async fn panic_in_lifecycle_becomes_error() {
    let kernel = Kernel::new(KernelConfig::default());
    let ctx = system_ctx();

    kernel
        .add_module(&ctx, Arc::new(ProbeModule::new("wild").panicking("start")))
        .await
        .unwrap();

    let err = kernel.start(&ctx).await.expect_err("panic trapped");
    assert_eq!(
        err.to_string(),
        "panic in module wild during start: injected panic in start"
    );
    assert!(!kernel.running());
}

#[tokio::test]
async fn stop_records_first_error_but_stops_everything() {
    let kernel = Kernel::new(KernelConfig::default());
    let ctx = system_ctx();
    let log = CallLog::new();

    let fine = Arc::new(ProbeModule::new("fine").with_log(log.clone()));
    let stubborn = Arc::new(
        ProbeModule::new("stubborn")
            .failing("stop")
            .with_log(log.clone()),
    );

    kernel.add_module(&ctx, fine.clone()).await.unwrap();
    kernel.add_module(&ctx, stubborn).await.unwrap();
    kernel.start(&ctx).await.unwrap();

    let err = kernel.stop(&ctx).await.expect_err("stop failure surfaces");
    assert!(matches!(
        err,
        KernelError::Lifecycle {
            operation: "stop",
            ..
        }
    ));
    // The well-behaved module was still stopped.
    assert!(log.contains("fine.stop"));
    assert!(!fine.is_started());
    assert!(!kernel.running());
}

#[tokio::test]
async fn stop_exceeding_shutdown_timeout_is_abandoned() {
    let kernel = Kernel::new(KernelConfig::default());
    let ctx = system_ctx();

    let slow = Arc::new(
        ProbeModule::new("slow")
            .delaying("stop", Duration::from_millis(500))
            .with_shutdown_timeout(Duration::from_millis(20)),
    );
    kernel.add_module(&ctx, slow).await.unwrap();
    kernel.start(&ctx).await.unwrap();

    let err = kernel.stop(&ctx).await.expect_err("timeout");
    assert!(matches!(err, KernelError::Timeout { .. }));

    // The kernel proceeded to not-running despite the abandoned stop.
    let err = kernel.stop(&ctx).await.expect_err("second stop");
    assert!(matches!(err, KernelError::NotRunning));
}

#[tokio::test]
async fn double_start_and_double_stop_are_state_errors() {
    let kernel = Kernel::new(KernelConfig::default());
    let ctx = system_ctx();

    kernel.start(&ctx).await.unwrap();
    assert!(matches!(
        kernel.start(&ctx).await.expect_err("already running"),
        KernelError::AlreadyRunning
    ));
    assert!(kernel.running());

    kernel.stop(&ctx).await.unwrap();
    assert!(matches!(
        kernel.stop(&ctx).await.expect_err("not running"),
        KernelError::NotRunning
    ));
}

#[tokio::test]
async fn add_and_remove_module_roundtrip() {
    let kernel = Kernel::new(KernelConfig::default());
    let ctx = system_ctx();
    let registry = kernel.registry();

    let module = Arc::new(ProbeModule::new("m").with_service("m_service"));
    kernel.add_module(&ctx, module).await.unwrap();
    kernel.start(&ctx).await.unwrap();

    assert_eq!(kernel.list_modules(), ["m"]);
    assert!(registry.contains_service("m_service"));

    kernel.remove_module(&ctx, "m").await.unwrap();
    assert!(kernel.list_modules().is_empty());
    assert!(!registry.contains_service("m_service"));
    assert!(kernel.get_module("m").is_none());

    kernel.stop(&ctx).await.unwrap();
}

#[tokio::test]
async fn remove_module_restores_entry_on_stop_failure() {
    let kernel = Kernel::new(KernelConfig::default());
    let ctx = system_ctx();

    let module = Arc::new(ProbeModule::new("m").failing("stop"));
    kernel.add_module(&ctx, module).await.unwrap();
    kernel.start(&ctx).await.unwrap();

    let err = kernel.remove_module(&ctx, "m").await.expect_err("stop fails");
    assert!(matches!(err, KernelError::Lifecycle { .. }));
    assert!(kernel.get_module("m").is_some(), "module restored");
}

#[tokio::test]
async fn add_module_to_running_kernel_starts_immediately() {
    let kernel = Kernel::new(KernelConfig::default());
    let ctx = system_ctx();
    kernel.start(&ctx).await.unwrap();

    let module = Arc::new(ProbeModule::new("late").with_service("late_service"));
    kernel.add_module(&ctx, module.clone()).await.unwrap();

    assert!(module.is_started());
    assert!(kernel.registry().contains_service("late_service"));
    assert!(module.log().contains("late.on_ready"));

    kernel.stop(&ctx).await.unwrap();
}

#[tokio::test]
async fn disable_then_enable_restarts_without_duplicate_services() {
    let kernel = Kernel::new(KernelConfig::default());
    let ctx = system_ctx();
    let registry = kernel.registry();

    let module = Arc::new(ProbeModule::new("m").with_service("m_service"));
    kernel.add_module(&ctx, module.clone()).await.unwrap();
    kernel.start(&ctx).await.unwrap();

    kernel.disable_module(&ctx, "m").await.unwrap();
    assert!(!module.is_started());
    // Services are not force-unregistered on disable.
    assert!(registry.contains_service("m_service"));

    kernel.enable_module(&ctx, "m").await.unwrap();
    assert!(module.is_started());
    assert_eq!(registry.service_names(), ["m_service"]);
    // Enable re-runs start only.
    assert_eq!(module.log().position("m.register_services"), Some(2));

    kernel.stop(&ctx).await.unwrap();
}

#[tokio::test]
async fn reload_replaces_running_module() {
    let kernel = kernel_with_config(
        r#"
[modules.n]
payload = "v2"
"#,
    );
    let ctx = system_ctx();

    let original = Arc::new(ProbeModule::new("n"));
    kernel.add_module(&ctx, original.clone()).await.unwrap();
    kernel.start(&ctx).await.unwrap();

    let replacement = Arc::new(ProbeModule::new("n"));
    kernel.reload_module(replacement.clone()).await.unwrap();

    assert!(!original.is_started());
    assert!(replacement.is_started());
    assert!(replacement.log().contains("n.configure"));
    assert!(replacement.log().contains("n.on_ready"));

    kernel.stop(&ctx).await.unwrap();
}

#[tokio::test]
async fn reload_rolls_back_on_configure_failure() {
    let kernel = kernel_with_config(
        r#"
[modules.n]
payload = "v2"
"#,
    );
    let ctx = system_ctx();
    let registry = kernel.registry();

    let original = Arc::new(ProbeModule::new("n").with_service("n_service"));
    kernel.add_module(&ctx, original.clone()).await.unwrap();
    kernel.start(&ctx).await.unwrap();
    assert!(registry.contains_service("n_service"));

    let replacement = Arc::new(ProbeModule::new("n").failing("configure"));
    let err = kernel
        .reload_module(replacement.clone())
        .await
        .expect_err("configure failure");
    assert!(matches!(
        err,
        KernelError::Lifecycle {
            operation: "configure",
            ..
        }
    ));

    // The original instance is back, started, with its services intact.
    assert!(original.is_started());
    assert!(!replacement.is_started());
    assert_eq!(registry.service_names(), ["n_service"]);

    kernel.stop(&ctx).await.unwrap();
}

#[tokio::test]
async fn reload_unknown_module_is_not_found() {
    let kernel = Kernel::new(KernelConfig::default());

    let err = kernel
        .reload_module(Arc::new(ProbeModule::new("ghost")))
        .await
        .expect_err("unknown");
    assert!(matches!(err, KernelError::NotFound { .. }));
}

#[tokio::test]
async fn duplicate_names_rejected() {
    let kernel = Kernel::new(KernelConfig::default());
    let ctx = system_ctx();

    kernel
        .add_module(&ctx, Arc::new(ProbeModule::new("m")))
        .await
        .unwrap();
    assert!(matches!(
        kernel
            .add_module(&ctx, Arc::new(ProbeModule::new("m")))
            .await
            .expect_err("duplicate module"),
        KernelError::Duplicate { .. }
    ));

    kernel
        .add_gateway(Arc::new(ProbeGateway::new("g")))
        .await
        .unwrap();
    assert!(matches!(
        kernel
            .add_gateway(Arc::new(ProbeGateway::new("g")))
            .await
            .expect_err("duplicate gateway"),
        KernelError::Duplicate { .. }
    ));
}

#[tokio::test]
async fn kernel_publishes_lifecycle_events() {
    let kernel = Kernel::new(KernelConfig::default());
    let ctx = system_ctx();
    let bus = kernel.event_bus();

    let mut added = bus.subscribe(events::MODULE_ADDED);
    let mut started = bus.subscribe(events::MODULE_STARTED);
    let mut gw_started = bus.subscribe(events::GATEWAY_STARTED);
    let mut gw_stopped = bus.subscribe(events::GATEWAY_STOPPED);

    kernel
        .add_module(&ctx, Arc::new(ProbeModule::new("m")))
        .await
        .unwrap();
    kernel
        .add_gateway(Arc::new(ProbeGateway::new("g")))
        .await
        .unwrap();
    kernel.start(&ctx).await.unwrap();
    kernel.stop(&ctx).await.unwrap();

    assert_eq!(added.recv().await.unwrap().event_type(), "module.added");
    assert_eq!(started.recv().await.unwrap().event_type(), "module.started");
    assert_eq!(
        gw_started.recv().await.unwrap().event_type(),
        "gateway.started"
    );
    assert_eq!(
        gw_stopped.recv().await.unwrap().event_type(),
        "gateway.stopped"
    );
}

#[tokio::test]
async fn health_aggregates_reporters_and_defaults() {
    let kernel = Kernel::new(KernelConfig::default());
    let ctx = system_ctx();

    kernel
        .add_module(
            &ctx,
            Arc::new(ProbeModule::new("plain")),
        )
        .await
        .unwrap();
    kernel
        .add_module(
            &ctx,
            Arc::new(ProbeModule::new("tired").with_health(HealthStatus::degraded("cache cold"))),
        )
        .await
        .unwrap();
    kernel
        .add_gateway(Arc::new(
            ProbeGateway::new("edge").with_health(HealthStatus::unhealthy("listener down")),
        ))
        .await
        .unwrap();

    let report = kernel.health(&ctx).await;

    let plain = &report["module:plain"];
    assert!(plain.is_healthy());
    assert!(plain.message.as_deref().unwrap_or("").contains("no health reporter"));

    assert_eq!(report["module:tired"].state, HealthState::Degraded);
    assert_eq!(report["gateway:edge"].state, HealthState::Unhealthy);
}

#[tokio::test]
async fn config_change_fans_out_to_components() {
    let kernel = kernel_with_config(
        r#"
[modules.m]
mode = "old"

[gateways.g]
mode = "old"
"#,
    );
    let ctx = system_ctx();

    let module = Arc::new(ProbeModule::new("m"));
    let gateway = Arc::new(ProbeGateway::new("g"));
    kernel.add_module(&ctx, module.clone()).await.unwrap();
    kernel.add_gateway(gateway.clone()).await.unwrap();
    kernel.start(&ctx).await.unwrap();

    let new_config = KernelConfig::from_toml(
        r#"
[modules.m]
mode = "new"

[gateways.g]
mode = "new"
"#,
    )
    .unwrap();
    kernel.apply_config_change(new_config).await;

    assert!(module.log().contains("m.on_config_changed"));
    let slice = module.last_config().expect("new module slice");
    assert_eq!(slice.get("mode").and_then(|v| v.as_str()), Some("new"));

    let slice = gateway.last_config().expect("new gateway slice");
    assert_eq!(slice.get("mode").and_then(|v| v.as_str()), Some("new"));

    kernel.stop(&ctx).await.unwrap();
}

#[tokio::test]
async fn config_change_failure_does_not_block_peers() {
    let kernel = Kernel::new(KernelConfig::default());
    let ctx = system_ctx();

    let flaky = Arc::new(ProbeModule::new("flaky").failing("on_config_changed"));
    let steady = Arc::new(ProbeModule::new("steady"));
    kernel.add_module(&ctx, flaky).await.unwrap();
    kernel.add_module(&ctx, steady.clone()).await.unwrap();

    kernel.apply_config_change(KernelConfig::default()).await;

    assert!(steady.log().contains("steady.on_config_changed"));
}

#[tokio::test]
async fn run_dev_starts_and_stops_owned_kernel() {
    let kernel = Kernel::new(KernelConfig::default());
    let ctx = system_ctx();

    let module = Arc::new(ProbeModule::new("m"));
    kernel.add_module(&ctx, module.clone()).await.unwrap();

    kernel
        .run_dev(&ctx, DevOptions::ticks(2))
        .await
        .expect("run_dev");

    assert!(!kernel.running());
    assert!(module.log().contains("m.start"));
    assert!(module.log().contains("m.stop"));
}

#[tokio::test]
async fn run_dev_leaves_externally_started_kernel_running() {
    let kernel = Kernel::new(KernelConfig::default());
    let ctx = system_ctx();

    kernel.start(&ctx).await.unwrap();
    kernel
        .run_dev(&ctx, DevOptions::ticks(1))
        .await
        .expect("run_dev");

    assert!(kernel.running(), "kernel was not started by run_dev");
    kernel.stop(&ctx).await.unwrap();
}

//! End-to-end monitoring scenarios driven through the plugin on a paused
//! clock: a fast healthy call, a slow healthy call, and a host that goes
//! silent mid-call.
//!
//! Cadence note: once a probe ran, the loop sleeps
//! `max(interval - probe_elapsed, 3000)` ms, so with a 1000 ms interval the
//! probes land 3 s apart. With a 5 s grace window and a 3 s unavailability
//! threshold the verdict lands on the probe at T=14 s: T=5 s is still inside
//! the grace window, T=8 s starts the streak, T=11 s sits exactly on the
//! threshold, T=14 s exceeds it.

use std::sync::Arc;
use std::time::Duration;

use serial_test::serial;
use tokio::time::sleep;

use hostguard::core::driver::PluginService;
use hostguard::core::error::{WrapperError, WrapperResult};
use hostguard::core::host::HostAvailability;
use hostguard::core::monitoring::HostMonitoringPlugin;

use crate::common::{detection_props, host_with_aliases, ExecBehavior, MockConnection, MockPluginService};

#[tokio::test(start_paused = true)]
#[serial]
async fn fast_healthy_call_sees_no_probes() {
    let plugin_service = MockPluginService::new();
    let host = host_with_aliases("db-1", &[]);
    plugin_service.set_current(Arc::new(MockConnection::new()), host);
    let plugin = HostMonitoringPlugin::new(
        Arc::clone(&plugin_service) as Arc<dyn PluginService>,
        detection_props(5000, 1000, 3, 60_000),
    );

    let result: WrapperResult<&str> = plugin
        .execute("Cursor.execute", async {
            sleep(Duration::from_millis(200)).await;
            Ok("rows")
        })
        .await;

    assert_eq!(result.expect("result"), "rows");
    // The call ended inside the grace window: no probe ever ran and no
    // availability transition happened.
    assert_eq!(plugin_service.force_connect_count(), 0);
    assert!(plugin_service.availability_events().is_empty());
    plugin.release_resources();
}

#[tokio::test(start_paused = true)]
#[serial]
async fn slow_healthy_call_is_probed_and_survives() {
    let plugin_service = MockPluginService::new();
    let host = host_with_aliases("db-1", &[]);
    plugin_service.set_current(Arc::new(MockConnection::new()), host.clone());
    let plugin = HostMonitoringPlugin::new(
        Arc::clone(&plugin_service) as Arc<dyn PluginService>,
        detection_props(5000, 1000, 3, 60_000),
    );

    let result: WrapperResult<&str> = plugin
        .execute("Cursor.execute", async {
            sleep(Duration::from_secs(10)).await;
            Ok("rows")
        })
        .await;

    assert_eq!(result.expect("result"), "rows");
    // Probing started once the grace window elapsed: the monitoring
    // connection was opened (the first probe) and the sentinel query ran on
    // the later ticks. Healthy probes leave availability untouched.
    let monitoring_conns = plugin_service.connections_for(&host.url);
    assert_eq!(monitoring_conns.len(), 1);
    assert!(monitoring_conns[0].execute_count() >= 1);
    assert!(plugin_service.availability_events().is_empty());
    plugin.release_resources();
}

#[tokio::test(start_paused = true)]
#[serial]
async fn silent_host_aborts_the_call_and_surfaces_unavailable() {
    let plugin_service = MockPluginService::new();
    let host = host_with_aliases("db-1", &[]);
    let app_conn = Arc::new(MockConnection::new());
    plugin_service.set_current(Arc::clone(&app_conn), host.clone());
    // Every sentinel query on the monitoring connection fails.
    plugin_service.set_default_exec_behavior(ExecBehavior::FailNetwork);

    let plugin = HostMonitoringPlugin::new(
        Arc::clone(&plugin_service) as Arc<dyn PluginService>,
        detection_props(5000, 1000, 3, 60_000),
    );

    let result: WrapperResult<&str> = plugin
        .execute("Cursor.execute", async {
            // The in-flight call outlives the verdict and even "succeeds".
            sleep(Duration::from_secs(20)).await;
            Ok("rows")
        })
        .await;

    // The verdict overrides the call's own result.
    assert!(matches!(result, Err(WrapperError::UnavailableHost(_))));

    // The in-flight connection was aborted exactly once, the host's aliases
    // were marked NOT_AVAILABLE, and the connection was closed.
    assert_eq!(plugin_service.mock_dialect().abort_count(), 1);
    assert!(app_conn.is_closed());
    let mut expected_aliases: Vec<String> = host.all_aliases.iter().cloned().collect();
    expected_aliases.sort();
    assert!(plugin_service
        .availability_events()
        .contains(&(expected_aliases, HostAvailability::NotAvailable)));
    plugin.release_resources();
}

#[tokio::test(start_paused = true)]
#[serial]
async fn verdict_lands_within_the_detection_budget() {
    let plugin_service = MockPluginService::new();
    let host = host_with_aliases("db-1", &[]);
    let app_conn = Arc::new(MockConnection::new());
    plugin_service.set_current(Arc::clone(&app_conn), host);
    plugin_service.set_default_exec_behavior(ExecBehavior::FailNetwork);

    let plugin = HostMonitoringPlugin::new(
        Arc::clone(&plugin_service) as Arc<dyn PluginService>,
        detection_props(5000, 1000, 3, 60_000),
    );

    let started = tokio::time::Instant::now();
    let result: WrapperResult<&str> = plugin
        .execute("Cursor.execute", async {
            sleep(Duration::from_secs(30)).await;
            Ok("rows")
        })
        .await;

    assert!(matches!(result, Err(WrapperError::UnavailableHost(_))));
    // The call itself returns at T=30 s; the verdict was in place by the
    // T=14 s probe (grace to 5 s, streak from 8 s, threshold crossed at 14 s).
    assert!(started.elapsed() <= Duration::from_secs(31));
    assert_eq!(plugin_service.mock_dialect().abort_count(), 1);
    plugin.release_resources();
}

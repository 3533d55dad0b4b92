//! Per-caller monitoring facade.
//!
//! Each plugin owns one `MonitorService`. The service resolves monitors
//! through the process-wide registry, caching the last `(aliases, monitor)`
//! pair so repeated calls against the same host skip the registry lookup.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::core::driver::{Connection, PluginService};
use crate::core::error::{WrapperError, WrapperResult};
use crate::core::host::HostInfo;
use crate::core::monitoring::context::MonitoringContext;
use crate::core::monitoring::lock;
use crate::core::monitoring::monitor::Monitor;
use crate::core::monitoring::registry::MonitorRegistry;
use crate::core::props::Properties;

pub struct MonitorService {
    plugin_service: Arc<dyn PluginService>,
    registry: &'static MonitorRegistry,
    cached_monitor: Mutex<Option<(HashSet<String>, Arc<Monitor>)>>,
    released: AtomicBool,
}

impl MonitorService {
    pub fn new(plugin_service: Arc<dyn PluginService>) -> Self {
        Self {
            plugin_service,
            registry: MonitorRegistry::acquire(),
            cached_monitor: Mutex::new(None),
            released: AtomicBool::new(false),
        }
    }

    /// Creates a context for one wrapped call and submits it to the host's
    /// monitor. Errors on an empty alias set or an unresolvable dialect.
    pub async fn start_monitoring(
        &self,
        connection: Arc<dyn Connection>,
        host_aliases: &HashSet<String>,
        host_info: &HostInfo,
        props: &Properties,
        failure_detection_time_ms: u64,
        failure_detection_interval_ms: u64,
        failure_detection_count: u32,
    ) -> WrapperResult<Arc<MonitoringContext>> {
        if host_aliases.is_empty() {
            return Err(WrapperError::Configuration(format!(
                "cannot monitor {}: the host has no aliases",
                host_info.url
            )));
        }

        let monitor = self.resolve_monitor(host_aliases, host_info, props)?;

        let dialect = match self.plugin_service.dialect() {
            Some(dialect) => dialect,
            None => {
                self.plugin_service.update_dialect().await?;
                self.plugin_service.dialect().ok_or(WrapperError::NoDialect)?
            }
        };

        let context = Arc::new(MonitoringContext::new(
            Arc::clone(&monitor),
            connection,
            dialect,
            failure_detection_time_ms,
            failure_detection_interval_ms,
            failure_detection_count,
        ));
        monitor.start_monitoring(&context);
        Ok(context)
    }

    fn resolve_monitor(
        &self,
        host_aliases: &HashSet<String>,
        host_info: &HostInfo,
        props: &Properties,
    ) -> WrapperResult<Arc<Monitor>> {
        let mut cached = lock(&self.cached_monitor);
        if let Some((aliases, monitor)) = cached.as_ref() {
            if aliases == host_aliases {
                return Ok(Arc::clone(monitor));
            }
        }

        let plugin_service = Arc::clone(&self.plugin_service);
        let supplier_host = host_info.clone();
        let supplier_props = props.clone();
        let monitor = self.registry.get_or_create_monitor(host_aliases, move || {
            Some(Arc::new(Monitor::new(
                plugin_service,
                supplier_host,
                supplier_props,
            )))
        })?;

        *cached = Some((host_aliases.clone(), Arc::clone(&monitor)));
        Ok(monitor)
    }

    pub fn stop_monitoring(&self, context: &Arc<MonitoringContext>) {
        context.monitor().stop_monitoring(context);
    }

    /// Stops all monitoring for the host registered under any of `aliases`:
    /// its contexts are cleared and the monitor is parked for reuse.
    pub fn stop_monitoring_host(&self, host_aliases: &HashSet<String>) {
        for alias in host_aliases {
            if let Some(monitor) = self.registry.get_monitor(alias) {
                monitor.clear_contexts();
                self.registry.reset_resource(&monitor);
                return;
            }
        }
    }

    /// Drops this caller's registry reference. Idempotent.
    pub fn release_resources(&self) {
        if !self.released.swap(true, Ordering::SeqCst) {
            self.registry.release_instance();
        }
    }
}

impl Drop for MonitorService {
    fn drop(&mut self) {
        self.release_resources();
    }
}

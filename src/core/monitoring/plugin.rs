//! Call wrapping for failure detection.
//!
//! `HostMonitoringPlugin` brackets each network-bound application call with
//! a monitoring context: the context is submitted before the call starts and
//! stopped on every exit path. When the monitor's verdict says the host went
//! unavailable mid-call, the plugin marks the host down, closes the
//! application connection best-effort, and raises a host-unavailable error
//! that overrides whatever the call itself produced.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;

use tracing::debug;

use crate::core::driver::{Connection, PluginService};
use crate::core::endpoint;
use crate::core::error::{WrapperError, WrapperResult};
use crate::core::host::{HostAvailability, HostEvent, HostInfo};
use crate::core::monitoring::service::MonitorService;
use crate::core::props::{
    Properties, FAILURE_DETECTION_COUNT, FAILURE_DETECTION_ENABLED, FAILURE_DETECTION_INTERVAL_MS,
    FAILURE_DETECTION_TIME_MS,
};

/// Driver methods that hit the network and are therefore wrapped. Everything
/// else passes straight through.
pub const NETWORK_BOUND_METHODS: &[&str] = &[
    "Connection.commit",
    "Connection.autocommit",
    "Connection.rollback",
    "Connection.cursor",
    "Cursor.callproc",
    "Cursor.execute",
    "Cursor.executemany",
    "Cursor.fetchone",
    "Cursor.fetchmany",
    "Cursor.fetchall",
];

pub struct HostMonitoringPlugin {
    plugin_service: Arc<dyn PluginService>,
    props: Properties,
    monitor_service: MonitorService,
    /// Effective monitoring host, resolved once and kept until the topology
    /// changes. Cluster endpoints resolve to their underlying instance.
    monitoring_host_info: tokio::sync::Mutex<Option<HostInfo>>,
    /// Serializes verdict post-processing against re-entrant callers.
    post_lock: tokio::sync::Mutex<()>,
}

impl HostMonitoringPlugin {
    pub fn new(plugin_service: Arc<dyn PluginService>, props: Properties) -> Self {
        Self {
            monitor_service: MonitorService::new(Arc::clone(&plugin_service)),
            plugin_service,
            props,
            monitoring_host_info: tokio::sync::Mutex::new(None),
            post_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Executes one driver call under monitoring. Non-network-bound methods
    /// and disabled failure detection pass through untouched.
    pub async fn execute<T, F>(&self, method_name: &str, execute_call: F) -> WrapperResult<T>
    where
        F: Future<Output = WrapperResult<T>>,
    {
        let connection = self
            .plugin_service
            .current_connection()
            .ok_or_else(|| WrapperError::NoConnection(method_name.to_string()))?;
        let host_info = self
            .plugin_service
            .current_host_info()
            .ok_or_else(|| WrapperError::NoHostInfo(method_name.to_string()))?;

        if !self.props.get_bool(&FAILURE_DETECTION_ENABLED)
            || !NETWORK_BOUND_METHODS.contains(&method_name)
        {
            return execute_call.await;
        }

        let failure_detection_time_ms = self.props.get_u64(&FAILURE_DETECTION_TIME_MS);
        let failure_detection_interval_ms = self.props.get_u64(&FAILURE_DETECTION_INTERVAL_MS);
        let failure_detection_count = self.props.get_u32(&FAILURE_DETECTION_COUNT);

        let monitoring_host = self.monitoring_host_info().await?;

        debug!(method = method_name, "monitoring activated");
        let context = self
            .monitor_service
            .start_monitoring(
                Arc::clone(&connection),
                &monitoring_host.all_aliases,
                &monitoring_host,
                &self.props,
                failure_detection_time_ms,
                failure_detection_interval_ms,
                failure_detection_count,
            )
            .await?;

        let result = execute_call.await;

        // Every exit path stops the context and inspects the verdict. The
        // lock keeps availability-transition + close + raise atomic with
        // respect to a re-entrant caller.
        let _guard = self.post_lock.lock().await;
        self.monitor_service.stop_monitoring(&context);
        if context.is_host_unavailable() {
            self.plugin_service
                .set_availability(&monitoring_host.all_aliases, HostAvailability::NotAvailable);
            if let Some(dialect) = self.plugin_service.dialect() {
                if !dialect.is_closed(connection.as_ref()).await {
                    if let Err(err) = connection.close().await {
                        debug!(error = %err, "closing the unavailable host's connection failed");
                    }
                }
            }
            // The verdict wins even when the call itself finished cleanly.
            return Err(WrapperError::UnavailableHost(host_info.as_alias()));
        }
        debug!(method = method_name, "monitoring deactivated");

        result
    }

    /// Connection-open hook (both regular and forced opens): a connection to
    /// a cluster-shaped endpoint gets its aliases re-learned, since the DNS
    /// name says nothing stable about the underlying instance.
    pub async fn connect<F>(
        &self,
        host_info: &mut HostInfo,
        connect_call: F,
    ) -> WrapperResult<Arc<dyn Connection>>
    where
        F: Future<Output = WrapperResult<Arc<dyn Connection>>>,
    {
        let connection = connect_call.await?;
        if endpoint::is_cluster_endpoint(&host_info.host) {
            host_info.reset_aliases();
            self.plugin_service
                .fill_aliases(Some(Arc::clone(&connection)), host_info)
                .await?;
        }
        Ok(connection)
    }

    /// Reacts to topology changes: a monitoring host that went down or was
    /// deleted has its monitor stopped, and the cached monitoring host is
    /// invalidated either way.
    pub async fn notify_host_list_changed(&self, changes: &HashMap<String, HashSet<HostEvent>>) {
        let mut cached = self.monitoring_host_info.lock().await;
        if let Some(monitoring_host) = cached.as_ref() {
            let affected = changes.iter().any(|(url, events)| {
                (monitoring_host.all_aliases.contains(url) || *url == monitoring_host.url)
                    && (events.contains(&HostEvent::WentDown)
                        || events.contains(&HostEvent::HostDeleted))
            });
            if affected && !monitoring_host.all_aliases.is_empty() {
                debug!(host = %monitoring_host.url, "monitoring host changed, stopping its monitor");
                self.monitor_service
                    .stop_monitoring_host(&monitoring_host.all_aliases);
            }
        }
        *cached = None;
    }

    async fn monitoring_host_info(&self) -> WrapperResult<HostInfo> {
        let mut cached = self.monitoring_host_info.lock().await;
        if let Some(host) = cached.as_ref() {
            return Ok(host.clone());
        }

        let current = self
            .plugin_service
            .current_host_info()
            .ok_or_else(|| WrapperError::NoHostInfo("monitoring".to_string()))?;

        let mut monitoring_host = current.clone();
        if endpoint::is_cluster_endpoint(&current.host) {
            debug!(host = %current.host, "resolving cluster endpoint to its underlying host");
            monitoring_host = match self.plugin_service.identify_connection().await {
                Ok(Some(host)) => host,
                Ok(None) => {
                    return Err(WrapperError::Configuration(format!(
                        "unable to identify the host behind {} via {}",
                        current.host,
                        self.plugin_service.host_list_provider()
                    )))
                }
                Err(err) => {
                    return Err(WrapperError::Configuration(format!(
                        "error identifying the connected host: {}",
                        err
                    )))
                }
            };
            self.plugin_service
                .fill_aliases(None, &mut monitoring_host)
                .await?;
        }

        *cached = Some(monitoring_host.clone());
        Ok(monitoring_host)
    }

    pub fn release_resources(&self) {
        self.monitor_service.release_resources();
    }
}

//! Host liveness checks.
//!
//! `HostStatusProbe` issues one check per monitor tick: either the sentinel
//! query on the standing monitoring connection under a hard wall-clock
//! timeout, or, when that connection is missing or closed, a fresh
//! connection open whose duration counts as the probe itself. Errors never
//! propagate; every failure is reported as an unavailable status.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::debug;

use crate::core::driver::{Connection, Dialect, PluginService};
use crate::core::error::{WrapperError, WrapperResult};
use crate::core::host::HostInfo;
use crate::core::monitoring::clock::MonotonicClock;
use crate::core::props::Properties;

/// Outcome of one liveness check.
#[derive(Debug, Clone, Copy)]
pub struct ProbeStatus {
    pub is_available: bool,
    pub elapsed_ns: u64,
}

pub struct HostStatusProbe {
    plugin_service: Arc<dyn PluginService>,
    host_info: HostInfo,
    props: Properties,
    clock: MonotonicClock,
    // Owned by the monitor loop; no other task touches it.
    monitoring_conn: Mutex<Option<Arc<dyn Connection>>>,
}

impl HostStatusProbe {
    pub fn new(
        plugin_service: Arc<dyn PluginService>,
        host_info: HostInfo,
        props: Properties,
        clock: MonotonicClock,
    ) -> Self {
        Self {
            plugin_service,
            host_info,
            props,
            clock,
            monitoring_conn: Mutex::new(None),
        }
    }

    /// Runs one check bounded by `timeout_ms`. Never fails: internal errors
    /// count as an unavailable host.
    pub async fn check(&self, timeout_ms: u64) -> ProbeStatus {
        let start_ns = self.clock.now_ns();
        match self.try_check(timeout_ms).await {
            Ok(status) => status,
            Err(err) => {
                debug!(host = %self.host_info.url, error = %err, "host check failed");
                ProbeStatus {
                    is_available: false,
                    elapsed_ns: self.clock.now_ns().saturating_sub(start_ns),
                }
            }
        }
    }

    async fn try_check(&self, timeout_ms: u64) -> WrapperResult<ProbeStatus> {
        let dialect = self.resolve_dialect().await?;

        let mut guard = self.monitoring_conn.lock().await;
        let mut usable = None;
        if let Some(conn) = guard.as_ref() {
            if !dialect.is_closed(conn.as_ref()).await {
                usable = Some(Arc::clone(conn));
            }
        }

        let conn = match usable {
            Some(conn) => conn,
            None => {
                // Opening the monitoring connection is itself the probe.
                let probe_props = self.props.monitoring_properties();
                debug!(host = %self.host_info.url, "opening monitoring connection");
                let start_ns = self.clock.now_ns();
                let conn = self
                    .plugin_service
                    .force_connect(&self.host_info, &probe_props, None)
                    .await?;
                let elapsed_ns = self.clock.now_ns().saturating_sub(start_ns);
                *guard = Some(conn);
                debug!(host = %self.host_info.url, "opened monitoring connection");
                return Ok(ProbeStatus {
                    is_available: true,
                    elapsed_ns,
                });
            }
        };

        let start_ns = self.clock.now_ns();
        let is_available = self
            .execute_conn_check(conn.as_ref(), dialect.host_alive_query(), timeout_ms)
            .await;
        Ok(ProbeStatus {
            is_available,
            elapsed_ns: self.clock.now_ns().saturating_sub(start_ns),
        })
    }

    async fn resolve_dialect(&self) -> WrapperResult<Arc<dyn Dialect>> {
        if let Some(dialect) = self.plugin_service.dialect() {
            return Ok(dialect);
        }
        // Refresh once; persistent absence fails the probe.
        self.plugin_service.update_dialect().await?;
        self.plugin_service.dialect().ok_or(WrapperError::NoDialect)
    }

    async fn execute_conn_check(&self, conn: &dyn Connection, sql: &str, timeout_ms: u64) -> bool {
        let check = async {
            let mut cursor = conn.cursor()?;
            cursor.execute(sql).await
        };
        matches!(
            tokio::time::timeout(Duration::from_millis(timeout_ms), check).await,
            Ok(Ok(()))
        )
    }

    /// Drops the standing monitoring connection, closing it best-effort.
    pub(crate) async fn close_connection(&self) {
        if let Some(conn) = self.monitoring_conn.lock().await.take() {
            if let Err(err) = conn.close().await {
                debug!(host = %self.host_info.url, error = %err, "closing monitoring connection failed");
            }
        }
    }
}

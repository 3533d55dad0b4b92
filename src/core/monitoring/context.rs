//! Per-call monitoring state.
//!
//! A `MonitoringContext` is created for each wrapped network-bound call and
//! submitted to the host's `Monitor`. The monitor feeds probe results into
//! the context; the plugin inspects the verdict once the call returns. State
//! is kept in atomics so the caller-side stop and the monitor-side dispatch
//! never contend on a lock.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::core::driver::{Connection, Dialect};
use crate::core::monitoring::clock::NANOS_PER_MS;
use crate::core::monitoring::monitor::Monitor;

pub struct MonitoringContext {
    monitor: Arc<Monitor>,
    connection: Arc<dyn Connection>,
    dialect: Arc<dyn Dialect>,

    failure_detection_time_ms: u64,
    failure_detection_interval_ms: u64,
    failure_detection_count: u32,

    /// Time of context submission.
    monitor_start_time_ns: AtomicU64,
    /// Time when probes start affecting the verdict. Fixed at submission.
    active_monitoring_start_time_ns: AtomicU64,
    /// First probe-start of the current unavailable streak; 0 while healthy.
    unavailable_since_ns: AtomicU64,
    current_failure_count: AtomicU32,
    /// Terminal verdict, sticky once set.
    is_host_unavailable: AtomicBool,
    is_active: AtomicBool,
}

impl MonitoringContext {
    pub fn new(
        monitor: Arc<Monitor>,
        connection: Arc<dyn Connection>,
        dialect: Arc<dyn Dialect>,
        failure_detection_time_ms: u64,
        failure_detection_interval_ms: u64,
        failure_detection_count: u32,
    ) -> Self {
        Self {
            monitor,
            connection,
            dialect,
            failure_detection_time_ms,
            failure_detection_interval_ms,
            failure_detection_count,
            monitor_start_time_ns: AtomicU64::new(0),
            active_monitoring_start_time_ns: AtomicU64::new(0),
            unavailable_since_ns: AtomicU64::new(0),
            current_failure_count: AtomicU32::new(0),
            is_host_unavailable: AtomicBool::new(false),
            is_active: AtomicBool::new(true),
        }
    }

    pub fn monitor(&self) -> &Arc<Monitor> {
        &self.monitor
    }

    pub fn failure_detection_interval_ms(&self) -> u64 {
        self.failure_detection_interval_ms
    }

    pub fn active_monitoring_start_time_ns(&self) -> u64 {
        self.active_monitoring_start_time_ns.load(Ordering::SeqCst)
    }

    pub fn is_active(&self) -> bool {
        self.is_active.load(Ordering::SeqCst)
    }

    pub fn set_inactive(&self) {
        self.is_active.store(false, Ordering::SeqCst);
    }

    pub fn is_host_unavailable(&self) -> bool {
        self.is_host_unavailable.load(Ordering::SeqCst)
    }

    pub fn current_failure_count(&self) -> u32 {
        self.current_failure_count.load(Ordering::SeqCst)
    }

    /// Stamps the submission time and fixes the point at which probes start
    /// counting.
    pub fn set_monitor_start_time_ns(&self, start_time_ns: u64) {
        self.monitor_start_time_ns
            .store(start_time_ns, Ordering::SeqCst);
        self.active_monitoring_start_time_ns.store(
            start_time_ns + self.failure_detection_time_ms.saturating_mul(NANOS_PER_MS),
            Ordering::SeqCst,
        );
    }

    /// Feeds one probe result into the context. Results landing inside the
    /// grace window are ignored, even stale ones.
    pub async fn update_host_status(
        &self,
        url: &str,
        check_start_ns: u64,
        check_end_ns: u64,
        is_available: bool,
    ) {
        if !self.is_active() {
            return;
        }

        let elapsed_ns =
            check_end_ns.saturating_sub(self.monitor_start_time_ns.load(Ordering::SeqCst));
        if elapsed_ns > self.failure_detection_time_ms.saturating_mul(NANOS_PER_MS) {
            self.set_host_availability(url, is_available, check_start_ns, check_end_ns)
                .await;
        }
    }

    async fn set_host_availability(
        &self,
        url: &str,
        is_available: bool,
        check_start_ns: u64,
        check_end_ns: u64,
    ) {
        if is_available {
            self.current_failure_count.store(0, Ordering::SeqCst);
            self.unavailable_since_ns.store(0, Ordering::SeqCst);
            self.is_host_unavailable.store(false, Ordering::SeqCst);
            return;
        }

        let failures = self.current_failure_count.fetch_add(1, Ordering::SeqCst) + 1;
        // Latch the start of the unavailable streak at the first failed probe.
        let _ = self.unavailable_since_ns.compare_exchange(
            0,
            check_start_ns,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );

        let unavailable_ns =
            check_end_ns.saturating_sub(self.unavailable_since_ns.load(Ordering::SeqCst));
        let threshold_ms = self
            .failure_detection_interval_ms
            .saturating_mul(u64::from(self.failure_detection_count));

        if unavailable_ns > threshold_ms.saturating_mul(NANOS_PER_MS) {
            if !self.is_host_unavailable.swap(true, Ordering::SeqCst) {
                debug!(host = url, failures, "host declared unavailable");
                self.abort_connection().await;
            }
            return;
        }

        debug!(host = url, failures, "host not responding");
    }

    async fn abort_connection(&self) {
        if !self.is_active() {
            return;
        }
        if let Err(err) = self
            .dialect
            .abort_connection(self.connection.as_ref())
            .await
        {
            // Never rethrown; the verdict already stands.
            debug!(error = %err, "aborting the monitored connection failed");
        }
    }
}

//! Long-lived per-host monitoring worker.
//!
//! One `Monitor` serves every concurrent caller on the same host, so the
//! probe cost is amortized across contexts. Fresh contexts wait in
//! `new_contexts` until their grace window has elapsed, then move to
//! `active_contexts` where each probe result is dispatched to them. A monitor
//! with nothing to do disposes of itself after `monitor_disposal_time_ms`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::debug;

use crate::core::driver::PluginService;
use crate::core::host::HostInfo;
use crate::core::monitoring::clock::{MonotonicClock, NANOS_PER_MS};
use crate::core::monitoring::context::MonitoringContext;
use crate::core::monitoring::lock;
use crate::core::monitoring::probe::HostStatusProbe;
use crate::core::monitoring::registry::MonitorRegistry;
use crate::core::props::{Properties, MONITOR_DISPOSAL_TIME_MS};

const INACTIVE_SLEEP_MS: u64 = 100;
const MIN_HOST_CHECK_TIMEOUT_MS: u64 = 3000;

pub struct Monitor {
    host_info: HostInfo,
    probe: HostStatusProbe,
    clock: MonotonicClock,

    new_contexts: Mutex<VecDeque<Arc<MonitoringContext>>>,
    active_contexts: Mutex<VecDeque<Arc<MonitoringContext>>>,

    is_stopped: AtomicBool,
    last_used_ns: AtomicU64,
    /// Adaptive probe timeout, floored at `MIN_HOST_CHECK_TIMEOUT_MS`.
    host_check_timeout_ms: AtomicU64,
    monitor_disposal_time_ms: u64,
}

impl Monitor {
    pub fn new(
        plugin_service: Arc<dyn PluginService>,
        host_info: HostInfo,
        props: Properties,
    ) -> Self {
        let monitor_disposal_time_ms = props.get_u64(&MONITOR_DISPOSAL_TIME_MS);
        let clock = MonotonicClock::new();
        Self {
            probe: HostStatusProbe::new(plugin_service, host_info.clone(), props, clock),
            host_info,
            clock,
            new_contexts: Mutex::new(VecDeque::new()),
            active_contexts: Mutex::new(VecDeque::new()),
            is_stopped: AtomicBool::new(false),
            last_used_ns: AtomicU64::new(clock.now_ns()),
            host_check_timeout_ms: AtomicU64::new(MIN_HOST_CHECK_TIMEOUT_MS),
            monitor_disposal_time_ms,
        }
    }

    pub fn host_info(&self) -> &HostInfo {
        &self.host_info
    }

    pub fn is_stopped(&self) -> bool {
        self.is_stopped.load(Ordering::SeqCst)
    }

    /// Requests the loop to exit at its next check. Best-effort: a loop
    /// blocked in a probe finishes that probe first.
    pub fn stop(&self) {
        self.is_stopped.store(true, Ordering::SeqCst);
    }

    /// Stamps the submission time on `context` and queues it for monitoring.
    pub fn start_monitoring(&self, context: &Arc<MonitoringContext>) {
        let current_ns = self.clock.now_ns();
        context.set_monitor_start_time_ns(current_ns);
        self.last_used_ns.store(current_ns, Ordering::SeqCst);
        lock(&self.new_contexts).push_back(Arc::clone(context));
    }

    /// Marks `context` inactive. Removal from the queues is lazy: the loop
    /// discards inactive contexts at its next dequeue.
    pub fn stop_monitoring(&self, context: &Arc<MonitoringContext>) {
        context.set_inactive();
        self.last_used_ns.store(self.clock.now_ns(), Ordering::SeqCst);
    }

    pub fn clear_contexts(&self) {
        lock(&self.new_contexts).clear();
        lock(&self.active_contexts).clear();
    }

    /// The monitor loop. Runs until stopped or self-disposed; never
    /// propagates an error: probe failures become unavailable statuses.
    pub async fn run(self: Arc<Self>) {
        self.is_stopped.store(false, Ordering::SeqCst);
        debug!(host = %self.host_info.url, "monitor started");

        loop {
            if self.is_stopped() {
                break;
            }
            let current_ns = self.clock.now_ns();

            // Stage new contexts whose grace window has started. The first
            // re-enqueued context marks a full cycle; seeing it again means
            // everything left is still waiting, so move on.
            let mut first_requeued: Option<Arc<MonitoringContext>> = None;
            loop {
                let popped = lock(&self.new_contexts).pop_front();
                let Some(context) = popped else { break };

                if let Some(first) = &first_requeued {
                    if Arc::ptr_eq(first, &context) {
                        lock(&self.new_contexts).push_back(context);
                        break;
                    }
                }
                if !context.is_active() {
                    continue;
                }
                if current_ns >= context.active_monitoring_start_time_ns() {
                    lock(&self.active_contexts).push_back(context);
                } else {
                    lock(&self.new_contexts).push_back(Arc::clone(&context));
                    if first_requeued.is_none() {
                        first_requeued = Some(context);
                    }
                }
            }

            if lock(&self.active_contexts).is_empty() {
                let idle_ns = self.clock.now_ns().saturating_sub(self.last_used_ns.load(Ordering::SeqCst));
                if idle_ns >= self.monitor_disposal_time_ms.saturating_mul(NANOS_PER_MS) {
                    debug!(host = %self.host_info.url, "monitor idle past disposal time, releasing");
                    self.probe.close_connection().await;
                    self.is_stopped.store(true, Ordering::SeqCst);
                    MonitorRegistry::instance().release_monitor(&self);
                    return;
                }
                tokio::time::sleep(Duration::from_millis(INACTIVE_SLEEP_MS)).await;
                continue;
            }

            let check_start_ns = self.clock.now_ns();
            self.last_used_ns.store(check_start_ns, Ordering::SeqCst);
            let status = self
                .probe
                .check(self.host_check_timeout_ms.load(Ordering::SeqCst))
                .await;

            // Dispatch the result to every active context, keeping the
            // smallest surviving interval as the next delay.
            let mut delay_ms: Option<u64> = None;
            let mut first_requeued: Option<Arc<MonitoringContext>> = None;
            loop {
                let popped = lock(&self.active_contexts).pop_front();
                let Some(context) = popped else { break };

                if !context.is_active() {
                    continue;
                }
                if let Some(first) = &first_requeued {
                    if Arc::ptr_eq(first, &context) {
                        lock(&self.active_contexts).push_back(context);
                        break;
                    }
                }

                context
                    .update_host_status(
                        &self.host_info.url,
                        check_start_ns,
                        check_start_ns + status.elapsed_ns,
                        status.is_available,
                    )
                    .await;

                if !context.is_active() || context.is_host_unavailable() {
                    continue;
                }

                lock(&self.active_contexts).push_back(Arc::clone(&context));
                let interval_ms = context.failure_detection_interval_ms();
                delay_ms = Some(match delay_ms {
                    Some(delay) => delay.min(interval_ms),
                    None => interval_ms,
                });
                if first_requeued.is_none() {
                    first_requeued = Some(context);
                }
            }

            let sleep_ms = match delay_ms {
                None => INACTIVE_SLEEP_MS,
                Some(delay) => {
                    // Subtract the time the check itself took, then floor.
                    let adjusted = delay
                        .saturating_sub(status.elapsed_ns / NANOS_PER_MS)
                        .max(MIN_HOST_CHECK_TIMEOUT_MS);
                    self.host_check_timeout_ms.store(adjusted, Ordering::SeqCst);
                    adjusted
                }
            };
            tokio::time::sleep(Duration::from_millis(sleep_ms)).await;
        }

        // Stopped externally: release the monitoring connection.
        self.probe.close_connection().await;
        self.is_stopped.store(true, Ordering::SeqCst);
        debug!(host = %self.host_info.url, "monitor stopped");
    }
}

//! Process-wide monitor registry.
//!
//! Monitors are pooled across callers to avoid N-squared probe traffic;
//! sharing is keyed by alias sets because the same host is reachable under
//! multiple names and each caller may know only a subset. The registry is a
//! reference-counted singleton: every `MonitorService` acquires it on
//! construction and releases it on teardown, and the last release clears all
//! state.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use once_cell::sync::Lazy;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::core::error::{WrapperError, WrapperResult};
use crate::core::monitoring::lock;
use crate::core::monitoring::monitor::Monitor;

static REGISTRY: Lazy<MonitorRegistry> = Lazy::new(|| MonitorRegistry {
    state: Mutex::new(RegistryState::default()),
    usage_count: AtomicUsize::new(0),
});

#[derive(Default)]
struct RegistryState {
    /// Many-to-one: every alias of a host maps to the host's monitor.
    monitor_by_alias: HashMap<String, Arc<Monitor>>,
    /// Exactly one loop handle per active monitor.
    task_by_monitor: Vec<(Arc<Monitor>, JoinHandle<()>)>,
    /// Recycled monitors eligible for reuse.
    available_monitors: VecDeque<Arc<Monitor>>,
}

pub struct MonitorRegistry {
    state: Mutex<RegistryState>,
    usage_count: AtomicUsize,
}

impl MonitorRegistry {
    /// The singleton, without touching the usage count.
    pub fn instance() -> &'static MonitorRegistry {
        &REGISTRY
    }

    /// Registers a caller. Pairs with `release_instance`.
    pub fn acquire() -> &'static MonitorRegistry {
        REGISTRY.usage_count.fetch_add(1, Ordering::SeqCst);
        &REGISTRY
    }

    /// Drops one caller reference. The last release cancels outstanding loop
    /// handles (best-effort; a running loop observes its stop flag at the
    /// next idle check) and clears all state. Releasing past zero is a no-op.
    pub fn release_instance(&self) {
        let mut current = self.usage_count.load(Ordering::SeqCst);
        loop {
            if current == 0 {
                return;
            }
            match self.usage_count.compare_exchange(
                current,
                current - 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => {
                    if current == 1 {
                        self.clear();
                    }
                    return;
                }
                Err(observed) => current = observed,
            }
        }
    }

    pub fn usage_count(&self) -> usize {
        self.usage_count.load(Ordering::SeqCst)
    }

    fn clear(&self) {
        let mut state = lock(&self.state);
        debug!(
            monitors = state.task_by_monitor.len(),
            "releasing the monitor registry"
        );
        state.monitor_by_alias.clear();
        for (monitor, handle) in state.task_by_monitor.drain(..) {
            monitor.stop();
            handle.abort();
        }
        state.available_monitors.clear();
    }

    /// Resolves the monitor for `host_aliases`, creating or recycling one if
    /// no alias is bound yet. The returned monitor ends up registered under
    /// every alias in the set; existing bindings are never overwritten.
    pub fn get_or_create_monitor<F>(
        &self,
        host_aliases: &HashSet<String>,
        supplier: F,
    ) -> WrapperResult<Arc<Monitor>>
    where
        F: FnOnce() -> Option<Arc<Monitor>>,
    {
        if host_aliases.is_empty() {
            return Err(WrapperError::Configuration(
                "cannot resolve a monitor for an empty alias set".to_string(),
            ));
        }

        let mut state = lock(&self.state);

        let mut monitor = None;
        for alias in host_aliases {
            if let Some(existing) = state.monitor_by_alias.get(alias) {
                monitor = Some(Arc::clone(existing));
                break;
            }
        }

        let monitor = match monitor {
            Some(monitor) => monitor,
            None => Self::take_or_supply(&mut state, supplier)?,
        };

        for alias in host_aliases {
            state
                .monitor_by_alias
                .entry(alias.clone())
                .or_insert_with(|| Arc::clone(&monitor));
        }

        Ok(monitor)
    }

    fn take_or_supply<F>(state: &mut RegistryState, supplier: F) -> WrapperResult<Arc<Monitor>>
    where
        F: FnOnce() -> Option<Arc<Monitor>>,
    {
        if let Some(available) = state.available_monitors.pop_front() {
            if !available.is_stopped() {
                debug!(host = %available.host_info().url, "recycling an available monitor");
                return Ok(available);
            }
            // Recycled monitor already stopped: drop its loop handle for good.
            Self::cancel_task(state, &available);
        }

        let monitor = supplier().ok_or_else(|| {
            WrapperError::Internal("the monitor supplier returned no monitor".to_string())
        })?;
        let handle = tokio::spawn(Arc::clone(&monitor).run());
        state
            .task_by_monitor
            .push((Arc::clone(&monitor), handle));
        Ok(monitor)
    }

    fn cancel_task(state: &mut RegistryState, monitor: &Arc<Monitor>) {
        if let Some(index) = state
            .task_by_monitor
            .iter()
            .position(|(candidate, _)| Arc::ptr_eq(candidate, monitor))
        {
            let (monitor, handle) = state.task_by_monitor.swap_remove(index);
            monitor.stop();
            handle.abort();
        }
    }

    pub fn get_monitor(&self, alias: &str) -> Option<Arc<Monitor>> {
        lock(&self.state).monitor_by_alias.get(alias).cloned()
    }

    /// Unbinds every alias pointing at `monitor` and parks it for reuse. The
    /// monitor keeps running and may be handed to the next caller.
    pub fn reset_resource(&self, monitor: &Arc<Monitor>) {
        let mut state = lock(&self.state);
        state
            .monitor_by_alias
            .retain(|_, bound| !Arc::ptr_eq(bound, monitor));
        state.available_monitors.push_back(Arc::clone(monitor));
    }

    /// Unbinds every alias pointing at `monitor` and cancels its loop.
    pub fn release_monitor(&self, monitor: &Arc<Monitor>) {
        let mut state = lock(&self.state);
        state
            .monitor_by_alias
            .retain(|_, bound| !Arc::ptr_eq(bound, monitor));
        Self::cancel_task(&mut state, monitor);
    }

    pub fn available_monitor_count(&self) -> usize {
        lock(&self.state).available_monitors.len()
    }
}

pub mod clock;
pub mod context;
pub mod monitor;
pub mod plugin;
pub mod probe;
pub mod registry;
pub mod service;

// Re-export commonly used items
pub use clock::MonotonicClock;
pub use context::MonitoringContext;
pub use monitor::Monitor;
pub use plugin::{HostMonitoringPlugin, NETWORK_BOUND_METHODS};
pub use probe::{HostStatusProbe, ProbeStatus};
pub use registry::MonitorRegistry;
pub use service::MonitorService;

use std::sync::{Mutex, MutexGuard};

// Queue and cache locks are held for a handful of operations at most; a
// poisoned lock just means another thread panicked mid-push, so recover the
// inner state instead of propagating the poison.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

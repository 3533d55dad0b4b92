// Monotonic time source for the monitoring subsystem

use tokio::time::Instant;

pub const NANOS_PER_MS: u64 = 1_000_000;

/// Monotonic nanosecond clock anchored at construction.
///
/// Every monitor owns one and stamps all of its timestamps
/// (`monitor_start_time`, probe windows, idle stamps) on the same axis;
/// values from different clocks are never compared. Built on tokio's
/// `Instant` so the loops follow the runtime clock, including the paused
/// clock tokio's test-util provides.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    anchor: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            anchor: Instant::now(),
        }
    }

    /// Nanoseconds since this clock was created.
    pub fn now_ns(&self) -> u64 {
        self.anchor.elapsed().as_nanos() as u64
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

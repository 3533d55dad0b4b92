/*!
Failure detection and reader failover for cluster-aware database drivers.

This crate is the concurrency core of a driver wrapper targeting a cluster
database with a single writer and multiple read replicas. It contributes two
subsystems:

- **Host monitoring**: while an application call is in flight, a shared
  per-host [`Monitor`](core::monitoring::Monitor) probes the host the call is
  executing against. If the host stays unresponsive past the configured
  threshold, the in-flight connection is aborted and the host marked
  unavailable.
- **Reader failover**: given a topology and a failed host,
  [`ReaderFailoverHandler`](core::failover::ReaderFailoverHandler) races
  connection attempts against candidate readers in pairs and returns the
  first healthy connection within a bounded time budget.

Everything environment-specific (topology discovery, dialect negotiation,
connection opening) stays behind the trait seams in [`core::driver`]; the
embedding driver implements them, and tests substitute mocks.

## Dependencies

- `tokio`: monitor loops, failover races, timeouts
- `async-trait`: the external collaborator traits
- `thiserror`: error kinds surfaced to callers
- `tracing`: structured diagnostics (no subscriber is installed here)
*/

pub mod core;

// Re-export the public surface at the crate root
pub use crate::core::driver::{CancelSignal, Connection, Cursor, Dialect, PluginService};
pub use crate::core::error::{
    DefaultExceptionHandler, ExceptionHandler, WrapperError, WrapperResult,
};
pub use crate::core::failover::{FailoverMode, ReaderFailoverHandler, ReaderFailoverResult};
pub use crate::core::host::{HostAvailability, HostEvent, HostInfo, HostRole};
pub use crate::core::monitoring::{
    HostMonitoringPlugin, MonitorRegistry, MonitorService, MonitoringContext,
};
pub use crate::core::props::Properties;

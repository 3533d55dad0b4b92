//! External collaborator contracts.
//!
//! The core never opens sockets or speaks a database protocol itself; it
//! drives the surrounding driver wrapper through the narrow trait seams
//! defined here. Production code implements them on top of the real plugin
//! chain; tests substitute mock implementations.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::core::error::{ExceptionHandler, WrapperError, WrapperResult};
use crate::core::host::{HostAvailability, HostInfo};
use crate::core::props::Properties;

/// Set-once cancellation flag shared between a failover run and the
/// `force_connect` implementations it races. Implementations must poll the
/// flag at bounded intervals and abort promptly once it is set.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    flag: Arc<AtomicBool>,
}

impl CancelSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// One-shot statement execution handle obtained from a `Connection`.
#[async_trait]
pub trait Cursor: Send {
    async fn execute(&mut self, sql: &str) -> WrapperResult<()>;
}

/// A live database connection as seen by the core.
#[async_trait]
pub trait Connection: Send + Sync {
    async fn close(&self) -> WrapperResult<()>;

    fn cursor(&self) -> WrapperResult<Box<dyn Cursor>>;
}

/// Database-specific behavior the core cannot know on its own.
#[async_trait]
pub trait Dialect: Send + Sync {
    async fn is_closed(&self, conn: &dyn Connection) -> bool;

    /// Terminates in-flight I/O on `conn` without a graceful handshake.
    async fn abort_connection(&self, conn: &dyn Connection) -> WrapperResult<()>;

    fn exception_handler(&self) -> &dyn ExceptionHandler;

    /// Sentinel statement used for host liveness checks.
    fn host_alive_query(&self) -> &str {
        "SELECT 1"
    }
}

/// Read-only views and operations the driver plugin chain exposes to the
/// core. All topology knowledge, connection opening, and dialect negotiation
/// live behind this trait.
#[async_trait]
pub trait PluginService: Send + Sync {
    fn current_connection(&self) -> Option<Arc<dyn Connection>>;

    fn current_host_info(&self) -> Option<HostInfo>;

    fn hosts(&self) -> Vec<HostInfo>;

    fn dialect(&self) -> Option<Arc<dyn Dialect>>;

    /// Descriptive name of the topology provider, used in diagnostics.
    fn host_list_provider(&self) -> String;

    /// Refreshes the dialect information.
    async fn update_dialect(&self) -> WrapperResult<()>;

    /// Opens a connection to `host` ignoring plugin layering. A supplied
    /// cancel signal must be honored.
    async fn force_connect(
        &self,
        host: &HostInfo,
        props: &Properties,
        cancel: Option<CancelSignal>,
    ) -> WrapperResult<Arc<dyn Connection>>;

    /// Resolves the underlying host when the current connection was opened
    /// against a cluster endpoint.
    async fn identify_connection(&self) -> WrapperResult<Option<HostInfo>>;

    /// Populates `host_info.all_aliases`, optionally using `conn` to query
    /// the server for its own names.
    async fn fill_aliases(
        &self,
        conn: Option<Arc<dyn Connection>>,
        host_info: &mut HostInfo,
    ) -> WrapperResult<()>;

    fn set_availability(&self, aliases: &HashSet<String>, availability: HostAvailability);

    /// Pulls a fresh topology using `conn`.
    async fn force_refresh_host_list(&self, conn: Arc<dyn Connection>) -> WrapperResult<()>;

    fn is_network_exception(&self, error: &WrapperError) -> bool;
}

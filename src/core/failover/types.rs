// Result and mode types for reader failover

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::driver::Connection;
use crate::core::error::WrapperError;
use crate::core::host::HostInfo;
use crate::core::props::{Properties, FAILOVER_MODE};

/// How picky reader failover is about the replacement host's role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FailoverMode {
    /// Any reachable host will do; the writer is an acceptable fallback.
    #[default]
    ReaderOrWriter,
    /// The replacement must be a READER even if the writer is reachable
    /// sooner; the writer is only tried when the topology has no readers.
    StrictReader,
}

impl FailoverMode {
    pub fn from_properties(props: &Properties) -> FailoverMode {
        match props.get(FAILOVER_MODE.name) {
            Some("strict-reader") => FailoverMode::StrictReader,
            _ => FailoverMode::ReaderOrWriter,
        }
    }
}

/// Outcome of a reader failover attempt.
///
/// `is_connected` implies both `connection` and `new_host` are present. A
/// result with only `exception` set is terminal: the failure was not a
/// network condition and retrying other hosts will not help.
pub struct ReaderFailoverResult {
    pub connection: Option<Arc<dyn Connection>>,
    pub is_connected: bool,
    pub new_host: Option<HostInfo>,
    pub exception: Option<WrapperError>,
}

impl ReaderFailoverResult {
    pub fn connected(connection: Arc<dyn Connection>, new_host: HostInfo) -> Self {
        Self {
            connection: Some(connection),
            is_connected: true,
            new_host: Some(new_host),
            exception: None,
        }
    }

    /// The failed sentinel: not connected, nothing terminal.
    pub fn failed() -> Self {
        Self {
            connection: None,
            is_connected: false,
            new_host: None,
            exception: None,
        }
    }

    pub fn from_error(error: WrapperError) -> Self {
        Self {
            connection: None,
            is_connected: false,
            new_host: None,
            exception: Some(error),
        }
    }
}

impl fmt::Debug for ReaderFailoverResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReaderFailoverResult")
            .field("is_connected", &self.is_connected)
            .field("new_host", &self.new_host.as_ref().map(|h| h.url.clone()))
            .field("exception", &self.exception)
            .finish()
    }
}

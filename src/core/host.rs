// Host model shared by the monitoring and failover subsystems

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Role a host plays inside the cluster topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HostRole {
    Writer,
    Reader,
}

impl fmt::Display for HostRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostRole::Writer => write!(f, "writer"),
            HostRole::Reader => write!(f, "reader"),
        }
    }
}

/// Last known availability of a host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum HostAvailability {
    #[default]
    Available,
    NotAvailable,
}

impl fmt::Display for HostAvailability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostAvailability::Available => write!(f, "available"),
            HostAvailability::NotAvailable => write!(f, "not_available"),
        }
    }
}

/// Topology change events delivered to `HostMonitoringPlugin::notify_host_list_changed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HostEvent {
    WentUp,
    WentDown,
    HostAdded,
    HostDeleted,
    ConvertedToWriter,
    ConvertedToReader,
}

/// A single cluster host as seen by the driver wrapper.
///
/// `url` is the stable identity (`host:port`). `all_aliases` is the union of
/// names under which the host is reachable; it must be non-empty for any host
/// that participates in monitoring, and always contains `url`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostInfo {
    pub url: String,
    pub host: String,
    pub port: u16,
    pub role: HostRole,
    pub availability: HostAvailability,
    pub all_aliases: HashSet<String>,
}

impl HostInfo {
    pub fn new(host: &str, port: u16, role: HostRole) -> Self {
        let url = format!("{}:{}", host, port);
        let mut all_aliases = HashSet::new();
        all_aliases.insert(url.clone());
        Self {
            url,
            host: host.to_string(),
            port,
            role,
            availability: HostAvailability::Available,
            all_aliases,
        }
    }

    /// The canonical alias for this host, used in diagnostics and errors.
    pub fn as_alias(&self) -> String {
        self.url.clone()
    }

    pub fn add_alias(&mut self, alias: &str) {
        self.all_aliases.insert(alias.to_string());
    }

    /// Drops every learned alias, keeping only the canonical `url`.
    pub fn reset_aliases(&mut self) {
        self.all_aliases.clear();
        self.all_aliases.insert(self.url.clone());
    }
}

impl fmt::Display for HostInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.url, self.role)
    }
}

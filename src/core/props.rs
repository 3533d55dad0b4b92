// Connection properties recognized by the failure-detection core

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Keys carrying this prefix configure the monitoring connection: the prefix
/// is stripped and the remapped key replaces the original in the probe
/// property set.
pub const MONITORING_PROPERTY_PREFIX: &str = "monitoring-";

/// A recognized configuration key together with its default value.
#[derive(Debug, Clone, Copy)]
pub struct PropertyDefinition {
    pub name: &'static str,
    pub default_value: &'static str,
}

/// Gates wrapping of network-bound calls.
pub const FAILURE_DETECTION_ENABLED: PropertyDefinition = PropertyDefinition {
    name: "failure_detection_enabled",
    default_value: "true",
};

/// Grace period before probing starts, in milliseconds.
pub const FAILURE_DETECTION_TIME_MS: PropertyDefinition = PropertyDefinition {
    name: "failure_detection_time_ms",
    default_value: "30000",
};

/// Probe period, in milliseconds.
pub const FAILURE_DETECTION_INTERVAL_MS: PropertyDefinition = PropertyDefinition {
    name: "failure_detection_interval_ms",
    default_value: "5000",
};

/// Consecutive failed probes tolerated before the host is declared unavailable.
pub const FAILURE_DETECTION_COUNT: PropertyDefinition = PropertyDefinition {
    name: "failure_detection_count",
    default_value: "3",
};

/// How long a monitor may sit idle before disposing of itself, in milliseconds.
pub const MONITOR_DISPOSAL_TIME_MS: PropertyDefinition = PropertyDefinition {
    name: "monitor_disposal_time_ms",
    default_value: "60000",
};

/// Reader failover mode: `reader-or-writer` (default) or `strict-reader`.
pub const FAILOVER_MODE: PropertyDefinition = PropertyDefinition {
    name: "failover_mode",
    default_value: "reader-or-writer",
};

/// String-keyed connection properties, as handed to the wrapper by the
/// application. Typed getters fall back to the definition's default when the
/// key is absent or unparseable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Properties(HashMap<String, String>);

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.0.insert(key.to_string(), value.to_string());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    /// Strict boolean parsing: only "true"/"false" (case-insensitive) are
    /// accepted; anything else falls back to the definition's default.
    pub fn get_bool(&self, prop: &PropertyDefinition) -> bool {
        let raw = self.get(prop.name).unwrap_or(prop.default_value);
        match raw.trim().to_lowercase().as_str() {
            "true" => true,
            "false" => false,
            _ => prop.default_value == "true",
        }
    }

    pub fn get_u64(&self, prop: &PropertyDefinition) -> u64 {
        self.get(prop.name)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or_else(|| prop.default_value.parse().unwrap_or(0))
    }

    pub fn get_u32(&self, prop: &PropertyDefinition) -> u32 {
        self.get(prop.name)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or_else(|| prop.default_value.parse().unwrap_or(0))
    }

    /// Copy of these properties for the monitoring connection: every
    /// `monitoring-`-prefixed key is re-mapped by stripping the prefix and the
    /// prefixed original is removed, so probe connections can be configured
    /// distinctly from application connections.
    pub fn monitoring_properties(&self) -> Properties {
        let mut copy = self.clone();
        for (key, value) in &self.0 {
            if let Some(stripped) = key.strip_prefix(MONITORING_PROPERTY_PREFIX) {
                copy.0.insert(stripped.to_string(), value.clone());
                copy.0.remove(key);
            }
        }
        copy
    }
}

//! Configuration snapshot structure, loaded from the YAML file described in
//! spec §6. This mirrors how the original Python relay kept one `config`
//! dict shared by the HTTP layer and the health monitor, except here it is a
//! typed, immutable value — callers get a fresh `RelayConfig` and diff it
//! themselves rather than mutating a shared dict in place.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::endpoint::EndpointSpec;
use crate::{DEFAULT_HOST, DEFAULT_MAX_BLOCKS_BEHIND, DEFAULT_MONITOR_INTERVAL_SECS, DEFAULT_PORT};

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct RpcEndpoints {
    #[serde(default)]
    pub primary: Vec<EndpointSpec>,
    #[serde(default)]
    pub secondary: Vec<EndpointSpec>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RelaySettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_monitor_interval")]
    pub monitor_interval: u64,
    #[serde(default)]
    pub latency_threshold_ms: Option<f64>,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_monitor_interval() -> u64 {
    DEFAULT_MONITOR_INTERVAL_SECS
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            monitor_interval: default_monitor_interval(),
            latency_threshold_ms: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct HealthMonitorSettings {
    #[serde(default = "default_max_blocks_behind")]
    pub max_blocks_behind: u64,
    /// Presentation only — widths for a terminal dashboard's columns. Not
    /// consumed by this crate, carried through for a future dashboard
    /// consumer (spec §1 names the dashboard renderer out of scope).
    #[serde(default)]
    pub column_widths: HashMap<String, u32>,
}

fn default_max_blocks_behind() -> u64 {
    DEFAULT_MAX_BLOCKS_BEHIND
}

/// Top-level shape of `config.yaml`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RelayConfig {
    #[serde(default)]
    pub rpc_endpoints: RpcEndpoints,
    #[serde(default)]
    pub relay: RelaySettings,
    #[serde(default)]
    pub cache_ttl: HashMap<String, u64>,
    #[serde(default)]
    pub health_monitor: HealthMonitorSettings,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            rpc_endpoints: RpcEndpoints::default(),
            relay: RelaySettings::default(),
            cache_ttl: HashMap::new(),
            health_monitor: HealthMonitorSettings::default(),
        }
    }
}

impl RelayConfig {
    pub fn from_yaml_str(s: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(s)
    }

    /// Set of URLs across both tiers, in primary-then-secondary order (I1).
    pub fn all_urls(&self) -> Vec<&str> {
        self.rpc_endpoints
            .primary
            .iter()
            .chain(self.rpc_endpoints.secondary.iter())
            .map(|e| e.url.as_str())
            .collect()
    }
}

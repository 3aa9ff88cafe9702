//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the balancer.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::load_balancer::Algorithm;

/// Root configuration for the load balancer.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BalancerConfig {
    /// Identifier reported in every proxied response and in `/status`.
    pub balancer_id: String,

    /// Selection algorithm active at startup.
    pub algorithm: Algorithm,

    /// Listener configuration.
    pub listener: ListenerConfig,

    /// Static node list. Fixed for the lifetime of the process.
    pub nodes: Vec<NodeConfig>,

    /// Health check settings.
    pub health_check: HealthCheckConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Request history settings.
    pub history: HistoryConfig,

    /// Strategy tuning.
    pub selection: SelectionConfig,

    /// Request size limits.
    pub limits: LimitsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for BalancerConfig {
    fn default() -> Self {
        Self {
            balancer_id: "load_balancer_1".to_string(),
            algorithm: Algorithm::RoundRobin,
            listener: ListenerConfig::default(),
            nodes: vec![
                NodeConfig::new("backend_1", "http://localhost:5001", 3),
                NodeConfig::new("backend_2", "http://localhost:5002", 2),
                NodeConfig::new("backend_3", "http://localhost:5003", 1),
            ],
            health_check: HealthCheckConfig::default(),
            timeouts: TimeoutConfig::default(),
            history: HistoryConfig::default(),
            selection: SelectionConfig::default(),
            limits: LimitsConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:9000").
    pub bind_address: String,
}

impl ListenerConfig {
    /// Replace the port of the bind address, keeping the host.
    pub fn set_port(&mut self, port: u16) {
        let host = self
            .bind_address
            .rsplit_once(':')
            .map(|(host, _)| host)
            .unwrap_or("0.0.0.0");
        self.bind_address = format!("{}:{}", host, port);
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:9000".to_string(),
        }
    }
}

/// Backend node configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NodeConfig {
    /// Unique node identifier.
    pub id: String,

    /// Node base address (e.g., "http://127.0.0.1:5001").
    pub address: String,

    /// Weight for weighted round robin (default: 1).
    #[serde(default = "default_weight")]
    pub weight: u32,
}

fn default_weight() -> u32 {
    1
}

impl NodeConfig {
    pub fn new(id: impl Into<String>, address: impl Into<String>, weight: u32) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
            weight,
        }
    }
}

/// Parses `id=address` or `id=address@weight`.
impl FromStr for NodeConfig {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (id, rest) = s
            .split_once('=')
            .ok_or_else(|| format!("expected `id=address[@weight]`, got '{}'", s))?;

        let (address, weight) = match rest.rsplit_once('@') {
            Some((address, weight)) => {
                let weight = weight
                    .trim()
                    .parse::<u32>()
                    .map_err(|e| format!("invalid weight '{}' for node '{}': {}", weight, id, e))?;
                (address, weight)
            }
            None => (rest, default_weight()),
        };

        Ok(Self::new(id.trim(), address.trim(), weight))
    }
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable active health checks.
    pub enabled: bool,

    /// Health check interval in seconds.
    pub interval_secs: u64,

    /// Per-probe timeout in seconds.
    pub timeout_secs: u64,

    /// Path to probe on each node.
    pub path: String,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 5,
            timeout_secs: 2,
            path: "/health".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Total time allowed for one forwarded call, body included, in seconds.
    pub backend_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { backend_secs: 5 }
    }
}

/// Recent-request history configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Ring buffer capacity.
    pub capacity: usize,

    /// Number of most recent records returned by `/status`.
    pub status_window: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: 100,
            status_window: 20,
        }
    }
}

/// Strategy tuning.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Response time assumed for nodes that have no samples yet.
    /// Zero makes least-response-time prefer untested nodes.
    pub untested_response_time_secs: f64,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            untested_response_time_secs: 0.0,
        }
    }
}

/// Request size limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum inbound body size in bytes. Also caps buffered node responses.
    pub max_body_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus scrape endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9100".to_string(),
        }
    }
}

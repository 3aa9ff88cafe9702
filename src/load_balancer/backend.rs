//! Backend node abstraction.
//!
//! # Responsibilities
//! - Represent a single compute node (id, address, weight)
//! - Carry the liveness flag written by the health monitor
//! - Build endpoint URLs for probing and forwarding

use std::sync::atomic::{AtomicBool, Ordering};
use url::Url;

use crate::config::NodeConfig;

/// Why a node could not be built from its configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NodeError {
    #[error("node '{id}' must have weight >= 1")]
    ZeroWeight { id: String },

    #[error("node '{id}' has invalid address '{address}': {reason}")]
    InvalidAddress {
        id: String,
        address: String,
        reason: String,
    },

    #[error("duplicate node id '{id}'")]
    DuplicateId { id: String },
}

/// A single backend node.
#[derive(Debug)]
pub struct Node {
    /// Unique node identifier.
    pub id: String,
    /// Address as configured.
    pub address: String,
    /// Pre-parsed base URL.
    pub base_url: Url,
    /// Weight for weighted round robin, always >= 1.
    pub weight: u32,
    /// Position in the registry. Indexes per-node metrics.
    pub(crate) slot: usize,
    /// Liveness flag. Only the health monitor writes it.
    healthy: AtomicBool,
}

impl Node {
    /// Create a node from configuration. Nodes start out healthy.
    pub fn from_config(config: &NodeConfig, slot: usize) -> Result<Self, NodeError> {
        if config.weight == 0 {
            return Err(NodeError::ZeroWeight {
                id: config.id.clone(),
            });
        }
        let base_url =
            parse_node_address(&config.address).map_err(|reason| NodeError::InvalidAddress {
                id: config.id.clone(),
                address: config.address.clone(),
                reason,
            })?;
        Ok(Self {
            id: config.id.clone(),
            address: config.address.clone(),
            base_url,
            weight: config.weight,
            slot,
            healthy: AtomicBool::new(true),
        })
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Acquire)
    }

    /// Store a new liveness value, returning the previous one.
    pub fn set_healthy(&self, healthy: bool) -> bool {
        self.healthy.swap(healthy, Ordering::AcqRel)
    }

    /// Absolute URL of `path` on this node.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.as_str().trim_end_matches('/'), path)
    }
}

/// Parse a node address, defaulting the scheme to `http`.
pub fn parse_node_address(address: &str) -> Result<Url, String> {
    let candidate = if address.contains("://") {
        address.to_string()
    } else {
        format!("http://{}", address)
    };

    let url = Url::parse(&candidate).map_err(|e| e.to_string())?;
    if url.scheme() != "http" {
        return Err(format!("unsupported scheme '{}'", url.scheme()));
    }
    if url.host_str().is_none() {
        return Err("missing host".to_string());
    }
    Ok(url)
}

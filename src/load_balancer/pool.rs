//! Node registry.
//!
//! # Responsibilities
//! - Hold the ordered, fixed set of nodes built at startup
//! - Look nodes up by id
//! - Produce the current healthy subset in registry order

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::NodeConfig;
use crate::load_balancer::backend::{Node, NodeError};

/// Immutable ordered list of candidate nodes.
#[derive(Debug)]
pub struct NodeRegistry {
    nodes: Vec<Arc<Node>>,
    by_id: HashMap<String, usize>,
}

impl NodeRegistry {
    /// Build the registry from configuration, preserving order.
    pub fn new(configs: &[NodeConfig]) -> Result<Self, NodeError> {
        let mut nodes = Vec::with_capacity(configs.len());
        let mut by_id = HashMap::with_capacity(configs.len());

        for (slot, config) in configs.iter().enumerate() {
            if by_id.insert(config.id.clone(), slot).is_some() {
                return Err(NodeError::DuplicateId {
                    id: config.id.clone(),
                });
            }
            nodes.push(Arc::new(Node::from_config(config, slot)?));
        }

        Ok(Self { nodes, by_id })
    }

    /// All nodes in registry order.
    pub fn all(&self) -> &[Arc<Node>] {
        &self.nodes
    }

    pub fn get(&self, id: &str) -> Option<&Arc<Node>> {
        self.by_id.get(id).map(|&slot| &self.nodes[slot])
    }

    /// Nodes currently flagged healthy, in registry order.
    pub fn healthy(&self) -> Vec<Arc<Node>> {
        self.nodes.iter().filter(|n| n.is_healthy()).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

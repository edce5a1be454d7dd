// SPDX-License-Identifier: MIT OR Apache-2.0
//! Cable (edge) definitions for the graph.

use crate::node::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A cable from an output port to an input port.
///
/// Cables carry no identity of their own: two cables are the same cable
/// when all four endpoint fields match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cable {
    /// Source node ID
    pub from: NodeId,
    /// Source output port name
    pub from_port: String,
    /// Target node ID
    pub to: NodeId,
    /// Target input port name
    pub to_port: String,
}

impl Cable {
    /// Create a new cable
    pub fn new(
        from: NodeId,
        from_port: impl Into<String>,
        to: NodeId,
        to_port: impl Into<String>,
    ) -> Self {
        Self {
            from,
            from_port: from_port.into(),
            to,
            to_port: to_port.into(),
        }
    }

    /// Check if this cable touches a specific node
    pub fn involves_node(&self, node_id: NodeId) -> bool {
        self.from == node_id || self.to == node_id
    }

    /// Check if this cable feeds the given input
    pub fn targets(&self, node_id: NodeId, port: &str) -> bool {
        self.to == node_id && self.to_port == port
    }
}

impl fmt::Display for Cable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{} -> {}.{}", self.from, self.from_port, self.to, self.to_port)
    }
}

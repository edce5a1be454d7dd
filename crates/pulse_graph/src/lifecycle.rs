// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node lifecycle hooks injected into the history engine.
//!
//! The history engine never creates or tears down nodes itself. It asks the
//! [`GraphHooks`] it was given at startup, so the layer that owns scene
//! objects, audio graphs, or editor widgets can do its part without the
//! engine depending on it.

use crate::commands::CommandError;
use crate::graph::{Graph, RemovedNode};
use crate::node::{Node, NodeId, NodeRegistry, NodeSnapshot};
use std::sync::Arc;

/// Capability object the history engine calls to apply structural changes
pub trait GraphHooks {
    /// Build the node described by `snapshot` (under `snapshot.id`) and add it to the graph
    fn materialize_node(&mut self, graph: &mut Graph, snapshot: &NodeSnapshot) -> Result<NodeId, CommandError>;

    /// Tear a node down and remove it (and its cables) from the graph
    fn dematerialize_node(&mut self, graph: &mut Graph, id: NodeId) -> Result<RemovedNode, CommandError>;

    /// Cables changed; redraw or re-route whatever depends on them
    fn refresh_connections(&mut self, _graph: &Graph) {}

    /// A node's parameters or position changed
    fn refresh_node(&mut self, _graph: &Graph, _id: NodeId) {}
}

/// Default hooks: build nodes from a [`NodeRegistry`] and run their behavior's
/// `init` / `dispose`.
///
/// Hosts that own external objects usually wrap this and add their own work
/// around the calls.
#[derive(Debug, Clone)]
pub struct RegistryHooks {
    registry: Arc<NodeRegistry>,
}

impl RegistryHooks {
    /// Create hooks over a shared registry
    pub fn new(registry: Arc<NodeRegistry>) -> Self {
        Self { registry }
    }

    /// The registry nodes are built from
    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    /// Build a node record from a snapshot, running `init`, without inserting it
    pub fn build_node(&self, snapshot: &NodeSnapshot) -> Result<Node, CommandError> {
        let node_type = self
            .registry
            .get(&snapshot.node_type)
            .ok_or_else(|| CommandError::UnknownNodeType(snapshot.node_type.clone()))?;

        let mut node = Node::new(snapshot.id, node_type).with_position(snapshot.position);
        node.apply_params(&snapshot.params);
        if let Some(behavior) = &node_type.behavior {
            behavior.init(&mut node);
        }
        Ok(node)
    }

    /// Run the type's `dispose` on a node that already left the graph
    pub fn dispose_node(&self, node: &mut Node) {
        if let Some(behavior) = self.registry.behavior(&node.node_type) {
            behavior.dispose(node);
        }
    }
}

impl GraphHooks for RegistryHooks {
    fn materialize_node(&mut self, graph: &mut Graph, snapshot: &NodeSnapshot) -> Result<NodeId, CommandError> {
        graph.check_node_id(snapshot.id)?;
        let node = self.build_node(snapshot)?;
        let id = graph.insert_node(node)?;
        tracing::trace!(node = %id, node_type = %snapshot.node_type, "materialized node");
        Ok(id)
    }

    fn dematerialize_node(&mut self, graph: &mut Graph, id: NodeId) -> Result<RemovedNode, CommandError> {
        let mut removed = graph.remove_node(id).ok_or(CommandError::NodeNotFound(id))?;
        self.dispose_node(&mut removed.node);
        tracing::trace!(node = %id, cables = removed.cables.len(), "dematerialized node");
        Ok(removed)
    }
}

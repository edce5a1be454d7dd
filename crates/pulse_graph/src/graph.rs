// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph store: the nodes, the cables between them, and input resolution.

use crate::connection::Cable;
use crate::node::{Node, NodeId};
use crate::port::{PortType, PortValue, EMPTY, ZERO};
use indexmap::IndexMap;
use std::borrow::Cow;
use std::collections::{HashSet, VecDeque};

/// A node removed from the graph together with the cables that touched it
#[derive(Debug)]
pub struct RemovedNode {
    /// The node record
    pub node: Node,
    /// Cables dropped by the cascade, in graph order
    pub cables: Vec<Cable>,
    /// Where the node sat in graph order
    pub index: usize,
}

/// A node graph
#[derive(Debug)]
pub struct Graph {
    /// Nodes in graph order (insertion order)
    nodes: IndexMap<NodeId, Node>,
    /// Cables in insertion order
    cables: Vec<Cable>,
    /// Next id the allocator hands out
    next_id: u64,
    /// Bumped on every structural change
    revision: u64,
}

impl Graph {
    /// Create a new empty graph
    pub fn new() -> Self {
        Self {
            nodes: IndexMap::new(),
            cables: Vec::new(),
            next_id: 1,
            revision: 0,
        }
    }

    /// Hand out a fresh node id
    pub fn allocate_id(&mut self) -> Result<NodeId, GraphError> {
        let id = self.next_id;
        self.next_id = id.checked_add(1).ok_or(GraphError::IdSpaceExhausted)?;
        Ok(NodeId(id))
    }

    /// Make sure the allocator never hands out `id` or anything below it.
    ///
    /// The last id in the space can never be reserved since nothing could
    /// be allocated after it.
    pub fn reserve_id(&mut self, id: NodeId) -> Result<(), GraphError> {
        let next = id.0.checked_add(1).ok_or(GraphError::IdSpaceExhausted)?;
        self.next_id = self.next_id.max(next);
        Ok(())
    }

    /// Add a node to the graph.
    ///
    /// Fails if the id is already taken; the allocator is bumped past the id.
    pub fn insert_node(&mut self, node: Node) -> Result<NodeId, GraphError> {
        let id = node.id;
        self.check_node_id(id)?;
        self.reserve_id(id)?;
        self.nodes.insert(id, node);
        self.revision += 1;
        Ok(id)
    }

    /// Check whether a node could be inserted under `id` right now
    pub fn check_node_id(&self, id: NodeId) -> Result<(), GraphError> {
        if self.nodes.contains_key(&id) {
            return Err(GraphError::NodeExists(id));
        }
        if id.0 == u64::MAX {
            return Err(GraphError::IdSpaceExhausted);
        }
        Ok(())
    }

    /// Remove a node and every cable touching it
    pub fn remove_node(&mut self, node_id: NodeId) -> Option<RemovedNode> {
        let (index, _, node) = self.nodes.shift_remove_full(&node_id)?;
        let (cables, kept): (Vec<Cable>, Vec<Cable>) = std::mem::take(&mut self.cables)
            .into_iter()
            .partition(|c| c.involves_node(node_id));
        self.cables = kept;
        self.revision += 1;
        Some(RemovedNode { node, cables, index })
    }

    /// Move a node to `index` in graph order, clamped to the last slot
    pub fn move_node_to(&mut self, node_id: NodeId, index: usize) -> Result<(), GraphError> {
        let from = self
            .nodes
            .get_index_of(&node_id)
            .ok_or(GraphError::NodeNotFound(node_id))?;
        let to = index.min(self.nodes.len() - 1);
        if from != to {
            self.nodes.move_index(from, to);
            self.revision += 1;
        }
        Ok(())
    }

    /// Get a node by ID
    pub fn node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    /// Get a mutable node by ID
    pub fn node_mut(&mut self, node_id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&node_id)
    }

    /// Whether a node exists
    pub fn contains_node(&self, node_id: NodeId) -> bool {
        self.nodes.contains_key(&node_id)
    }

    /// Get all nodes in graph order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Get all node IDs in graph order
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Check whether a cable could be inserted right now
    pub fn check_cable(&self, cable: &Cable) -> Result<(), GraphError> {
        let source = self
            .nodes
            .get(&cable.from)
            .ok_or(GraphError::NodeNotFound(cable.from))?;
        let target = self
            .nodes
            .get(&cable.to)
            .ok_or(GraphError::NodeNotFound(cable.to))?;

        if cable.from == cable.to {
            return Err(GraphError::SelfLoop(cable.from));
        }

        let source_port = source.output(&cable.from_port).ok_or_else(|| {
            GraphError::PortNotFound(cable.from, cable.from_port.clone())
        })?;
        let target_port = target
            .input(&cable.to_port)
            .ok_or_else(|| GraphError::PortNotFound(cable.to, cable.to_port.clone()))?;

        if !source_port.can_connect(target_port) {
            return Err(GraphError::IncompatiblePorts {
                from: source_port.port_type.clone(),
                to: target_port.port_type.clone(),
            });
        }

        // Single-input semantics
        if self.cable_into(cable.to, &cable.to_port).is_some() {
            return Err(GraphError::InputOccupied(cable.to, cable.to_port.clone()));
        }

        Ok(())
    }

    /// Add a cable between ports
    pub fn insert_cable(&mut self, cable: Cable) -> Result<(), GraphError> {
        self.check_cable(&cable)?;
        self.cables.push(cable);
        self.revision += 1;
        Ok(())
    }

    /// Remove the cable matching all four endpoint fields
    pub fn remove_cable(&mut self, cable: &Cable) -> bool {
        let Some(index) = self.cables.iter().position(|c| c == cable) else {
            return false;
        };
        self.cables.remove(index);
        self.revision += 1;
        true
    }

    /// Whether this exact cable exists
    pub fn contains_cable(&self, cable: &Cable) -> bool {
        self.cables.contains(cable)
    }

    /// Get the cable feeding an input, if any
    pub fn cable_into(&self, node_id: NodeId, port: &str) -> Option<&Cable> {
        self.cables.iter().find(|c| c.targets(node_id, port))
    }

    /// Get all cables
    pub fn cables(&self) -> impl Iterator<Item = &Cable> {
        self.cables.iter()
    }

    /// Get cables leaving a node
    pub fn cables_from(&self, node_id: NodeId) -> impl Iterator<Item = &Cable> {
        self.cables.iter().filter(move |c| c.from == node_id)
    }

    /// Get cables touching a node
    pub fn cables_touching(&self, node_id: NodeId) -> impl Iterator<Item = &Cable> {
        self.cables.iter().filter(move |c| c.involves_node(node_id))
    }

    /// Get the number of cables
    pub fn cable_count(&self) -> usize {
        self.cables.len()
    }

    /// Structural revision, bumped by every node or cable insertion/removal
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Resolve the value flowing into an input port.
    ///
    /// A connected port reads the upstream node's current output. If the
    /// upstream has not produced that output, non-numeric ports read
    /// `Empty` and numeric ports fall through to the parameter. An
    /// unconnected port reads the node's parameter of the same name, or
    /// the port type's neutral value.
    pub fn resolve_input(&self, node_id: NodeId, port: &str) -> Cow<'_, PortValue> {
        let Some(node) = self.nodes.get(&node_id) else {
            return Cow::Borrowed(&ZERO);
        };
        let port_type = node.input(port).map(|p| &p.port_type);

        if let Some(cable) = self.cable_into(node_id, port) {
            let upstream = self
                .nodes
                .get(&cable.from)
                .and_then(|source| source.value(&cable.from_port));
            if let Some(value) = upstream {
                return Cow::Borrowed(value);
            }
            if !port_type.map_or(true, PortType::falls_back_to_param) {
                return Cow::Borrowed(&EMPTY);
            }
        }

        match node.param(port) {
            Some(value) => Cow::Owned(value.to_port_value()),
            None => Cow::Borrowed(port_type.map_or(&ZERO, PortType::neutral)),
        }
    }

    /// Whether a cable `from -> to` would close a loop through existing cables
    pub fn would_close_cycle(&self, from: NodeId, to: NodeId) -> bool {
        if from == to {
            return true;
        }
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([to]);
        while let Some(current) = queue.pop_front() {
            if current == from {
                return true;
            }
            if seen.insert(current) {
                queue.extend(self.cables_from(current).map(|c| c.to));
            }
        }
        false
    }

    /// Drop every node and cable, returning the nodes in graph order.
    ///
    /// The id allocator is left alone so old ids stay retired.
    pub fn clear(&mut self) -> Vec<Node> {
        self.cables.clear();
        self.revision += 1;
        self.nodes.drain(..).map(|(_, node)| node).collect()
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

/// Error from a structural change to the graph store
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GraphError {
    /// Node not found
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// Node id already in use
    #[error("Node already exists: {0}")]
    NodeExists(NodeId),

    /// Port not found
    #[error("Port not found: {0}.{1}")]
    PortNotFound(NodeId, String),

    /// Incompatible port types
    #[error("Incompatible port types: {from:?} -> {to:?}")]
    IncompatiblePorts {
        /// Output type
        from: PortType,
        /// Input type
        to: PortType,
    },

    /// Input already has a cable
    #[error("Input already connected: {0}.{1}")]
    InputOccupied(NodeId, String),

    /// Self-loop not allowed
    #[error("Self-loop not allowed on {0}")]
    SelfLoop(NodeId),

    /// No node id left to hand out
    #[error("Node id space exhausted")]
    IdSpaceExhausted,
}

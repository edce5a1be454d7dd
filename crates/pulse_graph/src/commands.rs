// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph edit commands for undo/redo support.
//!
//! A [`Command`] carries everything needed to apply it in either
//! [`Direction`]. Structural work goes through the [`GraphHooks`] so the
//! command engine never builds or tears down nodes on its own.

use crate::connection::Cable;
use crate::graph::{Graph, GraphError};
use crate::lifecycle::GraphHooks;
use crate::node::{NodeId, NodeSnapshot, ParamValue};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Which way a command is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Forward application (first execution and redo)
    Do,
    /// Inverse application
    Undo,
}

impl Direction {
    /// The opposite direction
    pub fn inverse(self) -> Self {
        match self {
            Self::Do => Self::Undo,
            Self::Undo => Self::Do,
        }
    }
}

/// Command kind tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandKind {
    /// ADD
    AddNode,
    /// DEL
    DeleteNode,
    /// CONN
    Connect,
    /// DISCONN
    Disconnect,
    /// PARAM
    SetParam,
    /// MOVE
    MoveNodes,
    /// Grouped commands
    Batch,
}

/// What a delete captured so it can be undone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeletedNode {
    /// The node as it was just before removal
    pub snapshot: NodeSnapshot,
    /// Every cable that touched it
    pub cables: Vec<Cable>,
    /// Its slot in graph order
    #[serde(default)]
    pub index: usize,
}

/// One node's position change
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeMove {
    /// Node being moved
    pub node: NodeId,
    /// Position before the move
    pub from: [f32; 2],
    /// Position after the move
    pub to: [f32; 2],
}

/// A recorded graph edit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    /// Create a node
    AddNode {
        /// Registry key
        node_type: String,
        /// Editor position
        position: [f32; 2],
        /// Parameter overrides
        params: IndexMap<String, ParamValue>,
        /// Id to create under. Empty until the first do allocates one.
        id: Option<NodeId>,
    },
    /// Delete a node and its cables
    DeleteNode {
        /// Node to delete
        id: NodeId,
        /// Filled in by the first do
        captured: Option<DeletedNode>,
    },
    /// Add a cable
    Connect {
        /// The cable
        cable: Cable,
    },
    /// Remove a cable
    Disconnect {
        /// The cable
        cable: Cable,
    },
    /// Change one parameter
    SetParam {
        /// Target node
        node: NodeId,
        /// Parameter name
        key: String,
        /// Value restored on undo
        old: ParamValue,
        /// Value written on do
        new: ParamValue,
    },
    /// Reposition nodes
    MoveNodes {
        /// Per-node moves
        moves: Vec<NodeMove>,
    },
    /// Several commands undone and redone as one
    Batch {
        /// Label shown in the history
        description: String,
        /// Children, in do order
        commands: Vec<Command>,
    },
}

impl Command {
    /// Create a fresh node of `node_type` with the type's defaults
    pub fn add_node(node_type: impl Into<String>, position: [f32; 2]) -> Self {
        Self::AddNode {
            node_type: node_type.into(),
            position,
            params: IndexMap::new(),
            id: None,
        }
    }

    /// Re-create a node under its recorded id
    pub fn restore_node(snapshot: NodeSnapshot) -> Self {
        Self::AddNode {
            node_type: snapshot.node_type,
            position: snapshot.position,
            params: snapshot.params,
            id: Some(snapshot.id),
        }
    }

    /// Override a parameter on an [`Command::AddNode`]; no-op for other kinds
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        if let Self::AddNode { params, .. } = &mut self {
            params.insert(key.into(), value.into());
        }
        self
    }

    /// Delete a node
    pub fn delete_node(id: NodeId) -> Self {
        Self::DeleteNode { id, captured: None }
    }

    /// Connect an output to an input
    pub fn connect(cable: Cable) -> Self {
        Self::Connect { cable }
    }

    /// Remove a cable
    pub fn disconnect(cable: Cable) -> Self {
        Self::Disconnect { cable }
    }

    /// Change a parameter from `old` to `new`
    pub fn set_param(
        node: NodeId,
        key: impl Into<String>,
        old: impl Into<ParamValue>,
        new: impl Into<ParamValue>,
    ) -> Self {
        Self::SetParam {
            node,
            key: key.into(),
            old: old.into(),
            new: new.into(),
        }
    }

    /// Change a parameter, taking `old` from the graph's current value
    pub fn set_param_from(
        graph: &Graph,
        node: NodeId,
        key: impl Into<String>,
        new: impl Into<ParamValue>,
    ) -> Result<Self, CommandError> {
        let key = key.into();
        let old = graph
            .node(node)
            .ok_or(CommandError::NodeNotFound(node))?
            .param(&key)
            .cloned()
            .ok_or_else(|| CommandError::ParamNotFound(node, key.clone()))?;
        Ok(Self::SetParam {
            node,
            key,
            old,
            new: new.into(),
        })
    }

    /// Move nodes
    pub fn move_nodes(moves: Vec<NodeMove>) -> Self {
        Self::MoveNodes { moves }
    }

    /// Group commands into one history entry
    pub fn batch(description: impl Into<String>, commands: Vec<Command>) -> Self {
        Self::Batch {
            description: description.into(),
            commands,
        }
    }

    /// Kind tag
    pub fn kind(&self) -> CommandKind {
        match self {
            Self::AddNode { .. } => CommandKind::AddNode,
            Self::DeleteNode { .. } => CommandKind::DeleteNode,
            Self::Connect { .. } => CommandKind::Connect,
            Self::Disconnect { .. } => CommandKind::Disconnect,
            Self::SetParam { .. } => CommandKind::SetParam,
            Self::MoveNodes { .. } => CommandKind::MoveNodes,
            Self::Batch { .. } => CommandKind::Batch,
        }
    }

    /// Get a description of this command
    pub fn description(&self) -> &str {
        match self {
            Self::AddNode { .. } => "Add Node",
            Self::DeleteNode { .. } => "Delete Node",
            Self::Connect { .. } => "Connect",
            Self::Disconnect { .. } => "Disconnect",
            Self::SetParam { .. } => "Change Parameter",
            Self::MoveNodes { .. } => "Move Nodes",
            Self::Batch { description, .. } => description.as_str(),
        }
    }

    /// Id of the node an ADD created, once it has run
    pub fn created_node(&self) -> Option<NodeId> {
        match self {
            Self::AddNode { id, .. } => *id,
            _ => None,
        }
    }

    /// Apply the command.
    ///
    /// On error the graph is left as it was. Payload fields that only the
    /// first do can know (allocated ids, delete captures) are filled in here.
    pub fn apply(
        &mut self,
        direction: Direction,
        graph: &mut Graph,
        hooks: &mut dyn GraphHooks,
    ) -> Result<(), CommandError> {
        tracing::trace!(command = self.description(), ?direction, "applying command");

        match self {
            Self::AddNode {
                node_type,
                position,
                params,
                id,
            } => match direction {
                Direction::Do => {
                    let node = match id {
                        Some(node) => *node,
                        None => graph.allocate_id()?,
                    };
                    let snapshot = NodeSnapshot {
                        id: node,
                        node_type: node_type.clone(),
                        position: *position,
                        params: params.clone(),
                    };
                    *id = Some(hooks.materialize_node(graph, &snapshot)?);
                    Ok(())
                }
                Direction::Undo => {
                    let node = id.ok_or(CommandError::NotApplied)?;
                    let removed = hooks.dematerialize_node(graph, node)?;
                    if !removed.cables.is_empty() {
                        hooks.refresh_connections(graph);
                    }
                    Ok(())
                }
            },

            Self::DeleteNode { id, captured } => match direction {
                Direction::Do => {
                    let snapshot = graph
                        .node(*id)
                        .ok_or(CommandError::NodeNotFound(*id))?
                        .snapshot();
                    let removed = hooks.dematerialize_node(graph, *id)?;
                    *captured = Some(DeletedNode {
                        snapshot,
                        cables: removed.cables,
                        index: removed.index,
                    });
                    hooks.refresh_connections(graph);
                    Ok(())
                }
                Direction::Undo => {
                    let deleted = captured.as_ref().ok_or(CommandError::NotApplied)?;
                    let node = hooks.materialize_node(graph, &deleted.snapshot)?;
                    if let Err(err) = reattach_node(graph, node, deleted) {
                        // Every captured cable touches the node, so this also
                        // drops any that did go back in
                        if let Err(cleanup) = hooks.dematerialize_node(graph, node) {
                            tracing::warn!(node = %node, %cleanup, "could not undo partial restore");
                        }
                        return Err(err.into());
                    }
                    hooks.refresh_connections(graph);
                    Ok(())
                }
            },

            Self::Connect { cable } => match direction {
                Direction::Do => connect(graph, hooks, cable),
                Direction::Undo => disconnect(graph, hooks, cable),
            },

            Self::Disconnect { cable } => match direction {
                Direction::Do => disconnect(graph, hooks, cable),
                Direction::Undo => connect(graph, hooks, cable),
            },

            Self::SetParam {
                node,
                key,
                old,
                new,
            } => {
                let value = match direction {
                    Direction::Do => new,
                    Direction::Undo => old,
                };
                let param = graph
                    .node_mut(*node)
                    .ok_or(CommandError::NodeNotFound(*node))?
                    .params
                    .get_mut(key.as_str())
                    .ok_or_else(|| CommandError::ParamNotFound(*node, key.clone()))?;
                param.value = value.clone();
                hooks.refresh_node(graph, *node);
                Ok(())
            }

            Self::MoveNodes { moves } => {
                if let Some(missing) = moves.iter().find(|m| !graph.contains_node(m.node)) {
                    return Err(CommandError::NodeNotFound(missing.node));
                }
                for m in moves.iter() {
                    let target = match direction {
                        Direction::Do => m.to,
                        Direction::Undo => m.from,
                    };
                    if let Some(node) = graph.node_mut(m.node) {
                        node.position = target;
                    }
                    hooks.refresh_node(graph, m.node);
                }
                Ok(())
            }

            Self::Batch { commands, .. } => apply_batch(commands, direction, graph, hooks),
        }
    }
}

fn reattach_node(graph: &mut Graph, node: NodeId, deleted: &DeletedNode) -> Result<(), GraphError> {
    graph.move_node_to(node, deleted.index)?;
    for cable in &deleted.cables {
        graph.insert_cable(cable.clone())?;
    }
    Ok(())
}

fn connect(graph: &mut Graph, hooks: &mut dyn GraphHooks, cable: &Cable) -> Result<(), CommandError> {
    let closes_cycle = graph.would_close_cycle(cable.from, cable.to);
    graph.insert_cable(cable.clone())?;
    if closes_cycle {
        tracing::debug!(%cable, "cable closes a cycle; loop members will read last frame's values");
    }
    hooks.refresh_connections(graph);
    Ok(())
}

fn disconnect(graph: &mut Graph, hooks: &mut dyn GraphHooks, cable: &Cable) -> Result<(), CommandError> {
    if !graph.remove_cable(cable) {
        return Err(CommandError::CableNotFound(cable.clone()));
    }
    hooks.refresh_connections(graph);
    Ok(())
}

/// Apply children in order (reverse order for undo). If one fails, the ones
/// already applied are rolled back before the error is returned.
fn apply_batch(
    commands: &mut [Command],
    direction: Direction,
    graph: &mut Graph,
    hooks: &mut dyn GraphHooks,
) -> Result<(), CommandError> {
    let order: Vec<usize> = match direction {
        Direction::Do => (0..commands.len()).collect(),
        Direction::Undo => (0..commands.len()).rev().collect(),
    };

    for (done, &index) in order.iter().enumerate() {
        if let Err(err) = commands[index].apply(direction, graph, hooks) {
            for &applied in order[..done].iter().rev() {
                if let Err(rollback) = commands[applied].apply(direction.inverse(), graph, hooks) {
                    tracing::warn!(%rollback, "batch rollback step failed");
                }
            }
            return Err(err);
        }
    }
    Ok(())
}

/// Error type for command execution
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CommandError {
    /// No type registered under this key
    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),

    /// Node not found
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// Node has no such parameter
    #[error("Parameter not found: {0}.{1}")]
    ParamNotFound(NodeId, String),

    /// No cable matches all four endpoint fields
    #[error("Cable not found: {0}")]
    CableNotFound(Cable),

    /// Undo of a command whose do never ran
    #[error("Command was never applied")]
    NotApplied,

    /// The history engine has no hooks to apply structural changes with
    #[error("Graph hooks not registered")]
    HooksNotRegistered,

    /// Rejected by the graph store
    #[error(transparent)]
    Graph(#[from] GraphError),
}

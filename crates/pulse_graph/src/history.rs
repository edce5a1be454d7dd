// SPDX-License-Identifier: MIT OR Apache-2.0
//! Undo/redo history over graph edit commands.
//!
//! Every mutation to the graph goes through [`History::execute`], which
//! applies the command and only then records it. Undo and redo replay the
//! recorded command in the opposite or same [`Direction`].

use crate::commands::{Command, CommandError, Direction};
use crate::graph::Graph;
use crate::lifecycle::GraphHooks;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use thiserror::Error;

/// Default undo history depth
pub const MAX_HISTORY: usize = 50;

/// History errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HistoryError {
    /// `register_hooks` was already called
    #[error("Graph hooks already registered")]
    HooksAlreadyRegistered,

    /// The command was rejected
    #[error("Command failed: {0}")]
    Command(#[from] CommandError),
}

/// Result type for history operations
pub type Result<T> = std::result::Result<T, HistoryError>;

/// History statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryStats {
    /// Entries in the undo stack
    pub undo_count: usize,
    /// Entries in the redo stack
    pub redo_count: usize,
    /// Maximum undo depth
    pub max_depth: usize,
}

/// Undo/redo history manager
pub struct History {
    /// Undo stack, newest at the back
    undo_stack: VecDeque<Command>,
    /// Redo stack, newest at the back
    redo_stack: VecDeque<Command>,
    /// Maximum undo depth
    max_depth: usize,
    /// Structural hooks, set once at startup
    hooks: Option<Box<dyn GraphHooks>>,
}

impl History {
    /// Create a new history manager
    pub fn new() -> Self {
        Self::with_max_depth(MAX_HISTORY)
    }

    /// Create with custom maximum depth
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            max_depth,
            hooks: None,
        }
    }

    /// Create with custom maximum depth and hooks already in place
    pub fn with_hooks(max_depth: usize, hooks: Box<dyn GraphHooks>) -> Self {
        Self {
            hooks: Some(hooks),
            ..Self::with_max_depth(max_depth)
        }
    }

    /// Inject the hooks commands use to build and tear down nodes.
    /// Callable once.
    pub fn register_hooks(&mut self, hooks: Box<dyn GraphHooks>) -> Result<()> {
        if self.hooks.is_some() {
            return Err(HistoryError::HooksAlreadyRegistered);
        }
        self.hooks = Some(hooks);
        Ok(())
    }

    /// Whether hooks have been registered
    pub fn has_hooks(&self) -> bool {
        self.hooks.is_some()
    }

    /// The registered hooks
    pub fn hooks_mut(&mut self) -> Option<&mut (dyn GraphHooks + 'static)> {
        self.hooks.as_deref_mut()
    }

    fn require_hooks(&mut self) -> std::result::Result<&mut (dyn GraphHooks + 'static), CommandError> {
        self.hooks
            .as_deref_mut()
            .ok_or(CommandError::HooksNotRegistered)
    }

    /// Apply a fresh command and record it.
    ///
    /// A rejected command is not recorded and the redo stack is kept.
    pub fn execute(&mut self, graph: &mut Graph, mut command: Command) -> Result<()> {
        command.apply(Direction::Do, graph, self.require_hooks()?)?;
        tracing::trace!(command = command.description(), "recorded");

        self.redo_stack.clear();
        self.undo_stack.push_back(command);

        // Enforce history limit
        while self.undo_stack.len() > self.max_depth {
            if let Some(evicted) = self.undo_stack.pop_front() {
                tracing::trace!(command = evicted.description(), "evicted from history");
            }
        }

        Ok(())
    }

    /// Undo the last command. Returns `false` if there was nothing to undo.
    pub fn undo(&mut self, graph: &mut Graph) -> Result<bool> {
        let Some(mut command) = self.undo_stack.pop_back() else {
            return Ok(false);
        };

        let applied = match self.require_hooks() {
            Ok(hooks) => command.apply(Direction::Undo, graph, hooks),
            Err(err) => Err(err),
        };
        if let Err(err) = applied {
            self.undo_stack.push_back(command);
            return Err(err.into());
        }

        self.redo_stack.push_back(command);
        Ok(true)
    }

    /// Redo the last undone command. Returns `false` if there was nothing to redo.
    pub fn redo(&mut self, graph: &mut Graph) -> Result<bool> {
        let Some(mut command) = self.redo_stack.pop_back() else {
            return Ok(false);
        };

        let applied = match self.require_hooks() {
            Ok(hooks) => command.apply(Direction::Do, graph, hooks),
            Err(err) => Err(err),
        };
        if let Err(err) = applied {
            self.redo_stack.push_back(command);
            return Err(err.into());
        }

        self.undo_stack.push_back(command);
        Ok(true)
    }

    /// Check if undo is available
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    /// Check if redo is available
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Get undo stack depth
    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    /// Get redo stack depth
    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    /// Maximum undo depth
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Change the maximum depth, evicting the oldest entries if needed
    pub fn set_max_depth(&mut self, max_depth: usize) {
        self.max_depth = max_depth;
        while self.undo_stack.len() > max_depth {
            self.undo_stack.pop_front();
        }
    }

    /// Clear both stacks. Hooks stay registered.
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    /// Get history statistics
    pub fn stats(&self) -> HistoryStats {
        HistoryStats {
            undo_count: self.undo_stack.len(),
            redo_count: self.redo_stack.len(),
            max_depth: self.max_depth,
        }
    }

    /// Get description of next undo operation
    pub fn undo_description(&self) -> Option<&str> {
        self.undo_stack.back().map(Command::description)
    }

    /// Get description of next redo operation
    pub fn redo_description(&self) -> Option<&str> {
        self.redo_stack.back().map(Command::description)
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for History {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("History")
            .field("undo_stack", &self.undo_stack)
            .field("redo_stack", &self.redo_stack)
            .field("max_depth", &self.max_depth)
            .field("hooks", &self.hooks.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Cable;
    use crate::graph::GraphError;
    use crate::lifecycle::RegistryHooks;
    use crate::node::{NodeCategory, NodeId, NodeRegistry, NodeType, Param, ParamValue};
    use crate::port::{Port, PortType};
    use std::sync::Arc;

    fn registry() -> Arc<NodeRegistry> {
        let mut registry = NodeRegistry::new();
        registry.register(
            NodeType::new("src", "Source", NodeCategory::Signal)
                .with_port(Port::output("Out", PortType::Number))
                .with_param("Level", Param::number(0.5)),
        );
        registry.register(
            NodeType::new("sink", "Sink", NodeCategory::Math)
                .with_port(Port::input("In", PortType::Number))
                .with_port(Port::output("Out", PortType::Number)),
        );
        Arc::new(registry)
    }

    fn history() -> History {
        let mut history = History::new();
        history
            .register_hooks(Box::new(RegistryHooks::new(registry())))
            .unwrap();
        history
    }

    /// Structure as comparable data: nodes with params, then cables
    fn shape(graph: &Graph) -> (Vec<(NodeId, String, Vec<(String, ParamValue)>)>, Vec<Cable>) {
        let nodes = graph
            .nodes()
            .map(|n| {
                let params = n
                    .params
                    .iter()
                    .map(|(k, p)| (k.clone(), p.value.clone()))
                    .collect();
                (n.id, n.node_type.clone(), params)
            })
            .collect();
        let mut cables: Vec<Cable> = graph.cables().cloned().collect();
        cables.sort_by_key(|c| (c.from, c.to, c.from_port.clone(), c.to_port.clone()));
        (nodes, cables)
    }

    fn add(history: &mut History, graph: &mut Graph, ty: &str) -> NodeId {
        let before = graph.node_ids().collect::<Vec<_>>();
        history.execute(graph, Command::add_node(ty, [0.0, 0.0])).unwrap();
        graph
            .node_ids()
            .find(|id| !before.contains(id))
            .unwrap()
    }

    #[test]
    fn test_execute_requires_hooks() {
        let mut history = History::new();
        let mut graph = Graph::new();
        let err = history
            .execute(&mut graph, Command::add_node("src", [0.0, 0.0]))
            .unwrap_err();
        assert_eq!(err, HistoryError::Command(CommandError::HooksNotRegistered));
        assert!(!history.can_undo());
    }

    #[test]
    fn test_hooks_register_once() {
        let mut history = history();
        assert!(history.has_hooks());
        assert_eq!(
            history.register_hooks(Box::new(RegistryHooks::new(registry()))),
            Err(HistoryError::HooksAlreadyRegistered)
        );
    }

    #[test]
    fn test_undo_redo_on_empty_stacks() {
        let mut history = history();
        let mut graph = Graph::new();
        assert_eq!(history.undo(&mut graph), Ok(false));
        assert_eq!(history.redo(&mut graph), Ok(false));
        assert_eq!(graph.node_count(), 0);
    }

    #[test]
    fn test_add_connect_undo_redo() {
        let mut history = history();
        let mut graph = Graph::new();
        let y = add(&mut history, &mut graph, "sink");
        let x = add(&mut history, &mut graph, "src");
        let cable = Cable::new(x, "Out", y, "In");
        history.execute(&mut graph, Command::connect(cable.clone())).unwrap();

        assert_eq!(history.undo_description(), Some("Connect"));
        assert_eq!(history.undo(&mut graph), Ok(true));
        assert!(!graph.contains_cable(&cable));
        assert!(graph.contains_node(x));

        assert_eq!(history.undo(&mut graph), Ok(true));
        assert!(!graph.contains_node(x));
        assert_eq!(history.redo_depth(), 2);

        assert_eq!(history.redo(&mut graph), Ok(true));
        assert_eq!(history.redo(&mut graph), Ok(true));
        assert!(graph.contains_node(x));
        assert!(graph.contains_cable(&cable));
        assert!(!history.can_redo());
    }

    #[test]
    fn test_rejected_connect_is_not_recorded() {
        let mut history = history();
        let mut graph = Graph::new();
        let a = add(&mut history, &mut graph, "src");
        let b = add(&mut history, &mut graph, "src");
        let sink = add(&mut history, &mut graph, "sink");
        history
            .execute(&mut graph, Command::connect(Cable::new(a, "Out", sink, "In")))
            .unwrap();
        history.undo(&mut graph).unwrap();
        history.redo(&mut graph).unwrap();
        let before = shape(&graph);
        let stats = history.stats();

        let err = history
            .execute(&mut graph, Command::connect(Cable::new(b, "Out", sink, "In")))
            .unwrap_err();

        assert_eq!(
            err,
            HistoryError::Command(CommandError::Graph(GraphError::InputOccupied(sink, "In".into())))
        );
        assert_eq!(shape(&graph), before);
        assert_eq!(history.stats(), stats);
    }

    #[test]
    fn test_n_undos_restore_initial_graph() {
        let mut history = history();
        let mut graph = Graph::new();
        let seed = add(&mut history, &mut graph, "sink");
        history.clear();
        let initial = shape(&graph);

        let src = add(&mut history, &mut graph, "src");
        let mid = add(&mut history, &mut graph, "sink");
        history.execute(&mut graph, Command::connect(Cable::new(src, "Out", mid, "In"))).unwrap();
        history.execute(&mut graph, Command::connect(Cable::new(mid, "Out", seed, "In"))).unwrap();
        let set_level = Command::set_param_from(&graph, src, "Level", 2.0).unwrap();
        history.execute(&mut graph, set_level).unwrap();
        history.execute(&mut graph, Command::delete_node(mid)).unwrap();
        let done = shape(&graph);

        for _ in 0..6 {
            assert_eq!(history.undo(&mut graph), Ok(true));
        }
        assert_eq!(shape(&graph), initial);

        for _ in 0..6 {
            assert_eq!(history.redo(&mut graph), Ok(true));
        }
        assert_eq!(shape(&graph), done);
    }

    #[test]
    fn test_delete_undo_restores_node_and_cables_in_one_step() {
        let mut history = history();
        let mut graph = Graph::new();
        let a = add(&mut history, &mut graph, "src");
        let b = add(&mut history, &mut graph, "sink");
        let c = add(&mut history, &mut graph, "sink");
        history.execute(&mut graph, Command::connect(Cable::new(a, "Out", b, "In"))).unwrap();
        history.execute(&mut graph, Command::connect(Cable::new(b, "Out", c, "In"))).unwrap();
        let before = shape(&graph);

        history.execute(&mut graph, Command::delete_node(b)).unwrap();
        assert_eq!(graph.cable_count(), 0);

        history.undo(&mut graph).unwrap();
        assert_eq!(shape(&graph).1, before.1);
        assert!(graph.contains_node(b));
    }

    #[test]
    fn test_fresh_command_clears_redo() {
        let mut history = history();
        let mut graph = Graph::new();
        add(&mut history, &mut graph, "src");
        history.undo(&mut graph).unwrap();
        assert!(history.can_redo());

        add(&mut history, &mut graph, "sink");
        assert!(!history.can_redo());
        assert_eq!(history.undo_depth(), 1);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut history = History::with_max_depth(3);
        history
            .register_hooks(Box::new(RegistryHooks::new(registry())))
            .unwrap();
        let mut graph = Graph::new();
        let first = add(&mut history, &mut graph, "src");
        for _ in 0..3 {
            add(&mut history, &mut graph, "src");
        }
        assert_eq!(history.undo_depth(), 3);

        while history.undo(&mut graph).unwrap() {}
        // The first ADD fell off the stack, so its node stays
        assert_eq!(graph.node_ids().collect::<Vec<_>>(), vec![first]);
        assert_eq!(history.stats().redo_count, 3);
    }

    #[test]
    fn test_set_max_depth_trims() {
        let mut history = history();
        let mut graph = Graph::new();
        for _ in 0..5 {
            add(&mut history, &mut graph, "src");
        }
        history.set_max_depth(2);
        assert_eq!(history.undo_depth(), 2);
        assert_eq!(history.max_depth(), 2);
    }
}

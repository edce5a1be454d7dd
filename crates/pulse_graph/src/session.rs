// SPDX-License-Identifier: MIT OR Apache-2.0
//! The runtime context: one graph, its scheduler, and its edit history.

use crate::commands::{Command, CommandError, NodeMove};
use crate::config::SessionConfig;
use crate::connection::Cable;
use crate::document::{DocumentError, LoadMode, LoadReport, ProjectDocument, TemplateDocument};
use crate::evaluation::{EvaluationError, FrameContext};
use crate::graph::Graph;
use crate::history::{History, HistoryError};
use crate::lifecycle::{GraphHooks, RegistryHooks};
use crate::node::{NodeId, NodeRegistry, ParamValue};
use crate::scheduler::{FrameReport, Scheduler};
use std::sync::Arc;

/// Owns everything a running patch needs.
///
/// Hosts create one per open project and drive it with [`Session::tick`].
/// Every edit goes through the history so it can be undone.
#[derive(Debug)]
pub struct Session {
    graph: Graph,
    scheduler: Scheduler,
    history: History,
    registry: Arc<NodeRegistry>,
    config: SessionConfig,
}

impl Session {
    /// Create a session whose nodes are built by [`RegistryHooks`]
    pub fn new(registry: Arc<NodeRegistry>, config: SessionConfig) -> Self {
        let hooks = RegistryHooks::new(Arc::clone(&registry));
        Self::with_hooks(registry, config, Box::new(hooks))
    }

    /// Create a session with host-provided hooks
    pub fn with_hooks(registry: Arc<NodeRegistry>, config: SessionConfig, hooks: Box<dyn GraphHooks>) -> Self {
        Self {
            graph: Graph::new(),
            scheduler: Scheduler::new(),
            history: History::with_hooks(config.history_capacity, hooks),
            registry,
            config,
        }
    }

    /// The graph
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// The node type registry
    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    /// The edit history
    pub fn history(&self) -> &History {
        &self.history
    }

    /// Active settings
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Run a command and record it
    pub fn execute(&mut self, command: Command) -> Result<(), HistoryError> {
        self.history.execute(&mut self.graph, command)
    }

    /// Undo the last edit. `false` if there was nothing to undo.
    pub fn undo(&mut self) -> Result<bool, HistoryError> {
        self.history.undo(&mut self.graph)
    }

    /// Redo the last undone edit. `false` if there was nothing to redo.
    pub fn redo(&mut self) -> Result<bool, HistoryError> {
        self.history.redo(&mut self.graph)
    }

    /// Add a node with the type's defaults
    pub fn add_node(&mut self, node_type: &str, position: [f32; 2]) -> Result<NodeId, HistoryError> {
        let id = self.graph.allocate_id().map_err(CommandError::from)?;
        let mut command = Command::add_node(node_type, position);
        if let Command::AddNode { id: slot, .. } = &mut command {
            *slot = Some(id);
        }
        self.execute(command)?;
        Ok(id)
    }

    /// Delete a node and its cables
    pub fn delete_node(&mut self, id: NodeId) -> Result<(), HistoryError> {
        self.execute(Command::delete_node(id))
    }

    /// Connect an output to an input
    pub fn connect(
        &mut self,
        from: NodeId,
        from_port: &str,
        to: NodeId,
        to_port: &str,
    ) -> Result<(), HistoryError> {
        self.execute(Command::connect(Cable::new(from, from_port, to, to_port)))
    }

    /// Remove a cable
    pub fn disconnect(&mut self, cable: Cable) -> Result<(), HistoryError> {
        self.execute(Command::disconnect(cable))
    }

    /// Change a parameter, recording its current value for undo
    pub fn set_param(&mut self, id: NodeId, key: &str, value: impl Into<ParamValue>) -> Result<(), HistoryError> {
        let command = Command::set_param_from(&self.graph, id, key, value)?;
        self.execute(command)
    }

    /// Move one node
    pub fn move_node(&mut self, id: NodeId, to: [f32; 2]) -> Result<(), HistoryError> {
        let from = self
            .graph
            .node(id)
            .ok_or(CommandError::NodeNotFound(id))?
            .position;
        self.execute(Command::move_nodes(vec![NodeMove { node: id, from, to }]))
    }

    /// Evaluate one frame
    pub fn tick(&mut self, frame: &FrameContext) -> Result<FrameReport, EvaluationError> {
        self.scheduler
            .tick(&mut self.graph, &self.registry, frame, self.config.fault_policy)
    }

    /// Current execution order
    pub fn order(&mut self) -> &[NodeId] {
        self.scheduler.order(&self.graph)
    }

    /// Whether the graph contains a cycle
    pub fn is_cyclic(&mut self) -> bool {
        self.scheduler.refresh(&self.graph);
        self.scheduler.is_cyclic()
    }

    /// Tear down every node through the hooks and forget all history.
    /// The id allocator keeps counting.
    pub fn reset(&mut self) {
        if let Some(hooks) = self.history.hooks_mut() {
            let ids: Vec<NodeId> = self.graph.node_ids().collect();
            for id in ids {
                if let Err(err) = hooks.dematerialize_node(&mut self.graph, id) {
                    tracing::warn!(node = %id, %err, "failed to dematerialize node during reset");
                }
            }
            hooks.refresh_connections(&self.graph);
        }
        let leftovers = self.graph.clear();
        if !leftovers.is_empty() {
            tracing::warn!(count = leftovers.len(), "disposing nodes the hooks did not remove");
        }
        for mut node in leftovers {
            if let Some(behavior) = self.registry.behavior(&node.node_type) {
                behavior.dispose(&mut node);
            }
        }
        self.history.clear();
        self.scheduler.invalidate();
        tracing::debug!("session reset");
    }

    /// Replace the graph with a document's contents. Not recorded in history.
    pub fn load_document(&mut self, document: &ProjectDocument, mode: LoadMode) -> Result<LoadReport, DocumentError> {
        self.reset();
        let hooks = self
            .history
            .hooks_mut()
            .ok_or(CommandError::HooksNotRegistered)?;
        Ok(document.instantiate(&mut self.graph, hooks, mode))
    }

    /// Parse and load a JSON project
    pub fn load_json(&mut self, json: &str, mode: LoadMode) -> Result<LoadReport, DocumentError> {
        let document = ProjectDocument::from_json(json)?;
        self.load_document(&document, mode)
    }

    /// Load a starter template with fresh ids
    pub fn load_template(&mut self, template: &TemplateDocument) -> Result<LoadReport, DocumentError> {
        self.load_document(&template.to_project(), LoadMode::Fresh)
    }

    /// Capture the graph as a document
    pub fn to_document(&self) -> ProjectDocument {
        ProjectDocument::from_graph(&self.graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::NodeBehavior;
    use crate::library::create_standard_registry;
    use crate::node::{NodeCategory, NodeType};
    use crate::port::PortValue;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn session() -> Session {
        Session::new(Arc::new(create_standard_registry()), SessionConfig::default())
    }

    #[test]
    fn test_lfo_drives_map_in_same_frame() {
        let mut session = session();
        let map = session.add_node("math_map", [200.0, 0.0]).unwrap();
        let lfo = session.add_node("sig_lfo", [0.0, 0.0]).unwrap();
        session.connect(lfo, "Val", map, "In").unwrap();
        session.set_param(map, "OutMax", 10.0).unwrap();

        assert_eq!(session.order(), &[lfo, map]);
        let report = session
            .tick(&FrameContext::at(std::f64::consts::FRAC_PI_2))
            .unwrap();
        assert_eq!(report.evaluated, 2);

        let out = session.graph().node(map).unwrap().value("Out").unwrap().as_number();
        assert!((out - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_edits_are_undoable() {
        let mut session = session();
        let a = session.add_node("sig_lfo", [0.0, 0.0]).unwrap();
        session.move_node(a, [5.0, 6.0]).unwrap();
        session.set_param(a, "Offset", 2.0).unwrap();
        assert_eq!(session.history().undo_description(), Some("Change Parameter"));

        assert!(session.undo().unwrap());
        assert!(session.undo().unwrap());
        assert_eq!(session.graph().node(a).unwrap().position, [0.0, 0.0]);
        assert!(session.redo().unwrap());
        assert_eq!(session.graph().node(a).unwrap().position, [5.0, 6.0]);
    }

    #[test]
    fn test_errors_surface_through_history() {
        let mut session = session();
        assert_eq!(
            session.add_node("nope", [0.0, 0.0]),
            Err(HistoryError::Command(CommandError::UnknownNodeType("nope".into())))
        );
        assert_eq!(
            session.set_param(NodeId(42), "Offset", 1.0),
            Err(HistoryError::Command(CommandError::NodeNotFound(NodeId(42))))
        );
        assert!(!session.history().can_undo());
    }

    #[test]
    fn test_reset_clears_graph_and_history() {
        let mut session = session();
        let a = session.add_node("sig_lfo", [0.0, 0.0]).unwrap();
        let b = session.add_node("math_op", [0.0, 0.0]).unwrap();
        session.connect(a, "Val", b, "A").unwrap();

        session.reset();
        assert_eq!(session.graph().node_count(), 0);
        assert_eq!(session.graph().cable_count(), 0);
        assert!(!session.history().can_undo());
        assert!(session.order().is_empty());

        // Ids are not reused after a reset
        let c = session.add_node("sig_lfo", [0.0, 0.0]).unwrap();
        assert!(c > b);
    }

    /// Builds nodes normally but refuses to tear them down
    struct Sticky(RegistryHooks);

    impl GraphHooks for Sticky {
        fn materialize_node(
            &mut self,
            graph: &mut Graph,
            snapshot: &crate::node::NodeSnapshot,
        ) -> Result<NodeId, CommandError> {
            self.0.materialize_node(graph, snapshot)
        }

        fn dematerialize_node(
            &mut self,
            _graph: &mut Graph,
            id: NodeId,
        ) -> Result<crate::graph::RemovedNode, CommandError> {
            Err(CommandError::NodeNotFound(id))
        }
    }

    /// Counts disposals
    struct Counted(Arc<AtomicUsize>);

    impl NodeBehavior for Counted {
        fn dispose(&self, _node: &mut crate::node::Node) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_reset_disposes_nodes_the_hooks_kept() {
        let disposed = Arc::new(AtomicUsize::new(0));
        let mut registry = NodeRegistry::new();
        registry.register(
            NodeType::new("counted", "Counted", NodeCategory::System)
                .with_behavior(Counted(Arc::clone(&disposed))),
        );
        let registry = Arc::new(registry);
        let hooks = Sticky(RegistryHooks::new(Arc::clone(&registry)));
        let mut session = Session::with_hooks(registry, SessionConfig::default(), Box::new(hooks));

        session.add_node("counted", [0.0, 0.0]).unwrap();
        session.add_node("counted", [0.0, 0.0]).unwrap();
        session.reset();

        assert_eq!(session.graph().node_count(), 0);
        assert_eq!(disposed.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_load_is_not_recorded() {
        let mut session = session();
        session.add_node("sig_lfo", [0.0, 0.0]).unwrap();
        let doc = session.to_document();

        let report = session.load_document(&doc, LoadMode::Fresh).unwrap();
        assert_eq!(report.id_map.len(), 1);
        assert_eq!(session.graph().node_count(), 1);
        assert!(!session.history().can_undo());
        assert_eq!(session.undo(), Ok(false));
    }

    #[test]
    fn test_load_template() {
        let mut session = session();
        let template = TemplateDocument::from_json(
            r#"{ "n": [ { "t": "sig_mouse" }, { "t": "math_op", "p": { "Op": 2 } } ],
                 "c": [ { "f": 1, "p1": "X", "t": 2, "p2": "A" },
                        { "f": 1, "p1": "Y", "t": 2, "p2": "B" } ] }"#,
        )
        .unwrap();
        let report = session.load_template(&template).unwrap();
        assert_eq!(report.cables, 2);

        let op = report.id_map[&NodeId(2)];
        session
            .tick(&FrameContext::at(0.0).with_pointer(0.5, 0.5))
            .unwrap();
        assert_eq!(
            session.graph().node(op).unwrap().value("Out"),
            Some(&PortValue::Number(0.25))
        );
    }

    #[test]
    fn test_cyclic_patch_still_ticks() {
        let mut session = session();
        let a = session.add_node("math_op", [0.0, 0.0]).unwrap();
        let b = session.add_node("math_op", [0.0, 0.0]).unwrap();
        session.connect(a, "Out", b, "A").unwrap();
        session.connect(b, "Out", a, "A").unwrap();

        assert!(session.is_cyclic());
        assert_eq!(session.order().len(), 2);
        let report = session.tick(&FrameContext::default()).unwrap();
        assert!(report.faults.is_empty());
    }
}

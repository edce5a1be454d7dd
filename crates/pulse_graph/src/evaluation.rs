// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node behaviors and the per-frame evaluation context.

use crate::graph::Graph;
use crate::node::{Node, NodeId, NodeState, ParamValue};
use crate::port::{PortType, PortValue};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Shared per-frame inputs, supplied by the host
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameContext {
    /// Seconds since the session started
    pub time: f64,
    /// Pointer position, normalized to -1..1 on both axes
    pub pointer: [f32; 2],
    /// Other continuous signals (audio bands, MIDI faders, ...)
    pub signals: IndexMap<String, f64>,
}

impl FrameContext {
    /// Create a context at the given time
    pub fn at(time: f64) -> Self {
        Self {
            time,
            ..Self::default()
        }
    }

    /// Set the pointer position
    pub fn with_pointer(mut self, x: f32, y: f32) -> Self {
        self.pointer = [x, y];
        self
    }

    /// Set a named signal
    pub fn with_signal(mut self, name: impl Into<String>, value: f64) -> Self {
        self.signals.insert(name.into(), value);
        self
    }

    /// Read a named signal, zero if the host does not provide it
    pub fn signal(&self, name: &str) -> f64 {
        self.signals.get(name).copied().unwrap_or(0.0)
    }
}

/// Per-type runtime behavior.
///
/// Implementations are shared by every node of the type, so anything
/// per-instance belongs in the node's [`NodeState`].
pub trait NodeBehavior: Send + Sync {
    /// Called once when a node is materialized, before it joins the graph.
    /// May acquire external resources and publish initial outputs.
    fn init(&self, _node: &mut Node) {}

    /// Called every scheduled frame
    fn logic(&self, _scope: &mut NodeScope<'_>, _frame: &FrameContext) -> Result<(), BehaviorError> {
        Ok(())
    }

    /// Called when a node is dematerialized, after it left the graph.
    /// Must release whatever `init` or `logic` acquired.
    fn dispose(&self, _node: &mut Node) {}
}

/// A behavior's view of its node during one `logic` call.
///
/// Inputs resolve against the live graph; outputs and state belong to the
/// node being evaluated.
pub struct NodeScope<'a> {
    graph: &'a Graph,
    id: NodeId,
    values: &'a mut IndexMap<String, PortValue>,
    state: &'a mut NodeState,
}

impl<'a> NodeScope<'a> {
    /// Create a scope over a node whose outputs and state were moved out of the graph
    pub fn new(
        graph: &'a Graph,
        id: NodeId,
        values: &'a mut IndexMap<String, PortValue>,
        state: &'a mut NodeState,
    ) -> Self {
        Self {
            graph,
            id,
            values,
            state,
        }
    }

    /// Id of the node being evaluated
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// The graph, for behaviors that inspect their neighborhood
    pub fn graph(&self) -> &'a Graph {
        self.graph
    }

    /// Resolve an input port
    pub fn input(&self, port: &str) -> Cow<'a, PortValue> {
        self.graph.resolve_input(self.id, port)
    }

    /// Resolve an input port as a number
    pub fn input_number(&self, port: &str) -> f64 {
        self.input(port).as_number()
    }

    /// Resolve an input port, failing unless it carries the expected type
    pub fn require_input(&self, port: &str, expected: PortType) -> Result<Cow<'a, PortValue>, BehaviorError> {
        let value = self.input(port);
        match value.port_type() {
            None => Err(BehaviorError::MissingInput(port.to_string())),
            Some(found) if found.can_connect_to(&expected) => Ok(value),
            Some(_) => Err(BehaviorError::TypeMismatch {
                port: port.to_string(),
                expected,
            }),
        }
    }

    /// Read a static parameter
    pub fn param(&self, name: &str) -> Option<&'a ParamValue> {
        self.graph.node(self.id).and_then(|node| node.param(name))
    }

    /// Read a static parameter as a number, zero if missing
    pub fn param_number(&self, name: &str) -> f64 {
        self.param(name).map_or(0.0, ParamValue::as_number)
    }

    /// Read what this node published on a port, as of the previous write
    pub fn output(&self, port: &str) -> Option<&PortValue> {
        self.values.get(port)
    }

    /// Publish an output value
    pub fn set_output(&mut self, port: impl Into<String>, value: impl Into<PortValue>) {
        self.values.insert(port.into(), value.into());
    }

    /// The node's private working state
    pub fn state(&mut self) -> &mut NodeState {
        &mut *self.state
    }
}

/// What to do when a behavior reports a fault during a frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FaultPolicy {
    /// Log it, record it in the frame report, and keep walking
    #[default]
    Skip,
    /// Stop the frame and return the fault
    Halt,
}

/// Fault raised by a behavior
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BehaviorError {
    /// Missing required input
    #[error("Missing required input: {0}")]
    MissingInput(String),

    /// Type mismatch
    #[error("Type mismatch on {port}: expected {expected:?}")]
    TypeMismatch {
        /// Input port name
        port: String,
        /// What the behavior wanted
        expected: PortType,
    },

    /// Custom error
    #[error("{0}")]
    Custom(String),
}

/// Error during evaluation
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvaluationError {
    /// A behavior faulted under [`FaultPolicy::Halt`]
    #[error("Node {node} ({node_type}) faulted: {source}")]
    Behavior {
        /// Faulting node
        node: NodeId,
        /// Its type
        node_type: String,
        /// The fault
        #[source]
        source: BehaviorError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Cable;
    use crate::node::{NodeCategory, NodeType, Param};
    use crate::port::{Port, ResourceKind};

    #[test]
    fn test_frame_context() {
        let frame = FrameContext::at(1.5)
            .with_pointer(0.25, -0.5)
            .with_signal("bass", 0.8);
        assert_eq!(frame.time, 1.5);
        assert_eq!(frame.pointer, [0.25, -0.5]);
        assert_eq!(frame.signal("bass"), 0.8);
        assert_eq!(frame.signal("treble"), 0.0);
    }

    #[test]
    fn test_scope_reads_and_writes() {
        let ty = NodeType::new("t", "T", NodeCategory::Math)
            .with_port(Port::input("In", PortType::Number))
            .with_port(Port::input("Tex", PortType::Resource(ResourceKind::Texture)))
            .with_port(Port::output("Out", PortType::Number))
            .with_param("Gain", Param::number(2.0));
        let mut graph = Graph::new();
        let a = graph.allocate_id().unwrap();
        let b = graph.allocate_id().unwrap();
        graph.insert_node(Node::new(a, &ty)).unwrap();
        graph.insert_node(Node::new(b, &ty)).unwrap();
        graph.insert_cable(Cable::new(a, "Out", b, "In")).unwrap();
        graph.node_mut(a).unwrap().set_value("Out", 4.0);

        let mut values = IndexMap::new();
        let mut state = NodeState::default();
        let mut scope = NodeScope::new(&graph, b, &mut values, &mut state);

        assert_eq!(scope.id(), b);
        assert_eq!(scope.input_number("In"), 4.0);
        assert_eq!(scope.param_number("Gain"), 2.0);
        assert_eq!(scope.param_number("Missing"), 0.0);
        assert_eq!(
            scope.require_input("Tex", PortType::Resource(ResourceKind::Texture)),
            Err(BehaviorError::MissingInput("Tex".into()))
        );
        assert!(matches!(
            scope.require_input("In", PortType::Array),
            Err(BehaviorError::TypeMismatch { .. })
        ));

        let out = scope.input_number("In") * scope.param_number("Gain");
        scope.set_output("Out", out);
        scope.state().set(7u8);
        assert_eq!(scope.output("Out"), Some(&PortValue::Number(8.0)));

        assert_eq!(values.get("Out"), Some(&PortValue::Number(8.0)));
        assert_eq!(state.get::<u8>(), Some(&7));
    }
}

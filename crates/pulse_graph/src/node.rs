// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions for the graph runtime.

use crate::evaluation::NodeBehavior;
use crate::port::{Port, PortDirection, PortValue};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Unique identifier for a node.
///
/// Ids come from the owning [`Graph`](crate::Graph)'s allocator and are
/// never handed out twice, so history entries can keep referring to them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u64);

impl NodeId {
    /// Get the raw ID value
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Node type category, used by editors for grouping and coloring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeCategory {
    /// Signal sources (LFOs, pointer, beat clocks)
    Signal,
    /// Math operations
    Math,
    /// Geometry generators
    Geometry,
    /// Materials and shaders
    Material,
    /// Scene objects, cameras, lights
    Object,
    /// Textures
    Texture,
    /// Audio players and analysis
    Sound,
    /// Post-processing passes
    Effect,
    /// Organizational nodes (frames, groups)
    System,
}

impl NodeCategory {
    /// Short tag, as used in saved documents and style sheets
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Signal => "sig",
            Self::Math => "math",
            Self::Geometry => "geo",
            Self::Material => "mat",
            Self::Object => "obj",
            Self::Texture => "tex",
            Self::Sound => "snd",
            Self::Effect => "fx",
            Self::System => "sys",
        }
    }
}

/// A parameter's value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Numeric parameter
    Number(f64),
    /// Text parameter (labels, expressions)
    Text(String),
}

impl ParamValue {
    /// Numeric view, zero for text
    pub fn as_number(&self) -> f64 {
        match self {
            Self::Number(v) => *v,
            Self::Text(_) => 0.0,
        }
    }

    /// Convert to the value an input port reads
    pub fn to_port_value(&self) -> PortValue {
        match self {
            Self::Number(v) => PortValue::Number(*v),
            Self::Text(s) => PortValue::Text(s.clone()),
        }
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// A static parameter with optional editing constraints.
///
/// Constraints are hints for the inspector; the runtime stores whatever
/// value it is given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    /// Current value
    pub value: ParamValue,
    /// Lower bound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    /// Upper bound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Increment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
}

impl Param {
    /// Create an unconstrained numeric parameter
    pub fn number(value: f64) -> Self {
        Self {
            value: ParamValue::Number(value),
            min: None,
            max: None,
            step: None,
        }
    }

    /// Create a text parameter
    pub fn text(value: impl Into<String>) -> Self {
        Self {
            value: ParamValue::Text(value.into()),
            min: None,
            max: None,
            step: None,
        }
    }

    /// Set the range
    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    /// Set the step
    pub fn with_step(mut self, step: f64) -> Self {
        self.step = Some(step);
        self
    }
}

/// Node type definition
#[derive(Clone)]
pub struct NodeType {
    /// Unique type identifier (registry key)
    pub id: String,
    /// Display name
    pub name: String,
    /// Category
    pub category: NodeCategory,
    /// Description
    pub description: String,
    /// Input ports
    pub inputs: Vec<Port>,
    /// Output ports
    pub outputs: Vec<Port>,
    /// Parameter schema with defaults
    pub params: IndexMap<String, Param>,
    /// Per-frame behavior, if the type does anything at runtime
    pub behavior: Option<Arc<dyn NodeBehavior>>,
}

impl NodeType {
    /// Create a new type with no ports, params, or behavior
    pub fn new(id: impl Into<String>, name: impl Into<String>, category: NodeCategory) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category,
            description: String::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            params: IndexMap::new(),
            behavior: None,
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Add a port; direction decides which list it lands in
    pub fn with_port(mut self, port: Port) -> Self {
        match port.direction {
            PortDirection::Input => self.inputs.push(port),
            PortDirection::Output => self.outputs.push(port),
        }
        self
    }

    /// Add a parameter
    pub fn with_param(mut self, name: impl Into<String>, param: Param) -> Self {
        self.params.insert(name.into(), param);
        self
    }

    /// Attach a behavior
    pub fn with_behavior(mut self, behavior: impl NodeBehavior + 'static) -> Self {
        self.behavior = Some(Arc::new(behavior));
        self
    }
}

impl fmt::Debug for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeType")
            .field("id", &self.id)
            .field("category", &self.category)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("params", &self.params)
            .field("behavior", &self.behavior.is_some())
            .finish()
    }
}

/// Private working state of a node, owned by its behavior.
#[derive(Default)]
pub struct NodeState(Option<Box<dyn Any>>);

impl NodeState {
    /// Borrow the state as `T`
    pub fn get<T: 'static>(&self) -> Option<&T> {
        self.0.as_ref().and_then(|b| b.downcast_ref())
    }

    /// Mutably borrow the state as `T`
    pub fn get_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.0.as_mut().and_then(|b| b.downcast_mut())
    }

    /// Borrow the state as `T`, inserting `init()` if absent or of another type
    pub fn get_or_insert_with<T: 'static>(&mut self, init: impl FnOnce() -> T) -> &mut T {
        if self.get::<T>().is_none() {
            self.0 = Some(Box::new(init()));
        }
        // Just inserted as `T` above if it was missing.
        self.0
            .as_mut()
            .and_then(|b| b.downcast_mut())
            .unwrap_or_else(|| unreachable!("state was just set"))
    }

    /// Replace the state
    pub fn set<T: 'static>(&mut self, value: T) {
        self.0 = Some(Box::new(value));
    }

    /// Drop the state
    pub fn clear(&mut self) {
        self.0 = None;
    }

    /// Whether no state is held
    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }
}

impl fmt::Debug for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.0.is_some() { "NodeState(..)" } else { "NodeState(empty)" })
    }
}

/// Everything needed to bring a node back exactly as it was.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    /// Id to restore under
    pub id: NodeId,
    /// Registry key
    pub node_type: String,
    /// Editor position
    pub position: [f32; 2],
    /// Parameter values by name
    pub params: IndexMap<String, ParamValue>,
}

/// A node instance in the graph
#[derive(Debug)]
pub struct Node {
    /// Unique instance ID
    pub id: NodeId,
    /// Node type ID
    pub node_type: String,
    /// Position in the editor; the runtime never reads it
    pub position: [f32; 2],
    /// Input ports
    pub inputs: Vec<Port>,
    /// Output ports
    pub outputs: Vec<Port>,
    /// Static parameters
    pub params: IndexMap<String, Param>,
    /// Current output values by port name
    pub values: IndexMap<String, PortValue>,
    /// Behavior-owned working state
    pub state: NodeState,
}

impl Node {
    /// Create a new node from a type definition, with the type's defaults
    pub fn new(id: NodeId, node_type: &NodeType) -> Self {
        Self {
            id,
            node_type: node_type.id.clone(),
            position: [0.0, 0.0],
            inputs: node_type.inputs.clone(),
            outputs: node_type.outputs.clone(),
            params: node_type.params.clone(),
            values: IndexMap::new(),
            state: NodeState::default(),
        }
    }

    /// Set the position
    pub fn with_position(mut self, position: [f32; 2]) -> Self {
        self.position = position;
        self
    }

    /// Overwrite parameter values. Names the node does not declare are ignored.
    pub fn apply_params(&mut self, overrides: &IndexMap<String, ParamValue>) {
        for (name, value) in overrides {
            if let Some(param) = self.params.get_mut(name) {
                param.value = value.clone();
            }
        }
    }

    /// Get an input port by name
    pub fn input(&self, name: &str) -> Option<&Port> {
        self.inputs.iter().find(|p| p.name == name)
    }

    /// Get an output port by name
    pub fn output(&self, name: &str) -> Option<&Port> {
        self.outputs.iter().find(|p| p.name == name)
    }

    /// Get a parameter's value
    pub fn param(&self, name: &str) -> Option<&ParamValue> {
        self.params.get(name).map(|p| &p.value)
    }

    /// Get a current output value
    pub fn value(&self, port: &str) -> Option<&PortValue> {
        self.values.get(port)
    }

    /// Publish an output value
    pub fn set_value(&mut self, port: impl Into<String>, value: impl Into<PortValue>) {
        self.values.insert(port.into(), value.into());
    }

    /// Capture what is needed to restore this node later
    pub fn snapshot(&self) -> NodeSnapshot {
        NodeSnapshot {
            id: self.id,
            node_type: self.node_type.clone(),
            position: self.position,
            params: self
                .params
                .iter()
                .map(|(name, param)| (name.clone(), param.value.clone()))
                .collect(),
        }
    }
}

/// Registry of available node types
#[derive(Debug, Clone, Default)]
pub struct NodeRegistry {
    /// Registered node types by ID
    types: IndexMap<String, NodeType>,
}

impl NodeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node type, replacing any previous type with the same ID
    pub fn register(&mut self, node_type: NodeType) {
        self.types.insert(node_type.id.clone(), node_type);
    }

    /// Get a node type by ID
    pub fn get(&self, id: &str) -> Option<&NodeType> {
        self.types.get(id)
    }

    /// Whether a type is registered
    pub fn contains(&self, id: &str) -> bool {
        self.types.contains_key(id)
    }

    /// Get the behavior for a type, if it has one
    pub fn behavior(&self, id: &str) -> Option<&Arc<dyn NodeBehavior>> {
        self.types.get(id).and_then(|t| t.behavior.as_ref())
    }

    /// Get all registered types
    pub fn types(&self) -> impl Iterator<Item = &NodeType> {
        self.types.values()
    }

    /// Get types by category
    pub fn types_in_category(&self, category: NodeCategory) -> impl Iterator<Item = &NodeType> {
        self.types.values().filter(move |t| t.category == category)
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Create a node from a type ID, without running its behavior's `init`
    pub fn create_node(&self, type_id: &str, id: NodeId) -> Option<Node> {
        self.get(type_id).map(|t| Node::new(id, t))
    }
}

// SPDX-License-Identifier: MIT OR Apache-2.0
//! Dataflow graph runtime for Pulse.
//!
//! A patch is a graph of nodes joined by cables. Every frame the
//! [`Scheduler`] walks the nodes in dependency order and runs each type's
//! [`NodeBehavior`]; edits go through an undoable [`History`].
//!
//! ## Architecture
//!
//! - [`Graph`]: node and cable store with input resolution
//! - [`Scheduler`]: cached topological order, cycle fallback, frame walk
//! - [`History`] and [`Command`]: undo/redo over graph edits
//! - [`GraphHooks`]: how commands build and tear down nodes
//! - [`Session`]: one running patch with its settings
//! - [`library`]: built-in signal and math nodes

pub mod commands;
pub mod config;
pub mod connection;
pub mod document;
pub mod evaluation;
pub mod graph;
pub mod history;
pub mod library;
pub mod lifecycle;
pub mod node;
pub mod port;
pub mod scheduler;
pub mod session;

pub use commands::{Command, CommandError, CommandKind, Direction, NodeMove};
pub use config::{ConfigError, SessionConfig};
pub use connection::Cable;
pub use document::{DocumentError, LoadMode, LoadReport, ProjectDocument, TemplateDocument};
pub use evaluation::{BehaviorError, EvaluationError, FaultPolicy, FrameContext, NodeBehavior, NodeScope};
pub use graph::{Graph, GraphError};
pub use history::{History, HistoryError, HistoryStats};
pub use lifecycle::{GraphHooks, RegistryHooks};
pub use node::{Node, NodeCategory, NodeId, NodeRegistry, NodeSnapshot, NodeType, Param, ParamValue};
pub use port::{Port, PortDirection, PortType, PortValue, ResourceHandle, ResourceKind};
pub use scheduler::{FrameReport, Scheduler};
pub use session::Session;

// SPDX-License-Identifier: MIT OR Apache-2.0
//! Saved project documents and templates.
//!
//! Projects are JSON:
//!
//! ```json
//! {
//!   "nodes": [{ "id": 1, "type": "sig_lfo", "x": 40, "y": 80,
//!               "params": { "Frequency": { "value": 2 } } }],
//!   "cables": [{ "from": 1, "fromPort": "Val", "to": 2, "toPort": "In" }]
//! }
//! ```
//!
//! Older files wrote parameter values under `"v"`; both keys are read.

use crate::commands::CommandError;
use crate::connection::Cable;
use crate::graph::Graph;
use crate::lifecycle::GraphHooks;
use crate::node::{NodeId, NodeSnapshot, ParamValue};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Errors reading or writing documents
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// Malformed or unserializable JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// File could not be read or written
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The session could not be prepared for loading
    #[error("Command error: {0}")]
    Command(#[from] CommandError),
}

/// How document ids map onto the graph
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoadMode {
    /// Every node gets a fresh id from the allocator; cables are remapped
    #[default]
    Fresh,
    /// Nodes keep the ids written in the document
    Restore,
}

/// A saved parameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentParam {
    /// The value
    #[serde(alias = "v")]
    pub value: ParamValue,
}

/// A saved node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentNode {
    /// Id at save time
    pub id: NodeId,
    /// Registry key
    #[serde(rename = "type")]
    pub node_type: String,
    /// Editor X
    #[serde(default)]
    pub x: f32,
    /// Editor Y
    #[serde(default)]
    pub y: f32,
    /// Parameter values by name
    #[serde(default)]
    pub params: IndexMap<String, DocumentParam>,
}

impl DocumentNode {
    fn snapshot(&self, id: NodeId) -> NodeSnapshot {
        NodeSnapshot {
            id,
            node_type: self.node_type.clone(),
            position: [self.x, self.y],
            params: self
                .params
                .iter()
                .map(|(name, param)| (name.clone(), param.value.clone()))
                .collect(),
        }
    }
}

/// A saved project
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectDocument {
    /// Nodes in graph order
    #[serde(default)]
    pub nodes: Vec<DocumentNode>,
    /// Cables in graph order
    #[serde(default)]
    pub cables: Vec<Cable>,
}

/// What a load produced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    /// Document id to graph id, for every node that was created
    pub id_map: IndexMap<NodeId, NodeId>,
    /// Cables created
    pub cables: usize,
    /// Nodes that could not be created
    pub skipped_nodes: usize,
    /// Cables that could not be created
    pub skipped_cables: usize,
}

impl ProjectDocument {
    /// Capture every node and cable of a graph
    pub fn from_graph(graph: &Graph) -> Self {
        let nodes = graph
            .nodes()
            .map(|node| DocumentNode {
                id: node.id,
                node_type: node.node_type.clone(),
                x: node.position[0],
                y: node.position[1],
                params: node
                    .params
                    .iter()
                    .map(|(name, param)| {
                        (
                            name.clone(),
                            DocumentParam {
                                value: param.value.clone(),
                            },
                        )
                    })
                    .collect(),
            })
            .collect();

        Self {
            nodes,
            cables: graph.cables().cloned().collect(),
        }
    }

    /// Parse a document
    pub fn from_json(json: &str) -> Result<Self, DocumentError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize compactly
    pub fn to_json(&self) -> Result<String, DocumentError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Serialize with indentation
    pub fn to_json_pretty(&self) -> Result<String, DocumentError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Create the document's nodes and cables in `graph`.
    ///
    /// Nodes go through `hooks` like an ADD would. Cables are created only
    /// after every node exists. Anything that cannot be created is logged
    /// and skipped; the load itself does not fail.
    pub fn instantiate(&self, graph: &mut Graph, hooks: &mut dyn GraphHooks, mode: LoadMode) -> LoadReport {
        let mut report = LoadReport::default();

        for doc_node in &self.nodes {
            let materialized = match mode {
                LoadMode::Fresh => graph.allocate_id().map_err(CommandError::from),
                LoadMode::Restore => Ok(doc_node.id),
            }
            .and_then(|id| hooks.materialize_node(graph, &doc_node.snapshot(id)));
            match materialized {
                Ok(id) => {
                    report.id_map.insert(doc_node.id, id);
                }
                Err(err) => {
                    tracing::warn!(node = %doc_node.id, node_type = %doc_node.node_type, %err, "skipping node");
                    report.skipped_nodes += 1;
                }
            }
        }

        for cable in &self.cables {
            let (Some(&from), Some(&to)) = (report.id_map.get(&cable.from), report.id_map.get(&cable.to)) else {
                tracing::warn!(%cable, "skipping cable to a node that was not loaded");
                report.skipped_cables += 1;
                continue;
            };
            let mapped = Cable::new(from, cable.from_port.clone(), to, cable.to_port.clone());
            match graph.insert_cable(mapped) {
                Ok(()) => report.cables += 1,
                Err(err) => {
                    tracing::warn!(%cable, %err, "skipping cable");
                    report.skipped_cables += 1;
                }
            }
        }

        hooks.refresh_connections(graph);
        tracing::debug!(
            nodes = report.id_map.len(),
            cables = report.cables,
            skipped_nodes = report.skipped_nodes,
            skipped_cables = report.skipped_cables,
            "document loaded"
        );
        report
    }
}

/// A template node, in the compact template format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateNode {
    /// Registry key
    #[serde(rename = "t")]
    pub node_type: String,
    /// Editor X
    #[serde(default)]
    pub x: f32,
    /// Editor Y
    #[serde(default)]
    pub y: f32,
    /// Parameter overrides
    #[serde(rename = "p", default)]
    pub params: IndexMap<String, ParamValue>,
}

/// A template cable. Endpoints are 1-based positions in the node list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateCable {
    /// Source node position
    #[serde(rename = "f")]
    pub from: u64,
    /// Source port
    #[serde(rename = "p1")]
    pub from_port: String,
    /// Target node position
    #[serde(rename = "t")]
    pub to: u64,
    /// Target port
    #[serde(rename = "p2")]
    pub to_port: String,
}

/// A starter patch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateDocument {
    /// Nodes
    #[serde(rename = "n", default)]
    pub nodes: Vec<TemplateNode>,
    /// Cables
    #[serde(rename = "c", default)]
    pub cables: Vec<TemplateCable>,
}

impl TemplateDocument {
    /// Parse a template
    pub fn from_json(json: &str) -> Result<Self, DocumentError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Expand into a project document whose ids are the 1-based node positions
    pub fn to_project(&self) -> ProjectDocument {
        let nodes = self
            .nodes
            .iter()
            .enumerate()
            .map(|(index, node)| DocumentNode {
                id: NodeId(index as u64 + 1),
                node_type: node.node_type.clone(),
                x: node.x,
                y: node.y,
                params: node
                    .params
                    .iter()
                    .map(|(name, value)| (name.clone(), DocumentParam { value: value.clone() }))
                    .collect(),
            })
            .collect();
        let cables = self
            .cables
            .iter()
            .map(|c| Cable::new(NodeId(c.from), c.from_port.clone(), NodeId(c.to), c.to_port.clone()))
            .collect();

        ProjectDocument { nodes, cables }
    }
}

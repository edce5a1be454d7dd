// SPDX-License-Identifier: MIT OR Apache-2.0
//! Execution ordering and the per-frame walk.
//!
//! The order is a topological sort of the cable graph. Nodes the sort
//! cannot place (members of a cycle and everything downstream of one) are
//! appended in graph order, so every node still runs every frame; inside a
//! cycle a consumer may read what its producer wrote on the previous frame.

use crate::evaluation::{BehaviorError, EvaluationError, FaultPolicy, FrameContext, NodeScope};
use crate::graph::Graph;
use crate::node::{NodeId, NodeRegistry};
use std::collections::{HashMap, HashSet, VecDeque};

/// A computed execution order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionOrder {
    /// Every node id, producers before consumers where the graph allows it
    pub nodes: Vec<NodeId>,
    /// Whether some nodes had to be appended by the cycle fallback
    pub cyclic: bool,
}

/// Compute an execution order with Kahn's algorithm.
///
/// The ready queue is FIFO and seeded in graph order.
pub fn execution_order(graph: &Graph) -> ExecutionOrder {
    let mut in_degree: HashMap<NodeId, usize> = graph.node_ids().map(|id| (id, 0)).collect();
    let mut downstream: HashMap<NodeId, Vec<NodeId>> = HashMap::new();

    for cable in graph.cables() {
        if !in_degree.contains_key(&cable.from) {
            continue;
        }
        let Some(degree) = in_degree.get_mut(&cable.to) else {
            continue;
        };
        *degree += 1;
        downstream.entry(cable.from).or_default().push(cable.to);
    }

    let mut queue: VecDeque<NodeId> = graph
        .node_ids()
        .filter(|id| in_degree.get(id) == Some(&0))
        .collect();
    let mut nodes = Vec::with_capacity(graph.node_count());

    while let Some(id) = queue.pop_front() {
        nodes.push(id);
        for next in downstream.get(&id).into_iter().flatten() {
            if let Some(degree) = in_degree.get_mut(next) {
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(*next);
                }
            }
        }
    }

    let cyclic = nodes.len() < graph.node_count();
    if cyclic {
        let placed: HashSet<NodeId> = nodes.iter().copied().collect();
        let stragglers: Vec<NodeId> = graph.node_ids().filter(|id| !placed.contains(id)).collect();
        nodes.extend(stragglers);
    }

    ExecutionOrder { nodes, cyclic }
}

/// A behavior fault recorded under [`FaultPolicy::Skip`]
#[derive(Debug, Clone, PartialEq)]
pub struct NodeFault {
    /// Faulting node
    pub node: NodeId,
    /// Its type
    pub node_type: String,
    /// The fault
    pub error: BehaviorError,
}

/// Summary of one frame tick
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameReport {
    /// Nodes whose behavior ran
    pub evaluated: usize,
    /// Nodes whose type has no behavior
    pub skipped: usize,
    /// Faults that did not stop the frame
    pub faults: Vec<NodeFault>,
}

/// Caches the execution order and walks it each frame
#[derive(Debug, Default)]
pub struct Scheduler {
    order: ExecutionOrder,
    /// Node count, cable count, and revision the cache was built from
    seen: Option<(usize, usize, u64)>,
    recomputations: u64,
}

impl Scheduler {
    /// Create a scheduler with an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the cached order no longer matches the graph
    pub fn is_stale(&self, graph: &Graph) -> bool {
        self.seen != Some((graph.node_count(), graph.cable_count(), graph.revision()))
    }

    /// Recompute the order if the graph's topology changed. Returns whether it did.
    pub fn refresh(&mut self, graph: &Graph) -> bool {
        if !self.is_stale(graph) {
            return false;
        }
        self.order = execution_order(graph);
        self.seen = Some((graph.node_count(), graph.cable_count(), graph.revision()));
        self.recomputations += 1;
        tracing::debug!(
            nodes = graph.node_count(),
            cables = graph.cable_count(),
            cyclic = self.order.cyclic,
            "recomputed execution order"
        );
        true
    }

    /// The execution order for the graph as it is now
    pub fn order(&mut self, graph: &Graph) -> &[NodeId] {
        self.refresh(graph);
        &self.order.nodes
    }

    /// The cached order, possibly stale
    pub fn cached_order(&self) -> &[NodeId] {
        &self.order.nodes
    }

    /// Whether the cached order needed the cycle fallback
    pub fn is_cyclic(&self) -> bool {
        self.order.cyclic
    }

    /// How many times the order has been recomputed
    pub fn recomputations(&self) -> u64 {
        self.recomputations
    }

    /// Forget the cached order
    pub fn invalidate(&mut self) {
        self.seen = None;
    }

    /// Run one frame: refresh the order, then invoke each node's behavior in order.
    ///
    /// Under [`FaultPolicy::Halt`] the first fault stops the frame; nodes
    /// later in the order keep last frame's outputs.
    pub fn tick(
        &mut self,
        graph: &mut Graph,
        registry: &NodeRegistry,
        frame: &FrameContext,
        policy: FaultPolicy,
    ) -> Result<FrameReport, EvaluationError> {
        self.refresh(graph);
        let mut report = FrameReport::default();

        for &id in &self.order.nodes {
            let Some(node) = graph.node_mut(id) else {
                continue;
            };
            let Some(behavior) = registry.behavior(&node.node_type) else {
                report.skipped += 1;
                continue;
            };

            // Outputs and state move into the scope so the rest of the graph
            // stays readable while the node writes.
            let mut values = std::mem::take(&mut node.values);
            let mut state = std::mem::take(&mut node.state);
            let result = {
                let mut scope = NodeScope::new(graph, id, &mut values, &mut state);
                behavior.logic(&mut scope, frame)
            };
            let node_type = match graph.node_mut(id) {
                Some(node) => {
                    node.values = values;
                    node.state = state;
                    node.node_type.clone()
                }
                None => String::new(),
            };
            report.evaluated += 1;

            let Err(error) = result else {
                continue;
            };
            match policy {
                FaultPolicy::Skip => {
                    tracing::warn!(node = %id, node_type = %node_type, %error, "node behavior faulted, skipping");
                    report.faults.push(NodeFault {
                        node: id,
                        node_type,
                        error,
                    });
                }
                FaultPolicy::Halt => {
                    return Err(EvaluationError::Behavior {
                        node: id,
                        node_type,
                        source: error,
                    });
                }
            }
        }

        Ok(report)
    }
}

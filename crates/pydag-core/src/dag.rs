//! Graph Assembler and DAG Normalizer
//!
//! [`DagGraph`] materializes an accumulated node/edge sequence as a
//! `petgraph::StableGraph` keyed by node id, then breaks cycles so the
//! result can be laid out as a directed acyclic graph.
//!
//! Assembly rules:
//!
//! - nodes are added in emission order; a repeated id keeps the first node
//! - edges are added in emission order; an endpoint that was never declared
//!   becomes an implicit vertex labelled by its id
//! - a repeated `(source, target)` arc is kept once
//!
//! Cycle search is a depth-first search over vertices and out-arcs in
//! insertion order, so the cycle reported (and the edge removed) is the
//! same on every run.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use petgraph::algo::{greedy_feedback_arc_set, is_cyclic_directed};
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableGraph};
use petgraph::visit::{EdgeRef, IntoEdgeReferences, NodeIndexable};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::graph::{GraphAccumulator, GraphNode, NodeKind, Relation};

// ============================================================================
// Cycle Policy
// ============================================================================

/// How cycles are broken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CyclePolicy {
    /// Remove the first edge of the first cycle found, then stop. Other
    /// independent cycles survive.
    SingleEdge,
    /// Remove the first edge of the first cycle found until no cycle is left.
    #[default]
    Acyclic,
    /// Remove a greedy feedback arc set in one pass. Removes different edges
    /// than the other policies.
    FeedbackArcSet,
}

impl CyclePolicy {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            CyclePolicy::SingleEdge => "single-edge",
            CyclePolicy::Acyclic => "acyclic",
            CyclePolicy::FeedbackArcSet => "feedback-arc-set",
        }
    }
}

impl fmt::Display for CyclePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CyclePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "single-edge" => Ok(CyclePolicy::SingleEdge),
            "acyclic" => Ok(CyclePolicy::Acyclic),
            "feedback-arc-set" => Ok(CyclePolicy::FeedbackArcSet),
            _ => Err(format!(
                "unknown cycle policy '{}' (expected single-edge, acyclic or feedback-arc-set)",
                s
            )),
        }
    }
}

// ============================================================================
// Cycles and Reports
// ============================================================================

/// One arc of a cycle, with display labels of its endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleEdge {
    /// Arc index in the graph it was found in
    pub index: EdgeIndex,
    /// Source label
    pub source: String,
    /// Target label
    pub target: String,
    /// Relation carried by the arc
    pub relation: Relation,
}

/// A directed cycle as an ordered list of arcs.
///
/// The first arc leaves the vertex the closing back-edge points to; the last
/// arc is the back-edge itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cycle {
    pub edges: Vec<CycleEdge>,
}

impl Cycle {
    /// Number of arcs in the cycle
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// Whether the cycle has no arcs
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// The arc a single-edge removal takes out
    pub fn first_edge(&self) -> Option<&CycleEdge> {
        self.edges.first()
    }
}

impl fmt::Display for Cycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, edge) in self.edges.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "('{}', '{}')", edge.source, edge.target)?;
        }
        write!(f, "]")
    }
}

/// What normalization found and removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizationReport {
    /// Policy that was applied
    pub policy: CyclePolicy,
    /// Cycles found, in the order they were found
    pub cycles: Vec<Cycle>,
    /// Arcs removed, in removal order
    pub removed: Vec<CycleEdge>,
    /// Whether the graph has no cycle after normalization
    pub acyclic: bool,
}

impl NormalizationReport {
    /// Whether the graph had no cycle to begin with
    pub fn was_acyclic(&self) -> bool {
        self.removed.is_empty()
    }

    /// Number of arcs removed
    pub fn removed_count(&self) -> usize {
        self.removed.len()
    }
}

// ============================================================================
// DagGraph
// ============================================================================

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnPath,
    Done,
}

/// Directed graph assembled from extracted nodes and edges.
#[derive(Debug, Clone, Default)]
pub struct DagGraph {
    graph: StableGraph<GraphNode, Relation>,
    node_index_map: HashMap<String, NodeIndex>,
    implicit: HashSet<NodeIndex>,
}

impl DagGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Assemble a graph from accumulated nodes and edges.
    pub fn from_accumulator(acc: &GraphAccumulator) -> Self {
        let mut dag = Self::new();
        for node in &acc.nodes {
            dag.add_node(node.clone());
        }
        for edge in &acc.edges {
            dag.add_edge(&edge.source, &edge.target, edge.relation);
        }
        debug!(
            "Assembled {} vertices ({} implicit) and {} arcs from {} nodes and {} edges",
            dag.node_count(),
            dag.implicit.len(),
            dag.edge_count(),
            acc.node_count(),
            acc.edge_count()
        );
        dag
    }

    // ------------------------------------------------------------------------
    // Node Operations
    // ------------------------------------------------------------------------

    /// Add a node. A node whose id is already present is ignored, unless the
    /// present vertex was only created implicitly by an edge.
    pub fn add_node(&mut self, node: GraphNode) -> NodeIndex {
        if let Some(&idx) = self.node_index_map.get(&node.id) {
            if self.implicit.remove(&idx) {
                self.graph[idx] = node;
            }
            return idx;
        }
        let id = node.id.clone();
        let idx = self.graph.add_node(node);
        self.node_index_map.insert(id, idx);
        idx
    }

    /// Get the vertex for `id`, creating an implicit one if needed.
    pub fn ensure_vertex(&mut self, id: &str) -> NodeIndex {
        if let Some(&idx) = self.node_index_map.get(id) {
            return idx;
        }
        let idx = self.graph.add_node(GraphNode::implicit(id));
        self.node_index_map.insert(id.to_string(), idx);
        self.implicit.insert(idx);
        idx
    }

    /// Get a node by its id
    pub fn get_node(&self, id: &str) -> Option<&GraphNode> {
        self.node_index_map
            .get(id)
            .and_then(|&idx| self.graph.node_weight(idx))
    }

    /// Get the NodeIndex for a node id
    pub fn get_node_index(&self, id: &str) -> Option<NodeIndex> {
        self.node_index_map.get(id).copied()
    }

    /// Check if the graph contains a vertex with the given id
    pub fn contains_node(&self, id: &str) -> bool {
        self.node_index_map.contains_key(id)
    }

    /// Whether the vertex was only created as an edge endpoint
    pub fn is_implicit(&self, id: &str) -> bool {
        self.get_node_index(id)
            .map(|idx| self.implicit.contains(&idx))
            .unwrap_or(false)
    }

    /// Number of vertices, implicit ones included
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of implicit vertices
    pub fn implicit_count(&self) -> usize {
        self.implicit.len()
    }

    /// All vertices in insertion order
    pub fn vertices(&self) -> impl Iterator<Item = &GraphNode> {
        self.graph.node_weights()
    }

    /// Declared (non-implicit) nodes in insertion order
    pub fn declared_nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.graph
            .node_indices()
            .filter(|idx| !self.implicit.contains(idx))
            .map(|idx| &self.graph[idx])
    }

    // ------------------------------------------------------------------------
    // Edge Operations
    // ------------------------------------------------------------------------

    /// Add an arc between two ids, creating implicit endpoints as needed.
    ///
    /// An existing arc between the same endpoints is returned unchanged.
    pub fn add_edge(&mut self, source: &str, target: &str, relation: Relation) -> EdgeIndex {
        let from = self.ensure_vertex(source);
        let to = self.ensure_vertex(target);
        if let Some(existing) = self.graph.find_edge(from, to) {
            return existing;
        }
        self.graph.add_edge(from, to, relation)
    }

    /// Check whether an arc between two ids exists
    pub fn contains_edge(&self, source: &str, target: &str) -> bool {
        match (self.get_node_index(source), self.get_node_index(target)) {
            (Some(from), Some(to)) => self.graph.find_edge(from, to).is_some(),
            _ => false,
        }
    }

    /// Remove an arc, returning its relation
    pub fn remove_edge(&mut self, edge: EdgeIndex) -> Option<Relation> {
        self.graph.remove_edge(edge)
    }

    /// Number of arcs
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// All arcs in insertion order, as (source, target, relation)
    pub fn edges(&self) -> impl Iterator<Item = (&GraphNode, &GraphNode, Relation)> {
        self.graph
            .edge_references()
            .map(|e| (&self.graph[e.source()], &self.graph[e.target()], *e.weight()))
    }

    /// Access the underlying petgraph graph
    pub fn inner(&self) -> &StableGraph<GraphNode, Relation> {
        &self.graph
    }

    fn describe_edge(&self, edge: EdgeIndex) -> Option<CycleEdge> {
        let (from, to) = self.graph.edge_endpoints(edge)?;
        Some(CycleEdge {
            index: edge,
            source: self.graph[from].label.clone(),
            target: self.graph[to].label.clone(),
            relation: *self.graph.edge_weight(edge)?,
        })
    }

    fn sorted_out_edges(&self, node: NodeIndex) -> Vec<(EdgeIndex, NodeIndex)> {
        let mut out: Vec<_> = self
            .graph
            .edges(node)
            .map(|e| (e.id(), e.target()))
            .collect();
        out.sort_by_key(|(edge, _)| *edge);
        out
    }

    // ------------------------------------------------------------------------
    // Cycle Detection
    // ------------------------------------------------------------------------

    /// Find the first directed cycle in deterministic DFS order.
    pub fn find_cycle(&self) -> Option<Cycle> {
        let mut marks = vec![Mark::Unvisited; self.graph.node_bound()];

        for start in self.graph.node_indices() {
            if marks[start.index()] != Mark::Unvisited {
                continue;
            }

            // Frames of (vertex, out-arcs, next arc); path[i] leads from frame i to frame i+1
            let mut stack = vec![(start, self.sorted_out_edges(start), 0usize)];
            let mut path: Vec<EdgeIndex> = Vec::new();
            marks[start.index()] = Mark::OnPath;

            while let Some(frame) = stack.last_mut() {
                let next = frame.1.get(frame.2).copied();
                frame.2 += 1;

                match next {
                    Some((edge, target)) => match marks[target.index()] {
                        Mark::OnPath => {
                            let pos = stack.iter().position(|f| f.0 == target)?;
                            let mut arcs = path[pos..].to_vec();
                            arcs.push(edge);
                            let edges = arcs
                                .into_iter()
                                .filter_map(|e| self.describe_edge(e))
                                .collect();
                            return Some(Cycle { edges });
                        }
                        Mark::Unvisited => {
                            marks[target.index()] = Mark::OnPath;
                            path.push(edge);
                            stack.push((target, self.sorted_out_edges(target), 0));
                        }
                        Mark::Done => {}
                    },
                    None => {
                        marks[frame.0.index()] = Mark::Done;
                        stack.pop();
                        path.pop();
                    }
                }
            }
        }
        None
    }

    /// Whether the graph has no directed cycle
    pub fn is_acyclic(&self) -> bool {
        !is_cyclic_directed(&self.graph)
    }

    // ------------------------------------------------------------------------
    // Normalization
    // ------------------------------------------------------------------------

    /// Break cycles according to `policy`.
    pub fn normalize(&mut self, policy: CyclePolicy) -> NormalizationReport {
        let mut report = NormalizationReport {
            policy,
            cycles: Vec::new(),
            removed: Vec::new(),
            acyclic: false,
        };

        match policy {
            CyclePolicy::SingleEdge => {
                if let Some(cycle) = self.find_cycle() {
                    self.break_cycle(&cycle, &mut report);
                    report.cycles.push(cycle);
                }
            }
            CyclePolicy::Acyclic => self.break_all_cycles(&mut report),
            CyclePolicy::FeedbackArcSet => {
                if let Some(cycle) = self.find_cycle() {
                    report.cycles.push(cycle);
                    let arcs: Vec<EdgeIndex> =
                        greedy_feedback_arc_set(&self.graph).map(|e| e.id()).collect();
                    for arc in arcs {
                        if let Some(edge) = self.describe_edge(arc) {
                            self.graph.remove_edge(arc);
                            report.removed.push(edge);
                        }
                    }
                    if !self.is_acyclic() {
                        warn!("Feedback arc set left a cycle, removing the rest one by one");
                        self.break_all_cycles(&mut report);
                    }
                }
            }
        }

        report.acyclic = self.is_acyclic();
        info!(
            "Normalized with {} policy: {} cycles found, {} edges removed",
            policy,
            report.cycles.len(),
            report.removed.len()
        );
        report
    }

    fn break_all_cycles(&mut self, report: &mut NormalizationReport) {
        while let Some(cycle) = self.find_cycle() {
            self.break_cycle(&cycle, report);
            report.cycles.push(cycle);
        }
    }

    fn break_cycle(&mut self, cycle: &Cycle, report: &mut NormalizationReport) {
        if let Some(edge) = cycle.first_edge() {
            debug!("Removing {} -> {} to break {}", edge.source, edge.target, cycle);
            self.graph.remove_edge(edge.index);
            report.removed.push(edge.clone());
        }
    }

    // ------------------------------------------------------------------------
    // Statistics
    // ------------------------------------------------------------------------

    /// Vertex counts per kind, implicit vertices included
    pub fn kind_counts(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for node in self.graph.node_weights() {
            *counts.entry(node.kind.as_str()).or_insert(0) += 1;
        }
        counts
    }

    /// Arc counts per relation
    pub fn relation_counts(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for relation in self.graph.edge_weights() {
            *counts.entry(relation.as_str()).or_insert(0) += 1;
        }
        counts
    }

    /// Number of vertices of one kind
    pub fn count_kind(&self, kind: NodeKind) -> usize {
        self.graph.node_weights().filter(|n| n.kind == kind).count()
    }
}

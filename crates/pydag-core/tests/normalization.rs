//! Normalization and export tests.
//!
//! Extracted graphs are almost always acyclic (declarations and references
//! live in different id spaces), so cycle tests build accumulators by hand.

mod common;

use common::{analyze, fixture};
use petgraph::algo::kosaraju_scc;
use pretty_assertions::assert_eq;
use pydag_core::dag::{CyclePolicy, DagGraph};
use pydag_core::export::ExportedGraph;
use pydag_core::graph::{GraphAccumulator, GraphNode, Relation};
use pydag_core::render::to_dot;
use tempfile::TempDir;

// ============================================================================
// Test Helpers
// ============================================================================

fn ring(acc: &mut GraphAccumulator, prefix: &str, len: usize) {
    for i in 0..len {
        let id = format!("{}{}", prefix, i);
        acc.push_node(GraphNode::function(id.clone(), &id, "m", i + 1));
    }
    for i in 0..len {
        acc.push_edge(
            &format!("{}{}", prefix, i),
            &format!("{}{}", prefix, (i + 1) % len),
            Relation::Invokes,
        );
    }
}

/// Number of directed cycles that are independent of each other
fn independent_cycles(dag: &DagGraph) -> usize {
    let graph = dag.inner();
    kosaraju_scc(graph)
        .into_iter()
        .filter(|scc| {
            scc.len() > 1 || graph.find_edge(scc[0], scc[0]).is_some()
        })
        .count()
}

// ============================================================================
// Cycle Breaking
// ============================================================================

#[test]
fn test_single_cycle_of_any_length_is_fixed_by_one_removal() {
    for len in 1..=6 {
        let mut acc = GraphAccumulator::new();
        ring(&mut acc, "f", len);
        acc.push_edge("f0", "Call:print", Relation::Invokes);
        let mut dag = DagGraph::from_accumulator(&acc);
        let before = dag.edge_count();

        let report = dag.normalize(CyclePolicy::SingleEdge);
        assert_eq!(report.removed_count(), 1, "ring of {}", len);
        assert_eq!(report.cycles[0].len(), len);
        assert_eq!(dag.edge_count(), before - 1);
        assert!(dag.is_acyclic());
    }
}

#[test]
fn test_single_edge_policy_leaves_one_of_two_disjoint_cycles() {
    let mut acc = GraphAccumulator::new();
    ring(&mut acc, "a", 3);
    ring(&mut acc, "b", 2);
    let mut dag = DagGraph::from_accumulator(&acc);
    assert_eq!(independent_cycles(&dag), 2);

    let report = dag.normalize(CyclePolicy::SingleEdge);
    assert_eq!(report.removed_count(), 1);
    assert!(!report.acyclic);
    assert_eq!(independent_cycles(&dag), 1);
}

#[test]
fn test_acyclic_policy_leaves_no_cycle() {
    let mut acc = GraphAccumulator::new();
    ring(&mut acc, "a", 3);
    ring(&mut acc, "b", 2);
    ring(&mut acc, "c", 1);
    // a chord creating a second cycle through the first ring
    acc.push_edge("a2", "a1", Relation::Invokes);
    let mut dag = DagGraph::from_accumulator(&acc);

    let report = dag.normalize(CyclePolicy::Acyclic);
    assert!(report.acyclic);
    assert_eq!(independent_cycles(&dag), 0);
    assert_eq!(report.cycles.len(), report.removed_count());
}

#[test]
fn test_feedback_arc_set_policy_leaves_no_cycle() {
    let mut acc = GraphAccumulator::new();
    ring(&mut acc, "a", 4);
    ring(&mut acc, "b", 3);
    let mut dag = DagGraph::from_accumulator(&acc);

    let report = dag.normalize(CyclePolicy::FeedbackArcSet);
    assert!(report.acyclic);
    assert!(dag.is_acyclic());
}

#[test]
fn test_extracted_tree_is_already_a_dag() {
    let temp = fixture(&[
        ("app.py", "from lib import helper\n\nclass App(Base):\n    def run(self):\n        helper()\n"),
        ("lib.py", "def helper():\n    raise ValueError('x')\n"),
    ]);
    let outcome = analyze(temp.path());
    let mut dag = DagGraph::from_accumulator(&outcome.graph);
    let report = dag.normalize(CyclePolicy::default());
    assert!(report.was_acyclic());
    assert!(report.acyclic);
}

// ============================================================================
// Export
// ============================================================================

#[test]
fn test_export_round_trip_through_file() {
    let temp = fixture(&[(
        "svc.py",
        "import json\n# entry\nclass Service(Base):\n    def start(self):\n        try:\n            boot()\n        except OSError:\n            pass\n",
    )]);
    let outcome = analyze(temp.path());
    let mut dag = DagGraph::from_accumulator(&outcome.graph);
    dag.normalize(CyclePolicy::Acyclic);
    let export = ExportedGraph::from_dag(&dag);

    let out = TempDir::new().unwrap();
    let path = out.path().join("graph.json");
    export.write(&path).unwrap();
    let reloaded = ExportedGraph::read(&path).unwrap();

    assert_eq!(reloaded.nodes, export.nodes);
    assert_eq!(reloaded.edges, export.edges);
    assert_eq!(
        export.nodes,
        vec![
            "Module:svc",
            "Comment:# entry",
            "Import:json in svc",
            "Class:Service in svc",
            "Method:start of Class:Service in svc",
            "Try block in svc",
            "Handler for OSError in svc",
            "Class:Base",
            "Call:boot",
        ]
    );
}

#[test]
fn test_export_and_render_share_the_normalized_graph() {
    let mut acc = GraphAccumulator::new();
    ring(&mut acc, "a", 3);
    let mut dag = DagGraph::from_accumulator(&acc);
    dag.normalize(CyclePolicy::Acyclic);

    let export = ExportedGraph::from_dag(&dag);
    let dot = to_dot(&dag);
    assert_eq!(export.edges.len(), dag.edge_count());
    assert_eq!(dot.matches(" -> ").count(), dag.edge_count());
    assert!(!export
        .edges
        .contains(&("Function:a0 in m".to_string(), "Function:a1 in m".to_string())));
}

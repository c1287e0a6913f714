//! Common test utilities for integration tests.
//!
//! Fixture trees are written into a `TempDir` and analyzed with a
//! `GraphBuilder`.

#![allow(dead_code)]

use std::fs;
use std::path::Path;

use pydag_core::builder::{AnalysisOutcome, BuilderConfig, GraphBuilder};
use pydag_core::graph::{GraphAccumulator, GraphNode, NodeKind};
use tempfile::TempDir;

/// Write `(relative path, contents)` pairs beneath `root`.
pub fn write_files(root: &Path, files: &[(&str, &str)]) {
    for (rel, contents) in files {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create fixture directory");
        }
        fs::write(&path, contents).expect("Failed to write fixture file");
    }
}

/// Create a temporary source tree.
pub fn fixture(files: &[(&str, &str)]) -> TempDir {
    let temp = TempDir::new().expect("Failed to create temp dir");
    write_files(temp.path(), files);
    temp
}

/// Analyze a directory with the given configuration.
pub fn analyze_with(dir: &Path, config: BuilderConfig) -> AnalysisOutcome {
    GraphBuilder::with_config(config)
        .build_from_directory(dir)
        .expect("Failed to build graph")
}

/// Analyze a directory with default configuration.
pub fn analyze(dir: &Path) -> AnalysisOutcome {
    analyze_with(dir, BuilderConfig::default())
}

/// Analyze a single file named `x.py` holding `source`.
pub fn analyze_module_x(source: &str) -> GraphAccumulator {
    let temp = fixture(&[("x.py", source)]);
    analyze(temp.path()).graph
}

/// Node labels in emission order
pub fn labels(graph: &GraphAccumulator) -> Vec<&str> {
    graph.labels().collect()
}

/// Labels of nodes of one kind
pub fn labels_of_kind(graph: &GraphAccumulator, kind: NodeKind) -> Vec<&str> {
    graph
        .nodes_of_kind(kind)
        .map(|n: &GraphNode| n.label.as_str())
        .collect()
}

/// Edges as `(source, target)` pairs
pub fn edge_pairs(graph: &GraphAccumulator) -> Vec<(&str, &str)> {
    graph
        .edges
        .iter()
        .map(|e| (e.source.as_str(), e.target.as_str()))
        .collect()
}

//! JSON export of a normalized graph.
//!
//! The export holds two ordered lists: `nodes` (every vertex label, first
//! occurrence only) and `edges` (`[source, target]` label pairs). It is
//! written with a four-space indent.

use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;
use thiserror::Error;
use tracing::info;

use crate::dag::DagGraph;
use crate::graph::{GraphNode, NodeKind, Relation};

/// Errors reading or writing graph exports.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid graph JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Serialized form of a graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedGraph {
    /// Distinct vertex labels in vertex order
    pub nodes: Vec<String>,
    /// Edge label pairs in arc order
    pub edges: Vec<(String, String)>,
}

impl ExportedGraph {
    /// Capture the vertex labels and all arcs of `dag`.
    ///
    /// Referenced vertices (base classes, callees) are listed too. Distinct
    /// nodes that share a label, such as two try blocks in one module,
    /// appear once.
    pub fn from_dag(dag: &DagGraph) -> Self {
        let mut seen = HashSet::new();
        Self {
            nodes: dag
                .vertices()
                .filter(|n| seen.insert(n.label.as_str()))
                .map(|n| n.label.clone())
                .collect(),
            edges: dag
                .edges()
                .map(|(source, target, _)| (source.label.clone(), target.label.clone()))
                .collect(),
        }
    }

    /// Rebuild a graph from labels alone.
    ///
    /// Labels become ids, node kinds are recovered from label prefixes and
    /// relations are inferred from the endpoint kinds. Class and call
    /// references come back as implicit vertices.
    pub fn to_dag(&self) -> DagGraph {
        let mut dag = DagGraph::new();
        for label in &self.nodes {
            match NodeKind::from_label(label) {
                Some(kind) if kind.is_reference() => {
                    dag.ensure_vertex(label);
                }
                _ => {
                    dag.add_node(GraphNode::implicit(label));
                }
            }
        }
        for (source, target) in &self.edges {
            let relation = infer_relation(
                NodeKind::from_label(source),
                NodeKind::from_label(target),
            );
            dag.add_edge(source, target, relation);
        }
        dag
    }

    /// Serialize to four-space indented JSON.
    pub fn to_json(&self) -> Result<String, ExportError> {
        let mut buf = Vec::new();
        let formatter = PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut ser)?;
        // serde_json only emits valid UTF-8
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Parse from JSON text.
    pub fn from_json(json: &str) -> Result<Self, ExportError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Write to a file, creating missing parent directories.
    pub fn write(&self, path: &Path) -> Result<(), ExportError> {
        let json = self.to_json()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| ExportError::Write {
                path: path.to_path_buf(),
                source,
            })?;
        }
        let mut file = fs::File::create(path).map_err(|source| ExportError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        file.write_all(json.as_bytes())
            .map_err(|source| ExportError::Write {
                path: path.to_path_buf(),
                source,
            })?;
        info!(
            "Graph exported to {} ({} nodes, {} edges)",
            path.display(),
            self.nodes.len(),
            self.edges.len()
        );
        Ok(())
    }

    /// Read from a file.
    pub fn read(path: &Path) -> Result<Self, ExportError> {
        let json = fs::read_to_string(path).map_err(|source| ExportError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }
}

/// Relation implied by the kinds of an edge's endpoints.
pub fn infer_relation(source: Option<NodeKind>, target: Option<NodeKind>) -> Relation {
    match (source, target) {
        (_, Some(NodeKind::ClassRef)) => Relation::Inherits,
        (_, Some(NodeKind::Method)) => Relation::Contains,
        (_, Some(NodeKind::Variable)) => Relation::Assigns,
        (_, Some(NodeKind::Import)) => Relation::Imports,
        (_, Some(NodeKind::TryBlock)) | (Some(NodeKind::TryBlock), _) => Relation::Handles,
        _ => Relation::Invokes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphAccumulator;
    use pretty_assertions::assert_eq;

    fn sample_dag() -> DagGraph {
        let mut acc = GraphAccumulator::new();
        acc.push_node(GraphNode::module("x"));
        acc.push_node(GraphNode::class("x::A".into(), "A", "x", 1));
        acc.push_edge("x::A", "Class:B", Relation::Inherits);
        acc.push_edge("x", "Call:f", Relation::Invokes);
        DagGraph::from_accumulator(&acc)
    }

    #[test]
    fn test_from_dag_uses_labels() {
        let export = ExportedGraph::from_dag(&sample_dag());
        assert_eq!(
            export.nodes,
            vec!["Module:x", "Class:A in x", "Class:B", "Call:f"]
        );
        assert_eq!(
            export.edges,
            vec![
                ("Class:A in x".to_string(), "Class:B".to_string()),
                ("Module:x".to_string(), "Call:f".to_string()),
            ]
        );
    }

    #[test]
    fn test_from_dag_lists_shared_labels_once() {
        let mut acc = GraphAccumulator::new();
        acc.push_node(GraphNode::module("x"));
        for line in [1, 5] {
            let try_id = format!("x::try@{}:0", line);
            let handler_id = format!("x::except@{}:0", line + 2);
            acc.push_node(GraphNode::try_block(try_id.clone(), "x", line));
            acc.push_node(GraphNode::handler(handler_id.clone(), "E", "x", line + 2));
            acc.push_edge("x", &try_id, Relation::Handles);
            acc.push_edge(&try_id, &handler_id, Relation::Handles);
        }
        let dag = DagGraph::from_accumulator(&acc);
        assert_eq!(dag.node_count(), 5);

        let export = ExportedGraph::from_dag(&dag);
        assert_eq!(
            export.nodes,
            vec!["Module:x", "Try block in x", "Handler for E in x"]
        );
        assert_eq!(export.edges.len(), 4);
    }

    #[test]
    fn test_write_creates_parent_directories() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("out").join("nested").join("graph.json");
        let export = ExportedGraph::from_dag(&sample_dag());

        export.write(&path).unwrap();

        assert_eq!(ExportedGraph::read(&path).unwrap(), export);
    }

    #[test]
    fn test_json_layout() {
        let export = ExportedGraph {
            nodes: vec!["Module:x".to_string()],
            edges: vec![("Module:x".to_string(), "Call:f".to_string())],
        };
        let json = export.to_json().unwrap();
        let expected = "{\n    \"nodes\": [\n        \"Module:x\"\n    ],\n    \"edges\": [\n        [\n            \"Module:x\",\n            \"Call:f\"\n        ]\n    ]\n}";
        assert_eq!(json, expected);
    }

    #[test]
    fn test_to_dag_recovers_kinds_and_relations() {
        let export = ExportedGraph::from_dag(&sample_dag());
        let dag = export.to_dag();
        assert_eq!(dag.node_count(), 4);
        assert_eq!(dag.get_node("Class:A in x").unwrap().kind, NodeKind::Class);
        assert!(dag.is_implicit("Call:f"));
        let relations: Vec<_> = dag.edges().map(|(_, _, r)| r).collect();
        assert_eq!(relations, vec![Relation::Inherits, Relation::Invokes]);
        assert_eq!(ExportedGraph::from_dag(&dag), export);
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            ExportedGraph::from_json("{\"nodes\": 3}"),
            Err(ExportError::Json(_))
        ));
    }
}

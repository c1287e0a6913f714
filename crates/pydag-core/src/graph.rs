//! Graph Schema Definitions for Python Structure Graphs
//!
//! This module defines the node and edge model emitted by the extractor:
//! typed nodes with a stable identity and a display label, directed edges
//! between node ids, and the append-only accumulator that collects both
//! during a directory analysis.
//!
//! ## Identity vs. label
//!
//! Every node carries an `id` and a `label`. The label is the human-readable
//! text (`Class:A in pkg.mod`) used for display and export. The id is what
//! edges reference and what the assembler coalesces on:
//!
//! - declarations: `<module>::<Outer>.<Inner>` (lexical path)
//! - variables / imports: `<module>::var:<text>` / `<module>::import:<name>`
//! - positional entities: `<module>::try@<line>:<col>`
//! - reference endpoints (`Class:B`, `Call:f`): the label itself
//!
//! Module names never contain `:`, so declaration ids cannot collide with
//! reference labels.

use serde::{Deserialize, Serialize};
use tree_sitter::Node as SyntaxNode;

// ============================================================================
// Node Kinds
// ============================================================================

/// Kinds of graph nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// One per analyzed source file
    Module,
    /// Class definition
    Class,
    /// Function defined outside a class body
    Function,
    /// Function defined directly in a class body
    Method,
    /// Assignment target
    Variable,
    /// Imported name
    Import,
    /// Source comment
    Comment,
    /// `raise` statement
    RaiseSite,
    /// `try` statement
    TryBlock,
    /// `except` clause of a try statement
    Handler,
    /// Base class referenced by name (edge target only)
    ClassRef,
    /// Callee referenced by a call expression (edge target only)
    CallSite,
}

impl NodeKind {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Module => "module",
            NodeKind::Class => "class",
            NodeKind::Function => "function",
            NodeKind::Method => "method",
            NodeKind::Variable => "variable",
            NodeKind::Import => "import",
            NodeKind::Comment => "comment",
            NodeKind::RaiseSite => "raise_site",
            NodeKind::TryBlock => "try_block",
            NodeKind::Handler => "handler",
            NodeKind::ClassRef => "class_ref",
            NodeKind::CallSite => "call_site",
        }
    }

    /// Recover the kind from a rendered label.
    ///
    /// Used when a graph is reloaded from its JSON export, where only labels
    /// survive. `Class:B` without a qualifier is a reference, `Class:A in m`
    /// a declaration.
    pub fn from_label(label: &str) -> Option<Self> {
        if label.starts_with("Try block in ") {
            return Some(NodeKind::TryBlock);
        }
        if label.starts_with("Handler for ") {
            return Some(NodeKind::Handler);
        }
        let (prefix, rest) = label.split_once(':')?;
        let kind = match prefix {
            "Module" => NodeKind::Module,
            "Class" if rest.contains(" in ") => NodeKind::Class,
            "Class" => NodeKind::ClassRef,
            "Function" => NodeKind::Function,
            "Method" => NodeKind::Method,
            "Variable" => NodeKind::Variable,
            "Import" => NodeKind::Import,
            "Comment" => NodeKind::Comment,
            "Raises" => NodeKind::RaiseSite,
            "Call" => NodeKind::CallSite,
            _ => return None,
        };
        Some(kind)
    }

    /// Whether nodes of this kind are only ever created implicitly as edge targets
    pub fn is_reference(&self) -> bool {
        matches!(self, NodeKind::ClassRef | NodeKind::CallSite)
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Relations
// ============================================================================

/// Types of relationships between graph nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Relation {
    /// Class → method
    Contains,
    /// Subclass → base class reference
    Inherits,
    /// Caller (class or module) → call site
    Invokes,
    /// Module → variable
    Assigns,
    /// Module → import
    Imports,
    /// Module → try block, try block → handler
    Handles,
}

impl Relation {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Relation::Contains => "CONTAINS",
            Relation::Inherits => "INHERITS",
            Relation::Invokes => "INVOKES",
            Relation::Assigns => "ASSIGNS",
            Relation::Imports => "IMPORTS",
            Relation::Handles => "HANDLES",
        }
    }
}

// ============================================================================
// Node
// ============================================================================

/// A node in the structure graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    /// Stable identity (see module docs)
    pub id: String,

    /// Node kind
    pub kind: NodeKind,

    /// Entity name (class name, callee, comment text, ...)
    pub name: String,

    /// Display label
    pub label: String,

    /// Starting line number (1-indexed), 0 when the node has no source position
    pub line: usize,
}

impl GraphNode {
    /// Create a module node
    pub fn module(module: &str) -> Self {
        Self {
            id: module.to_string(),
            kind: NodeKind::Module,
            name: module.to_string(),
            label: module_label(module),
            line: 0,
        }
    }

    /// Create a class declaration node
    pub fn class(id: String, name: &str, module: &str, line: usize) -> Self {
        Self {
            id,
            kind: NodeKind::Class,
            name: name.to_string(),
            label: format!("Class:{} in {}", name, module),
            line,
        }
    }

    /// Create a module-level (or nested) function node
    pub fn function(id: String, name: &str, module: &str, line: usize) -> Self {
        Self {
            id,
            kind: NodeKind::Function,
            name: name.to_string(),
            label: format!("Function:{} in {}", name, module),
            line,
        }
    }

    /// Create a method node, labelled by its owning class label
    pub fn method(id: String, name: &str, class_label: &str, line: usize) -> Self {
        Self {
            id,
            kind: NodeKind::Method,
            name: name.to_string(),
            label: format!("Method:{} of {}", name, class_label),
            line,
        }
    }

    /// Create a variable node for an assignment target
    pub fn variable(module: &str, text: &str, line: usize) -> Self {
        Self {
            id: format!("{}::var:{}", module, text),
            kind: NodeKind::Variable,
            name: text.to_string(),
            label: format!("Variable:{} in {}", text, module),
            line,
        }
    }

    /// Create an import node
    pub fn import(module: &str, name: &str, line: usize) -> Self {
        Self {
            id: format!("{}::import:{}", module, name),
            kind: NodeKind::Import,
            name: name.to_string(),
            label: format!("Import:{} in {}", name, module),
            line,
        }
    }

    /// Create a comment node
    pub fn comment(id: String, text: &str, line: usize) -> Self {
        Self {
            id,
            kind: NodeKind::Comment,
            name: text.to_string(),
            label: format!("Comment:{}", text),
            line,
        }
    }

    /// Create a raise-site node
    pub fn raise_site(id: String, exception: &str, line: usize) -> Self {
        Self {
            id,
            kind: NodeKind::RaiseSite,
            name: exception.to_string(),
            label: format!("Raises:{}", exception),
            line,
        }
    }

    /// Create a try-block node
    pub fn try_block(id: String, module: &str, line: usize) -> Self {
        Self {
            id,
            kind: NodeKind::TryBlock,
            name: "try".to_string(),
            label: format!("Try block in {}", module),
            line,
        }
    }

    /// Create an exception handler node
    pub fn handler(id: String, exception: &str, module: &str, line: usize) -> Self {
        Self {
            id,
            kind: NodeKind::Handler,
            name: exception.to_string(),
            label: format!("Handler for {} in {}", exception, module),
            line,
        }
    }

    /// Create an implicit vertex for an edge endpoint that was never declared.
    ///
    /// The id doubles as the label.
    pub fn implicit(id: &str) -> Self {
        let kind = NodeKind::from_label(id).unwrap_or(NodeKind::CallSite);
        let name = id.split_once(':').map(|(_, n)| n).unwrap_or(id);
        Self {
            id: id.to_string(),
            kind,
            name: name.to_string(),
            label: id.to_string(),
            line: 0,
        }
    }
}

/// Label of the module node for `module`.
pub fn module_label(module: &str) -> String {
    format!("Module:{}", module)
}

/// Label (and id) of a base-class reference.
pub fn class_ref_label(base: &str) -> String {
    format!("Class:{}", base)
}

/// Label (and id) of a call-site reference.
pub fn call_site_label(callee: &str) -> String {
    format!("Call:{}", callee)
}

/// Build a position-keyed node id, e.g. `pkg.mod::try@12:4`.
///
/// Line is 1-indexed, column 0-indexed.
pub fn positional_id(module: &str, tag: &str, node: &SyntaxNode) -> String {
    let pos = node.start_position();
    format!("{}::{}@{}:{}", module, tag, pos.row + 1, pos.column)
}

// ============================================================================
// Edge
// ============================================================================

/// A directed edge between two node ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GraphEdge {
    /// Source node id
    pub source: String,

    /// Target node id (may have no declared node)
    pub target: String,

    /// Relationship type
    pub relation: Relation,
}

impl GraphEdge {
    /// Create an edge
    pub fn new(source: impl Into<String>, target: impl Into<String>, relation: Relation) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            relation,
        }
    }
}

// ============================================================================
// Accumulator
// ============================================================================

/// Ordered, append-only collection of extracted nodes and edges.
///
/// Node order is significant (display and export order); edge order is kept
/// for determinism. Duplicates are kept here and coalesced by the assembler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphAccumulator {
    /// All emitted nodes, in emission order
    pub nodes: Vec<GraphNode>,

    /// All emitted edges, in emission order
    pub edges: Vec<GraphEdge>,
}

impl GraphAccumulator {
    /// Create an empty accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node
    pub fn push_node(&mut self, node: GraphNode) {
        self.nodes.push(node);
    }

    /// Append an edge
    pub fn push_edge(&mut self, source: &str, target: &str, relation: Relation) {
        self.edges.push(GraphEdge::new(source, target, relation));
    }

    /// Append every node and edge of `other`, preserving its order
    pub fn extend(&mut self, other: GraphAccumulator) {
        self.nodes.extend(other.nodes);
        self.edges.extend(other.edges);
    }

    /// Find the first node with the given label
    pub fn node_by_label(&self, label: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.label == label)
    }

    /// Labels of all nodes, in emission order
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|n| n.label.as_str())
    }

    /// Nodes of a given kind
    pub fn nodes_of_kind(&self, kind: NodeKind) -> impl Iterator<Item = &GraphNode> {
        self.nodes.iter().filter(move |n| n.kind == kind)
    }

    /// Edges of a given relation
    pub fn edges_of(&self, relation: Relation) -> impl Iterator<Item = &GraphEdge> {
        self.edges.iter().filter(move |e| e.relation == relation)
    }

    /// Whether an edge between the two ids exists
    pub fn has_edge(&self, source: &str, target: &str) -> bool {
        self.edges
            .iter()
            .any(|e| e.source == source && e.target == target)
    }

    /// Number of nodes emitted (duplicates included)
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges emitted (duplicates included)
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Whether nothing has been emitted
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_labels() {
        assert_eq!(GraphNode::module("pkg.mod").label, "Module:pkg.mod");
        assert_eq!(
            GraphNode::class("x::A".into(), "A", "x", 1).label,
            "Class:A in x"
        );
        assert_eq!(
            GraphNode::method("x::C.m".into(), "m", "Class:C in x", 2).label,
            "Method:m of Class:C in x"
        );
        assert_eq!(
            GraphNode::function("x::f".into(), "f", "x", 1).label,
            "Function:f in x"
        );
        assert_eq!(GraphNode::variable("x", "a", 1).label, "Variable:a in x");
        assert_eq!(GraphNode::import("x", "os", 1).label, "Import:os in x");
        assert_eq!(
            GraphNode::try_block("x::try@1:0".into(), "x", 1).label,
            "Try block in x"
        );
        assert_eq!(
            GraphNode::handler("x::handler@2:0".into(), "ValueError", "x", 2).label,
            "Handler for ValueError in x"
        );
        assert_eq!(
            GraphNode::raise_site("x::raise@3:4".into(), "KeyError", 3).label,
            "Raises:KeyError"
        );
        assert_eq!(
            GraphNode::comment("x::comment@1:0".into(), "# hi", 1).label,
            "Comment:# hi"
        );
    }

    #[test]
    fn test_variable_and_import_ids_coalesce_per_module() {
        assert_eq!(
            GraphNode::variable("x", "a", 1).id,
            GraphNode::variable("x", "a", 7).id
        );
        assert_ne!(
            GraphNode::variable("x", "a", 1).id,
            GraphNode::variable("y", "a", 1).id
        );
        assert_eq!(
            GraphNode::import("x", "os", 1).id,
            GraphNode::import("x", "os", 2).id
        );
    }

    #[test]
    fn test_kind_from_label() {
        assert_eq!(NodeKind::from_label("Module:x"), Some(NodeKind::Module));
        assert_eq!(NodeKind::from_label("Class:A in x"), Some(NodeKind::Class));
        assert_eq!(NodeKind::from_label("Class:B"), Some(NodeKind::ClassRef));
        assert_eq!(NodeKind::from_label("Call:print"), Some(NodeKind::CallSite));
        assert_eq!(
            NodeKind::from_label("Try block in x"),
            Some(NodeKind::TryBlock)
        );
        assert_eq!(
            NodeKind::from_label("Handler for E in x"),
            Some(NodeKind::Handler)
        );
        assert_eq!(
            NodeKind::from_label("Comment:# a: b"),
            Some(NodeKind::Comment)
        );
        assert_eq!(NodeKind::from_label("whatever"), None);
    }

    #[test]
    fn test_implicit_node() {
        let node = GraphNode::implicit("Class:Base");
        assert_eq!(node.kind, NodeKind::ClassRef);
        assert_eq!(node.name, "Base");
        assert_eq!(node.label, "Class:Base");
        assert!(node.kind.is_reference());
    }

    #[test]
    fn test_relation_serialization() {
        let json = serde_json::to_string(&Relation::Inherits).unwrap();
        assert_eq!(json, "\"INHERITS\"");
        let kind = serde_json::to_string(&NodeKind::RaiseSite).unwrap();
        assert_eq!(kind, "\"raise_site\"");
    }

    #[test]
    fn test_accumulator_extend_preserves_order() {
        let mut first = GraphAccumulator::new();
        first.push_node(GraphNode::module("a"));
        first.push_edge("a", "Call:f", Relation::Invokes);

        let mut second = GraphAccumulator::new();
        second.push_node(GraphNode::module("b"));
        second.push_edge("b", "Call:g", Relation::Invokes);

        first.extend(second);
        let labels: Vec<_> = first.labels().collect();
        assert_eq!(labels, vec!["Module:a", "Module:b"]);
        assert_eq!(first.edge_count(), 2);
        assert!(first.has_edge("b", "Call:g"));
    }
}

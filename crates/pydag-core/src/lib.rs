//! pydag Core - Python structure graphs using tree-sitter parsing
//!
//! This crate provides the core functionality for graph generation:
//! - Source discovery and dotted module naming
//! - Tree-sitter parsing and syntax tree extraction
//! - Graph assembly and DAG normalization (cycle breaking)
//! - JSON export and DOT/SVG rendering

pub mod builder;
pub mod comments;
pub mod dag;
pub mod discovery;
pub mod export;
pub mod extractor;
pub mod graph;
pub mod parser;
pub mod render;

// Re-exports for convenience
pub use graph::{GraphAccumulator, GraphEdge, GraphNode, NodeKind, Relation};
pub use parser::{ParserError, PythonParser};

// Builder re-exports
pub use builder::{AnalysisOutcome, BuilderConfig, BuilderError, FailurePolicy, GraphBuilder};

// Extraction re-exports
pub use comments::collect_comments;
pub use extractor::{Extractor, ScopeMode, TraversalContext};

// Discovery re-exports
pub use discovery::{DiscoveryConfig, DiscoveryError, SourceDiscovery, SourceFile};

// DAG re-exports
pub use dag::{Cycle, CyclePolicy, DagGraph, NormalizationReport};

// Output re-exports
pub use export::{ExportError, ExportedGraph};
pub use render::{to_dot, to_svg, ForceLayout, Layout, LayoutConfig};

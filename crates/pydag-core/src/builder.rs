//! Graph Builder for Python Structure Graphs
//!
//! This module provides the `GraphBuilder` struct, which runs one analysis
//! session over a source directory: enumerate files, then for each file
//! read, decode, parse, emit the module node, collect comments and extract
//! declarations into a shared accumulator.
//!
//! ## Usage
//!
//! ```ignore
//! use pydag_core::builder::{BuilderConfig, GraphBuilder};
//! use std::path::Path;
//!
//! let builder = GraphBuilder::with_config(BuilderConfig::default());
//! let outcome = builder.build_from_directory(Path::new("src"))?;
//! println!("{} nodes", outcome.graph.node_count());
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::comments::collect_comments;
use crate::discovery::{
    default_exclude_patterns, DiscoveryConfig, DiscoveryError, SourceDiscovery, SourceFile,
};
use crate::extractor::{Extractor, ScopeMode, TraversalContext};
use crate::graph::{GraphAccumulator, GraphNode, NodeKind};
use crate::parser::{ParserError, PythonParser};

// ============================================================================
// Errors
// ============================================================================

/// Errors that can occur during graph building.
#[derive(Debug, Error)]
pub enum BuilderError {
    /// Source file could not be read
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Source file is not valid UTF-8 text
    #[error("Failed to decode {path} as UTF-8: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: std::str::Utf8Error,
    },

    /// Source file could not be parsed
    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ParserError,
    },

    /// Directory enumeration failed
    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    /// Parser could not be created
    #[error("Parser error: {0}")]
    Parser(#[from] ParserError),

    /// Worker pool could not be created
    #[error("Failed to start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl BuilderError {
    /// Path of the file the error belongs to, if any
    pub fn path(&self) -> Option<&Path> {
        match self {
            BuilderError::Io { path, .. }
            | BuilderError::Decode { path, .. }
            | BuilderError::Parse { path, .. } => Some(path),
            _ => None,
        }
    }
}

// ============================================================================
// Builder Configuration
// ============================================================================

/// What to do when a single file fails to read, decode or parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// The first failing file aborts the whole run
    #[default]
    Abort,
    /// Failing files are skipped and reported in the outcome
    Isolate,
}

impl FailurePolicy {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            FailurePolicy::Abort => "abort",
            FailurePolicy::Isolate => "isolate",
        }
    }
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "abort" => Ok(FailurePolicy::Abort),
            "isolate" => Ok(FailurePolicy::Isolate),
            _ => Err(format!(
                "unknown failure policy '{}' (expected abort or isolate)",
                s
            )),
        }
    }
}

/// Configuration for the graph builder.
#[derive(Debug, Clone)]
pub struct BuilderConfig {
    /// Source file extension, without the dot
    pub extension: String,
    /// File patterns to exclude (glob patterns)
    pub exclude_patterns: Vec<String>,
    /// Honor `.gitignore` and hidden-file rules while walking
    pub respect_gitignore: bool,
    /// How enclosing classes are tracked
    pub scope_mode: ScopeMode,
    /// Per-file failure handling
    pub failure_policy: FailurePolicy,
    /// Worker threads for extraction (1 = sequential, 0 = one per core)
    pub parallelism: usize,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            extension: "py".to_string(),
            exclude_patterns: default_exclude_patterns(),
            respect_gitignore: false,
            scope_mode: ScopeMode::default(),
            failure_policy: FailurePolicy::default(),
            parallelism: 1,
        }
    }
}

impl BuilderConfig {
    fn discovery_config(&self) -> DiscoveryConfig {
        DiscoveryConfig {
            extension: self.extension.clone(),
            exclude_patterns: self.exclude_patterns.clone(),
            respect_gitignore: self.respect_gitignore,
        }
    }
}

// ============================================================================
// Outcome
// ============================================================================

/// A file that was skipped under [`FailurePolicy::Isolate`].
#[derive(Debug)]
pub struct FileFailure {
    /// The file that failed
    pub file: SourceFile,
    /// Why it failed
    pub error: BuilderError,
}

/// Result of one analysis session.
#[derive(Debug, Default)]
pub struct AnalysisOutcome {
    /// Accumulated nodes and edges, in directory order
    pub graph: GraphAccumulator,
    /// Module names of the files that were analyzed
    pub modules: Vec<String>,
    /// Files skipped because they failed
    pub failures: Vec<FileFailure>,
}

impl AnalysisOutcome {
    /// Number of files analyzed successfully
    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    /// Whether every discovered file was analyzed
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

// ============================================================================
// Graph Builder
// ============================================================================

/// Builds structure graphs from Python source directories.
pub struct GraphBuilder {
    config: BuilderConfig,
    discovery: SourceDiscovery,
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphBuilder {
    /// Create a builder with default configuration.
    pub fn new() -> Self {
        Self::with_config(BuilderConfig::default())
    }

    /// Create a builder with custom configuration.
    pub fn with_config(config: BuilderConfig) -> Self {
        let discovery = SourceDiscovery::new(config.discovery_config());
        Self { config, discovery }
    }

    /// Get the configuration
    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    /// Analyze every source file beneath `root`.
    pub fn build_from_directory(&self, root: &Path) -> Result<AnalysisOutcome, BuilderError> {
        self.build_from_directory_with(root, |_| {})
    }

    /// Analyze every source file beneath `root`, calling `on_file` before
    /// each file is processed.
    pub fn build_from_directory_with<F>(
        &self,
        root: &Path,
        on_file: F,
    ) -> Result<AnalysisOutcome, BuilderError>
    where
        F: Fn(&SourceFile) + Sync,
    {
        info!("Processing files in {}", root.display());
        let files = self.discovery.discover(root)?;
        info!("Found {} files to process", files.len());

        let outcome = if self.config.parallelism == 1 {
            self.analyze_sequential(files, &on_file)?
        } else {
            self.analyze_parallel(files, &on_file)?
        };

        let graph = &outcome.graph;
        info!("Analysis summary:");
        info!("  - Modules: {}", outcome.module_count());
        info!("  - Nodes: {}", graph.node_count());
        info!("  - Edges: {}", graph.edge_count());
        for kind in [NodeKind::Class, NodeKind::Function, NodeKind::Method] {
            debug!("  - {} nodes: {}", kind, graph.nodes_of_kind(kind).count());
        }
        if !outcome.failures.is_empty() {
            warn!("Skipped {} files that failed", outcome.failures.len());
        }

        Ok(outcome)
    }

    fn analyze_sequential<F>(
        &self,
        files: Vec<SourceFile>,
        on_file: &F,
    ) -> Result<AnalysisOutcome, BuilderError>
    where
        F: Fn(&SourceFile) + Sync,
    {
        let mut parser = PythonParser::new()?;
        let mut outcome = AnalysisOutcome::default();
        for file in files {
            on_file(&file);
            let result = self.analyze_file(&mut parser, &file);
            self.record(&mut outcome, file, result)?;
        }
        Ok(outcome)
    }

    fn analyze_parallel<F>(
        &self,
        files: Vec<SourceFile>,
        on_file: &F,
    ) -> Result<AnalysisOutcome, BuilderError>
    where
        F: Fn(&SourceFile) + Sync,
    {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.parallelism)
            .build()?;
        debug!("Extracting with {} worker threads", pool.current_num_threads());

        // Per-file accumulators, merged below in directory order
        let results: Vec<Result<GraphAccumulator, BuilderError>> = pool.install(|| {
            files
                .par_iter()
                .map(|file| {
                    on_file(file);
                    let mut parser = PythonParser::new()?;
                    self.analyze_file(&mut parser, file)
                })
                .collect()
        });

        let mut outcome = AnalysisOutcome::default();
        for (file, result) in files.into_iter().zip(results) {
            self.record(&mut outcome, file, result)?;
        }
        Ok(outcome)
    }

    fn record(
        &self,
        outcome: &mut AnalysisOutcome,
        file: SourceFile,
        result: Result<GraphAccumulator, BuilderError>,
    ) -> Result<(), BuilderError> {
        match result {
            Ok(graph) => {
                outcome.graph.extend(graph);
                outcome.modules.push(file.module_name);
                Ok(())
            }
            Err(error) => match self.config.failure_policy {
                FailurePolicy::Abort => Err(error),
                FailurePolicy::Isolate => {
                    warn!("Skipping {}: {}", file.relative_path, error);
                    outcome.failures.push(FileFailure { file, error });
                    Ok(())
                }
            },
        }
    }

    /// Read, decode and analyze one file.
    pub fn analyze_file(
        &self,
        parser: &mut PythonParser,
        file: &SourceFile,
    ) -> Result<GraphAccumulator, BuilderError> {
        info!("Analyzing {}", file.path.display());

        let bytes = fs::read(&file.path).map_err(|source| BuilderError::Io {
            path: file.path.clone(),
            source,
        })?;
        let text = std::str::from_utf8(&bytes).map_err(|source| BuilderError::Decode {
            path: file.path.clone(),
            source,
        })?;

        self.analyze_source(parser, &file.module_name, text)
            .map_err(|source| BuilderError::Parse {
                path: file.path.clone(),
                source,
            })
    }

    /// Analyze in-memory source text as module `module`.
    ///
    /// Emits the module node, then the module's comments, then everything
    /// the extractor finds.
    pub fn analyze_source(
        &self,
        parser: &mut PythonParser,
        module: &str,
        source: &str,
    ) -> Result<GraphAccumulator, ParserError> {
        let source = source.strip_prefix('\u{feff}').unwrap_or(source);
        let tree = parser.parse(source)?;
        let root = tree.root_node();

        let mut graph = GraphAccumulator::new();
        graph.push_node(GraphNode::module(module));

        let comments = collect_comments(&root, source.as_bytes(), module, &mut graph);

        let mut ctx = TraversalContext::new(module, self.config.scope_mode);
        Extractor::new(source, &mut graph).extract(&root, &mut ctx);

        debug!(
            "{}: {} nodes ({} comments), {} edges",
            module,
            graph.node_count(),
            comments,
            graph.edge_count()
        );
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Relation;

    #[test]
    fn test_builder_config_default() {
        let config = BuilderConfig::default();
        assert_eq!(config.extension, "py");
        assert_eq!(config.scope_mode, ScopeMode::Nested);
        assert_eq!(config.failure_policy, FailurePolicy::Abort);
        assert_eq!(config.parallelism, 1);
        assert!(config
            .exclude_patterns
            .contains(&"**/__pycache__/**".to_string()));
    }

    #[test]
    fn test_analyze_source_order() {
        let builder = GraphBuilder::new();
        let mut parser = PythonParser::new().unwrap();
        let graph = builder
            .analyze_source(&mut parser, "x", "import os\n# note\n")
            .unwrap();
        let labels: Vec<_> = graph.labels().collect();
        assert_eq!(labels, vec!["Module:x", "Comment:# note", "Import:os in x"]);
        assert!(graph.has_edge("x", "x::import:os"));
        assert_eq!(graph.edges_of(Relation::Imports).count(), 1);
    }

    #[test]
    fn test_analyze_source_strips_bom() {
        let builder = GraphBuilder::new();
        let mut parser = PythonParser::new().unwrap();
        let graph = builder
            .analyze_source(&mut parser, "x", "\u{feff}a = 1\n")
            .unwrap();
        assert!(graph.node_by_label("Variable:a in x").is_some());
    }

    #[test]
    fn test_analyze_source_rejects_syntax_error() {
        let builder = GraphBuilder::new();
        let mut parser = PythonParser::new().unwrap();
        let result = builder.analyze_source(&mut parser, "x", "class :\n");
        assert!(matches!(result, Err(ParserError::Syntax { .. })));
    }

    #[test]
    fn test_failure_policy_from_str() {
        assert_eq!("abort".parse::<FailurePolicy>(), Ok(FailurePolicy::Abort));
        assert_eq!("Isolate".parse::<FailurePolicy>(), Ok(FailurePolicy::Isolate));
        assert!("retry".parse::<FailurePolicy>().is_err());
    }
}

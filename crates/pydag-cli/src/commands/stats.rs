//! Stats command - Summarize an exported graph

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use pydag_core::export::ExportedGraph;
use serde::Serialize;

use crate::GlobalOptions;

/// Arguments for the stats command
#[derive(Args, Debug)]
pub struct StatsArgs {
    /// JSON file written by `pydag analyze --json`
    graph: PathBuf,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

/// Counts recovered from an export
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GraphStats {
    pub nodes: usize,
    pub edges: usize,
    /// Base class and callee reference vertices
    pub referenced: usize,
    pub acyclic: bool,
    pub kinds: BTreeMap<&'static str, usize>,
    pub relations: BTreeMap<&'static str, usize>,
}

impl GraphStats {
    /// Compute counts by rebuilding the graph from its labels.
    pub fn from_export(export: &ExportedGraph) -> Self {
        let dag = export.to_dag();
        Self {
            nodes: export.nodes.len(),
            edges: dag.edge_count(),
            referenced: dag.implicit_count(),
            acyclic: dag.is_acyclic(),
            kinds: dag.kind_counts(),
            relations: dag.relation_counts(),
        }
    }
}

/// Execute the stats command
pub fn execute(args: StatsArgs, _global: GlobalOptions) -> Result<()> {
    let export = ExportedGraph::read(&args.graph)
        .with_context(|| format!("Failed to load graph from {}", args.graph.display()))?;
    let stats = GraphStats::from_export(&export);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("Graph: {}", args.graph.display());
    println!("  Nodes:      {}", stats.nodes);
    println!("  Referenced: {}", stats.referenced);
    println!("  Edges:      {}", stats.edges);
    println!("  Acyclic:    {}", if stats.acyclic { "yes" } else { "no" });

    println!("\nBy kind:");
    for (kind, count) in &stats.kinds {
        println!("  {:<14} {}", kind, count);
    }

    println!("\nBy relation:");
    for (relation, count) in &stats.relations {
        println!("  {:<14} {}", relation, count);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_from_export() {
        let export = ExportedGraph {
            nodes: vec![
                "Module:app".to_string(),
                "Class:App in app".to_string(),
                "Method:run of Class:App in app".to_string(),
            ],
            edges: vec![
                ("Class:App in app".to_string(), "Class:Base".to_string()),
                (
                    "Class:App in app".to_string(),
                    "Method:run of Class:App in app".to_string(),
                ),
            ],
        };

        let stats = GraphStats::from_export(&export);
        assert_eq!(stats.nodes, 3);
        assert_eq!(stats.edges, 2);
        assert_eq!(stats.referenced, 1);
        assert!(stats.acyclic);
        assert_eq!(stats.relations.values().sum::<usize>(), 2);
    }
}

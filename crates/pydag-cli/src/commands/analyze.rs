//! Analyze command - Build, normalize and export the graph of a source tree

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use pydag_config::{ConfigOverrides, PydagConfig};
use pydag_core::builder::{AnalysisOutcome, FailurePolicy, GraphBuilder};
use pydag_core::dag::{CyclePolicy, DagGraph, NormalizationReport};
use pydag_core::discovery::SourceFile;
use pydag_core::export::ExportedGraph;
use pydag_core::extractor::ScopeMode;
use pydag_core::graph::NodeKind;
use pydag_core::render::{to_dot, to_svg, ForceLayout};
use tracing::{debug, info};

use super::{load_config, print_info, print_warning, resolve_root, write_output};
use crate::progress::{
    finish_spinner, finish_spinner_error, finish_spinner_warn, set_message, spinner,
};
use crate::GlobalOptions;

/// Arguments for the analyze command
#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Directory to analyze (defaults to current directory)
    #[arg(default_value = ".")]
    pub root: PathBuf,

    /// Write the graph as JSON
    #[arg(long)]
    json: Option<PathBuf>,

    /// Write the graph as Graphviz DOT
    #[arg(long)]
    dot: Option<PathBuf>,

    /// Write the SVG rendering here (config default: dag.svg)
    #[arg(long)]
    svg: Option<PathBuf>,

    /// Do not render SVG
    #[arg(long, conflicts_with = "svg")]
    no_svg: bool,

    /// Cycle policy (single-edge, acyclic, feedback-arc-set)
    #[arg(long)]
    policy: Option<CyclePolicy>,

    /// Scope tracking (nested, flat)
    #[arg(long)]
    scope: Option<ScopeMode>,

    /// Skip files that fail to read, decode or parse instead of stopping
    #[arg(long)]
    keep_going: bool,

    /// Extraction threads (1 = sequential, 0 = one per core)
    #[arg(long, short = 'j', env = "PYDAG_JOBS")]
    jobs: Option<usize>,
}

impl AnalyzeArgs {
    /// Convert arguments to config overrides
    fn to_config_overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            scope: self.scope,
            policy: self.policy,
            failure_policy: self.keep_going.then_some(FailurePolicy::Isolate),
            parallelism: self.jobs,
            svg: self.svg.clone(),
            dot: self.dot.clone(),
            json: self.json.clone(),
            ..Default::default()
        }
    }
}

/// Execute the analyze command
pub fn execute(args: AnalyzeArgs, global: GlobalOptions) -> Result<()> {
    let quiet = global.quiet;
    let root = resolve_root(&args.root)?;

    let mut config = load_config(&root, &args.to_config_overrides())?;
    if args.no_svg {
        config.output.svg = None;
    }
    debug!(
        "Using scope={}, policy={}, failure_policy={}, jobs={}",
        config.analysis.scope.as_str(),
        config.normalize.policy,
        config.analysis.failure_policy.as_str(),
        config.analysis.parallelism
    );

    print_info(&format!("Analyzing {}", root.display()), quiet);

    let outcome = build_graph(&root, &config, quiet)?;
    report_failures(&outcome);

    let mut dag = DagGraph::from_accumulator(&outcome.graph);
    let report = dag.normalize(config.normalize.policy);
    print_cycle_report(&report);

    print_summary(&outcome, &dag, quiet);
    write_outputs(&dag, &config, quiet)?;

    Ok(())
}

fn build_graph(root: &Path, config: &PydagConfig, quiet: bool) -> Result<AnalysisOutcome> {
    let builder = GraphBuilder::with_config(config.builder_config());

    let pb = spinner("Discovering source files...", quiet);
    let on_file = |file: &SourceFile| {
        set_message(pb.as_ref(), format!("Analyzing {}", file.relative_path));
    };

    match builder.build_from_directory_with(root, on_file) {
        Ok(outcome) if outcome.is_complete() => {
            finish_spinner(pb, &format!("Analyzed {} modules", outcome.module_count()));
            Ok(outcome)
        }
        Ok(outcome) => {
            finish_spinner_warn(
                pb,
                &format!(
                    "Analyzed {} modules, {} files skipped",
                    outcome.module_count(),
                    outcome.failures.len()
                ),
            );
            Ok(outcome)
        }
        Err(e) => {
            finish_spinner_error(pb, "Analysis failed");
            Err(e).context("Failed to analyze source tree")
        }
    }
}

fn report_failures(outcome: &AnalysisOutcome) {
    for failure in &outcome.failures {
        print_warning(&format!(
            "skipped {}: {}",
            failure.file.relative_path, failure.error
        ));
    }
}

/// Print what normalization did. This is the command's result, so it
/// ignores --quiet.
fn print_cycle_report(report: &NormalizationReport) {
    if report.was_acyclic() {
        println!("No cycle found, the graph is a DAG.");
        return;
    }

    for cycle in &report.cycles {
        println!("Cycle detected: {}", cycle);
    }

    match report.removed_count() {
        1 => println!("An edge in the cycle was removed to make the graph acyclic."),
        n => println!("Removed {} edges to make the graph acyclic.", n),
    }

    if !report.acyclic {
        print_warning(&format!(
            "cycles remain after {} normalization; use --policy acyclic to remove them all",
            report.policy
        ));
    }
}

fn print_summary(outcome: &AnalysisOutcome, dag: &DagGraph, quiet: bool) {
    if quiet {
        return;
    }

    eprintln!();
    eprintln!("Summary");
    eprintln!("=======");
    eprintln!("  Modules:     {}", outcome.module_count());
    eprintln!("  Vertices:    {}", dag.node_count());
    eprintln!("  Referenced:  {}", dag.implicit_count());
    eprintln!("  Edges:       {}", dag.edge_count());
    for kind in [
        NodeKind::Class,
        NodeKind::Function,
        NodeKind::Method,
        NodeKind::Import,
        NodeKind::TryBlock,
    ] {
        let count = dag.count_kind(kind);
        if count > 0 {
            eprintln!("  {:<12} {}", format!("{}:", kind), count);
        }
    }
    eprintln!();
}

fn write_outputs(dag: &DagGraph, config: &PydagConfig, quiet: bool) -> Result<()> {
    if let Some(ref path) = config.output.json {
        ExportedGraph::from_dag(dag)
            .write(path)
            .with_context(|| format!("Failed to export graph to {}", path.display()))?;
        print_info(&format!("Wrote JSON to {}", path.display()), quiet);
    }

    if let Some(ref path) = config.output.dot {
        write_output(path, &to_dot(dag))?;
        print_info(&format!("Wrote DOT to {}", path.display()), quiet);
    }

    if let Some(ref path) = config.output.svg {
        let pb = spinner("Laying out graph...", quiet);
        let layout = ForceLayout::new(config.layout_config()).compute(dag);
        info!("Laid out {} vertices", layout.len());
        write_output(path, &to_svg(dag, &layout))?;
        finish_spinner(pb, &format!("Wrote SVG to {}", path.display()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(keep_going: bool) -> AnalyzeArgs {
        AnalyzeArgs {
            root: PathBuf::from("."),
            json: Some(PathBuf::from("graph.json")),
            dot: None,
            svg: None,
            no_svg: false,
            policy: Some(CyclePolicy::SingleEdge),
            scope: None,
            keep_going,
            jobs: Some(4),
        }
    }

    #[test]
    fn test_overrides_from_args() {
        let overrides = args(true).to_config_overrides();
        assert_eq!(overrides.policy, Some(CyclePolicy::SingleEdge));
        assert_eq!(overrides.failure_policy, Some(FailurePolicy::Isolate));
        assert_eq!(overrides.parallelism, Some(4));
        assert_eq!(overrides.json, Some(PathBuf::from("graph.json")));
        assert!(overrides.scope.is_none());
        assert!(overrides.svg.is_none());
    }

    #[test]
    fn test_keep_going_off_leaves_config_policy() {
        let overrides = args(false).to_config_overrides();
        assert!(overrides.failure_policy.is_none());
    }
}

//! pydag CLI - Structure graphs for Python source trees
//!
//! Walks a directory of Python files, extracts classes, functions, imports,
//! calls and exception handling into one graph, breaks any cycles and writes
//! the result as JSON, DOT or SVG.
//!
//! # Usage
//!
//! ```bash
//! # Analyze the current directory and render dag.svg
//! pydag analyze
//!
//! # Export JSON too, keep going past files that fail to parse
//! pydag analyze src --json graph.json --keep-going
//!
//! # Summarize a previous export
//! pydag stats graph.json
//! ```

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use pydag_config::ConfigLoader;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

mod commands;
mod progress;

/// pydag - Python source structure graphs, normalized into a DAG
#[derive(Parser, Debug)]
#[command(name = "pydag")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOptions,
}

/// Global options available to all commands
#[derive(Args, Debug, Clone)]
struct GlobalOptions {
    /// Enable verbose output
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyze a source tree and write the normalized graph
    Analyze(commands::analyze::AnalyzeArgs),

    /// Summarize a previously exported graph
    Stats(commands::stats::StatsArgs),

    /// View and manage configuration
    #[command(subcommand)]
    Config(commands::config::ConfigCommand),
}

impl Commands {
    /// Directory whose local config decides the log level
    fn config_root(&self) -> PathBuf {
        match self {
            Commands::Analyze(args) => args.root.clone(),
            _ => PathBuf::from("."),
        }
    }
}

/// Pick the log level: flags first, then `[logging] level`, then info.
fn log_level(global: &GlobalOptions, root: &Path) -> Level {
    if global.quiet {
        return Level::ERROR;
    }
    if global.verbose {
        return Level::DEBUG;
    }

    // Config errors surface later from the command itself
    ConfigLoader::new()
        .load(root, None)
        .ok()
        .and_then(|config| config.logging.level.parse().ok())
        .unwrap_or(Level::INFO)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level(&cli.global, &cli.command.config_root()))
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Analyze(args) => commands::analyze::execute(args, cli.global),
        Commands::Stats(args) => commands::stats::execute(args, cli.global),
        Commands::Config(cmd) => commands::config::execute(cmd, cli.global),
    }
}

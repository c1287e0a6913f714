//! Config command - View and manage configuration
//!
//! - Show the effective configuration and where each value came from
//! - Create a default config file (local or global)
//! - Show configuration file paths

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;
use pydag_config::{ConfigLoader, PydagConfig};
use serde::Serialize;

use super::{print_info, resolve_root};
use crate::GlobalOptions;

/// Config management commands
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the effective configuration
    Show(ShowArgs),

    /// Create a config file with default values
    Init(InitArgs),

    /// Show configuration file paths
    Path(PathArgs),
}

/// Arguments for the show command
#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Analysis root whose local config applies
    #[arg(default_value = ".")]
    root: PathBuf,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

/// Arguments for the init command
#[derive(clap::Args, Debug)]
pub struct InitArgs {
    /// Analysis root to create `.pydag/config.toml` in
    #[arg(default_value = ".")]
    root: PathBuf,

    /// Create ~/.pydag/config.toml instead of a local file
    #[arg(long)]
    global: bool,
}

/// Arguments for the path command
#[derive(clap::Args, Debug)]
pub struct PathArgs {
    /// Analysis root whose local config path is shown
    #[arg(default_value = ".")]
    root: PathBuf,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

/// Configuration paths
#[derive(Debug, Clone, Serialize)]
pub struct ConfigPaths {
    /// Global config file path
    pub global: Option<PathBuf>,
    /// Local config file path
    pub local: PathBuf,
    /// Whether global config exists
    pub global_exists: bool,
    /// Whether local config exists
    pub local_exists: bool,
}

/// Execute the config command
pub fn execute(cmd: ConfigCommand, global: GlobalOptions) -> Result<()> {
    match cmd {
        ConfigCommand::Show(args) => execute_show(args),
        ConfigCommand::Init(args) => execute_init(args, global),
        ConfigCommand::Path(args) => execute_path(args),
    }
}

fn execute_show(args: ShowArgs) -> Result<()> {
    let root = resolve_root(&args.root)?;
    let mut loader = ConfigLoader::new();

    let global_config = loader.load_global()?.unwrap_or_default();
    let local_config = loader.load_local(&root)?.unwrap_or_default();
    let effective = loader
        .load(&root, None)
        .context("Failed to load configuration")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&effective)?);
    } else {
        print_config(&effective, &global_config, &local_config, &loader, &root);
    }

    Ok(())
}

fn execute_init(args: InitArgs, global: GlobalOptions) -> Result<()> {
    let loader = ConfigLoader::new();

    let path = if args.global {
        loader
            .init_global()
            .context("Failed to create global config")?
    } else {
        let root = resolve_root(&args.root)?;
        loader
            .init_local(&root)
            .context("Failed to create local config")?
    };

    print_info(&format!("Config file: {}", path.display()), global.quiet);
    Ok(())
}

fn execute_path(args: PathArgs) -> Result<()> {
    let root = resolve_root(&args.root)?;
    let loader = ConfigLoader::new();

    let global_path = loader.global_config_path();
    let local_path = loader.local_config_path(&root);

    let paths = ConfigPaths {
        global_exists: global_path.as_ref().is_some_and(|p| p.exists()),
        local_exists: local_path.exists(),
        global: global_path,
        local: local_path,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&paths)?);
        return Ok(());
    }

    match paths.global {
        Some(ref gp) => println!("Global: {} ({})", gp.display(), status(paths.global_exists)),
        None => println!("Global: not available (no home directory)"),
    }
    println!(
        "Local:  {} ({})",
        paths.local.display(),
        status(paths.local_exists)
    );

    Ok(())
}

fn status(exists: bool) -> &'static str {
    if exists {
        "exists"
    } else {
        "not found"
    }
}

/// Where a value came from, given what each layer says.
fn source_of<T: PartialEq>(effective: &T, global: &T, local: &T, default: &T) -> &'static str {
    if local != default && effective == local {
        "local"
    } else if global != default && effective == global {
        "global"
    } else if effective != default {
        "merged"
    } else {
        "default"
    }
}

/// Print a configuration value with its source
fn print_value<T: std::fmt::Debug + PartialEq>(
    key: &str,
    effective: &T,
    global: &T,
    local: &T,
    default: &T,
) {
    match source_of(effective, global, local, default) {
        "default" => println!("  {} = {:?}", key, effective),
        source => println!("  {} = {:?} ({})", key, effective, source),
    }
}

/// Print configuration in a human-readable format
fn print_config(
    effective: &PydagConfig,
    global: &PydagConfig,
    local: &PydagConfig,
    loader: &ConfigLoader,
    root: &Path,
) {
    let default = PydagConfig::default();

    println!("pydag Configuration");
    println!("===================\n");

    if let Some(gp) = loader.global_config_path() {
        let note = if gp.exists() { "" } else { " (not found)" };
        println!("Global config: {}{}", gp.display(), note);
    }
    let lp = loader.local_config_path(root);
    let note = if lp.exists() { "" } else { " (not found)" };
    println!("Local config:  {}{}\n", lp.display(), note);

    macro_rules! show {
        ($section:ident . $field:ident) => {
            print_value(
                stringify!($field),
                &effective.$section.$field,
                &global.$section.$field,
                &local.$section.$field,
                &default.$section.$field,
            )
        };
    }

    println!("[analysis]");
    show!(analysis.extension);
    show!(analysis.exclude_patterns);
    show!(analysis.respect_gitignore);
    show!(analysis.scope);
    show!(analysis.failure_policy);
    show!(analysis.parallelism);

    println!("\n[normalize]");
    show!(normalize.policy);

    println!("\n[output]");
    show!(output.svg);
    show!(output.dot);
    show!(output.json);
    show!(output.canvas_size);
    show!(output.layout_iterations);

    println!("\n[logging]");
    show!(logging.level);
}

//! CLI command implementations

pub mod analyze;
pub mod config;
pub mod stats;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use pydag_config::{ConfigLoader, ConfigOverrides, PydagConfig};

/// Resolve a directory argument to an absolute path.
pub fn resolve_root(path: &Path) -> Result<PathBuf> {
    let path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .context("Failed to get current directory")?
            .join(path)
    };

    path.canonicalize()
        .with_context(|| format!("Failed to resolve {}", path.display()))
}

/// Load the merged configuration for `root` with CLI overrides applied.
pub fn load_config(root: &Path, overrides: &ConfigOverrides) -> Result<PydagConfig> {
    ConfigLoader::new()
        .load(root, Some(overrides))
        .context("Failed to load configuration")
}

/// Write a text output, creating parent directories as needed.
pub fn write_output(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    std::fs::write(path, contents).with_context(|| format!("Failed to write {}", path.display()))
}

/// Print a warning message to stderr.
pub fn print_warning(message: &str) {
    eprintln!("warning: {}", message);
}

/// Print an info message (respects quiet flag).
pub fn print_info(message: &str, quiet: bool) {
    if !quiet {
        eprintln!("{}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_output_creates_parents() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("out/nested/graph.dot");
        write_output(&path, "digraph {}").unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "digraph {}");
    }

    #[test]
    fn test_resolve_root_missing_dir() {
        let temp = TempDir::new().unwrap();
        let err = resolve_root(&temp.path().join("missing")).unwrap_err();
        assert!(err.to_string().contains("Failed to resolve"));
    }
}

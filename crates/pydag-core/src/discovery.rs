//! Source Discovery Module
//!
//! Walks a root directory and yields the Python sources to analyze together
//! with their canonical dotted module names.
//!
//! Files are returned in top-down walk order: the files of a directory come
//! before those of its subdirectories, and siblings are sorted by name. The
//! order is deterministic so graph output is reproducible.

use std::cmp::Ordering;
use std::path::{Component, Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use thiserror::Error;
use tracing::{debug, warn};

/// File name of a package initializer, without extension
const PACKAGE_INIT: &str = "__init__";

/// Errors during source discovery
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Root path does not exist: {0}")]
    RootNotFound(PathBuf),

    #[error("Root path is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Failed to walk directory: {0}")]
    Walk(#[from] ignore::Error),
}

pub type Result<T> = std::result::Result<T, DiscoveryError>;

/// A source file selected for analysis
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Path on disk
    pub path: PathBuf,
    /// Path relative to the root, `/`-separated
    pub relative_path: String,
    /// Canonical dotted module name
    pub module_name: String,
}

/// Configuration for source discovery
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// File extension to select, without the dot
    pub extension: String,
    /// Glob patterns (relative to the root) of files to skip
    pub exclude_patterns: Vec<String>,
    /// Honor `.gitignore`, `.ignore` and hidden-file rules
    pub respect_gitignore: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            extension: "py".to_string(),
            exclude_patterns: default_exclude_patterns(),
            respect_gitignore: false,
        }
    }
}

/// Directories that never hold analyzable sources.
pub fn default_exclude_patterns() -> Vec<String> {
    vec![
        "**/.git/**".to_string(),
        "**/__pycache__/**".to_string(),
        "**/.venv/**".to_string(),
        "**/venv/**".to_string(),
        "**/.tox/**".to_string(),
    ]
}

/// Source discovery service
pub struct SourceDiscovery {
    config: DiscoveryConfig,
    excludes: GlobSet,
}

impl SourceDiscovery {
    /// Create a discovery service with the given configuration.
    pub fn new(config: DiscoveryConfig) -> Self {
        let excludes = build_exclude_glob_set(&config.exclude_patterns);
        Self { config, excludes }
    }

    /// Create a discovery service with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(DiscoveryConfig::default())
    }

    /// Get the configuration
    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Enumerate every matching source file beneath `root`.
    pub fn discover(&self, root: &Path) -> Result<Vec<SourceFile>> {
        if !root.exists() {
            return Err(DiscoveryError::RootNotFound(root.to_path_buf()));
        }
        if !root.is_dir() {
            return Err(DiscoveryError::NotADirectory(root.to_path_buf()));
        }

        let root_name = root_module_name(root);
        let walker = WalkBuilder::new(root)
            .standard_filters(self.config.respect_gitignore)
            .require_git(false)
            .follow_links(false)
            .build();

        let mut files = Vec::new();
        for entry in walker {
            let entry = entry?;

            let is_file = entry.file_type().map(|ft| ft.is_file()).unwrap_or(false);
            if !is_file || !self.has_extension(entry.path()) {
                continue;
            }

            let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
            let relative_path = slash_path(relative);
            if self.excludes.is_match(&relative_path) {
                debug!("Excluded {}", relative_path);
                continue;
            }

            let module_name = module_name(relative, &self.config.extension, &root_name);
            files.push(SourceFile {
                path: entry.path().to_path_buf(),
                relative_path,
                module_name,
            });
        }

        files.sort_by(|a, b| walk_order(&a.relative_path, &b.relative_path));
        debug!("Discovered {} source files under {}", files.len(), root.display());
        Ok(files)
    }

    fn has_extension(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| ext == self.config.extension.as_str())
            .unwrap_or(false)
    }
}

// ============================================================================
// Module Naming
// ============================================================================

/// Canonical dotted module name of a file relative to the analysis root.
///
/// `pkg/sub/mod.py` becomes `pkg.sub.mod`; `pkg/__init__.py` collapses to
/// `pkg`. A root-level `__init__.py` takes `root_name`.
pub fn module_name(relative: &Path, extension: &str, root_name: &str) -> String {
    let mut parts: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();

    if let Some(last) = parts.last_mut() {
        let suffix = format!(".{}", extension);
        if let Some(stem) = last.strip_suffix(&suffix) {
            *last = stem.to_string();
        }
    }

    if parts.last().map(String::as_str) == Some(PACKAGE_INIT) {
        parts.pop();
        if parts.is_empty() {
            return root_name.to_string();
        }
    }

    parts.join(".")
}

/// Name used for a package initializer sitting directly in the root.
fn root_module_name(root: &Path) -> String {
    let name = root
        .canonicalize()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()));
    match name {
        Some(name) => name,
        None => {
            warn!(
                "Could not determine a name for root {}, using '{}'",
                root.display(),
                PACKAGE_INIT
            );
            PACKAGE_INIT.to_string()
        }
    }
}

fn slash_path(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Top-down walk order over `/`-separated relative paths.
fn walk_order(a: &str, b: &str) -> Ordering {
    let (a_dir, a_name) = split_parent(a);
    let (b_dir, b_name) = split_parent(b);
    a_dir.cmp(&b_dir).then_with(|| a_name.cmp(b_name))
}

fn split_parent(path: &str) -> (Vec<&str>, &str) {
    let mut parts: Vec<&str> = path.split('/').collect();
    let name = parts.pop().unwrap_or("");
    (parts, name)
}

/// Build a glob set from exclude patterns, skipping invalid ones.
fn build_exclude_glob_set(patterns: &[String]) -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        match Glob::new(pattern) {
            Ok(glob) => {
                builder.add(glob);
            }
            Err(e) => warn!("Ignoring invalid exclude pattern '{}': {}", pattern, e),
        }
    }
    builder.build().unwrap_or_else(|_| GlobSet::empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, "").unwrap();
    }

    fn relative_paths(files: &[SourceFile]) -> Vec<&str> {
        files.iter().map(|f| f.relative_path.as_str()).collect()
    }

    #[test]
    fn test_module_name() {
        assert_eq!(module_name(Path::new("mod.py"), "py", "root"), "mod");
        assert_eq!(
            module_name(Path::new("pkg/sub/mod.py"), "py", "root"),
            "pkg.sub.mod"
        );
        assert_eq!(
            module_name(Path::new("pkg/sub/__init__.py"), "py", "root"),
            "pkg.sub"
        );
        assert_eq!(module_name(Path::new("__init__.py"), "py", "root"), "root");
    }

    #[test]
    fn test_discover_walk_order() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "b.py");
        touch(temp.path(), "a/z.py");
        touch(temp.path(), "a/b/c.py");
        touch(temp.path(), "a.py");
        touch(temp.path(), "notes.txt");

        let files = SourceDiscovery::with_defaults()
            .discover(temp.path())
            .unwrap();
        assert_eq!(
            relative_paths(&files),
            vec!["a.py", "b.py", "a/z.py", "a/b/c.py"]
        );
        let modules: Vec<_> = files.iter().map(|f| f.module_name.as_str()).collect();
        assert_eq!(modules, vec!["a", "b", "a.z", "a.b.c"]);
    }

    #[test]
    fn test_discover_skips_excluded_dirs() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "app.py");
        touch(temp.path(), "__pycache__/app.py");
        touch(temp.path(), ".venv/lib/site.py");
        touch(temp.path(), "pkg/venv/x.py");

        let files = SourceDiscovery::with_defaults()
            .discover(temp.path())
            .unwrap();
        assert_eq!(relative_paths(&files), vec!["app.py"]);
    }

    #[test]
    fn test_hidden_dirs_walked_without_gitignore() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), ".hidden/mod.py");
        fs::write(temp.path().join(".gitignore"), "ignored.py\n").unwrap();
        touch(temp.path(), "ignored.py");

        let plain = SourceDiscovery::with_defaults()
            .discover(temp.path())
            .unwrap();
        assert_eq!(relative_paths(&plain), vec!["ignored.py", ".hidden/mod.py"]);

        let filtered = SourceDiscovery::new(DiscoveryConfig {
            respect_gitignore: true,
            ..Default::default()
        })
        .discover(temp.path())
        .unwrap();
        assert!(filtered.is_empty());
    }

    #[test]
    fn test_custom_extension() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "stub.pyi");
        touch(temp.path(), "mod.py");

        let files = SourceDiscovery::new(DiscoveryConfig {
            extension: "pyi".to_string(),
            ..Default::default()
        })
        .discover(temp.path())
        .unwrap();
        assert_eq!(relative_paths(&files), vec!["stub.pyi"]);
        assert_eq!(files[0].module_name, "stub");
    }

    #[test]
    fn test_missing_root() {
        let temp = TempDir::new().unwrap();
        let err = SourceDiscovery::with_defaults()
            .discover(&temp.path().join("nope"))
            .unwrap_err();
        assert!(matches!(err, DiscoveryError::RootNotFound(_)));
    }

    #[test]
    fn test_invalid_pattern_is_skipped() {
        let set = build_exclude_glob_set(&["a[".to_string(), "*.py".to_string()]);
        assert!(set.is_match("x.py"));
    }
}

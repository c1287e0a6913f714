//! Configuration loader with inheritance support.
//!
//! Loads configuration from multiple sources and merges them:
//! 1. Global config: `~/.pydag/config.toml`
//! 2. Local config: `.pydag/config.toml` (in the analyzed root)
//! 3. CLI overrides
//!
//! Later sources override earlier ones.

use crate::error::ConfigError;
use crate::{
    AnalysisConfig, ConfigOverrides, LoggingConfig, NormalizeConfig, OutputConfig, PydagConfig,
};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Global configuration directory name.
const GLOBAL_CONFIG_DIR: &str = ".pydag";

/// Local configuration directory name.
const LOCAL_CONFIG_DIR: &str = ".pydag";

/// Configuration loader with caching and inheritance support.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Global config directory (e.g., `~/.pydag`)
    global_config_dir: Option<PathBuf>,

    /// Cached global config
    global_config: Option<PydagConfig>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a new configuration loader.
    ///
    /// Automatically detects the global config directory (`~/.pydag`).
    pub fn new() -> Self {
        let global_config_dir = dirs::home_dir().map(|h| h.join(GLOBAL_CONFIG_DIR));

        Self {
            global_config_dir,
            global_config: None,
        }
    }

    /// Create a loader with a custom global config directory.
    pub fn with_global_dir(global_dir: impl Into<PathBuf>) -> Self {
        Self {
            global_config_dir: Some(global_dir.into()),
            global_config: None,
        }
    }

    /// Get the global config file path.
    pub fn global_config_path(&self) -> Option<PathBuf> {
        self.global_config_dir
            .as_ref()
            .map(|d| d.join(CONFIG_FILE_NAME))
    }

    /// Get the local config file path for an analysis root.
    pub fn local_config_path(&self, root: &Path) -> PathBuf {
        root.join(LOCAL_CONFIG_DIR).join(CONFIG_FILE_NAME)
    }

    /// Load configuration for an analysis root with optional CLI overrides.
    ///
    /// Merges config in order: global → local → overrides, then validates.
    pub fn load(
        &mut self,
        root: &Path,
        overrides: Option<&ConfigOverrides>,
    ) -> Result<PydagConfig, ConfigError> {
        let mut config = PydagConfig::default();

        if let Some(global_config) = self.load_global()? {
            config = merge_configs(config, global_config);
        }

        if let Some(local_config) = self.load_local(root)? {
            config = merge_configs(config, local_config);
        }

        if let Some(ovr) = overrides {
            config.apply_overrides(ovr);
        }

        config.validate()?;
        Ok(config)
    }

    /// Load only the global configuration.
    pub fn load_global(&mut self) -> Result<Option<PydagConfig>, ConfigError> {
        if let Some(ref config) = self.global_config {
            return Ok(Some(config.clone()));
        }

        let Some(global_path) = self.global_config_path() else {
            debug!("No home directory found, skipping global config");
            return Ok(None);
        };

        if !global_path.exists() {
            trace!("Global config not found at {:?}", global_path);
            return Ok(None);
        }

        debug!("Loading global config from {:?}", global_path);
        let config = load_config_file(&global_path)?;
        self.global_config = Some(config.clone());

        Ok(Some(config))
    }

    /// Load only the local configuration for an analysis root.
    pub fn load_local(&self, root: &Path) -> Result<Option<PydagConfig>, ConfigError> {
        let local_path = self.local_config_path(root);

        if !local_path.exists() {
            trace!("Local config not found at {:?}", local_path);
            return Ok(None);
        }

        debug!("Loading local config from {:?}", local_path);
        load_config_file(&local_path).map(Some)
    }

    /// Save configuration to the global config file.
    pub fn save_global(&mut self, config: &PydagConfig) -> Result<(), ConfigError> {
        let Some(global_path) = self.global_config_path() else {
            return Err(ConfigError::NoHomeDir);
        };

        save_config_file(&global_path, config)?;
        self.global_config = Some(config.clone());
        Ok(())
    }

    /// Save configuration to the local config file for an analysis root.
    pub fn save_local(&self, root: &Path, config: &PydagConfig) -> Result<(), ConfigError> {
        let local_path = self.local_config_path(root);
        save_config_file(&local_path, config)
    }

    /// Initialize global configuration.
    ///
    /// Creates `~/.pydag/config.toml` with default configuration unless it exists.
    pub fn init_global(&self) -> Result<PathBuf, ConfigError> {
        let Some(ref global_dir) = self.global_config_dir else {
            return Err(ConfigError::NoHomeDir);
        };
        init_config_dir(global_dir)
    }

    /// Initialize local configuration for an analysis root.
    ///
    /// Creates `.pydag/config.toml` with default configuration unless it exists.
    pub fn init_local(&self, root: &Path) -> Result<PathBuf, ConfigError> {
        init_config_dir(&root.join(LOCAL_CONFIG_DIR))
    }

    /// Clear cached global configuration.
    pub fn clear_cache(&mut self) {
        self.global_config = None;
    }
}

fn init_config_dir(dir: &Path) -> Result<PathBuf, ConfigError> {
    if !dir.exists() {
        std::fs::create_dir_all(dir).map_err(|e| ConfigError::create_dir(dir, e))?;
    }

    let config_path = dir.join(CONFIG_FILE_NAME);
    if !config_path.exists() {
        save_config_file(&config_path, &PydagConfig::default())?;
    }

    Ok(config_path)
}

/// Load a configuration file from disk.
fn load_config_file(path: &Path) -> Result<PydagConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;

    toml::from_str(&content).map_err(|e| ConfigError::parse_toml(path, e))
}

/// Save a configuration file to disk.
fn save_config_file(path: &Path, config: &PydagConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))
}

/// Merge two configurations, with `overlay` taking precedence.
///
/// A field in `overlay` that still holds its default value leaves the base
/// value in place, so partial config files only change what they mention.
fn merge_configs(base: PydagConfig, overlay: PydagConfig) -> PydagConfig {
    PydagConfig {
        analysis: merge_analysis(base.analysis, overlay.analysis),
        normalize: merge_normalize(base.normalize, overlay.normalize),
        output: merge_output(base.output, overlay.output),
        logging: merge_logging(base.logging, overlay.logging),
    }
}

fn pick<T: PartialEq>(base: T, overlay: T, default: T) -> T {
    if overlay != default {
        overlay
    } else {
        base
    }
}

/// Merge analysis config. Exclude patterns accumulate.
fn merge_analysis(base: AnalysisConfig, overlay: AnalysisConfig) -> AnalysisConfig {
    let defaults = AnalysisConfig::default();
    let mut exclude_patterns = base.exclude_patterns;
    for pattern in overlay.exclude_patterns {
        if !exclude_patterns.contains(&pattern) {
            exclude_patterns.push(pattern);
        }
    }

    AnalysisConfig {
        extension: pick(base.extension, overlay.extension, defaults.extension),
        exclude_patterns,
        respect_gitignore: pick(
            base.respect_gitignore,
            overlay.respect_gitignore,
            defaults.respect_gitignore,
        ),
        scope: pick(base.scope, overlay.scope, defaults.scope),
        failure_policy: pick(
            base.failure_policy,
            overlay.failure_policy,
            defaults.failure_policy,
        ),
        parallelism: pick(base.parallelism, overlay.parallelism, defaults.parallelism),
    }
}

/// Merge normalize config.
fn merge_normalize(base: NormalizeConfig, overlay: NormalizeConfig) -> NormalizeConfig {
    NormalizeConfig {
        policy: pick(base.policy, overlay.policy, NormalizeConfig::default().policy),
    }
}

/// Merge output config.
fn merge_output(base: OutputConfig, overlay: OutputConfig) -> OutputConfig {
    let defaults = OutputConfig::default();
    OutputConfig {
        svg: pick(base.svg, overlay.svg, defaults.svg),
        dot: overlay.dot.or(base.dot),
        json: overlay.json.or(base.json),
        canvas_size: pick(base.canvas_size, overlay.canvas_size, defaults.canvas_size),
        layout_iterations: pick(
            base.layout_iterations,
            overlay.layout_iterations,
            defaults.layout_iterations,
        ),
    }
}

/// Merge logging config.
fn merge_logging(base: LoggingConfig, overlay: LoggingConfig) -> LoggingConfig {
    LoggingConfig {
        level: pick(base.level, overlay.level, LoggingConfig::default().level),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use pydag_core::builder::FailurePolicy;
    use pydag_core::dag::CyclePolicy;
    use pydag_core::extractor::ScopeMode;
    use tempfile::TempDir;

    fn create_local_config(content: &str, dir: &Path) -> PathBuf {
        let config_dir = dir.join(".pydag");
        std::fs::create_dir_all(&config_dir).unwrap();
        let path = config_dir.join("config.toml");
        std::fs::write(&path, content).unwrap();
        path
    }

    fn create_global_config(content: &str, dir: &Path) -> PathBuf {
        std::fs::create_dir_all(dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_default_config() {
        let temp = TempDir::new().unwrap();
        let mut loader = ConfigLoader::with_global_dir(temp.path().join("global"));

        let config = loader.load(temp.path(), None).unwrap();

        assert_eq!(config, PydagConfig::default());
    }

    #[test]
    fn test_load_local_config() {
        let temp = TempDir::new().unwrap();
        let mut loader = ConfigLoader::with_global_dir(temp.path().join("global"));

        create_local_config(
            r#"
            [analysis]
            scope = "flat"

            [normalize]
            policy = "single-edge"
            "#,
            temp.path(),
        );

        let config = loader.load(temp.path(), None).unwrap();

        assert_eq!(config.analysis.scope, ScopeMode::Flat);
        assert_eq!(config.normalize.policy, CyclePolicy::SingleEdge);
    }

    #[test]
    fn test_local_overrides_global() {
        let temp = TempDir::new().unwrap();
        let global_dir = temp.path().join("global");

        create_global_config(
            r#"
            [logging]
            level = "debug"

            [analysis]
            failure_policy = "isolate"
            parallelism = 4
            "#,
            &global_dir,
        );

        create_local_config(
            r#"
            [analysis]
            parallelism = 2
            "#,
            temp.path(),
        );

        let mut loader = ConfigLoader::with_global_dir(&global_dir);
        let config = loader.load(temp.path(), None).unwrap();

        assert_eq!(config.analysis.parallelism, 2);
        // Global values survive where local says nothing
        assert_eq!(config.analysis.failure_policy, FailurePolicy::Isolate);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_cli_overrides_all() {
        let temp = TempDir::new().unwrap();

        create_local_config(
            r#"
            [output]
            json = "local.json"
            "#,
            temp.path(),
        );

        let mut loader = ConfigLoader::with_global_dir(temp.path().join("global"));

        let overrides = ConfigOverrides {
            json: Some(PathBuf::from("cli.json")),
            log_level: Some("trace".to_string()),
            ..Default::default()
        };

        let config = loader.load(temp.path(), Some(&overrides)).unwrap();

        assert_eq!(config.output.json, Some(PathBuf::from("cli.json")));
        assert_eq!(config.logging.level, "trace");
    }

    #[test]
    fn test_invalid_local_config_is_reported() {
        let temp = TempDir::new().unwrap();
        let path = create_local_config("[analysis]\nscope = \"sideways\"\n", temp.path());

        let mut loader = ConfigLoader::with_global_dir(temp.path().join("global"));
        let err = loader.load(temp.path(), None).unwrap_err();

        match err {
            ConfigError::ParseToml { path: reported, .. } => assert_eq!(reported, path),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_invalid_value_fails_validation() {
        let temp = TempDir::new().unwrap();
        create_local_config("[logging]\nlevel = \"chatty\"\n", temp.path());

        let mut loader = ConfigLoader::with_global_dir(temp.path().join("global"));
        let err = loader.load(temp.path(), None).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_save_and_load_config() {
        let temp = TempDir::new().unwrap();
        let loader = ConfigLoader::with_global_dir(temp.path().join("global"));

        let mut config = PydagConfig::default();
        config.normalize.policy = CyclePolicy::FeedbackArcSet;
        config.output.dot = Some(PathBuf::from("dag.dot"));

        loader.save_local(temp.path(), &config).unwrap();

        let mut loader = ConfigLoader::with_global_dir(temp.path().join("global"));
        let loaded = loader.load(temp.path(), None).unwrap();

        assert_eq!(loaded.normalize.policy, CyclePolicy::FeedbackArcSet);
        assert_eq!(loaded.output.dot, Some(PathBuf::from("dag.dot")));
    }

    #[test]
    fn test_init_local_creates_config() {
        let temp = TempDir::new().unwrap();
        let loader = ConfigLoader::with_global_dir(temp.path().join("global"));

        let config_path = loader.init_local(temp.path()).unwrap();

        assert!(config_path.exists());
        assert!(config_path.ends_with(".pydag/config.toml"));

        let content = std::fs::read_to_string(&config_path).unwrap();
        let parsed: PydagConfig = toml::from_str(&content).unwrap();
        assert_eq!(parsed, PydagConfig::default());
    }

    #[test]
    fn test_init_global_keeps_existing_file() {
        let temp = TempDir::new().unwrap();
        let global_dir = temp.path().join("global");
        create_global_config("[logging]\nlevel = \"warn\"\n", &global_dir);

        let loader = ConfigLoader::with_global_dir(&global_dir);
        let path = loader.init_global().unwrap();

        let content = std::fs::read_to_string(path).unwrap();
        assert!(content.contains("warn"));
    }

    #[test]
    fn test_exclude_patterns_merge() {
        let base = AnalysisConfig::default();
        let overlay = AnalysisConfig {
            exclude_patterns: vec!["**/migrations/**".to_string(), "**/.git/**".to_string()],
            ..Default::default()
        };

        let merged = merge_analysis(base, overlay);

        assert!(merged
            .exclude_patterns
            .contains(&"**/migrations/**".to_string()));
        let git_count = merged
            .exclude_patterns
            .iter()
            .filter(|p| p.as_str() == "**/.git/**")
            .count();
        assert_eq!(git_count, 1);
    }

    #[test]
    fn test_cache_clearing() {
        let temp = TempDir::new().unwrap();
        let global_dir = temp.path().join("global");
        create_global_config("[logging]\nlevel = \"debug\"\n", &global_dir);

        let mut loader = ConfigLoader::with_global_dir(&global_dir);

        let _ = loader.load_global().unwrap();
        assert!(loader.global_config.is_some());

        loader.clear_cache();
        assert!(loader.global_config.is_none());
    }
}

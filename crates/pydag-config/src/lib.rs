//! pydag Configuration Management
//!
//! Provides configuration loading with support for:
//! - Global config: `~/.pydag/config.toml`
//! - Local config: `.pydag/config.toml` (in the analyzed root)
//! - CLI overrides via `ConfigOverrides`
//!
//! Configuration is merged in order: global → local → CLI overrides.

mod error;
mod loader;

pub use error::{ConfigError, FileAction};
pub use loader::ConfigLoader;

use pydag_core::builder::{BuilderConfig, FailurePolicy};
use pydag_core::dag::CyclePolicy;
use pydag_core::discovery::default_exclude_patterns;
use pydag_core::extractor::ScopeMode;
use pydag_core::render::LayoutConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Log levels accepted in `[logging] level`
pub const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Root configuration for pydag.
///
/// Represents the fully merged configuration from all sources.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct PydagConfig {
    /// Source analysis configuration
    pub analysis: AnalysisConfig,

    /// Cycle breaking configuration
    pub normalize: NormalizeConfig,

    /// Output files and rendering
    pub output: OutputConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Source analysis configuration.
///
/// # Example TOML
///
/// ```toml
/// [analysis]
/// extension = "py"
/// exclude_patterns = ["**/migrations/**"]
/// scope = "nested"          # or "flat"
/// failure_policy = "abort"  # or "isolate"
/// parallelism = 4
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Source file extension, without the dot
    pub extension: String,

    /// Glob patterns to exclude; patterns from later sources extend earlier ones
    pub exclude_patterns: Vec<String>,

    /// Honor `.gitignore` and hidden-file rules
    pub respect_gitignore: bool,

    /// How enclosing classes are tracked
    pub scope: ScopeMode,

    /// What to do with files that fail to read, decode or parse
    pub failure_policy: FailurePolicy,

    /// Extraction threads (1 = sequential, 0 = one per core)
    pub parallelism: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            extension: "py".to_string(),
            exclude_patterns: default_exclude_patterns(),
            respect_gitignore: false,
            scope: ScopeMode::default(),
            failure_policy: FailurePolicy::default(),
            parallelism: 1,
        }
    }
}

/// Cycle breaking configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct NormalizeConfig {
    /// Cycle policy (single-edge, acyclic, feedback-arc-set)
    pub policy: CyclePolicy,
}

/// Output files and rendering parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    /// SVG rendering path
    pub svg: Option<PathBuf>,

    /// Graphviz DOT path
    pub dot: Option<PathBuf>,

    /// JSON export path
    pub json: Option<PathBuf>,

    /// SVG canvas edge length in pixels
    pub canvas_size: f64,

    /// Force layout iterations
    pub layout_iterations: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            svg: Some(PathBuf::from("dag.svg")),
            dot: None,
            json: None,
            canvas_size: 5000.0,
            layout_iterations: 50,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// CLI overrides for configuration values.
///
/// Used to apply command-line arguments over file-based config.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Override scope mode
    pub scope: Option<ScopeMode>,

    /// Override cycle policy
    pub policy: Option<CyclePolicy>,

    /// Override failure policy
    pub failure_policy: Option<FailurePolicy>,

    /// Override parallelism
    pub parallelism: Option<usize>,

    /// Override gitignore handling
    pub respect_gitignore: Option<bool>,

    /// Override SVG output path
    pub svg: Option<PathBuf>,

    /// Override DOT output path
    pub dot: Option<PathBuf>,

    /// Override JSON output path
    pub json: Option<PathBuf>,

    /// Override log level
    pub log_level: Option<String>,
}

impl PydagConfig {
    /// Apply CLI overrides to this configuration.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(scope) = overrides.scope {
            self.analysis.scope = scope;
        }

        if let Some(policy) = overrides.policy {
            self.normalize.policy = policy;
        }

        if let Some(failure_policy) = overrides.failure_policy {
            self.analysis.failure_policy = failure_policy;
        }

        if let Some(parallelism) = overrides.parallelism {
            self.analysis.parallelism = parallelism;
        }

        if let Some(respect) = overrides.respect_gitignore {
            self.analysis.respect_gitignore = respect;
        }

        if let Some(ref path) = overrides.svg {
            self.output.svg = Some(path.clone());
        }

        if let Some(ref path) = overrides.dot {
            self.output.dot = Some(path.clone());
        }

        if let Some(ref path) = overrides.json {
            self.output.json = Some(path.clone());
        }

        if let Some(ref level) = overrides.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ext = &self.analysis.extension;
        if ext.is_empty() || ext.starts_with('.') {
            return Err(ConfigError::invalid_value(
                "analysis.extension",
                format!("'{}' must be a bare extension such as \"py\"", ext),
            ));
        }
        if !(self.output.canvas_size.is_finite() && self.output.canvas_size > 0.0) {
            return Err(ConfigError::invalid_value(
                "output.canvas_size",
                "must be a positive number",
            ));
        }
        if self.output.layout_iterations == 0 {
            return Err(ConfigError::invalid_value(
                "output.layout_iterations",
                "must be at least 1",
            ));
        }
        if !LOG_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::invalid_value(
                "logging.level",
                format!(
                    "unknown level '{}'. Valid values: {}",
                    self.logging.level,
                    LOG_LEVELS.join(", ")
                ),
            ));
        }
        Ok(())
    }

    /// Builder settings for an analysis run.
    pub fn builder_config(&self) -> BuilderConfig {
        BuilderConfig {
            extension: self.analysis.extension.clone(),
            exclude_patterns: self.analysis.exclude_patterns.clone(),
            respect_gitignore: self.analysis.respect_gitignore,
            scope_mode: self.analysis.scope,
            failure_policy: self.analysis.failure_policy,
            parallelism: self.analysis.parallelism,
        }
    }

    /// Layout settings for SVG rendering.
    pub fn layout_config(&self) -> LayoutConfig {
        LayoutConfig {
            width: self.output.canvas_size,
            height: self.output.canvas_size,
            iterations: self.output.layout_iterations,
            ..Default::default()
        }
    }
}

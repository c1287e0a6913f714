//! Errors raised while loading, validating and saving pydag settings.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// File operation that failed on a config path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileAction {
    Read,
    Write,
    CreateDir,
}

impl fmt::Display for FileAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FileAction::Read => "read config file",
            FileAction::Write => "write config file",
            FileAction::CreateDir => "create config directory",
        })
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    /// A config file or directory could not be accessed
    #[error("cannot {action} '{path}': {source}")]
    Io {
        action: FileAction,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("'{path}' is not a valid pydag config: {source}")]
    ParseToml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("cannot encode settings as TOML: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// No home directory, so there is no global config location
    #[error("could not determine home directory for ~/.pydag")]
    NoHomeDir,

    /// A setting parsed but is out of range
    #[error("invalid value for `{key}`: {message}")]
    InvalidValue { key: String, message: String },
}

impl ConfigError {
    fn io(action: FileAction, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }

    pub fn read_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::io(FileAction::Read, path, source)
    }

    pub fn write_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::io(FileAction::Write, path, source)
    }

    pub fn create_dir(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::io(FileAction::CreateDir, path, source)
    }

    pub fn parse_toml(path: impl Into<PathBuf>, source: toml::de::Error) -> Self {
        Self::ParseToml {
            path: path.into(),
            source,
        }
    }

    pub fn invalid_value(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            message: message.into(),
        }
    }

    /// The config path involved, when there is one
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Self::Io { path, .. } | Self::ParseToml { path, .. } => Some(path),
            _ => None,
        }
    }
}

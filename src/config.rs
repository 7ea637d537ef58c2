use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const ENV_WORKSPACE: &str = "CLASSBOOK_WORKSPACE";
pub const ENV_LOG: &str = "CLASSBOOK_LOG";
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Where a configuration value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Default,
    File,
    Environment,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::File => write!(f, "file"),
            ConfigSource::Environment => write!(f, "environment"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }
}

/// Daemon configuration with source tracking.
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Directory holding the database file.
    pub workspace: ConfigValue<PathBuf>,
    /// `tracing` filter directive, e.g. `info` or `classbookd=debug`.
    pub log_filter: ConfigValue<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    workspace: Option<PathBuf>,
    log_filter: Option<String>,
}

impl Config {
    /// Priority: environment > config file > defaults.
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        Self::load_with(config_path, |key| std::env::var(key).ok())
    }

    fn load_with(
        config_path: Option<PathBuf>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut workspace = ConfigValue::new(Self::default_data_dir(), ConfigSource::Default);
        let mut log_filter =
            ConfigValue::new(DEFAULT_LOG_FILTER.to_string(), ConfigSource::Default);
        let mut config_file = None;

        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::Read(path.clone(), e))?;
            let file: ConfigFile = serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::Parse(path.clone(), e))?;
            config_file = Some(path.clone());

            if let Some(ws) = file.workspace {
                workspace = ConfigValue::new(resolve_relative(&path, ws), ConfigSource::File);
            }
            if let Some(filter) = file.log_filter {
                log_filter = ConfigValue::new(filter, ConfigSource::File);
            }
        }

        if let Some(ws) = env(ENV_WORKSPACE).filter(|v| !v.trim().is_empty()) {
            workspace = ConfigValue::new(PathBuf::from(ws), ConfigSource::Environment);
        }
        if let Some(filter) = env(ENV_LOG).filter(|v| !v.trim().is_empty()) {
            log_filter = ConfigValue::new(filter, ConfigSource::Environment);
        }

        Ok(Self {
            workspace,
            log_filter,
            config_file,
        })
    }

    /// The workspace to open at startup, if one was configured explicitly.
    pub fn startup_workspace(&self) -> Option<&Path> {
        match self.workspace.source {
            ConfigSource::Default => None,
            _ => Some(self.workspace.value.as_path()),
        }
    }

    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("classbook")
    }

    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("classbook")
    }

    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join("config.yaml")
    }
}

// Relative paths in the file are taken from the file's own directory.
fn resolve_relative(config_path: &Path, p: PathBuf) -> PathBuf {
    if p.is_relative() {
        config_path.parent().map(|dir| dir.join(&p)).unwrap_or(p)
    } else {
        p
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {1}", .0.display())]
    Read(PathBuf, #[source] std::io::Error),
    #[error("Failed to parse config file '{}': {1}", .0.display())]
    Parse(PathBuf, #[source] serde_yaml::Error),
}

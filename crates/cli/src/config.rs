//! Configuration loading from coeffects.toml.

use coeffects::{CapabilitySet, Policy};
use serde::Deserialize;
use std::path::Path;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// How violations are handled.
    #[serde(default)]
    pub enforcement: Policy,

    #[serde(default)]
    pub matrix: MatrixConfig,

    #[serde(default)]
    pub runtime: RuntimeConfig,

    #[serde(default)]
    pub log: LogConfig,
}

/// Settings for the `matrix` command.
#[derive(Debug, Deserialize)]
pub struct MatrixConfig {
    /// Contexts of the function driving the matrix.
    #[serde(default = "default_entry")]
    pub entry: Vec<String>,
}

impl Default for MatrixConfig {
    fn default() -> Self {
        Self {
            entry: default_entry(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LogConfig {
    /// `tracing_subscriber::EnvFilter` directives; `RUST_LOG` wins.
    #[serde(default = "default_filter")]
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

fn default_entry() -> Vec<String> {
    vec!["defaults".to_string()]
}

fn default_max_depth() -> usize {
    runtime::DEFAULT_MAX_DEPTH
}

fn default_filter() -> String {
    "warn".to_string()
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML string.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.entry()?;
        let max_depth = config.runtime.max_depth;
        if !(1..=runtime::MAX_DEPTH_LIMIT).contains(&max_depth) {
            return Err(ConfigError::Invalid(format!(
                "runtime.max_depth must be between 1 and {}, got {max_depth}",
                runtime::MAX_DEPTH_LIMIT
            )));
        }
        Ok(config)
    }

    /// The matrix driver's capability set.
    pub fn entry(&self) -> Result<CapabilitySet, ConfigError> {
        CapabilitySet::parse(self.matrix.entry.as_slice())
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

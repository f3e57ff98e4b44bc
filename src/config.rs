//! Configuration management for Herald
//!
//! This module defines the main `Config` struct and its sub-structs,
//! responsible for holding all application settings. It uses the `figment`
//! crate to load configuration from a `herald.toml` file and merge it
//! with environment variables and command-line arguments.

use crate::cli::Cli;
use crate::formatting::FormatFlags;
use crate::logger::DEFAULT_PREFIX;
use crate::notification::{ConfigError, SinkConfig};
use crate::severity::Severity;
use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;

/// Configuration file read when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "herald.toml";

/// The main configuration struct for the application.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    /// Filter for Herald's own diagnostics, e.g. "info" or "herald=debug".
    pub log_level: String,
    /// The logger that relayed lines are written through.
    pub logger: LoggerConfig,
    /// Raw notification sink entries, validated by [`SinkConfig::from_map`].
    #[serde(default)]
    pub sinks: Vec<Map<String, Value>>,
}

/// Construction-time options of a [`Logger`](crate::logger::Logger).
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct LoggerConfig {
    /// Where lines are written.
    pub output: OutputTarget,
    /// The initial threshold.
    pub level: Severity,
    /// Tag included in every line and notification.
    pub prefix: String,
    /// Header fields preceding each message.
    pub flags: FormatFlags,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            output: OutputTarget::Stderr,
            level: Severity::Debug,
            prefix: DEFAULT_PREFIX.to_string(),
            flags: FormatFlags::standard(),
        }
    }
}

/// The stream a logger writes to.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputTarget {
    #[default]
    Stderr,
    Stdout,
    /// A file, created if missing and appended to.
    File(PathBuf),
}

impl OutputTarget {
    /// Opens the target for writing.
    pub fn open(&self) -> io::Result<Box<dyn Write + Send>> {
        Ok(match self {
            OutputTarget::Stderr => Box::new(io::stderr()),
            OutputTarget::Stdout => Box::new(io::stdout()),
            OutputTarget::File(path) => Box::new(
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)?,
            ),
        })
    }
}

impl Config {
    /// Loads the application configuration by layering defaults, the TOML
    /// file, `HERALD_`-prefixed environment variables and CLI arguments.
    ///
    /// Nested keys are separated by a double underscore in the environment,
    /// e.g. `HERALD_LOGGER__LEVEL=warn`.
    pub fn load(cli: &Cli) -> Result<Self> {
        let path = cli
            .config
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("HERALD_").split("__"))
            .merge(cli.clone())
            .extract()?;
        Ok(config)
    }

    /// Validates every sink entry, keeping the enabled and recognized ones.
    pub fn sink_configs(&self) -> Result<Vec<SinkConfig>, ConfigError> {
        let mut configs = Vec::new();
        for entry in &self.sinks {
            if let Some(config) = SinkConfig::from_map(entry)? {
                configs.push(config);
            }
        }
        Ok(configs)
    }
}

// Provide a default implementation for tests and easy setup.
impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            logger: LoggerConfig::default(),
            sinks: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_output_target_file_is_appended() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("herald.log");
        std::fs::write(&path, "existing\n").unwrap();

        let mut output = OutputTarget::File(path.clone()).open().unwrap();
        output.write_all(b"appended\n").unwrap();
        output.flush().unwrap();
        drop(output);

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "existing\nappended\n");
    }

    #[test]
    fn test_sink_configs_skip_disabled_and_unknown() {
        let config = Config {
            sinks: vec![
                json!({ "name": "feishu", "enable": true, "webhook": "https://a" }),
                json!({ "name": "slack", "enable": false }),
                json!({ "name": "sms", "enable": true }),
            ]
            .into_iter()
            .filter_map(|v| v.as_object().cloned())
            .collect(),
            ..Config::default()
        };

        let sinks = config.sink_configs().unwrap();
        assert_eq!(sinks.len(), 1);
        assert_eq!(sinks[0].name(), "feishu");
    }

    #[test]
    fn test_sink_configs_surface_errors() {
        let config = Config {
            sinks: vec![json!({ "enable": true }).as_object().cloned().unwrap()],
            ..Config::default()
        };
        assert_eq!(config.sink_configs(), Err(ConfigError::MissingKey("name")));
    }
}

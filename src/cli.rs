//! Command-Line Interface (CLI) argument parsing.
//!
//! This module defines the command-line arguments for the application using the
//! `clap` crate. These arguments are parsed at startup and then merged with
//! the configuration from the `herald.toml` file and environment variables.

use crate::severity::Severity;
use clap::Parser;
use figment::{
    providers::Serialized,
    value::{Dict, Map},
    Error, Figment, Metadata, Profile, Provider,
};
use std::path::PathBuf;

/// Relays lines from standard input through a leveled logger and forwards
/// them to the configured notification sinks.
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Minimum severity written to the output stream.
    #[arg(long, value_name = "SEVERITY")]
    pub level: Option<Severity>,

    /// Tag included in every line and notification.
    #[arg(long, value_name = "TAG")]
    pub prefix: Option<String>,

    /// Severity at which each input line is logged.
    #[arg(short, long, value_name = "SEVERITY", default_value = "info")]
    pub severity: Severity,

    /// Only write lines; do not forward them to notification sinks.
    #[arg(long)]
    pub no_notify: bool,
}

impl Provider for Cli {
    fn metadata(&self) -> Metadata {
        Metadata::named("Command-Line Arguments")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        let mut figment = Figment::new();

        if let Some(level) = self.level {
            figment = figment.merge(Serialized::default("logger.level", level));
        }

        if let Some(prefix) = &self.prefix {
            figment = figment.merge(Serialized::default("logger.prefix", prefix));
        }

        figment.data()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_arguments() {
        let cli = Cli::parse_from([
            "herald",
            "--config",
            "/etc/herald.toml",
            "--level",
            "warn",
            "--severity",
            "error",
            "--no-notify",
        ]);

        assert_eq!(cli.config, Some(PathBuf::from("/etc/herald.toml")));
        assert_eq!(cli.level, Some(Severity::Warn));
        assert_eq!(cli.severity, Severity::Error);
        assert!(cli.no_notify);
        assert_eq!(cli.prefix, None);
    }

    #[test]
    fn test_default_severity_is_info() {
        let cli = Cli::parse_from(["herald"]);
        assert_eq!(cli.severity, Severity::Info);
        assert!(!cli.no_notify);
    }

    #[test]
    fn test_rejects_unknown_severity() {
        assert!(Cli::try_parse_from(["herald", "--level", "chatty"]).is_err());
    }
}

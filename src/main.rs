//! Herald - leveled logging with notification fan-out
//!
//! Relays lines read from standard input through a configured logger,
//! forwarding each one to the enabled notification sinks, and waits for every
//! delivery before exiting.

use anyhow::Result;
use clap::Parser;
use herald::app::{spawn_line_reader, App};
use herald::{cli::Cli, config::Config};
use std::io::{self, BufReader};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration by layering sources: defaults, file, environment, and CLI args.
    let config = match Config::load(&cli) {
        Ok(config) => config,
        Err(err) => {
            tracing_subscriber::fmt().with_writer(std::io::stderr).init();
            error!("Failed to load configuration: {}", err);
            std::process::exit(1);
        }
    };

    // Initialize diagnostics
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!("Herald starting up...");
    info!("Logger Level: {}", config.logger.level);
    info!("Logger Prefix: {}", config.logger.prefix);
    info!("Relay Severity: {}", cli.severity);
    info!("Configured Sink Entries: {}", config.sinks.len());

    let app = App::builder(config).notify(!cli.no_notify).build()?;
    app.lifecycle().listen_for_os_signals()?;

    let lines = spawn_line_reader(BufReader::new(io::stdin()))?;
    let relayed = app.run(lines, cli.severity).await?;

    info!("Relayed {} lines. Exiting.", relayed);
    Ok(())
}

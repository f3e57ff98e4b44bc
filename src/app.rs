//! The main application logic, decoupled from the entry point.

use crate::{
    config::Config,
    lifecycle::Lifecycle,
    logger::Logger,
    notification::NotificationSink,
    severity::Severity,
};
use anyhow::Result;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::thread;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument};

/// Message logged when a shutdown request interrupts the relay.
const SHUTDOWN_TIP: &str = "Shutdown requested, draining pending notifications...";

/// Lines buffered between the reader thread and the relay.
const LINE_QUEUE_CAPACITY: usize = 64;

/// Reads `reader` line by line on a dedicated OS thread.
///
/// A blocking read cannot be cancelled, so it is kept off the runtime: once the
/// returned receiver is dropped the relay no longer depends on the reader, and
/// the thread ends at its next line or at EOF.
pub fn spawn_line_reader<R>(reader: R) -> io::Result<mpsc::Receiver<io::Result<String>>>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::channel(LINE_QUEUE_CAPACITY);
    thread::Builder::new()
        .name("herald-input".to_string())
        .spawn(move || {
            for line in reader.lines() {
                let failed = line.is_err();
                if tx.blocking_send(line).is_err() {
                    debug!("Relay stopped, input reader exiting.");
                    return;
                }
                if failed {
                    return;
                }
            }
            debug!("Input reached EOF.");
        })?;
    Ok(rx)
}

/// A configured relay: a logger, its sinks, and the lifecycle they run on.
#[derive(Debug)]
pub struct App {
    lifecycle: Lifecycle,
    logger: Logger,
    notify: bool,
}

impl App {
    /// Creates a new `AppBuilder` to construct an `App`.
    pub fn builder(config: Config) -> AppBuilder {
        AppBuilder::new(config)
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    /// Relays lines from `lines` until the channel closes or a shutdown is
    /// requested, then waits for every pending delivery.
    ///
    /// Returns the number of relayed lines. Blank lines are skipped. See
    /// [`spawn_line_reader`] for feeding the channel from a blocking reader.
    #[instrument(skip_all, fields(severity = %severity))]
    pub async fn run(
        &self,
        mut lines: mpsc::Receiver<io::Result<String>>,
        severity: Severity,
    ) -> Result<usize> {
        let mut relayed = 0;

        loop {
            let next = tokio::select! {
                biased;
                signal = self.lifecycle.await_signal(SHUTDOWN_TIP) => {
                    info!(?signal, "Relay received shutdown signal.");
                    break;
                }
                next = lines.recv() => next,
            };

            let line = match next {
                Some(Ok(line)) => line,
                Some(Err(e)) => {
                    error!(error = %e, "Failed to read input.");
                    self.drain().await;
                    return Err(e.into());
                }
                None => {
                    info!("Input closed.");
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }

            if self.notify {
                self.logger.notify(severity, format_args!("{}", line));
            } else {
                self.logger.emit(severity, format_args!("{}", line));
            }
            relayed += 1;
        }

        // Closing the receiver releases the reader thread at its next line.
        drop(lines);
        self.drain().await;
        info!(relayed, "Relay finished.");
        Ok(relayed)
    }

    async fn drain(&self) {
        debug!(pending = self.lifecycle.pending(), "Waiting for pending deliveries.");
        self.lifecycle.wait().await;
        self.lifecycle.cancel();
    }
}

/// Builder for the main application.
///
/// Separates constructing the components from running them, and lets tests
/// override the output stream and sinks.
pub struct AppBuilder {
    config: Config,
    lifecycle: Option<Lifecycle>,
    output_override: Option<Box<dyn Write + Send>>,
    sink_overrides: Vec<(String, Arc<dyn NotificationSink>)>,
    notify: bool,
}

impl AppBuilder {
    /// Creates a new `AppBuilder` with the given configuration.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            lifecycle: None,
            output_override: None,
            sink_overrides: Vec::new(),
            notify: true,
        }
    }

    /// Uses an existing lifecycle instead of creating one on the current runtime.
    pub fn lifecycle(mut self, lifecycle: Lifecycle) -> Self {
        self.lifecycle = Some(lifecycle);
        self
    }

    /// Overrides the configured output stream.
    pub fn output_override<W: Write + Send + 'static>(mut self, output: W) -> Self {
        self.output_override = Some(Box::new(output));
        self
    }

    /// Registers an extra sink in addition to the configured ones.
    pub fn sink(mut self, name: &str, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink_overrides.push((name.to_string(), sink));
        self
    }

    /// Disables notification fan-out for relayed lines.
    pub fn notify(mut self, notify: bool) -> Self {
        self.notify = notify;
        self
    }

    /// Builds the logger and registers every enabled sink.
    ///
    /// Without an explicit [`AppBuilder::lifecycle`], one is bound to the
    /// current Tokio runtime; building outside a runtime is then an error.
    #[instrument(skip_all)]
    pub fn build(self) -> Result<App> {
        let config = self.config;
        let lifecycle = match self.lifecycle {
            Some(lifecycle) => lifecycle,
            None => Lifecycle::try_new()?,
        };

        let sink_configs = config.sink_configs()?;

        let logger = match self.output_override {
            Some(output) => Logger::builder()
                .boxed_output(output)
                .level(config.logger.level)
                .prefix(config.logger.prefix.clone())
                .flags(config.logger.flags)
                .build(lifecycle.clone()),
            None => Logger::from_config(&config.logger, lifecycle.clone())?,
        };

        for sink_config in sink_configs {
            let name = sink_config.name();
            logger.register_sink(name, sink_config.build());
            info!(sink = name, "Notification sink enabled.");
        }
        for (name, sink) in self.sink_overrides {
            logger.register_sink(name, sink);
        }

        info!(
            level = %logger.level(),
            prefix = logger.prefix(),
            sinks = ?logger.sink_names(),
            "Herald initialized."
        );

        Ok(App {
            lifecycle,
            logger,
            notify: self.notify,
        })
    }
}

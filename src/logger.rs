//! The leveled logger and its notification fan-out.
//!
//! Every severity has four entry points: a plain formatted emission, a
//! space-joined `_ln` emission, and the `notify_` variants of both which also
//! forward the message to every registered [`NotificationSink`].
//!
//! The threshold only filters output lines. Notifying calls fan out even when
//! their line is suppressed.
//!
//! A [`Severity::Fatal`] emission never terminates the process. Deciding to
//! exit is left to the caller.

use crate::config::LoggerConfig;
use crate::formatting::{join_operands, line_tag, render_line, FormatFlags};
use crate::lifecycle::Lifecycle;
use crate::notification::{NotificationSink, SinkRegistry};
use crate::severity::Severity;
use std::fmt;
use std::io::{self, Write};
use std::panic::Location;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

/// Prefix used when none (or an empty one) is configured.
pub const DEFAULT_PREFIX: &str = "HERALD";

/// Writes a formatted line at the given severity.
///
/// ```ignore
/// herald::emit!(logger, Severity::Info, "listening on {}", addr);
/// ```
#[macro_export]
macro_rules! emit {
    ($logger:expr, $severity:expr, $($arg:tt)+) => {
        $logger.emit($severity, ::std::format_args!($($arg)+))
    };
}

/// Writes a formatted line at the given severity and fans it out to every sink.
#[macro_export]
macro_rules! notify {
    ($logger:expr, $severity:expr, $($arg:tt)+) => {
        $logger.notify($severity, ::std::format_args!($($arg)+))
    };
}

/// A cheap, cloneable handle to a shared logger.
#[derive(Clone)]
pub struct Logger {
    inner: Arc<Inner>,
}

struct Inner {
    threshold: AtomicI64,
    output: Mutex<Box<dyn Write + Send>>,
    prefix: String,
    flags: FormatFlags,
    /// Pre-rendered `[prefix][LEVEL]` tags, indexed by `code - 1`.
    tags: [String; 5],
    sinks: SinkRegistry,
    lifecycle: Lifecycle,
}

macro_rules! severity_methods {
    ($($severity:ident => $plain:ident, $plain_ln:ident, $notify:ident, $notify_ln:ident;)*) => {
        $(
            #[doc = concat!("Writes a line at [`Severity::", stringify!($severity), "`].")]
            #[track_caller]
            pub fn $plain(&self, args: fmt::Arguments<'_>) {
                self.emit(Severity::$severity, args);
            }

            #[doc = concat!("Writes the space-joined operands at [`Severity::", stringify!($severity), "`].")]
            #[track_caller]
            pub fn $plain_ln(&self, items: &[&dyn fmt::Display]) {
                self.emit_ln(Severity::$severity, items);
            }

            #[doc = concat!("Like [`Logger::", stringify!($plain), "`], then fans the message out to every sink.")]
            #[track_caller]
            pub fn $notify(&self, args: fmt::Arguments<'_>) {
                self.notify(Severity::$severity, args);
            }

            #[doc = concat!("Like [`Logger::", stringify!($plain_ln), "`], then fans the message out to every sink.")]
            #[track_caller]
            pub fn $notify_ln(&self, items: &[&dyn fmt::Display]) {
                self.notify_ln(Severity::$severity, items);
            }
        )*
    };
}

impl Logger {
    /// Creates a new `LoggerBuilder`.
    pub fn builder() -> LoggerBuilder {
        LoggerBuilder::default()
    }

    /// Builds a logger from its configuration section, opening the output.
    pub fn from_config(config: &LoggerConfig, lifecycle: Lifecycle) -> io::Result<Self> {
        let output = config.output.open()?;
        Ok(Self::builder()
            .boxed_output(output)
            .level(config.level)
            .prefix(config.prefix.clone())
            .flags(config.flags)
            .build(lifecycle))
    }

    /// The current threshold.
    pub fn level(&self) -> Severity {
        Severity::from_code(self.inner.threshold.load(Ordering::Acquire))
    }

    /// Replaces the threshold. Visible to every thread immediately.
    pub fn set_level(&self, severity: Severity) {
        self.inner
            .threshold
            .store(severity.code(), Ordering::Release);
    }

    /// Replaces the threshold from a numeric code. Codes outside `1..=5`
    /// select [`Severity::Debug`].
    pub fn set_level_code(&self, code: i64) {
        self.set_level(Severity::from_code(code));
    }

    /// Whether a line at `severity` would be written.
    pub fn enabled(&self, severity: Severity) -> bool {
        self.inner.threshold.load(Ordering::Acquire) <= severity.code()
    }

    pub fn prefix(&self) -> &str {
        &self.inner.prefix
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.inner.lifecycle
    }

    pub fn sinks(&self) -> &SinkRegistry {
        &self.inner.sinks
    }

    /// Registers a sink under `name`, replacing any previous one.
    pub fn register_sink(&self, name: impl Into<String>, sink: Arc<dyn NotificationSink>) {
        self.inner.sinks.register(name, sink);
    }

    pub fn remove_sink(&self, name: &str) -> Option<Arc<dyn NotificationSink>> {
        self.inner.sinks.remove(name)
    }

    pub fn sink_names(&self) -> Vec<String> {
        self.inner.sinks.names()
    }

    /// Writes a formatted line if `severity` passes the threshold.
    #[track_caller]
    pub fn emit(&self, severity: Severity, args: fmt::Arguments<'_>) {
        if !self.enabled(severity) {
            return;
        }
        match args.as_str() {
            Some(message) => self.write_line(severity, message),
            None => self.write_line(severity, &args.to_string()),
        }
    }

    /// Writes the space-joined operands if `severity` passes the threshold.
    #[track_caller]
    pub fn emit_ln(&self, severity: Severity, items: &[&dyn fmt::Display]) {
        if !self.enabled(severity) {
            return;
        }
        self.write_line(severity, &join_operands(items));
    }

    /// Like [`Logger::emit`], then fans the message out to every sink.
    #[track_caller]
    pub fn notify(&self, severity: Severity, args: fmt::Arguments<'_>) {
        let message = args.to_string();
        if self.enabled(severity) {
            self.write_line(severity, &message);
        }
        self.fan_out(&message);
    }

    /// Like [`Logger::emit_ln`], then fans the message out to every sink.
    ///
    /// The notification payload ends with a newline.
    #[track_caller]
    pub fn notify_ln(&self, severity: Severity, items: &[&dyn fmt::Display]) {
        let mut message = join_operands(items);
        if self.enabled(severity) {
            self.write_line(severity, &message);
        }
        message.push('\n');
        self.fan_out(&message);
    }

    severity_methods! {
        Debug => debug, debug_ln, notify_debug, notify_debug_ln;
        Warn => warn, warn_ln, notify_warn, notify_warn_ln;
        Info => info, info_ln, notify_info, notify_info_ln;
        Error => error, error_ln, notify_error, notify_error_ln;
        Fatal => fatal, fatal_ln, notify_fatal, notify_fatal_ln;
    }

    #[track_caller]
    fn write_line(&self, severity: Severity, message: &str) {
        let tag = &self.inner.tags[(severity.code() - 1) as usize];
        let line = render_line(tag, &self.inner.flags, Location::caller(), message);

        let mut output = match self.inner.output.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        // There is nowhere left to report a failing log stream.
        let _ = output.write_all(line.as_bytes());
        let _ = output.flush();
    }

    /// Prefixes the message and hands it to the registry. Delivery failures
    /// come back as plain Error lines so they are never re-notified.
    fn fan_out(&self, message: &str) {
        if self.inner.sinks.is_empty() {
            return;
        }

        let payload: Arc<str> = Arc::from(format!("[{}]{}", self.inner.prefix, message));
        let logger = self.clone();
        self.inner
            .sinks
            .fan_out(&self.inner.lifecycle, payload, move |name, err| {
                logger.error(format_args!("[notify][{}] delivery failed: {}", name, err));
            });
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("level", &self.level())
            .field("prefix", &self.inner.prefix)
            .field("flags", &self.inner.flags)
            .field("sinks", &self.inner.sinks)
            .finish()
    }
}

/// Builder for [`Logger`].
pub struct LoggerBuilder {
    output: Option<Box<dyn Write + Send>>,
    level: Severity,
    prefix: String,
    flags: FormatFlags,
}

impl Default for LoggerBuilder {
    fn default() -> Self {
        Self {
            output: None,
            level: Severity::Debug,
            prefix: DEFAULT_PREFIX.to_string(),
            flags: FormatFlags::standard(),
        }
    }
}

impl LoggerBuilder {
    /// Sets the output stream. Defaults to standard error.
    pub fn output<W: Write + Send + 'static>(self, output: W) -> Self {
        self.boxed_output(Box::new(output))
    }

    pub fn boxed_output(mut self, output: Box<dyn Write + Send>) -> Self {
        self.output = Some(output);
        self
    }

    pub fn level(mut self, level: Severity) -> Self {
        self.level = level;
        self
    }

    /// Sets the threshold from a numeric code, clamping out-of-range values
    /// to [`Severity::Debug`].
    pub fn level_code(self, code: i64) -> Self {
        self.level(Severity::from_code(code))
    }

    /// Sets the tag. An empty prefix falls back to [`DEFAULT_PREFIX`].
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        self.prefix = if prefix.is_empty() {
            DEFAULT_PREFIX.to_string()
        } else {
            prefix
        };
        self
    }

    pub fn flags(mut self, flags: FormatFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Builds the logger. Notification deliveries are spawned on `lifecycle`.
    pub fn build(self, lifecycle: Lifecycle) -> Logger {
        let output = self
            .output
            .unwrap_or_else(|| Box::new(io::stderr()) as Box<dyn Write + Send>);
        let tags = Severity::ALL.map(|severity| line_tag(&self.prefix, severity.label()));

        Logger {
            inner: Arc::new(Inner {
                threshold: AtomicI64::new(self.level.code()),
                output: Mutex::new(output),
                prefix: self.prefix,
                flags: self.flags,
                tags,
                sinks: SinkRegistry::new(),
                lifecycle,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailingSink, RecordingSink, SharedBuffer};
    use std::time::Duration;
    use tokio::time::timeout;

    fn test_logger(buffer: &SharedBuffer) -> Logger {
        Logger::builder()
            .output(buffer.clone())
            .prefix("test")
            .flags(FormatFlags::none())
            .build(Lifecycle::new())
    }

    #[tokio::test]
    async fn test_line_format() {
        let buffer = SharedBuffer::new();
        let logger = test_logger(&buffer);

        logger.info(format_args!("user {} logged in", 42));
        logger.warn_ln(&[&"disk", &93, &"%"]);

        assert_eq!(
            buffer.lines(),
            vec!["[test][INFO] user 42 logged in", "[test][WARN] disk 93 %"]
        );
    }

    #[tokio::test]
    async fn test_caller_location_points_at_call_site() {
        let buffer = SharedBuffer::new();
        let logger = Logger::builder()
            .output(buffer.clone())
            .prefix("loc")
            .flags(FormatFlags {
                short_file: true,
                ..FormatFlags::none()
            })
            .build(Lifecycle::new());

        let line = line!() + 1;
        crate::emit!(logger, Severity::Error, "from {}", "macro");

        assert_eq!(
            buffer.contents(),
            format!("[loc][ERROR] logger.rs:{}: from macro\n", line)
        );
    }

    #[tokio::test]
    async fn test_empty_prefix_uses_placeholder() {
        let buffer = SharedBuffer::new();
        let logger = Logger::builder()
            .output(buffer.clone())
            .prefix("")
            .flags(FormatFlags::none())
            .build(Lifecycle::new());

        logger.debug(format_args!("x"));
        assert_eq!(logger.prefix(), DEFAULT_PREFIX);
        assert_eq!(buffer.contents(), "[HERALD][DEBUG] x\n");
    }

    #[tokio::test]
    async fn test_set_level_code_clamps() {
        let logger = test_logger(&SharedBuffer::new());

        logger.set_level_code(4);
        assert_eq!(logger.level(), Severity::Error);
        logger.set_level_code(0);
        assert_eq!(logger.level(), Severity::Debug);
        logger.set_level_code(9);
        assert_eq!(logger.level(), Severity::Debug);
    }

    #[tokio::test]
    async fn test_fatal_does_not_terminate() {
        let buffer = SharedBuffer::new();
        let logger = test_logger(&buffer);

        logger.fatal(format_args!("still here"));
        logger.info(format_args!("after fatal"));

        assert_eq!(buffer.lines().len(), 2);
    }

    #[tokio::test]
    async fn test_notify_ln_payload_has_trailing_newline() {
        let buffer = SharedBuffer::new();
        let logger = test_logger(&buffer);
        let sink = Arc::new(RecordingSink::new("rec"));
        logger.register_sink("rec", sink.clone());

        logger.notify_info_ln(&[&"a", &1]);
        timeout(Duration::from_secs(1), logger.lifecycle().wait())
            .await
            .unwrap();

        assert_eq!(sink.messages(), vec!["[test]a 1\n".to_string()]);
        assert_eq!(buffer.contents(), "[test][INFO] a 1\n");
    }

    #[tokio::test]
    async fn test_notify_fans_out_even_when_line_is_filtered() {
        let buffer = SharedBuffer::new();
        let logger = test_logger(&buffer);
        logger.set_level(Severity::Error);
        let sink = Arc::new(RecordingSink::new("rec"));
        logger.register_sink("rec", sink.clone());

        logger.notify_debug(format_args!("quiet"));
        timeout(Duration::from_secs(1), logger.lifecycle().wait())
            .await
            .unwrap();

        assert!(buffer.contents().is_empty());
        assert_eq!(sink.messages(), vec!["[test]quiet".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_delivery_is_logged_not_renotified() {
        let buffer = SharedBuffer::new();
        let logger = test_logger(&buffer);
        let failing = Arc::new(FailingSink::new("pager"));
        logger.register_sink("pager", failing.clone());

        logger.notify_warn(format_args!("queue backlog"));
        timeout(Duration::from_secs(1), logger.lifecycle().wait())
            .await
            .unwrap();

        let lines = buffer.lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "[test][WARN] queue backlog");
        assert!(lines[1].starts_with("[test][ERROR] [notify][pager] delivery failed:"));
        assert_eq!(failing.attempts(), 1);
    }
}

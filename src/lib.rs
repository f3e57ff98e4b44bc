/// Herald - leveled logging with asynchronous notification fan-out
///
/// This library provides a severity-filtered logger whose threshold can change
/// at runtime, forwards selected messages to named notification sinks as
/// tracked background tasks, and coordinates process shutdown around them.
pub mod lifecycle;
pub mod notification;

pub mod app;
pub mod cli;
pub mod config;
pub mod formatting;
pub mod logger;
pub mod severity;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// Re-export core types for convenience
pub use lifecycle::{CancelScope, Lifecycle, LifecycleError, LifecycleState, ShutdownSignal};
pub use logger::{Logger, LoggerBuilder};
pub use notification::{ConfigError, NotificationSink, SendError, SinkConfig, SinkRegistry};
pub use severity::Severity;

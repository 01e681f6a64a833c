use std::fmt::{self, Write as _};
use std::sync::Arc;

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_log::NormalizeEvent;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::{EnvFilter, Layer};

/// Environment variable read for the log filter directives.
pub const LOG_FILTER_ENV: &str = "GACHAKIT_LOG";

/// Trait representing a logger that can log messages at various levels.
///
/// This trait should be implemented by any host that wants to receive the
/// crate's log lines (a UI console, a mobile logging bridge, ...).
///
/// # Examples
///
/// ```rust
/// use gachakit_core::logger::{Logger, LogLevel};
///
/// struct MyLogger;
///
/// impl Logger for MyLogger {
///     fn log(&self, level: LogLevel, message: String) {
///         println!("[{:?}] {}", level, message);
///     }
/// }
/// ```
pub trait Logger: Sync + Send {
    /// Logs a message at the specified log level.
    ///
    /// # Arguments
    ///
    /// * `level` - The severity level of the log message.
    /// * `message` - The log message to be recorded.
    fn log(&self, level: LogLevel, message: String);
}

/// Enumeration of possible log levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Designates very low priority, often extremely detailed messages.
    Trace,
    /// Designates lower priority debugging information.
    Debug,
    /// Designates informational messages that highlight the progress of the application.
    Info,
    /// Designates potentially harmful situations.
    Warn,
    /// Designates error events that might still allow the application to continue running.
    Error,
}

impl From<&Level> for LogLevel {
    fn from(level: &Level) -> Self {
        match *level {
            Level::ERROR => Self::Error,
            Level::WARN => Self::Warn,
            Level::INFO => Self::Info,
            Level::DEBUG => Self::Debug,
            _ => Self::Trace,
        }
    }
}

/// A `tracing` layer forwarding events to a host [`Logger`].
///
/// Debug and trace events from other crates are dropped.
pub struct ForeignLayer {
    logger: Arc<dyn Logger>,
}

impl ForeignLayer {
    /// Creates a layer forwarding to `logger`.
    #[must_use]
    pub fn new(logger: Arc<dyn Logger>) -> Self {
        Self { logger }
    }
}

impl<S: Subscriber> Layer<S> for ForeignLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        // events bridged from `log` carry their real target in the fields
        let normalized = event.normalized_metadata();
        let metadata = normalized.as_ref().unwrap_or_else(|| event.metadata());

        let is_from_gachakit = metadata.target().starts_with("gachakit");
        let is_debug_or_trace =
            *metadata.level() == Level::DEBUG || *metadata.level() == Level::TRACE;
        if is_debug_or_trace && !is_from_gachakit {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        self.logger.log(LogLevel::from(metadata.level()), visitor.finish());
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: String,
}

impl MessageVisitor {
    fn finish(self) -> String {
        if self.fields.is_empty() {
            self.message
        } else {
            format!("{}{}", self.message, self.fields)
        }
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.record_debug(field, &value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        match field.name() {
            "message" => self.message = format!("{value:?}"),
            name if name.starts_with("log.") => {}
            name => {
                let _ = write!(self.fields, " {name}={value:?}");
            }
        }
    }
}

/// Sets the global logger.
///
/// Installs a `tracing` subscriber that filters with [`LOG_FILTER_ENV`]
/// (everything by default) and forwards to `logger`, and routes `log` records
/// from dependencies through it. Call it once, before any logging occurs.
///
/// # Note
///
/// If a global subscriber has already been set, this function prints a
/// message and does nothing.
pub fn set_logger(logger: Arc<dyn Logger>) {
    if let Err(e) = tracing_log::LogTracer::init() {
        eprintln!("Failed to bridge `log` records: {e}");
    }

    let filter =
        EnvFilter::try_from_env(LOG_FILTER_ENV).unwrap_or_else(|_| EnvFilter::new("trace"));
    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(ForeignLayer::new(logger));
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set logger: {e}");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct RecordingLogger {
        lines: Mutex<Vec<(LogLevel, String)>>,
    }

    impl Logger for RecordingLogger {
        fn log(&self, level: LogLevel, message: String) {
            self.lines.lock().unwrap().push((level, message));
        }
    }

    fn capture(f: impl FnOnce()) -> Vec<(LogLevel, String)> {
        let logger = Arc::new(RecordingLogger::default());
        let subscriber = tracing_subscriber::registry().with(ForeignLayer::new(logger.clone()));
        tracing::subscriber::with_default(subscriber, f);
        let lines = logger.lines.lock().unwrap().clone();
        lines
    }

    #[test]
    fn test_forwards_message_and_fields() {
        let lines = capture(|| {
            tracing::info!(target: "gachakit_core::store", items = 2, "pulled {}", "Pikachu");
        });
        assert_eq!(lines, vec![(LogLevel::Info, "pulled Pikachu items=2".to_string())]);
    }

    #[test]
    fn test_drops_debug_from_other_crates() {
        let lines = capture(|| {
            tracing::debug!(target: "hyper::client", "connection reused");
            tracing::warn!(target: "hyper::client", "connection reset");
            tracing::trace!(target: "gachakit_core::engine", "loading engine module");
        });
        assert_eq!(
            lines,
            vec![
                (LogLevel::Warn, "connection reset".to_string()),
                (LogLevel::Trace, "loading engine module".to_string()),
            ]
        );
    }
}

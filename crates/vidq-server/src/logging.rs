//! Tracing setup for the vidq server
//!
//! Stdout and file output are separate optional layers over one env filter,
//! so every `LOG_OUTPUT` choice builds the same subscriber shape.

use tracing::Subscriber;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt, layer::SubscriberExt, registry::LookupSpan, util::SubscriberInitExt, EnvFilter, Layer,
};

const LOG_FILE: &str = "vidq-server.log";

type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync + 'static>;

/// Line format for emitted events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, human-readable
    Pretty,
    /// One JSON object per event
    Json,
    /// Single-line text
    Compact,
}

impl LogFormat {
    /// Read `LOG_FORMAT`; anything unknown is pretty
    pub fn from_env() -> Self {
        match std::env::var("LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            Ok("compact") => LogFormat::Compact,
            _ => LogFormat::Pretty,
        }
    }
}

/// Where events are written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    Stdout,
    File,
    Both,
}

impl LogOutput {
    /// Read `LOG_OUTPUT`; anything unknown is stdout
    pub fn from_env() -> Self {
        match std::env::var("LOG_OUTPUT").as_deref() {
            Ok("file") => LogOutput::File,
            Ok("both") => LogOutput::Both,
            _ => LogOutput::Stdout,
        }
    }

    pub fn writes_stdout(self) -> bool {
        matches!(self, LogOutput::Stdout | LogOutput::Both)
    }

    pub fn writes_file(self) -> bool {
        matches!(self, LogOutput::File | LogOutput::Both)
    }
}

fn env_filter() -> EnvFilter {
    let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // The HTTP stack stays at warn unless RUST_LOG names it
    for directive in ["hyper=warn", "tower=warn", "h2=warn"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }
    filter
}

fn stdout_layer<S>(format: LogFormat) -> BoxedLayer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    match format {
        LogFormat::Pretty => fmt::layer().pretty().with_target(true).boxed(),
        LogFormat::Json => fmt::layer().json().with_current_span(true).boxed(),
        LogFormat::Compact => fmt::layer().compact().boxed(),
    }
}

/// Daily-rotated file under `LOG_DIR`; never colored, JSON only when asked
fn file_layer<S>(format: LogFormat) -> BoxedLayer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let log_dir = std::env::var("LOG_DIR").unwrap_or_else(|_| "./logs".to_string());
    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("cannot create log directory {}: {}", log_dir, e);
    }
    let appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, LOG_FILE);

    match format {
        LogFormat::Json => fmt::layer().json().with_writer(appender).boxed(),
        _ => fmt::layer().with_writer(appender).with_ansi(false).boxed(),
    }
}

/// Install the global subscriber
///
/// Reads `RUST_LOG` (filter directives, default `info`), `LOG_FORMAT`
/// (`pretty`, `json`, `compact`), `LOG_OUTPUT` (`stdout`, `file`, `both`)
/// and `LOG_DIR` (default `./logs`).
///
/// ```bash
/// RUST_LOG=vidq_nl=debug LOG_FORMAT=json LOG_OUTPUT=both vidq-server
/// ```
pub fn init() {
    let format = LogFormat::from_env();
    let output = LogOutput::from_env();

    let stdout = output.writes_stdout().then(|| stdout_layer(format));
    let file = output.writes_file().then(|| file_layer(format));

    tracing_subscriber::registry()
        .with(env_filter())
        .with(stdout)
        .with(file)
        .init();

    tracing::info!(?format, ?output, "logging initialized");
}

/// Helper macro for logging with structured fields
///
/// Usage:
/// ```ignore
/// vidq_server::log_event!(
///     level: tracing::Level::INFO,
///     event: "answer_completed",
///     translator: "rules",
///     duration_ms: 42
/// );
/// ```
#[macro_export]
macro_rules! log_event {
    (level: $level:expr, event: $event:expr $(, $key:ident: $value:expr)* $(,)?) => {
        tracing::event!(
            $level,
            event = $event
            $(, $key = ?$value)*
        );
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_from_env() {
        std::env::set_var("LOG_FORMAT", "json");
        assert_eq!(LogFormat::from_env(), LogFormat::Json);

        std::env::set_var("LOG_FORMAT", "compact");
        assert_eq!(LogFormat::from_env(), LogFormat::Compact);

        std::env::set_var("LOG_FORMAT", "anything");
        assert_eq!(LogFormat::from_env(), LogFormat::Pretty);

        std::env::remove_var("LOG_FORMAT");
        assert_eq!(LogFormat::from_env(), LogFormat::Pretty);
    }

    #[test]
    fn test_log_output_from_env() {
        std::env::set_var("LOG_OUTPUT", "file");
        assert_eq!(LogOutput::from_env(), LogOutput::File);

        std::env::set_var("LOG_OUTPUT", "both");
        assert_eq!(LogOutput::from_env(), LogOutput::Both);

        std::env::remove_var("LOG_OUTPUT");
        assert_eq!(LogOutput::from_env(), LogOutput::Stdout);
    }

    #[test]
    fn test_output_destinations() {
        assert!(LogOutput::Stdout.writes_stdout());
        assert!(!LogOutput::Stdout.writes_file());
        assert!(!LogOutput::File.writes_stdout());
        assert!(LogOutput::File.writes_file());
        assert!(LogOutput::Both.writes_stdout() && LogOutput::Both.writes_file());
    }
}

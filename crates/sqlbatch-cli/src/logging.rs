//! Logging setup for the sqlbatch binary
//!
//! Human-readable events go to stderr so stdout only carries the run summary.
//! A daily-rotated JSON log file can be added for unattended runs.
//! `RUST_LOG` overrides the default filter.

use std::io::IsTerminal;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const LOG_FILE_PREFIX: &str = "sqlbatch.log";

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Directory for JSON log files, `None` to log to the console only
    pub json_log_dir: Option<PathBuf>,

    /// Whether to include file/line information in console logs
    pub include_location: bool,

    /// Default log level filter
    pub default_filter: String,
}

impl LoggingConfig {
    pub fn new(verbosity: u8) -> Self {
        let default_filter = match verbosity {
            0 => "info",
            1 => "info,sqlbatch_query=debug",
            _ => "debug",
        };
        Self {
            json_log_dir: None,
            include_location: verbosity > 1,
            default_filter: default_filter.to_string(),
        }
    }

    pub fn with_json_logs(mut self, log_dir: PathBuf) -> Self {
        self.json_log_dir = Some(log_dir);
        self
    }
}

/// Default location of JSON log files
pub fn log_directory() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sqlbatch")
        .join("logs")
}

/// Install the global subscriber.
///
/// The returned guard flushes the JSON log file when dropped and must be kept
/// alive until the program exits.
pub fn init(config: &LoggingConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    let mut layers = Vec::new();

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(config.include_location)
        .with_file(config.include_location)
        .with_line_number(config.include_location)
        .with_ansi(std::io::stderr().is_terminal())
        .compact()
        .with_filter(env_filter.clone())
        .boxed();
    layers.push(console_layer);

    let mut guard = None;
    if let Some(log_dir) = &config.json_log_dir {
        std::fs::create_dir_all(log_dir)?;

        let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
        let (non_blocking, worker_guard) = tracing_appender::non_blocking(file_appender);
        guard = Some(worker_guard);

        let json_layer = fmt::layer()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false)
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_writer(non_blocking)
            .with_filter(env_filter)
            .boxed();
        layers.push(json_layer);
    }

    tracing_subscriber::registry().with(layers).try_init()?;

    tracing::debug!(json_log_dir = ?config.json_log_dir, "logging initialized");
    Ok(guard)
}

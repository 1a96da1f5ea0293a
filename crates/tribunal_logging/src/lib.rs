//! Logging setup for the Tribunal binaries.
//!
//! Every process writes to two sinks: stderr (for whoever launched it) and a
//! daily-rolled log file under `<tribunal home>/logs`. Only the newest
//! `KEEP_LOG_FILES` files are kept.

use anyhow::{Context, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str = "tribunal=info,tribunal_jobs=info";
const KEEP_LOG_FILES: usize = 5;

/// Options for [`init_logging`].
pub struct LogConfig<'a> {
    /// Prefix of the log file name (sanitized before use).
    pub app_name: &'a str,
    /// Mirror the full file filter on stderr instead of warnings only.
    pub verbose: bool,
}

/// Flushes the background file writer when dropped. Hold it for the life of the process.
pub struct LoggingGuard {
    _file: WorkerGuard,
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` overrides the default filter for both sinks.
pub fn init_logging(config: LogConfig<'_>) -> Result<LoggingGuard> {
    let dir = ensure_logs_dir().context("Failed to ensure log directory")?;
    let appender = file_appender(&dir, config.app_name)
        .with_context(|| format!("Failed to open log file for {}", config.app_name))?;
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let file_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let stderr_filter = if config.verbose {
        file_filter.clone()
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_filter(file_filter),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_filter(stderr_filter),
        )
        .init();

    tracing::debug!("Logging to {}", dir.display());
    Ok(LoggingGuard { _file: guard })
}

/// Daily-rolled appender writing `<dir>/<app_name>.<date>.log`.
pub fn file_appender(dir: &Path, app_name: &str) -> Result<RollingFileAppender> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(sanitize_name(app_name))
        .filename_suffix("log")
        .max_log_files(KEEP_LOG_FILES)
        .build(dir)
        .with_context(|| format!("Failed to create log appender in {}", dir.display()))
}

/// Tribunal home directory: `$TRIBUNAL_HOME` or `~/.tribunal`.
pub fn tribunal_home() -> PathBuf {
    if let Ok(path) = std::env::var("TRIBUNAL_HOME") {
        return PathBuf::from(path);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tribunal")
}

/// Directory holding the log files.
pub fn logs_dir() -> PathBuf {
    tribunal_home().join("logs")
}

/// Create the logs directory if needed and return it.
pub fn ensure_logs_dir() -> Result<PathBuf> {
    let dir = logs_dir();
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create logs directory: {}", dir.display()))?;
    Ok(dir)
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .collect()
}

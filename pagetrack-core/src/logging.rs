//! Logging for pagetrack
//!
//! Every command logs to daily-rotated files under
//! `$XDG_STATE_HOME/pagetrack/` (`pagetrack.log.YYYY-MM-DD`). The ingestion
//! endpoint also mirrors its log to stderr so it can be watched in a terminal.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::{Config, LoggingConfig};
use crate::error::{Error, Result};

/// Prefix of the rotated log files
pub const LOG_FILE_PREFIX: &str = "pagetrack.log";

/// Where log records go besides the log file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    /// Agent commands: file only, stdout stays clean for the command's report
    File,
    /// Long-running endpoint: file plus stderr
    FileAndStderr,
}

impl LogOutput {
    fn mirrors_to_stderr(self) -> bool {
        matches!(self, LogOutput::FileAndStderr)
    }
}

/// Build the rotating appender for `dir`, keeping at most `max_files` files
fn file_appender(dir: &Path, max_files: usize) -> Result<RollingFileAppender> {
    std::fs::create_dir_all(dir)?;

    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .max_log_files(max_files.max(1))
        .build(dir)
        .map_err(|e| Error::Config(format!("failed to create log appender: {}", e)))
}

/// Install the global subscriber.
///
/// `RUST_LOG` overrides `logging.level`. Fails if a subscriber is already set.
pub fn init(config: &LoggingConfig, output: LogOutput) -> Result<LoggingGuard> {
    let dir = Config::state_dir();
    let (writer, guard) = tracing_appender::non_blocking(file_appender(&dir, config.max_files)?);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_thread_ids(true)
        .with_line_number(true);

    let stderr_layer = output
        .mirrors_to_stderr()
        .then(|| fmt::layer().with_writer(std::io::stderr).with_target(false));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .map_err(|e| Error::Config(format!("failed to install logger: {}", e)))?;

    tracing::info!(
        log_dir = %dir.display(),
        level = %config.level,
        max_files = config.max_files,
        "Logging initialized"
    );

    Ok(LoggingGuard { _guard: guard })
}

/// Initialize logging for tests (captured by the test harness)
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .with_span_events(FmtSpan::CLOSE)
        .try_init();
}

/// Flushes buffered log records when dropped; hold it for the life of the process
pub struct LoggingGuard {
    _guard: WorkerGuard,
}

/// Directory holding the rotated log files
pub fn log_dir() -> std::path::PathBuf {
    Config::state_dir()
}

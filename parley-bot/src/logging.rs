//! Tracing subscriber setup.
//!
//! Console output goes to stderr at INFO (or whatever `RUST_LOG` and the
//! `-v` flags ask for). A second layer writes DEBUG and above to a file in
//! the log directory that rotates daily and keeps the last seven files.

use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{Builder as RollingBuilder, Rotation};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Rotated log files kept on disk.
pub const MAX_LOG_FILES: usize = 7;

/// File name prefix of rotated logs.
pub const LOG_FILE_PREFIX: &str = "parley";

/// Logging options resolved from the command line and environment.
#[derive(Debug, Clone)]
pub struct LogOptions {
    /// `-v` count: 0 = info, 1 = debug, 2+ = trace including dependencies.
    pub verbosity: u8,
    /// Directory for rotated files; `None` disables the file sink.
    pub log_dir: Option<PathBuf>,
}

/// Keeps the background file writer alive; drop it on shutdown to flush.
#[derive(Debug)]
#[must_use = "dropping the guard stops file logging"]
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

/// Filter directives for the console layer.
fn console_directives(verbosity: u8) -> String {
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    format!(
        "parley={level},parley_bot={level},{}",
        if verbosity >= 2 { "debug" } else { "warn" }
    )
}

/// Filter directives for the file layer.
fn file_directives(verbosity: u8) -> String {
    console_directives(verbosity.max(1))
}

/// Install the global subscriber.
///
/// If the log directory cannot be created the bot keeps running with
/// console output only and reports the problem through the console layer.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init(options: &LogOptions) -> Result<LogGuard, tracing_subscriber::util::TryInitError> {
    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(console_directives(options.verbosity)));
    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(options.verbosity >= 2)
        .with_filter(console_filter);

    let (file_layer, guard, file_error) = match options.log_dir.as_deref().map(file_writer) {
        Some(Ok((writer, guard))) => {
            let layer = fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(EnvFilter::new(file_directives(options.verbosity)));
            (Some(layer), Some(guard), None)
        }
        Some(Err(e)) => (None, None, Some(e)),
        None => (None, None, None),
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file_layer)
        .try_init()?;

    if let Some(e) = file_error {
        tracing::warn!(error = %e, "file logging disabled");
    }

    Ok(LogGuard { _file: guard })
}

fn file_writer(
    dir: &Path,
) -> Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard), tracing_appender::rolling::InitError>
{
    let appender = RollingBuilder::new()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix("log")
        .max_log_files(MAX_LOG_FILES)
        .build(dir)?;
    Ok(tracing_appender::non_blocking(appender))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_directives_follow_verbosity() {
        assert_eq!(console_directives(0), "parley=INFO,parley_bot=INFO,warn");
        assert_eq!(console_directives(1), "parley=DEBUG,parley_bot=DEBUG,warn");
        assert_eq!(console_directives(3), "parley=TRACE,parley_bot=TRACE,debug");
    }

    #[test]
    fn test_file_sink_is_at_least_debug() {
        assert_eq!(file_directives(0), "parley=DEBUG,parley_bot=DEBUG,warn");
        assert_eq!(file_directives(2), console_directives(2));
    }

    #[test]
    fn test_file_writer_creates_directory() {
        let dir = std::env::temp_dir().join(format!("parley-log-test-{}", std::process::id()));
        let result = file_writer(&dir);
        assert!(result.is_ok());
        assert!(dir.is_dir());
        drop(result);
        let _ = std::fs::remove_dir_all(&dir);
    }
}

//! Global tracing subscriber setup.

use crate::options::LoggingOptions;
use dbcell_shared::errors::{DbcellError, DbcellResult};
use std::sync::OnceLock;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Keeps the non-blocking writer flushing for the life of the process.
static LOG_GUARD: OnceLock<Option<WorkerGuard>> = OnceLock::new();

const LOG_FILE_PREFIX: &str = "dbcell.log";

/// Install the global subscriber. Later calls are no-ops.
///
/// `RUST_LOG` takes precedence over `options.default_filter`. With a log
/// directory configured, output goes to a daily-rolling file there; otherwise
/// to stderr.
pub fn init_logging(options: &LoggingOptions) -> DbcellResult<()> {
    if LOG_GUARD.get().is_some() {
        return Ok(());
    }

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&options.default_filter))
        .map_err(|e| {
            DbcellError::Config(format!(
                "invalid log filter {:?}: {}",
                options.default_filter, e
            ))
        })?;

    let guard = match &options.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir).map_err(|e| {
                DbcellError::Config(format!(
                    "Failed to create log directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let installed = report_install(
                tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_writer(writer)
                    .with_ansi(false)
                    .try_init(),
            );
            installed.then_some(guard)
        }
        None => {
            report_install(
                tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_writer(std::io::stderr)
                    .try_init(),
            );
            None
        }
    };

    let _ = LOG_GUARD.set(guard);
    Ok(())
}

/// True when our subscriber became the global default.
fn report_install<E: std::fmt::Display>(result: Result<(), E>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            tracing::debug!(error = %e, "Global subscriber already installed, keeping it");
            false
        }
    }
}

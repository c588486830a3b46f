//! Tracing setup

use anyhow::{anyhow, Context, Result};
use std::path::Path;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;

/// Install the global subscriber
///
/// Logs go to stderr, or to `log_file` when given. The returned guard must be
/// kept alive until exit so buffered file output is flushed.
pub fn init(debug: bool, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let level = if debug { Level::DEBUG } else { Level::INFO };

    match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let file_name = path
                .file_name()
                .context("Log file path has no file name")?;

            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

            let appender = tracing_appender::rolling::never(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);

            tracing_subscriber::fmt()
                .with_max_level(level)
                .with_ansi(false)
                .with_writer(writer)
                .try_init()
                .map_err(|e| anyhow!("Failed to initialize logging: {}", e))?;

            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt()
                .with_max_level(level)
                .with_writer(std::io::stderr)
                .try_init()
                .map_err(|e| anyhow!("Failed to initialize logging: {}", e))?;

            Ok(None)
        }
    }
}

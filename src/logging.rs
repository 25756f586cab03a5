//! Subscriber setup for the `clinetl` binary and embedding applications.

use std::fs;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::{Result, EtlError};

/// Log file used when `--log-file` is given without a path
pub const DEFAULT_LOG_FILE: &str = "logs/etl_pipeline.log";

/// Install a console subscriber and, optionally, a plain-text file layer
///
/// `RUST_LOG` overrides the default filter. Keep the returned guard alive
/// until exit so buffered file output is flushed.
pub fn init_logging(verbose: bool, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("clinic_etl={level},clinetl={level}")));

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(verbose);

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
            fs::create_dir_all(dir)?;
            let file_name = path.file_name().ok_or_else(|| EtlError::Configuration {
                message: format!("Log file path '{}' has no file name", path.display()),
                suggestion: Some(format!("Use a path such as {}", DEFAULT_LOG_FILE)),
            })?;

            let appender = tracing_appender::rolling::never(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| EtlError::Configuration {
            message: format!("Failed to initialise logging: {}", e),
            suggestion: None,
        })?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_logging_creates_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs/etl_pipeline.log");

        let guard = init_logging(false, Some(&path)).unwrap();
        tracing::info!(target: "clinic_etl", "hello");
        drop(guard);

        assert!(path.parent().unwrap().is_dir());
        // a second global subscriber is refused
        assert!(init_logging(false, None).is_err());
    }
}

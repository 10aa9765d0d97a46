//! Logging setup for applications embedding tilemosaic.
//!
//! The library only emits `tracing` events. Binaries and examples call
//! [`init_logging`] once to print them:
//! - stdout output, compact format
//! - optional log file written through a non-blocking appender
//! - filtering through `RUST_LOG`, falling back to [`LoggingConfig::default_filter`]

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "info";

/// Logging options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Directive used when `RUST_LOG` is unset or invalid
    pub default_filter: String,
    /// Also write events to this file (truncated on start)
    pub log_file: Option<PathBuf>,
    /// Colour the stdout output
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default_filter: DEFAULT_FILTER.to_string(),
            log_file: None,
            ansi: true,
        }
    }
}

impl LoggingConfig {
    pub fn with_default_filter(mut self, filter: impl Into<String>) -> Self {
        self.default_filter = filter.into();
        self
    }

    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }

    pub fn with_ansi(mut self, ansi: bool) -> Self {
        self.ansi = ansi;
        self
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.default_filter))
    }
}

/// Guard that must be kept alive for the duration of logging.
///
/// Dropping it flushes and closes the log file writer.
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Creates the log file's directory and truncates the file.
fn prepare_log_file(path: &Path) -> io::Result<(PathBuf, String)> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "log file has no name"))?
        .to_string();
    fs::create_dir_all(&dir)?;
    fs::write(path, "")?;
    Ok((dir, name))
}

/// Installs the global subscriber.
///
/// # Errors
///
/// Fails when the log file cannot be created or a global subscriber is
/// already installed.
pub fn init_logging(config: LoggingConfig) -> Result<LoggingGuard, io::Error> {
    let (file_layer, file_guard) = match &config.log_file {
        Some(path) => {
            let (dir, name) = prepare_log_file(path)?;
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stdout)
        .with_ansi(config.ansi)
        .compact();

    tracing_subscriber::registry()
        .with(config.env_filter())
        .with(file_layer)
        .with(stdout_layer)
        .try_init()
        .map_err(io::Error::other)?;

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = LoggingConfig::default();
        assert_eq!(config.default_filter, "info");
        assert!(config.log_file.is_none());
    }

    #[test]
    fn test_builders() {
        let config = LoggingConfig::default()
            .with_default_filter("tilemosaic=debug")
            .with_log_file("logs/tiles.log")
            .with_ansi(false);
        assert_eq!(config.default_filter, "tilemosaic=debug");
        assert_eq!(config.log_file, Some(PathBuf::from("logs/tiles.log")));
        assert!(!config.ansi);
    }

    #[test]
    fn test_prepare_log_file_truncates() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/tiles.log");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "old log data").unwrap();

        let (log_dir, name) = prepare_log_file(&path).unwrap();
        assert_eq!(log_dir, dir.path().join("nested"));
        assert_eq!(name, "tiles.log");
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn test_prepare_log_file_creates_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a/b/c.log");
        prepare_log_file(&path).unwrap();
        assert!(path.exists());
    }

    // init_logging installs a process-wide subscriber, so it is left to
    // binaries rather than unit tests.
}

//! Logging initialization.
//!
//! Installs a `tracing` subscriber with a compact stderr layer and, when a
//! log path is given, an append-only JSONL file layer. Each line is flushed
//! on write so `tail -f` on the file sees events as they happen.

use crate::{ConfigError, ConfigResult};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Default filter (e.g., "info", "sheet_sync_reconciler=debug").
    /// Overridden by `RUST_LOG` when set.
    pub default_level: String,
    /// Optional JSONL log file.
    pub log_path: Option<PathBuf>,
    /// Emit human-readable logs on stderr.
    pub stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            default_level: crate::DEFAULT_LOG_LEVEL.to_string(),
            log_path: None,
            stderr: true,
        }
    }
}

/// Append-only file writer, flushed after every write.
#[derive(Clone)]
pub struct LogFileWriter {
    inner: Arc<Mutex<BufWriter<File>>>,
}

impl LogFileWriter {
    pub fn new(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            inner: Arc::new(Mutex::new(BufWriter::with_capacity(8192, file))),
        })
    }
}

impl Write for LogFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self.inner.lock();
        let written = guard.write(buf)?;
        guard.flush()?;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.lock().flush()
    }
}

impl<'a> MakeWriter<'a> for LogFileWriter {
    type Writer = LogFileWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Build the filter from `RUST_LOG` if set, else from `default_level`.
fn build_filter(rust_log: Option<&str>, default_level: &str) -> ConfigResult<EnvFilter> {
    let directives = rust_log
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(default_level);
    EnvFilter::try_new(directives)
        .map_err(|e| ConfigError::Logging(format!("invalid log filter {directives:?}: {e}")))
}

/// Install the global subscriber.
///
/// Fails if the filter is invalid, the log file cannot be opened, or a
/// subscriber is already installed.
pub fn init_logging(config: &LogConfig) -> ConfigResult<()> {
    let rust_log = std::env::var("RUST_LOG").ok();
    let filter = build_filter(rust_log.as_deref(), &config.default_level)?;

    let file_layer = match &config.log_path {
        Some(path) => {
            let writer = LogFileWriter::new(path)?;
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_span_list(false)
                    .with_writer(writer),
            )
        }
        None => None,
    };

    let stderr_layer = config.stderr.then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_file(false)
            .with_line_number(false)
            .compact()
            .with_writer(io::stderr)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .map_err(|e| ConfigError::Logging(e.to_string()))?;

    tracing::debug!(
        log_path = ?config.log_path,
        "Logging initialized"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::tempdir;

    #[test]
    fn test_log_file_writer_appends_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("logs").join("test.jsonl");

        let mut writer = LogFileWriter::new(&path).unwrap();
        writer.write_all(b"first\n").unwrap();
        drop(writer);

        let mut writer = LogFileWriter::new(&path).unwrap();
        writer.write_all(b"second\n").unwrap();

        let mut content = String::new();
        File::open(&path)
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "first\nsecond\n");
    }

    #[test]
    fn test_writer_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("deeply").join("nested").join("test.jsonl");

        assert!(LogFileWriter::new(&path).is_ok());
        assert!(path.parent().unwrap().exists());
    }

    #[test]
    fn test_build_filter_prefers_rust_log() {
        assert!(build_filter(Some("debug"), "info").is_ok());
        assert!(build_filter(None, "sheet_sync_reconciler=trace,info").is_ok());
        // Blank RUST_LOG falls back to the default
        assert!(build_filter(Some("  "), "warn").is_ok());
    }

    #[test]
    fn test_build_filter_rejects_bad_level() {
        let err = build_filter(None, "sheet_sync=loud").unwrap_err();
        assert!(matches!(err, ConfigError::Logging(_)));
    }

    #[test]
    fn test_second_init_fails() {
        let config = LogConfig {
            stderr: false,
            ..Default::default()
        };
        let _ = init_logging(&config);
        assert!(init_logging(&config).is_err());
    }
}

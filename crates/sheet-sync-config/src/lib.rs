//! Configuration, file system paths, and logging for the sheet sync tools.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{
    BackoffKind, Config, ReconcilerSettings, DEFAULT_LOG_LEVEL, DEFAULT_REQUEST_TIMEOUT_MS,
};
pub use error::{ConfigError, ConfigResult};
pub use logging::{init_logging, LogConfig, LogFileWriter};
pub use paths::Paths;

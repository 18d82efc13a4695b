//! Configuration management for the sheet sync tools.

use crate::{ConfigError, ConfigResult, Paths};
use serde::{Deserialize, Serialize};
use sheet_sync_reconciler::{
    Backoff, CreateSnapshotPolicy, ReconcilerConfig, RetryPolicy, DEFAULT_BASE_DELAY,
    DEFAULT_DRAIN_CAP, DEFAULT_HEALTH_CHECK_TTL, DEFAULT_IDLE_DRAIN_INTERVAL,
    DEFAULT_MAX_ATTEMPTS, DEFAULT_TASK_PACING,
};
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default per-request timeout for the HTTP adapters.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

/// Default cap for exponential backoff.
const DEFAULT_MAX_DELAY_MS: u64 = 30_000;

const ENV_LOG_LEVEL: &str = "CAMPUS_SYNC_LOG_LEVEL";
const ENV_STORE_URL: &str = "CAMPUS_SYNC_STORE_URL";
const ENV_STORE_KEY: &str = "CAMPUS_SYNC_STORE_KEY";
const ENV_SHEETS_URL: &str = "CAMPUS_SYNC_SHEETS_URL";
const ENV_SHEETS_TOKEN: &str = "CAMPUS_SYNC_SHEETS_TOKEN";

/// Main configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Hosted data API URL.
    #[serde(default)]
    pub store_url: Option<String>,
    /// Data API service key.
    #[serde(default)]
    pub store_key: Option<String>,
    /// Spreadsheet backend base URL.
    #[serde(default)]
    pub sheets_url: Option<String>,
    /// Bearer token for the spreadsheet backend.
    #[serde(default)]
    pub sheets_token: Option<String>,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Also write JSONL logs to `~/.campus-sync/logs/reconciler.jsonl`.
    #[serde(default)]
    pub log_to_file: bool,
    #[serde(default)]
    pub reconciler: ReconcilerSettings,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            store_url: None,
            store_key: None,
            sheets_url: None,
            sheets_token: None,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            log_to_file: false,
            reconciler: ReconcilerSettings::default(),
        }
    }
}

impl Config {
    /// Load configuration from the config file, falling back to defaults,
    /// then apply environment overrides.
    pub fn load(paths: &Paths) -> ConfigResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.apply_env(|name| std::env::var(name).ok());

        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the config file.
    pub fn save(&self, paths: &Paths) -> ConfigResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    /// Override settings from environment variables. Blank values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |name: &str| lookup(name).and_then(non_empty);

        if let Some(level) = var(ENV_LOG_LEVEL) {
            self.log_level = level;
        }
        if let Some(url) = var(ENV_STORE_URL) {
            self.store_url = Some(url);
        }
        if let Some(key) = var(ENV_STORE_KEY) {
            self.store_key = Some(key);
        }
        if let Some(url) = var(ENV_SHEETS_URL) {
            self.sheets_url = Some(url);
        }
        if let Some(token) = var(ENV_SHEETS_TOKEN) {
            self.sheets_token = Some(token);
        }
    }

    /// The data API URL, parsed.
    pub fn store_url(&self) -> ConfigResult<Url> {
        required_url(self.store_url.as_deref(), ENV_STORE_URL)
    }

    /// The data API key.
    pub fn store_key(&self) -> ConfigResult<&str> {
        self.store_key
            .as_deref()
            .ok_or_else(|| ConfigError::Config(format!("store key is not set ({ENV_STORE_KEY})")))
    }

    /// The spreadsheet backend URL, parsed.
    pub fn sheets_url(&self) -> ConfigResult<Url> {
        required_url(self.sheets_url.as_deref(), ENV_SHEETS_URL)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Check every configured value without requiring optional ones.
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(url) = &self.store_url {
            Url::parse(url)?;
        }
        if let Some(url) = &self.sheets_url {
            Url::parse(url)?;
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::Config(
                "request_timeout_ms must be positive".to_string(),
            ));
        }
        self.reconciler.validate()
    }
}

fn required_url(raw: Option<&str>, env_name: &str) -> ConfigResult<Url> {
    let raw = raw.ok_or_else(|| ConfigError::Config(format!("{env_name} is not set")))?;
    Url::parse(raw).map_err(ConfigError::from)
}

fn non_empty(raw: String) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Delay schedule selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffKind {
    #[default]
    Linear,
    Exponential,
}

/// Reconciler tunables as stored in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerSettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub backoff: BackoffKind,
    /// Upper bound for exponential backoff.
    pub max_delay_ms: u64,
    pub task_pacing_ms: u64,
    pub drain_cap: usize,
    pub idle_drain_interval_ms: u64,
    /// `null` disables the backend health probe.
    pub health_check_ttl_ms: Option<u64>,
    pub create_snapshot: CreateSnapshotPolicy,
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: DEFAULT_BASE_DELAY.as_millis() as u64,
            backoff: BackoffKind::default(),
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            task_pacing_ms: DEFAULT_TASK_PACING.as_millis() as u64,
            drain_cap: DEFAULT_DRAIN_CAP,
            idle_drain_interval_ms: DEFAULT_IDLE_DRAIN_INTERVAL.as_millis() as u64,
            health_check_ttl_ms: Some(DEFAULT_HEALTH_CHECK_TTL.as_millis() as u64),
            create_snapshot: CreateSnapshotPolicy::default(),
        }
    }
}

impl ReconcilerSettings {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_attempts == 0 {
            return Err(ConfigError::Config(
                "reconciler.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.drain_cap == 0 {
            return Err(ConfigError::Config(
                "reconciler.drain_cap must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Convert into the reconciler's runtime config.
    pub fn to_reconciler_config(&self) -> ReconcilerConfig {
        let base = Duration::from_millis(self.base_delay_ms);
        let backoff = match self.backoff {
            BackoffKind::Linear => Backoff::Linear { base },
            BackoffKind::Exponential => Backoff::Exponential {
                base,
                max: Duration::from_millis(self.max_delay_ms),
            },
        };

        ReconcilerConfig {
            retry: RetryPolicy {
                max_attempts: self.max_attempts,
                backoff,
            },
            task_pacing: Duration::from_millis(self.task_pacing_ms),
            drain_cap: self.drain_cap,
            idle_drain_interval: Duration::from_millis(self.idle_drain_interval_ms),
            health_check_ttl: self.health_check_ttl_ms.map(Duration::from_millis),
            create_snapshot: self.create_snapshot,
        }
    }
}

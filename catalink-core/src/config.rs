//! Runtime settings.
//!
//! Settings come from a `KEY="value"` file, with process environment
//! variables of the same name taking precedence. The loaded snapshot is
//! immutable; [`ConfigSource`] republishes a fresh snapshot on reload.

use crate::error::{CoreError, Result};
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

pub const DEFAULT_CONFIG_PATH: &str = "./config.ini";
pub const DEFAULT_WHITELIST_PATH: &str = "./whitelist";

pub const CRAWLING_INTERVAL: &str = "CRAWLING_INTERVAL";
pub const MONITOR_INTERVAL: &str = "MONITOR_INTERVAL";
pub const GRAPHDB_READ_URL: &str = "GRAPHDB_READ_URL";
pub const GRAPHDB_INSERT_URL: &str = "GRAPHDB_INSERT_URL";
pub const WHITELIST_PATH: &str = "WHITELIST_PATH";
pub const NATS_URL: &str = "NATS_URL";
pub const HTTP_TIMEOUT: &str = "HTTP_TIMEOUT";
pub const ERROR_COOLDOWN: &str = "ERROR_COOLDOWN";
pub const SKIP_UNCHANGED: &str = "SKIP_UNCHANGED";
pub const VERIFY_EXISTING: &str = "VERIFY_EXISTING";

const KEYS: [&str; 10] = [
    CRAWLING_INTERVAL,
    MONITOR_INTERVAL,
    GRAPHDB_READ_URL,
    GRAPHDB_INSERT_URL,
    WHITELIST_PATH,
    NATS_URL,
    HTTP_TIMEOUT,
    ERROR_COOLDOWN,
    SKIP_UNCHANGED,
    VERIFY_EXISTING,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub crawling_interval: Duration,
    pub monitor_interval: Duration,
    pub graphdb_read_url: String,
    pub graphdb_insert_url: String,
    pub whitelist_path: PathBuf,
    pub nats_url: Option<String>,
    pub http_timeout: Duration,
    pub error_cooldown: Duration,
    pub skip_unchanged: bool,
    pub verify_existing: bool,
}

impl Settings {
    /// Defaults for everything except the two graph store URLs.
    pub fn new(graphdb_read_url: impl Into<String>, graphdb_insert_url: impl Into<String>) -> Self {
        Self {
            crawling_interval: Duration::from_secs(3600),
            monitor_interval: Duration::from_secs(10),
            graphdb_read_url: graphdb_read_url.into(),
            graphdb_insert_url: graphdb_insert_url.into(),
            whitelist_path: PathBuf::from(DEFAULT_WHITELIST_PATH),
            nats_url: None,
            http_timeout: Duration::from_secs(30),
            error_cooldown: Duration::from_secs(60),
            skip_unchanged: false,
            verify_existing: false,
        }
    }

    pub fn with_crawling_interval(mut self, interval: Duration) -> Self {
        self.crawling_interval = interval;
        self
    }

    pub fn with_monitor_interval(mut self, interval: Duration) -> Self {
        self.monitor_interval = interval;
        self
    }

    pub fn with_error_cooldown(mut self, cooldown: Duration) -> Self {
        self.error_cooldown = cooldown;
        self
    }

    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    pub fn with_whitelist_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.whitelist_path = path.into();
        self
    }

    pub fn with_nats_url(mut self, url: impl Into<String>) -> Self {
        self.nats_url = Some(url.into());
        self
    }

    /// Load from `path`, then apply environment overrides.
    ///
    /// A missing file is not an error as long as the environment supplies
    /// the required keys.
    pub fn load(path: &Path) -> Result<Self> {
        let file_values = read_config_file(path)?;
        Self::resolve(&file_values, |key| env::var(key).ok())
    }

    /// Merge file values with overrides from `lookup` and validate.
    pub fn resolve<F>(file_values: &HashMap<String, String>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut values: HashMap<&'static str, String> = HashMap::new();
        for key in KEYS {
            if let Some(value) = lookup(key).or_else(|| file_values.get(key).cloned()) {
                values.insert(key, value);
            }
        }

        let required = |key: &'static str| -> Result<String> {
            values
                .get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or(CoreError::MissingSetting(key))
        };

        let mut settings = Self::new(required(GRAPHDB_READ_URL)?, required(GRAPHDB_INSERT_URL)?);

        if let Some(v) = values.get(CRAWLING_INTERVAL) {
            settings.crawling_interval = parse_seconds(CRAWLING_INTERVAL, v)?;
        }
        if let Some(v) = values.get(MONITOR_INTERVAL) {
            settings.monitor_interval = parse_positive_seconds(MONITOR_INTERVAL, v)?;
        }
        if let Some(v) = values.get(HTTP_TIMEOUT) {
            settings.http_timeout = parse_positive_seconds(HTTP_TIMEOUT, v)?;
        }
        if let Some(v) = values.get(ERROR_COOLDOWN) {
            settings.error_cooldown = parse_seconds(ERROR_COOLDOWN, v)?;
        }
        if let Some(v) = values.get(WHITELIST_PATH).filter(|v| !v.trim().is_empty()) {
            settings.whitelist_path = PathBuf::from(v.trim());
        }
        settings.nats_url = values
            .get(NATS_URL)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        if let Some(v) = values.get(SKIP_UNCHANGED) {
            settings.skip_unchanged = parse_bool(SKIP_UNCHANGED, v)?;
        }
        if let Some(v) = values.get(VERIFY_EXISTING) {
            settings.verify_existing = parse_bool(VERIFY_EXISTING, v)?;
        }

        Ok(settings)
    }
}

/// Read `KEY="value"` pairs. A missing file yields no values.
pub fn read_config_file(path: &Path) -> Result<HashMap<String, String>> {
    let iter = match dotenvy::from_path_iter(path) {
        Ok(iter) => iter,
        Err(e) if e.not_found() => {
            warn!("Config file {} not found, using environment only", path.display());
            return Ok(HashMap::new());
        }
        Err(source) => {
            return Err(CoreError::ConfigFile {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let mut values = HashMap::new();
    for item in iter {
        let (key, value) = item.map_err(|source| CoreError::ConfigFile {
            path: path.to_path_buf(),
            source,
        })?;
        values.insert(key, value);
    }
    debug!("Read {} key(s) from {}", values.len(), path.display());
    Ok(values)
}

fn parse_seconds(key: &'static str, value: &str) -> Result<Duration> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|e| CoreError::InvalidSetting {
            key,
            value: value.to_string(),
            reason: e.to_string(),
        })
}

fn parse_positive_seconds(key: &'static str, value: &str) -> Result<Duration> {
    let duration = parse_seconds(key, value)?;
    if duration.is_zero() {
        return Err(CoreError::InvalidSetting {
            key,
            value: value.to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(duration)
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" | "" => Ok(false),
        _ => Err(CoreError::InvalidSetting {
            key,
            value: value.to_string(),
            reason: "expected true or false".to_string(),
        }),
    }
}

/// Owner of the live settings snapshot.
///
/// Loops hold a [`watch::Receiver`] and read the latest value at the top of
/// every iteration.
pub struct ConfigSource {
    path: Option<PathBuf>,
    tx: watch::Sender<Settings>,
}

impl ConfigSource {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let settings = Settings::load(&path)?;
        info!("Loaded settings from {}", path.display());
        let (tx, _) = watch::channel(settings);
        Ok(Self { path: Some(path), tx })
    }

    /// A source with fixed settings and nothing to reload from.
    pub fn fixed(settings: Settings) -> Self {
        let (tx, _) = watch::channel(settings);
        Self { path: None, tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<Settings> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> Settings {
        self.tx.borrow().clone()
    }

    /// Replace the live settings. Receivers see the new value on their next read.
    pub fn replace(&self, settings: Settings) {
        self.tx.send_replace(settings);
    }

    /// Re-read the config file. On failure the previous settings stay live.
    pub fn reload(&self) -> Result<()> {
        let Some(path) = &self.path else {
            debug!("No config file to reload");
            return Ok(());
        };

        match Settings::load(path) {
            Ok(settings) => {
                if settings != *self.tx.borrow() {
                    info!("Settings reloaded from {}", path.display());
                }
                self.tx.send_replace(settings);
                Ok(())
            }
            Err(e) => {
                error!("Reload of {} failed, keeping previous settings: {}", path.display(), e);
                Err(e)
            }
        }
    }
}

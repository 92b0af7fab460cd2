//! Tile source configuration.
//!
//! # File format
//!
//! ```ini
//! [source]
//! max_concurrent_loads = 8
//! min_backoff_ms = 1000
//! max_backoff_ms = 32000
//! priority_buckets = 20
//! ```
//!
//! Every key is optional; missing keys keep their defaults. Other sections
//! are ignored so the file can be shared with an application config.

use std::path::Path;
use std::time::Duration;

use ini::Ini;

use crate::error::ConfigError;

/// Default cap on concurrently dispatched loader tasks.
pub const DEFAULT_MAX_CONCURRENT_LOADS: usize = 8;

/// Default delay before the first retry of a failed tile.
pub const DEFAULT_MIN_BACKOFF_MS: u64 = 1000;

/// Default upper bound of the retry delay.
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 32_000;

/// Default number of priority buckets per zoom level.
pub const DEFAULT_PRIORITY_BUCKETS: u32 = 20;

const SECTION: &str = "source";

/// Tunables of a [`crate::source::TileSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    /// Maximum number of loader tasks in flight at once.
    pub max_concurrent_loads: usize,
    /// Retry delay after the first failure.
    pub min_backoff: Duration,
    /// Retry delay cap.
    pub max_backoff: Duration,
    /// Distance buckets per zoom level.
    pub priority_buckets: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            max_concurrent_loads: DEFAULT_MAX_CONCURRENT_LOADS,
            min_backoff: Duration::from_millis(DEFAULT_MIN_BACKOFF_MS),
            max_backoff: Duration::from_millis(DEFAULT_MAX_BACKOFF_MS),
            priority_buckets: DEFAULT_PRIORITY_BUCKETS,
        }
    }
}

impl SourceConfig {
    /// Set the concurrency cap.
    pub fn with_max_concurrent_loads(mut self, max: usize) -> Self {
        self.max_concurrent_loads = max;
        self
    }

    /// Set the minimum and maximum retry delay.
    pub fn with_backoff(mut self, min: Duration, max: Duration) -> Self {
        self.min_backoff = min;
        self.max_backoff = max;
        self
    }

    /// Set the number of priority buckets per zoom level.
    pub fn with_priority_buckets(mut self, buckets: u32) -> Self {
        self.priority_buckets = buckets;
        self
    }

    /// Checks the invariants the loading state relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent_loads == 0 {
            return Err(invalid("max_concurrent_loads", "must be at least 1"));
        }
        if self.priority_buckets == 0 {
            return Err(invalid("priority_buckets", "must be at least 1"));
        }
        if self.min_backoff.is_zero() {
            return Err(invalid("min_backoff_ms", "must be greater than 0"));
        }
        if self.min_backoff > self.max_backoff {
            return Err(invalid(
                "max_backoff_ms",
                format!(
                    "must not be below min_backoff_ms ({} < {})",
                    self.max_backoff.as_millis(),
                    self.min_backoff.as_millis()
                ),
            ));
        }
        Ok(())
    }

    /// Loads and validates a configuration file.
    pub fn from_ini_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_ini_str(&content)
    }

    /// Parses and validates configuration from INI text.
    pub fn from_ini_str(content: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let mut config = Self::default();

        if let Some(section) = ini.section(Some(SECTION)) {
            if let Some(value) = section.get("max_concurrent_loads") {
                config.max_concurrent_loads = parse_number("max_concurrent_loads", value)?;
            }
            if let Some(value) = section.get("min_backoff_ms") {
                config.min_backoff = Duration::from_millis(parse_number("min_backoff_ms", value)?);
            }
            if let Some(value) = section.get("max_backoff_ms") {
                config.max_backoff = Duration::from_millis(parse_number("max_backoff_ms", value)?);
            }
            if let Some(value) = section.get("priority_buckets") {
                config.priority_buckets = parse_number("priority_buckets", value)?;
            }
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse_number<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| invalid(key, format!("'{}': {}", value, e)))
}

fn invalid(key: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key,
        reason: reason.into(),
    }
}

//! Store configuration.
//!
//! # Responsibility
//! - Describe which engine and database a store connects to.
//! - Carry pool sizing and the table prefix.
//! - Load from a JSON file and apply `ROWKEEPER_*` environment overrides.
//!
//! # Invariants
//! - `table_prefix` never contains underscores once normalized.
//! - `pool.max_idle` never exceeds `pool.max_open` after normalization.

use crate::db::Engine;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_ENGINE: &str = "ROWKEEPER_DB_ENGINE";
pub const ENV_URL: &str = "ROWKEEPER_DB_URL";
pub const ENV_PREFIX: &str = "ROWKEEPER_TABLE_PREFIX";
pub const ENV_MAX_OPEN: &str = "ROWKEEPER_POOL_MAX_OPEN";
pub const ENV_MAX_IDLE: &str = "ROWKEEPER_POOL_MAX_IDLE";
pub const ENV_MAX_LIFETIME_SECS: &str = "ROWKEEPER_POOL_MAX_LIFETIME_SECS";
pub const ENV_VERBOSE: &str = "ROWKEEPER_VERBOSE";

pub const DEFAULT_TABLE_PREFIX: &str = "rprj";

/// In-memory SQLite URL.
pub const MEMORY_URL: &str = ":memory:";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub max_open: u32,
    pub max_idle: u32,
    /// Connection lifetime in seconds; `0` keeps connections forever.
    pub max_lifetime_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_open: 25,
            max_idle: 10,
            max_lifetime_secs: 0,
        }
    }
}

impl PoolConfig {
    pub fn max_lifetime(&self) -> Option<Duration> {
        match self.max_lifetime_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub engine: Engine,
    /// SQLite file path (optionally `sqlite://`-prefixed) or `:memory:`.
    pub url: String,
    pub table_prefix: String,
    pub pool: PoolConfig,
    pub busy_timeout_ms: u64,
    /// Logs every generated statement with its parameters at debug level.
    pub verbose: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            engine: Engine::Sqlite,
            url: MEMORY_URL.to_string(),
            table_prefix: DEFAULT_TABLE_PREFIX.to_string(),
            pool: PoolConfig::default(),
            busy_timeout_ms: 30_000,
            verbose: false,
        }
    }
}

impl StoreConfig {
    pub fn sqlite(url: impl Into<String>, prefix: &str) -> Self {
        Self {
            url: url.into(),
            table_prefix: normalize_prefix(prefix),
            ..Self::default()
        }
    }

    pub fn sqlite_in_memory(prefix: &str) -> Self {
        Self::sqlite(MEMORY_URL, prefix)
    }

    /// Loads a JSON config file. Missing fields keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Self = serde_json::from_str(&raw).map_err(ConfigError::Parse)?;
        config.normalize()?;
        Ok(config)
    }

    /// Applies `ROWKEEPER_*` variables from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary key lookup.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(value) = lookup(ENV_ENGINE) {
            self.engine = value
                .parse()
                .map_err(|_| ConfigError::invalid(ENV_ENGINE, &value))?;
        }
        if let Some(value) = lookup(ENV_URL) {
            self.url = value;
        }
        if let Some(value) = lookup(ENV_PREFIX) {
            self.table_prefix = value;
        }
        if let Some(value) = lookup(ENV_MAX_OPEN) {
            self.pool.max_open = parse_number(ENV_MAX_OPEN, &value)?;
        }
        if let Some(value) = lookup(ENV_MAX_IDLE) {
            self.pool.max_idle = parse_number(ENV_MAX_IDLE, &value)?;
        }
        if let Some(value) = lookup(ENV_MAX_LIFETIME_SECS) {
            self.pool.max_lifetime_secs = parse_number(ENV_MAX_LIFETIME_SECS, &value)?;
        }
        if let Some(value) = lookup(ENV_VERBOSE) {
            self.verbose = matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }
        self.normalize()
    }

    /// Strips underscores from the prefix and validates pool sizing.
    pub fn normalize(&mut self) -> Result<(), ConfigError> {
        self.table_prefix = normalize_prefix(&self.table_prefix);
        if !self
            .table_prefix
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric())
        {
            return Err(ConfigError::invalid("table_prefix", &self.table_prefix));
        }
        if self.pool.max_open == 0 {
            return Err(ConfigError::invalid("pool.max_open", "0"));
        }
        self.pool.max_idle = self.pool.max_idle.min(self.pool.max_open);
        Ok(())
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    pub fn is_in_memory(&self) -> bool {
        self.url.trim() == MEMORY_URL
    }

    /// Filesystem path of a SQLite database.
    pub fn sqlite_path(&self) -> &str {
        let url = self.url.trim();
        url.strip_prefix("sqlite3://")
            .or_else(|| url.strip_prefix("sqlite://"))
            .unwrap_or(url)
    }
}

pub fn normalize_prefix(prefix: &str) -> String {
    prefix.trim().replace('_', "")
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::invalid(key, value))
}

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(serde_json::Error),
    InvalidValue {
        key: String,
        value: String,
    },
}

impl ConfigError {
    fn invalid(key: &str, value: &str) -> Self {
        Self::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config json: {err}"),
            Self::InvalidValue { key, value } => {
                write!(f, "invalid config value for `{key}`: `{value}`")
            }
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::InvalidValue { .. } => None,
        }
    }
}

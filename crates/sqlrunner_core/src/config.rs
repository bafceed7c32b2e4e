//! Runner configuration.
//!
//! # Responsibility
//! - Describe pool sizing, timeouts and connection pragmas in one place.
//! - Load settings from `SQLRUNNER_*` environment variables or a JSON file,
//!   falling back to defaults for anything unset.
//!
//! # Invariants
//! - `max_pool_size >= 1` and `min_idle <= max_pool_size` after `validate()`.
//! - Invalid values are reported with the offending key; they never fall back
//!   silently to the default.

use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const ENV_DB_PATH: &str = "SQLRUNNER_DB_PATH";
pub const ENV_POOL_SIZE: &str = "SQLRUNNER_POOL_SIZE";
pub const ENV_MIN_IDLE: &str = "SQLRUNNER_MIN_IDLE";
pub const ENV_CONNECTION_TIMEOUT_MS: &str = "SQLRUNNER_CONNECTION_TIMEOUT_MS";
pub const ENV_IDLE_TIMEOUT_MS: &str = "SQLRUNNER_IDLE_TIMEOUT_MS";
pub const ENV_BUSY_TIMEOUT_MS: &str = "SQLRUNNER_BUSY_TIMEOUT_MS";
pub const ENV_FOREIGN_KEYS: &str = "SQLRUNNER_FOREIGN_KEYS";
pub const ENV_STATEMENT_CACHE: &str = "SQLRUNNER_STATEMENT_CACHE";
pub const ENV_TRANSACTION_MODE: &str = "SQLRUNNER_TRANSACTION_MODE";

const DEFAULT_DB_FILE_NAME: &str = "sqlrunner.sqlite3";

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue {
        key: String,
        value: String,
        message: String,
    },
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue {
                key,
                value,
                message,
            } => write!(f, "invalid value `{value}` for {key}: {message}"),
            Self::Invalid(message) => write!(f, "invalid runner configuration: {message}"),
        }
    }
}

impl Error for ConfigError {}

/// How the runner opens the transaction wrapping a script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionMode {
    Deferred,
    /// Takes the write lock up front so concurrent scripts queue on the busy
    /// handler instead of failing mid-script on lock upgrade.
    #[default]
    Immediate,
    Exclusive,
}

impl TransactionMode {
    pub fn begin_sql(self) -> &'static str {
        match self {
            Self::Deferred => "BEGIN DEFERRED",
            Self::Immediate => "BEGIN IMMEDIATE",
            Self::Exclusive => "BEGIN EXCLUSIVE",
        }
    }
}

impl FromStr for TransactionMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "deferred" => Ok(Self::Deferred),
            "immediate" => Ok(Self::Immediate),
            "exclusive" => Ok(Self::Exclusive),
            other => Err(format!(
                "unsupported transaction mode `{other}`; expected deferred|immediate|exclusive"
            )),
        }
    }
}

/// Connection pool and execution settings for a [`crate::ScriptRunner`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// SQLite database file. Ignored by in-memory pools.
    pub database_path: PathBuf,
    pub max_pool_size: u32,
    pub min_idle: u32,
    /// Upper bound on waiting for a free pooled connection.
    pub connection_timeout_ms: u64,
    pub idle_timeout_ms: u64,
    /// SQLite busy handler timeout applied to every connection.
    pub busy_timeout_ms: u64,
    pub foreign_keys: bool,
    /// Prepared statement cache size per connection.
    pub statement_cache_capacity: usize,
    pub transaction_mode: TransactionMode,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DB_FILE_NAME),
            max_pool_size: 10,
            min_idle: 2,
            connection_timeout_ms: 30_000,
            idle_timeout_ms: 30_000,
            busy_timeout_ms: 5_000,
            foreign_keys: true,
            statement_cache_capacity: 250,
            transaction_mode: TransactionMode::Immediate,
        }
    }
}

impl RunnerConfig {
    /// Default settings pointed at the given database file.
    pub fn with_database(path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: path.into(),
            ..Self::default()
        }
    }

    /// Reads `SQLRUNNER_*` variables from the process environment.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup; unset keys keep defaults.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup(ENV_DB_PATH) {
            let trimmed = path.trim();
            if trimmed.is_empty() {
                return Err(invalid(ENV_DB_PATH, &path, "path cannot be empty"));
            }
            config.database_path = PathBuf::from(trimmed);
        }
        if let Some(value) = lookup(ENV_POOL_SIZE) {
            config.max_pool_size = parse_number(ENV_POOL_SIZE, &value)?;
        }
        if let Some(value) = lookup(ENV_MIN_IDLE) {
            config.min_idle = parse_number(ENV_MIN_IDLE, &value)?;
        }
        if let Some(value) = lookup(ENV_CONNECTION_TIMEOUT_MS) {
            config.connection_timeout_ms = parse_number(ENV_CONNECTION_TIMEOUT_MS, &value)?;
        }
        if let Some(value) = lookup(ENV_IDLE_TIMEOUT_MS) {
            config.idle_timeout_ms = parse_number(ENV_IDLE_TIMEOUT_MS, &value)?;
        }
        if let Some(value) = lookup(ENV_BUSY_TIMEOUT_MS) {
            config.busy_timeout_ms = parse_number(ENV_BUSY_TIMEOUT_MS, &value)?;
        }
        if let Some(value) = lookup(ENV_FOREIGN_KEYS) {
            config.foreign_keys = parse_flag(ENV_FOREIGN_KEYS, &value)?;
        }
        if let Some(value) = lookup(ENV_STATEMENT_CACHE) {
            config.statement_cache_capacity = parse_number(ENV_STATEMENT_CACHE, &value)?;
        }
        if let Some(value) = lookup(ENV_TRANSACTION_MODE) {
            config.transaction_mode = value
                .parse()
                .map_err(|message: String| invalid(ENV_TRANSACTION_MODE, &value, &message))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Checks cross-field constraints.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_pool_size == 0 {
            return Err(ConfigError::Invalid(
                "max_pool_size must be at least 1".to_string(),
            ));
        }
        if self.min_idle > self.max_pool_size {
            return Err(ConfigError::Invalid(format!(
                "min_idle {} exceeds max_pool_size {}",
                self.min_idle, self.max_pool_size
            )));
        }
        Ok(())
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }

    /// `None` disables idle reaping.
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_ms > 0).then(|| Duration::from_millis(self.idle_timeout_ms))
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

fn parse_number<T>(key: &str, value: &str) -> ConfigResult<T>
where
    T: FromStr,
    T::Err: Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|err| invalid(key, value, &err.to_string()))
}

fn parse_flag(key: &str, value: &str) -> ConfigResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Ok(true),
        "0" | "false" | "off" | "no" => Ok(false),
        _ => Err(invalid(key, value, "expected true|false")),
    }
}

fn invalid(key: &str, value: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        message: message.to_string(),
    }
}

//! Transactional SQL script runner over pooled SQLite connections.
//!
//! A script is split into statements, each statement receives its share of
//! one flat parameter list, and the whole script runs inside one transaction.
//! Row-producing statements come back as detached snapshots.

pub mod config;
pub mod db;
pub mod logging;
pub mod script;

pub use config::{ConfigError, ConfigResult, RunnerConfig, TransactionMode};
pub use db::migrations::{apply_migrations, Migration, MigrationError};
pub use db::{open_pool, open_pool_in_memory, ConnectionPool, ConnectionProvider, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status, LogLevel, LoggingError};
pub use rusqlite::types::Value;
pub use script::{
    allocate, count_placeholders, materialize, parse_script, split, ResultSnapshot, ScriptError,
    ScriptErrorKind, ScriptOutcome, ScriptResult, ScriptRunner, ScriptSource, SnapshotColumn,
    SnapshotRow, SqlValue, StatementOutput, StatementUnit,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

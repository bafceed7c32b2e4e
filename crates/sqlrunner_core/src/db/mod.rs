//! SQLite connection pooling and schema bootstrap entry points.
//!
//! # Responsibility
//! - Open pooled SQLite connections configured for script execution.
//! - Expose the acquisition seam the script runner depends on.
//! - Apply versioned schema scripts in deterministic order.
//!
//! # Invariants
//! - Every pooled connection has its bootstrap pragmas applied before use.
//! - A checked-out handle is owned by exactly one caller and returned to the
//!   pool when dropped.

use crate::config::ConfigError;
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::ops::Deref;

pub mod migrations;
mod pool;

pub use pool::{
    open_pool, open_pool_in_memory, ConnectionManager, ConnectionPool, PooledConnection,
};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    Config(ConfigError),
    /// The pool could not hand out a connection (timeout or failed connect).
    Pool(r2d2::Error),
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::Config(err) => write!(f, "{err}"),
            Self::Pool(err) => write!(f, "connection pool error: {err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "database schema version {db_version} is newer than supported {latest_supported}"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Config(err) => Some(err),
            Self::Pool(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<ConfigError> for DbError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<r2d2::Error> for DbError {
    fn from(value: r2d2::Error) -> Self {
        Self::Pool(value)
    }
}

/// Source of exclusive, scoped database connections.
///
/// The returned handle must give the connection back when dropped; the runner
/// relies on that for release on every exit path. A handle can come back with
/// a transaction still open when its rollback failed; implementations must not
/// hand such a connection out again as-is.
pub trait ConnectionProvider: Send + Sync {
    type Handle: Deref<Target = Connection>;

    fn acquire(&self) -> DbResult<Self::Handle>;
}

impl ConnectionProvider for ConnectionPool {
    type Handle = PooledConnection;

    fn acquire(&self) -> DbResult<PooledConnection> {
        Ok(self.get()?)
    }
}

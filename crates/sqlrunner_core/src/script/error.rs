//! Script execution error taxonomy.
//!
//! # Invariants
//! - Statement-level failures carry the zero-based statement index and text.
//! - A failed rollback never hides the failure that triggered it: the original
//!   error is the `source()` of [`ScriptError::RollbackFailed`].

use crate::db::DbError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub type ScriptResult<T> = Result<T, ScriptError>;

/// Coarse failure class, independent of where exactly the failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptErrorKind {
    /// Script text could not be read or a statement could not be compiled.
    Load,
    /// Binding, execution or commit failed.
    Execution,
    /// Reading result rows failed.
    Materialization,
    /// Rolling back after an earlier failure failed.
    Rollback,
    /// No connection or transaction could be obtained.
    Resource,
}

#[derive(Debug)]
pub enum ScriptError {
    Load {
        path: PathBuf,
        source: std::io::Error,
    },
    Acquire(DbError),
    Prepare {
        index: usize,
        sql: String,
        source: rusqlite::Error,
    },
    Execute {
        index: usize,
        sql: String,
        source: rusqlite::Error,
    },
    Materialize {
        index: usize,
        sql: String,
        source: rusqlite::Error,
    },
    Commit(rusqlite::Error),
    RollbackFailed {
        cause: Box<ScriptError>,
        rollback: rusqlite::Error,
    },
}

impl ScriptError {
    pub fn kind(&self) -> ScriptErrorKind {
        match self {
            Self::Load { .. } | Self::Prepare { .. } => ScriptErrorKind::Load,
            Self::Execute { .. } | Self::Commit(_) => ScriptErrorKind::Execution,
            Self::Materialize { .. } => ScriptErrorKind::Materialization,
            Self::RollbackFailed { .. } => ScriptErrorKind::Rollback,
            Self::Acquire(_) => ScriptErrorKind::Resource,
        }
    }

    /// Index of the failing statement, looking through a failed rollback.
    pub fn statement_index(&self) -> Option<usize> {
        match self {
            Self::Prepare { index, .. }
            | Self::Execute { index, .. }
            | Self::Materialize { index, .. } => Some(*index),
            Self::RollbackFailed { cause, .. } => cause.statement_index(),
            Self::Load { .. } | Self::Acquire(_) | Self::Commit(_) => None,
        }
    }

    /// Driver error behind the failure, looking through a failed rollback.
    pub fn sqlite_error(&self) -> Option<&rusqlite::Error> {
        match self {
            Self::Prepare { source, .. }
            | Self::Execute { source, .. }
            | Self::Materialize { source, .. }
            | Self::Commit(source) => Some(source),
            Self::Acquire(DbError::Sqlite(source)) => Some(source),
            Self::RollbackFailed { cause, .. } => cause.sqlite_error(),
            Self::Load { .. } | Self::Acquire(_) => None,
        }
    }

    /// The SQLite result code, when the failure came from SQLite itself.
    pub fn sqlite_code(&self) -> Option<rusqlite::ErrorCode> {
        self.sqlite_error().and_then(rusqlite::Error::sqlite_error_code)
    }

    pub fn rollback_error(&self) -> Option<&rusqlite::Error> {
        match self {
            Self::RollbackFailed { rollback, .. } => Some(rollback),
            _ => None,
        }
    }
}

impl Display for ScriptError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Load { path, source } => {
                write!(f, "failed to read SQL script `{}`: {source}", path.display())
            }
            Self::Acquire(err) => write!(f, "could not obtain a database connection: {err}"),
            Self::Prepare { index, sql, source } => {
                write!(f, "statement {index} could not be prepared (`{sql}`): {source}")
            }
            Self::Execute { index, sql, source } => {
                write!(f, "statement {index} failed (`{sql}`): {source}")
            }
            Self::Materialize { index, sql, source } => {
                write!(f, "reading results of statement {index} failed (`{sql}`): {source}")
            }
            Self::Commit(source) => write!(f, "commit failed: {source}"),
            Self::RollbackFailed { cause, rollback } => {
                write!(f, "rollback failed ({rollback}) after: {cause}")
            }
        }
    }
}

impl Error for ScriptError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Load { source, .. } => Some(source),
            Self::Acquire(err) => Some(err),
            Self::Prepare { source, .. }
            | Self::Execute { source, .. }
            | Self::Materialize { source, .. }
            | Self::Commit(source) => Some(source),
            Self::RollbackFailed { cause, .. } => Some(cause.as_ref()),
        }
    }
}

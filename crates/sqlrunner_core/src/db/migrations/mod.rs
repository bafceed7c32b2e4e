//! Versioned schema scripts applied through the script runner.
//!
//! # Responsibility
//! - Bring a database from its `PRAGMA user_version` up to the newest
//!   migration the caller knows.
//!
//! # Invariants
//! - Migration versions are strictly increasing and start above zero.
//! - A migration and its `user_version` bump commit together or not at all.
//! - Databases newer than the newest known migration are refused untouched.

use crate::db::{ConnectionProvider, DbError};
use crate::script::error::ScriptError;
use crate::script::runner::ScriptRunner;
use log::info;
use rusqlite::Connection;
use std::borrow::Cow;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    pub version: u32,
    pub sql: Cow<'static, str>,
}

impl Migration {
    pub const fn new(version: u32, sql: &'static str) -> Self {
        Self {
            version,
            sql: Cow::Borrowed(sql),
        }
    }
}

#[derive(Debug)]
pub enum MigrationError {
    /// Versions are not strictly increasing (or start at zero).
    OutOfOrder { previous: u32, next: u32 },
    Db(DbError),
    Script { version: u32, source: ScriptError },
}

impl Display for MigrationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OutOfOrder { previous, next } => write!(
                f,
                "migration {next} must come after {previous} and versions must increase"
            ),
            Self::Db(err) => write!(f, "{err}"),
            Self::Script { version, source } => write!(f, "migration {version} failed: {source}"),
        }
    }
}

impl Error for MigrationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::OutOfOrder { .. } => None,
            Self::Db(err) => Some(err),
            Self::Script { source, .. } => Some(source),
        }
    }
}

impl From<DbError> for MigrationError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for MigrationError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

pub fn latest_version(migrations: &[Migration]) -> u32 {
    migrations.last().map_or(0, |migration| migration.version)
}

pub fn current_version(conn: &Connection) -> rusqlite::Result<u32> {
    conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))
}

/// Applies every migration newer than the database's `user_version`.
///
/// Returns the schema version the database is at afterwards.
pub fn apply_migrations<P: ConnectionProvider>(
    runner: &ScriptRunner<P>,
    migrations: &[Migration],
) -> Result<u32, MigrationError> {
    check_order(migrations)?;

    let current = {
        let conn = runner.provider().acquire()?;
        current_version(&conn)?
    };
    let latest = latest_version(migrations);
    if current > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: current,
            latest_supported: latest,
        }
        .into());
    }

    for migration in migrations.iter().filter(|m| m.version > current) {
        let started_at = Instant::now();
        let script = format!(
            "{};\nPRAGMA user_version = {};",
            migration.sql.trim_end(),
            migration.version
        );
        runner
            .run_script(&script, [])
            .map_err(|source| MigrationError::Script {
                version: migration.version,
                source,
            })?;
        info!(
            "event=db_migrate module=db status=ok version={} duration_ms={}",
            migration.version,
            started_at.elapsed().as_millis()
        );
    }

    Ok(current.max(latest))
}

fn check_order(migrations: &[Migration]) -> Result<(), MigrationError> {
    let mut previous = 0;
    for migration in migrations {
        if migration.version <= previous {
            return Err(MigrationError::OutOfOrder {
                previous,
                next: migration.version,
            });
        }
        previous = migration.version;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{check_order, latest_version, Migration, MigrationError};

    #[test]
    fn latest_version_of_empty_list_is_zero() {
        assert_eq!(latest_version(&[]), 0);
        assert_eq!(
            latest_version(&[Migration::new(1, ""), Migration::new(4, "")]),
            4
        );
    }

    #[test]
    fn versions_must_strictly_increase() {
        assert!(check_order(&[Migration::new(1, ""), Migration::new(2, "")]).is_ok());
        assert!(matches!(
            check_order(&[Migration::new(2, ""), Migration::new(2, "")]),
            Err(MigrationError::OutOfOrder { previous: 2, next: 2 })
        ));
        assert!(matches!(
            check_order(&[Migration::new(0, "")]),
            Err(MigrationError::OutOfOrder { .. })
        ));
    }
}

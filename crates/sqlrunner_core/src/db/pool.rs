//! Pooled connection bootstrap for SQLite.
//!
//! # Responsibility
//! - Build file-backed or in-memory r2d2 pools from [`RunnerConfig`].
//! - Configure every new connection with the pragmas script execution needs.
//!
//! # Invariants
//! - Pooled connections have `foreign_keys` set as configured.
//! - Pooled connections have a busy timeout and statement cache capacity set.
//! - A connection still inside a transaction is never handed out again; it is
//!   closed instead, which makes SQLite roll the transaction back.

use super::DbResult;
use crate::config::RunnerConfig;
use log::{error, info, warn};
use r2d2::ManageConnection;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use std::time::{Duration, Instant};
use uuid::Uuid;

pub type ConnectionPool = r2d2::Pool<ConnectionManager>;
pub type PooledConnection = r2d2::PooledConnection<ConnectionManager>;

/// SQLite connection manager that retires connections left mid-transaction.
///
/// A script whose `ROLLBACK` failed returns its handle with the transaction
/// (and its write lock) still open. Such a connection is reported broken on
/// return, so r2d2 closes it and opens a fresh one. Checkout rolls back any
/// transaction still open and rejects the connection if that fails.
#[derive(Debug)]
pub struct ConnectionManager {
    inner: SqliteConnectionManager,
}

impl ConnectionManager {
    fn new(inner: SqliteConnectionManager) -> Self {
        Self { inner }
    }
}

impl ManageConnection for ConnectionManager {
    type Connection = Connection;
    type Error = rusqlite::Error;

    fn connect(&self) -> rusqlite::Result<Connection> {
        self.inner.connect()
    }

    fn is_valid(&self, conn: &mut Connection) -> rusqlite::Result<()> {
        if !conn.is_autocommit() {
            conn.execute_batch("ROLLBACK")?;
        }
        self.inner.is_valid(conn)
    }

    fn has_broken(&self, conn: &mut Connection) -> bool {
        if conn.is_autocommit() {
            return self.inner.has_broken(conn);
        }
        warn!("event=db_pool_discard module=db status=ok reason=open_transaction");
        true
    }
}

/// Opens a pool over the database file named by `config.database_path`.
///
/// # Errors
/// - [`DbError::Config`](super::DbError::Config) when `config` fails
///   validation; no connection is attempted.
/// - [`DbError::Pool`](super::DbError::Pool) when the initial connections
///   cannot be established within `connection_timeout_ms`.
///
/// # Side effects
/// - Establishes `min_idle` connections before returning.
/// - Emits `db_pool_open` logging events with duration and status.
pub fn open_pool(config: &RunnerConfig) -> DbResult<ConnectionPool> {
    let manager = SqliteConnectionManager::file(&config.database_path);
    build_pool(manager, config, config.min_idle, "file")
}

/// Opens a pool over a private shared-cache in-memory database.
///
/// All connections of the returned pool see the same database, which lives as
/// long as the pool keeps at least one connection open. Shared-cache locking
/// fails fast instead of waiting on the busy handler, so this is meant for
/// tests and single-caller tools.
pub fn open_pool_in_memory(config: &RunnerConfig) -> DbResult<ConnectionPool> {
    let uri = format!(
        "file:sqlrunner-{}?mode=memory&cache=shared",
        Uuid::new_v4().simple()
    );
    let manager = SqliteConnectionManager::file(uri);
    build_pool(manager, config, config.min_idle.max(1), "memory")
}

fn build_pool(
    manager: SqliteConnectionManager,
    config: &RunnerConfig,
    min_idle: u32,
    mode: &str,
) -> DbResult<ConnectionPool> {
    config.validate()?;

    let started_at = Instant::now();
    info!(
        "event=db_pool_open module=db status=start mode={} max_size={} min_idle={}",
        mode, config.max_pool_size, min_idle
    );

    let foreign_keys = config.foreign_keys;
    let busy_timeout = config.busy_timeout();
    let cache_capacity = config.statement_cache_capacity;
    let manager = ConnectionManager::new(manager.with_init(move |conn| {
        bootstrap_connection(conn, foreign_keys, busy_timeout, cache_capacity)
    }));

    let built = r2d2::Pool::builder()
        .max_size(config.max_pool_size)
        .min_idle(Some(min_idle.min(config.max_pool_size)))
        .connection_timeout(config.connection_timeout())
        .idle_timeout(config.idle_timeout())
        .build(manager);

    match built {
        Ok(pool) => {
            info!(
                "event=db_pool_open module=db status=ok mode={} duration_ms={}",
                mode,
                started_at.elapsed().as_millis()
            );
            Ok(pool)
        }
        Err(err) => {
            error!(
                "event=db_pool_open module=db status=error mode={} duration_ms={} error_code=db_pool_failed error={}",
                mode,
                started_at.elapsed().as_millis(),
                err
            );
            Err(err.into())
        }
    }
}

fn bootstrap_connection(
    conn: &mut Connection,
    foreign_keys: bool,
    busy_timeout: Duration,
    cache_capacity: usize,
) -> rusqlite::Result<()> {
    conn.pragma_update(None, "foreign_keys", foreign_keys)?;
    conn.busy_timeout(busy_timeout)?;
    conn.set_prepared_statement_cache_capacity(cache_capacity);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{open_pool, open_pool_in_memory, ConnectionPool};
    use crate::config::RunnerConfig;
    use crate::db::DbError;
    use rusqlite::Connection;

    fn memory_pool(config: &RunnerConfig) -> ConnectionPool {
        open_pool_in_memory(config).expect("valid config should open an in-memory pool")
    }

    fn foreign_keys_enabled(conn: &Connection) -> i64 {
        conn.query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
            .expect("foreign_keys pragma should be readable")
    }

    #[test]
    fn pooled_connections_have_foreign_keys_enabled() {
        let pool = memory_pool(&RunnerConfig::default());
        let conn = pool.get().expect("idle connection should be available");
        assert_eq!(foreign_keys_enabled(&conn), 1);
    }

    #[test]
    fn foreign_keys_follow_config() {
        let pool = memory_pool(&RunnerConfig {
            foreign_keys: false,
            ..RunnerConfig::default()
        });
        let conn = pool.get().expect("idle connection should be available");
        assert_eq!(foreign_keys_enabled(&conn), 0);
    }

    #[test]
    fn in_memory_pool_connections_share_one_database() {
        let pool = memory_pool(&RunnerConfig::default());
        let first = pool.get().expect("first connection should be available");
        let second = pool.get().expect("second connection should be available");

        first
            .execute_batch("CREATE TABLE shared (id INTEGER PRIMARY KEY);")
            .expect("table creation should succeed");
        let count: i64 = second
            .query_row("SELECT COUNT(*) FROM shared;", [], |row| row.get(0))
            .expect("table created on another connection should be visible");
        assert_eq!(count, 0);
    }

    #[test]
    fn separate_in_memory_pools_are_isolated() {
        let first = memory_pool(&RunnerConfig::default());
        let second = memory_pool(&RunnerConfig::default());

        first
            .get()
            .expect("idle connection should be available")
            .execute_batch("CREATE TABLE only_here (id INTEGER);")
            .expect("table creation should succeed");
        let exists: i64 = second
            .get()
            .expect("idle connection should be available")
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE name = 'only_here');",
                [],
                |row| row.get(0),
            )
            .expect("schema lookup should succeed");
        assert_eq!(exists, 0);
    }

    #[test]
    fn invalid_config_is_rejected_before_connecting() {
        let config = RunnerConfig {
            max_pool_size: 0,
            ..RunnerConfig::default()
        };
        let err = open_pool_in_memory(&config).expect_err("zero pool size must be rejected");
        assert!(matches!(err, DbError::Config(_)));
    }

    #[test]
    fn connection_returned_mid_transaction_is_replaced() {
        let dir = tempfile::tempdir().expect("temp dir should be creatable");
        let config = RunnerConfig {
            max_pool_size: 1,
            min_idle: 1,
            ..RunnerConfig::with_database(dir.path().join("pool.db"))
        };
        let pool = open_pool(&config).expect("valid config should open a pool");

        let conn = pool.get().expect("idle connection should be available");
        conn.execute_batch(
            "CREATE TABLE t (id INTEGER); BEGIN IMMEDIATE; INSERT INTO t VALUES (1);",
        )
        .expect("fixture statements should run");
        drop(conn);

        let conn = pool
            .get()
            .expect("pool should replace the discarded connection");
        assert!(conn.is_autocommit());
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM t;", [], |row| row.get(0))
            .expect("table created before the transaction should exist");
        assert_eq!(count, 0);
    }

    #[test]
    fn file_pool_creates_database_file() {
        let dir = tempfile::tempdir().expect("temp dir should be creatable");
        let path = dir.path().join("pool.db");
        let pool = open_pool(&RunnerConfig::with_database(&path))
            .expect("valid config should open a pool");
        pool.get()
            .expect("idle connection should be available")
            .execute_batch("CREATE TABLE t (id INTEGER);")
            .expect("table creation should succeed");
        assert!(path.exists());
    }
}

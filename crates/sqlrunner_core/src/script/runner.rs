//! Transactional multi-statement script execution.
//!
//! # Responsibility
//! - Run every statement of a script inside one transaction on one pooled
//!   connection.
//! - Feed each statement its slice of the caller's flat argument list.
//! - Snapshot row-producing statements before the next statement runs.
//!
//! # Invariants
//! - All-or-nothing: the transaction commits only after every statement
//!   succeeded; any failure (commit included) rolls back.
//! - The connection is acquired once per call and released exactly once, on
//!   every exit path, by dropping its handle.
//! - Logs carry statement indexes and counts only, never SQL text or values.
//!
//! Scripts must not contain their own transaction control (`BEGIN`, `COMMIT`,
//! `ROLLBACK`); the runner owns the transaction.

use super::error::{ScriptError, ScriptResult};
use super::params::{allocate, required_parameters, ParameterBatch};
use super::snapshot::{materialize, ResultSnapshot};
use super::source::ScriptSource;
use super::splitter::{parse_script, StatementUnit};
use crate::config::{RunnerConfig, TransactionMode};
use crate::db::{
    open_pool, open_pool_in_memory, ConnectionPool, ConnectionProvider, DbError, DbResult,
};
use log::{debug, error, info, warn};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use serde::Serialize;
use std::time::Instant;

/// Result of one executed statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementOutput {
    /// The statement produced a row set.
    Rows(ResultSnapshot),
    /// The statement produced no rows; carries the affected-row count.
    Changed(usize),
}

impl StatementOutput {
    pub fn snapshot(&self) -> Option<&ResultSnapshot> {
        match self {
            Self::Rows(snapshot) => Some(snapshot),
            Self::Changed(_) => None,
        }
    }

    pub fn into_snapshot(self) -> Option<ResultSnapshot> {
        match self {
            Self::Rows(snapshot) => Some(snapshot),
            Self::Changed(_) => None,
        }
    }

    pub fn changed(&self) -> Option<usize> {
        match self {
            Self::Changed(count) => Some(*count),
            Self::Rows(_) => None,
        }
    }
}

/// Ordered outputs of a committed script, one per statement.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct ScriptOutcome {
    outputs: Vec<StatementOutput>,
}

impl ScriptOutcome {
    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&StatementOutput> {
        self.outputs.get(index)
    }

    /// Snapshot of statement `index`, if that statement returned rows.
    pub fn snapshot(&self, index: usize) -> Option<&ResultSnapshot> {
        self.get(index).and_then(StatementOutput::snapshot)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, StatementOutput> {
        self.outputs.iter()
    }

    pub fn into_outputs(self) -> Vec<StatementOutput> {
        self.outputs
    }
}

impl IntoIterator for ScriptOutcome {
    type Item = StatementOutput;
    type IntoIter = std::vec::IntoIter<StatementOutput>;

    fn into_iter(self) -> Self::IntoIter {
        self.outputs.into_iter()
    }
}

/// Executes SQL scripts against connections from a [`ConnectionProvider`].
///
/// The runner keeps no per-call state, so one instance can serve concurrent
/// callers; each call checks out its own connection.
#[derive(Clone)]
pub struct ScriptRunner<P: ConnectionProvider = ConnectionPool> {
    provider: P,
    mode: TransactionMode,
}

impl ScriptRunner<ConnectionPool> {
    /// Opens a file-backed pool from `config` and wraps it in a runner.
    pub fn open(config: &RunnerConfig) -> DbResult<Self> {
        let pool = open_pool(config)?;
        Ok(Self::new(pool).with_transaction_mode(config.transaction_mode))
    }

    /// Opens a private in-memory database pool and wraps it in a runner.
    pub fn open_in_memory(config: &RunnerConfig) -> DbResult<Self> {
        let pool = open_pool_in_memory(config)?;
        Ok(Self::new(pool).with_transaction_mode(config.transaction_mode))
    }
}

impl<P: ConnectionProvider> ScriptRunner<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            mode: TransactionMode::default(),
        }
    }

    pub fn with_transaction_mode(mut self, mode: TransactionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Splits `script` and runs its statements in one transaction.
    ///
    /// `parameters` are handed out left to right, each statement taking as
    /// many as it has `?` markers. Values beyond the script's total are
    /// dropped. An empty script returns an empty outcome without touching the
    /// database.
    ///
    /// # Errors
    /// - [`ScriptError::Acquire`] when no connection or transaction is
    ///   available; nothing is rolled back.
    /// - [`ScriptError::Prepare`], [`ScriptError::Execute`],
    ///   [`ScriptError::Materialize`] or [`ScriptError::Commit`] after a
    ///   successful rollback.
    /// - [`ScriptError::RollbackFailed`] when the rollback itself failed.
    pub fn run_script(
        &self,
        script: &str,
        parameters: impl IntoIterator<Item = Value>,
    ) -> ScriptResult<ScriptOutcome> {
        let units = parse_script(script);
        if units.is_empty() {
            debug!("event=script_run module=script status=skip reason=empty_script");
            return Ok(ScriptOutcome::default());
        }

        let parameters: Vec<Value> = parameters.into_iter().collect();
        let required = required_parameters(&units);
        if parameters.len() > required {
            warn!(
                "event=script_params_discarded module=script status=ok supplied={} consumed={}",
                parameters.len(),
                required
            );
        }
        let batches = allocate(&units, parameters);

        self.execute_units(&units, batches)
    }

    /// Loads the script from `source`, then behaves like [`Self::run_script`].
    ///
    /// A script file that cannot be read fails with [`ScriptError::Load`]
    /// before any connection is acquired.
    pub fn run_source(
        &self,
        source: &ScriptSource,
        parameters: impl IntoIterator<Item = Value>,
    ) -> ScriptResult<ScriptOutcome> {
        let script = source.load()?;
        self.run_script(&script, parameters)
    }

    /// Runs one statement, without splitting, binding every parameter to it.
    pub fn run_statement(
        &self,
        sql: &str,
        parameters: impl IntoIterator<Item = Value>,
    ) -> ScriptResult<StatementOutput> {
        let unit = StatementUnit::new(sql.trim());
        let batch: ParameterBatch = parameters.into_iter().collect();
        let outcome = self.execute_units(std::slice::from_ref(&unit), vec![batch])?;
        Ok(outcome
            .into_outputs()
            .pop()
            .unwrap_or(StatementOutput::Changed(0)))
    }

    fn execute_units(
        &self,
        units: &[StatementUnit],
        batches: Vec<ParameterBatch>,
    ) -> ScriptResult<ScriptOutcome> {
        let started_at = Instant::now();
        info!(
            "event=script_run module=script status=start statements={}",
            units.len()
        );

        let conn = self.provider.acquire().map_err(|err| {
            error!(
                "event=script_run module=script status=error duration_ms={} error_code=acquire_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            ScriptError::Acquire(err)
        })?;
        let mut tx = ScopedTransaction::begin(&conn, self.mode).map_err(|err| {
            error!(
                "event=script_run module=script status=error duration_ms={} error_code=begin_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            ScriptError::Acquire(DbError::Sqlite(err))
        })?;

        let mut outputs = Vec::with_capacity(units.len());
        for (index, (unit, batch)) in units.iter().zip(batches).enumerate() {
            match run_unit(&conn, index, unit, batch) {
                Ok(output) => outputs.push(output),
                Err(cause) => return Err(fail(tx, cause, started_at)),
            }
        }

        if let Err(source) = tx.commit() {
            return Err(fail(tx, ScriptError::Commit(source), started_at));
        }

        info!(
            "event=script_run module=script status=ok statements={} duration_ms={}",
            outputs.len(),
            started_at.elapsed().as_millis()
        );
        Ok(ScriptOutcome { outputs })
    }
}

fn run_unit(
    conn: &Connection,
    index: usize,
    unit: &StatementUnit,
    batch: ParameterBatch,
) -> ScriptResult<StatementOutput> {
    let sql = unit.sql();
    let bound = batch.len();
    let mut statement = conn
        .prepare_cached(sql)
        .map_err(|source| ScriptError::Prepare {
            index,
            sql: sql.to_string(),
            source,
        })?;
    let execute_error = |source| ScriptError::Execute {
        index,
        sql: sql.to_string(),
        source,
    };

    let output = if statement.column_count() == 0 {
        let changed = statement
            .execute(params_from_iter(batch))
            .map_err(execute_error)?;
        StatementOutput::Changed(changed)
    } else {
        let rows = statement
            .query(params_from_iter(batch))
            .map_err(execute_error)?;
        let snapshot = materialize(rows).map_err(|source| ScriptError::Materialize {
            index,
            sql: sql.to_string(),
            source,
        })?;
        StatementOutput::Rows(snapshot)
    };

    debug!(
        "event=script_statement module=script status=ok index={} placeholders={} bound={} rows={}",
        index,
        unit.placeholders(),
        bound,
        output.snapshot().map_or(0, ResultSnapshot::len)
    );
    Ok(output)
}

/// Rolls back after `cause`, chaining a rollback failure onto it.
fn fail(tx: ScopedTransaction<'_>, cause: ScriptError, started_at: Instant) -> ScriptError {
    let err = match tx.rollback() {
        Ok(()) => cause,
        Err(rollback) => {
            error!(
                "event=script_rollback module=script status=error error_code=rollback_failed error={}",
                rollback
            );
            ScriptError::RollbackFailed {
                cause: Box::new(cause),
                rollback,
            }
        }
    };
    error!(
        "event=script_run module=script status=error duration_ms={} statement_index={} error_kind={:?} error={}",
        started_at.elapsed().as_millis(),
        err.statement_index()
            .map_or_else(|| "none".to_string(), |index| index.to_string()),
        err.kind(),
        err
    );
    err
}

/// Transaction bound to one borrowed connection.
///
/// Unlike `rusqlite::Transaction`, a failed commit leaves the guard usable so
/// the caller can roll back explicitly and observe the rollback's own result.
/// Dropping a guard that is still open rolls back.
struct ScopedTransaction<'conn> {
    conn: &'conn Connection,
    open: bool,
}

impl<'conn> ScopedTransaction<'conn> {
    fn begin(conn: &'conn Connection, mode: TransactionMode) -> rusqlite::Result<Self> {
        conn.execute_batch(mode.begin_sql())?;
        Ok(Self { conn, open: true })
    }

    fn commit(&mut self) -> rusqlite::Result<()> {
        self.conn.execute_batch("COMMIT")?;
        self.open = false;
        Ok(())
    }

    fn rollback(mut self) -> rusqlite::Result<()> {
        self.open = false;
        // SQLite already rolled back on its own for some errors (full disk,
        // I/O); a second ROLLBACK would fail with "no transaction is active".
        if self.conn.is_autocommit() {
            return Ok(());
        }
        self.conn.execute_batch("ROLLBACK")
    }
}

impl Drop for ScopedTransaction<'_> {
    fn drop(&mut self) {
        if !self.open || self.conn.is_autocommit() {
            return;
        }
        if let Err(err) = self.conn.execute_batch("ROLLBACK") {
            warn!(
                "event=script_rollback module=script status=error error_code=drop_rollback_failed error={}",
                err
            );
        }
    }
}

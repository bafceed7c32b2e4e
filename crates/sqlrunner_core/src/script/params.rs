//! Distribution of one flat argument list across a script's statements.
//!
//! # Invariants
//! - Values are consumed strictly left to right, in statement order.
//! - A batch never holds more values than its statement declares.
//! - Values left after the last statement are dropped, not reported as errors.
//!
//! A batch may be shorter than its statement's declared count when the caller
//! supplied too few values. That is not checked here; binding the short batch
//! fails at execution time.

use super::splitter::StatementUnit;
use rusqlite::types::Value;

/// Values bound to exactly one statement.
pub type ParameterBatch = Vec<Value>;

/// Slices `parameters` into one batch per statement.
pub fn allocate<V>(
    statements: &[StatementUnit],
    parameters: impl IntoIterator<Item = V>,
) -> Vec<Vec<V>> {
    let mut remaining = parameters.into_iter();
    statements
        .iter()
        .map(|statement| remaining.by_ref().take(statement.placeholders()).collect())
        .collect()
}

/// Total number of values the statements declare.
pub fn required_parameters(statements: &[StatementUnit]) -> usize {
    statements.iter().map(StatementUnit::placeholders).sum()
}

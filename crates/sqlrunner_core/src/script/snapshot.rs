//! Detached, connection-independent query results.
//!
//! # Responsibility
//! - Copy every row of a live cursor into memory in one pass.
//! - Normalize values by declared column type into portable [`SqlValue`]s.
//!
//! # Invariants
//! - Row order equals cursor order; column order equals select-list order.
//! - A [`ResultSnapshot`] holds no borrow of a statement or connection.
//! - Values that do not parse under their declared temporal type are kept in
//!   their storage class instead of failing the read.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use indexmap::IndexMap;
use rusqlite::types::{FromSql, ValueRef};
use rusqlite::Rows;
use serde::Serialize;

/// Portable column value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Boolean(bool),
    Text(String),
    Blob(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Real(value) => Some(*value),
            Self::Integer(value) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Blob(value) => Some(value.as_slice()),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Self::Date(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<NaiveTime> {
        match self {
            Self::Time(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Self::DateTime(value) => Some(*value),
            _ => None,
        }
    }

    fn from_storage(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Self::Null,
            ValueRef::Integer(value) => Self::Integer(value),
            ValueRef::Real(value) => Self::Real(value),
            ValueRef::Text(bytes) => Self::Text(String::from_utf8_lossy(bytes).into_owned()),
            ValueRef::Blob(bytes) => Self::Blob(bytes.to_vec()),
        }
    }
}

/// Column metadata captured once per result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotColumn {
    pub name: String,
    /// Type name from the column definition; `None` for expressions.
    pub declared_type: Option<String>,
}

/// One result row keyed by column name.
///
/// When two columns share a name, the later one wins, keeping the position of
/// the first.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct SnapshotRow(IndexMap<String, SqlValue>);

impl SnapshotRow {
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.0.get(column)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates `(column, value)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn into_map(self) -> IndexMap<String, SqlValue> {
        self.0
    }
}

/// In-memory copy of a query result.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ResultSnapshot {
    columns: Vec<SnapshotColumn>,
    rows: Vec<SnapshotRow>,
}

impl ResultSnapshot {
    pub fn columns(&self) -> &[SnapshotColumn] {
        &self.columns
    }

    pub fn rows(&self) -> &[SnapshotRow] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&SnapshotRow> {
        self.rows.get(index)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SnapshotRow> {
        self.rows.iter()
    }

    pub fn into_rows(self) -> Vec<SnapshotRow> {
        self.rows
    }
}

impl IntoIterator for ResultSnapshot {
    type Item = SnapshotRow;
    type IntoIter = std::vec::IntoIter<SnapshotRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

impl<'a> IntoIterator for &'a ResultSnapshot {
    type Item = &'a SnapshotRow;
    type IntoIter = std::slice::Iter<'a, SnapshotRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// Reads every remaining row of `rows` into a detached snapshot.
///
/// # Errors
/// - Returns the first driver error raised while stepping or reading a row;
///   rows read before it are discarded.
pub fn materialize(mut rows: Rows<'_>) -> rusqlite::Result<ResultSnapshot> {
    let columns: Vec<SnapshotColumn> = match rows.as_ref() {
        Some(statement) => statement
            .columns()
            .iter()
            .map(|column| SnapshotColumn {
                name: column.name().to_string(),
                declared_type: column.decl_type().map(str::to_string),
            })
            .collect(),
        None => Vec::new(),
    };
    let kinds: Vec<DeclaredKind> = columns
        .iter()
        .map(|column| DeclaredKind::classify(column.declared_type.as_deref()))
        .collect();

    let mut snapshot_rows = Vec::new();
    while let Some(row) = rows.next()? {
        let mut values = IndexMap::with_capacity(columns.len());
        for (index, (column, kind)) in columns.iter().zip(&kinds).enumerate() {
            let value = row.get_ref(index)?;
            values.insert(column.name.clone(), kind.normalize(value));
        }
        snapshot_rows.push(SnapshotRow(values));
    }

    Ok(ResultSnapshot {
        columns,
        rows: snapshot_rows,
    })
}

/// Normalization rule chosen from a column's declared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeclaredKind {
    Blob,
    DateTime,
    Date,
    Time,
    Boolean,
    Other,
}

impl DeclaredKind {
    fn classify(declared: Option<&str>) -> Self {
        let Some(declared) = declared else {
            return Self::Other;
        };
        let upper = declared.to_ascii_uppercase();
        // DATETIME contains both DATE and TIME; check it first.
        if upper.contains("BLOB") {
            Self::Blob
        } else if upper.contains("DATETIME") || upper.contains("TIMESTAMP") {
            Self::DateTime
        } else if upper.contains("DATE") {
            Self::Date
        } else if upper.contains("TIME") {
            Self::Time
        } else if upper.contains("BOOL") {
            Self::Boolean
        } else {
            Self::Other
        }
    }

    fn normalize(self, value: ValueRef<'_>) -> SqlValue {
        let normalized = match (self, value) {
            (_, ValueRef::Null) => Some(SqlValue::Null),
            (Self::Blob, ValueRef::Blob(bytes) | ValueRef::Text(bytes)) => {
                Some(SqlValue::Blob(bytes.to_vec()))
            }
            (Self::DateTime, ValueRef::Text(_)) => NaiveDateTime::column_result(value)
                .ok()
                .map(SqlValue::DateTime),
            (Self::DateTime, ValueRef::Integer(millis)) => {
                from_epoch_millis(millis).map(SqlValue::DateTime)
            }
            (Self::Date, ValueRef::Text(_)) => {
                NaiveDate::column_result(value).ok().map(SqlValue::Date)
            }
            (Self::Date, ValueRef::Integer(millis)) => {
                from_epoch_millis(millis).map(|at| SqlValue::Date(at.date()))
            }
            (Self::Time, ValueRef::Text(_)) => {
                NaiveTime::column_result(value).ok().map(SqlValue::Time)
            }
            (Self::Boolean, ValueRef::Integer(flag)) => Some(SqlValue::Boolean(flag != 0)),
            _ => None,
        };
        normalized.unwrap_or_else(|| SqlValue::from_storage(value))
    }
}

fn from_epoch_millis(millis: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_millis(millis).map(|at| at.naive_utc())
}

//! SQL script execution engine.
//!
//! # Responsibility
//! - Split script text into statements (`splitter`, `lexer`).
//! - Distribute one flat argument list over those statements (`params`).
//! - Execute them transactionally and detach their results (`runner`,
//!   `snapshot`).
//!
//! # Invariants
//! - Splitting and placeholder counting share one lexer, so both agree on
//!   what is quoted or commented.
//! - A script either commits as a whole or leaves no trace.

pub mod error;
pub mod lexer;
pub mod params;
pub mod placeholder;
pub mod runner;
pub mod snapshot;
pub mod source;
pub mod splitter;

pub use error::{ScriptError, ScriptErrorKind, ScriptResult};
pub use params::{allocate, required_parameters, ParameterBatch};
pub use placeholder::count_placeholders;
pub use runner::{ScriptOutcome, ScriptRunner, StatementOutput};
pub use snapshot::{materialize, ResultSnapshot, SnapshotColumn, SnapshotRow, SqlValue};
pub use source::ScriptSource;
pub use splitter::{parse_script, split, StatementUnit};

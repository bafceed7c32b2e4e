//! Script-to-statement splitting.
//!
//! # Responsibility
//! - Turn one script text into ordered, executable statement units.
//! - Strip comments and canonicalize line whitespace without touching quoted
//!   text.
//!
//! # Invariants
//! - Output order equals source order.
//! - Emitted statements are trimmed, non-empty and carry no trailing `;`.
//! - A `;` inside quotes or comments never ends a statement.

use super::lexer::{LexAction, Lexer};
use super::placeholder::count_placeholders;

/// One executable statement extracted from a script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementUnit {
    sql: String,
    placeholders: usize,
}

impl StatementUnit {
    /// Wraps a single statement, counting its positional placeholders.
    pub fn new(sql: impl Into<String>) -> Self {
        let sql = sql.into();
        let placeholders = count_placeholders(&sql);
        Self { sql, placeholders }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Number of unquoted `?` markers declared by the statement.
    pub fn placeholders(&self) -> usize {
        self.placeholders
    }
}

/// Splits script text into trimmed, comment-free statements.
///
/// A final statement without a terminating `;` is still returned. Scripts
/// holding only whitespace and comments yield an empty list.
pub fn split(text: &str) -> Vec<String> {
    let mut lexer = Lexer::new();
    let mut statements = Vec::new();
    let mut buffer = String::new();

    for ch in text.chars() {
        match lexer.feed(ch) {
            LexAction::Keep { ch, .. } => buffer.push(ch),
            LexAction::Separator => push_separator(&mut buffer),
            LexAction::Retract => {
                buffer.pop();
            }
            LexAction::Skip => {}
            LexAction::Terminate => flush(&mut buffer, &mut statements),
        }
    }
    flush(&mut buffer, &mut statements);

    statements
}

/// Splits a script and counts placeholders for every statement.
pub fn parse_script(text: &str) -> Vec<StatementUnit> {
    split(text).into_iter().map(StatementUnit::new).collect()
}

fn push_separator(buffer: &mut String) {
    if !buffer.is_empty() && !buffer.ends_with(char::is_whitespace) {
        buffer.push(' ');
    }
}

fn flush(buffer: &mut String, statements: &mut Vec<String>) {
    let trimmed = buffer.trim();
    if !trimmed.is_empty() {
        statements.push(trimmed.to_string());
    }
    buffer.clear();
}

#[cfg(test)]
mod tests {
    use super::{parse_script, split, StatementUnit};

    #[test]
    fn splits_statements_in_source_order() {
        assert_eq!(
            split("CREATE TABLE t (id INTEGER); INSERT INTO t VALUES (1); SELECT * FROM t;"),
            vec![
                "CREATE TABLE t (id INTEGER)",
                "INSERT INTO t VALUES (1)",
                "SELECT * FROM t",
            ]
        );
    }

    #[test]
    fn semicolon_inside_literal_does_not_split() {
        assert_eq!(
            split("SELECT 'a;b'; SELECT 1;"),
            vec!["SELECT 'a;b'", "SELECT 1"]
        );
        assert_eq!(
            split("SELECT \"odd;name\" FROM t;"),
            vec!["SELECT \"odd;name\" FROM t"]
        );
    }

    #[test]
    fn doubled_single_quote_stays_inside_literal() {
        assert_eq!(split("SELECT 'it''s';"), vec!["SELECT 'it''s'"]);
        assert_eq!(
            split("SELECT 'a'';b'; SELECT 2;"),
            vec!["SELECT 'a'';b'", "SELECT 2"]
        );
        assert_eq!(split("SELECT ''; SELECT 3;"), vec!["SELECT ''", "SELECT 3"]);
    }

    #[test]
    fn comments_are_stripped_and_hide_semicolons() {
        assert_eq!(
            split("SELECT 1 /* not; here */+ 2; -- trailing; note\nSELECT 3;"),
            vec!["SELECT 1 + 2", "SELECT 3"]
        );
    }

    #[test]
    fn comments_separate_tokens() {
        assert_eq!(split("SELECT 1/*x*/FROM t;"), vec!["SELECT 1 FROM t"]);
        assert_eq!(split("SELECT *-- all\nFROM t;"), vec!["SELECT * FROM t"]);
    }

    #[test]
    fn block_comments_do_not_nest() {
        assert_eq!(
            split("/* outer /* inner */ SELECT 1;"),
            vec!["SELECT 1"]
        );
    }

    #[test]
    fn line_whitespace_collapses_to_single_space() {
        assert_eq!(
            split("SELECT *\n\tFROM t\r\nWHERE id = 1;"),
            vec!["SELECT * FROM t WHERE id = 1"]
        );
    }

    #[test]
    fn quoted_whitespace_is_preserved_verbatim() {
        assert_eq!(split("SELECT 'a\n\tb';"), vec!["SELECT 'a\n\tb'"]);
    }

    #[test]
    fn missing_final_semicolon_is_tolerated() {
        assert_eq!(
            split("SELECT 1; SELECT 2"),
            vec!["SELECT 1", "SELECT 2"]
        );
    }

    #[test]
    fn empty_and_comment_only_scripts_yield_nothing() {
        assert!(split("").is_empty());
        assert!(split("  \n\t ").is_empty());
        assert!(split("-- just a note\n/* and a block */ ;;").is_empty());
    }

    #[test]
    fn stray_semicolons_produce_no_empty_statements() {
        assert_eq!(split(";;SELECT 1;;"), vec!["SELECT 1"]);
    }

    #[test]
    fn parse_script_counts_placeholders_per_statement() {
        let units = parse_script(
            "INSERT INTO test (id, username) /* Comment 1 */ VALUES (?, ?);;\n SELECT * -- Comment 2 \n FROM test WHERE id = ?",
        );
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].sql(), "INSERT INTO test (id, username)  VALUES (?, ?)");
        assert_eq!(units[0].placeholders(), 2);
        assert_eq!(units[1].sql(), "SELECT *  FROM test WHERE id = ?");
        assert_eq!(units[1].placeholders(), 1);
    }

    #[test]
    fn statement_unit_counts_on_construction() {
        let unit = StatementUnit::new("UPDATE t SET name = '?' WHERE id = ?");
        assert_eq!(unit.placeholders(), 1);
    }
}

//! Positional placeholder counting.

use super::lexer::{LexAction, Lexer};

/// Counts `?` markers outside quoted literals and comments.
///
/// Only anonymous `?` markers are recognized; numbered (`?3`) and named
/// (`:name`) parameters are not.
pub fn count_placeholders(statement: &str) -> usize {
    let mut lexer = Lexer::new();
    statement
        .chars()
        .filter(|ch| {
            matches!(
                lexer.feed(*ch),
                LexAction::Keep {
                    ch: '?',
                    quoted: false
                }
            )
        })
        .count()
}

#[cfg(test)]
mod tests {
    use super::count_placeholders;

    #[test]
    fn quoted_markers_are_ignored() {
        assert_eq!(count_placeholders("SELECT '?' WHERE x = ?"), 1);
        assert_eq!(count_placeholders("SELECT \"?\" FROM t WHERE a = ? AND b = ?"), 2);
    }

    #[test]
    fn commented_markers_are_ignored() {
        assert_eq!(count_placeholders("SELECT ? /* ? */ -- ?\n"), 1);
    }

    #[test]
    fn statement_without_markers_counts_zero() {
        assert_eq!(count_placeholders("SELECT COUNT(*) FROM t"), 0);
        assert_eq!(count_placeholders(""), 0);
    }

    #[test]
    fn marker_after_escaped_quote_is_counted() {
        assert_eq!(count_placeholders("INSERT INTO t VALUES ('it''s?', ?)"), 1);
    }
}

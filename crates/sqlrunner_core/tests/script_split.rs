use sqlrunner_core::{allocate, count_placeholders, parse_script, split};

#[test]
fn clean_statements_split_in_order() {
    let statements = (0..5)
        .map(|n| format!("INSERT INTO t (n) VALUES ({n})"))
        .collect::<Vec<_>>();
    let script = statements
        .iter()
        .map(|statement| format!("{statement};\n"))
        .collect::<String>();

    assert_eq!(split(&script), statements);
}

#[test]
fn semicolons_inside_literals_and_comments_do_not_split() {
    assert_eq!(
        split("SELECT 'a;b'; SELECT 1;"),
        ["SELECT 'a;b'", "SELECT 1"]
    );
    assert_eq!(
        split("SELECT \"odd;name\" FROM t -- trailing; comment\n; /* x; y */ SELECT 2"),
        ["SELECT \"odd;name\" FROM t", "SELECT 2"]
    );
}

#[test]
fn doubled_quotes_stay_in_one_literal() {
    assert_eq!(split("SELECT 'it''s';"), ["SELECT 'it''s'"]);
    assert_eq!(count_placeholders("SELECT 'what''s ?' WHERE a = ?"), 1);
}

#[test]
fn placeholders_in_literals_are_not_counted() {
    assert_eq!(count_placeholders("SELECT '?' WHERE x = ?"), 1);
    assert_eq!(count_placeholders("SELECT \"?\" -- ?\n, ? /* ? */"), 1);
}

#[test]
fn parameters_are_allocated_by_placeholder_count() {
    let units = parse_script("INSERT INTO a VALUES (?); INSERT INTO b VALUES (?, ?);");
    let batches = allocate(&units, ["a", "b", "c"]);
    assert_eq!(batches, vec![vec!["a"], vec!["b", "c"]]);
}

#[test]
fn multiline_statements_collapse_whitespace() {
    let units = parse_script(
        "CREATE TABLE t (\n\tid INTEGER PRIMARY KEY,\r\n\tname TEXT\n);\nINSERT INTO t VALUES (?, ?);",
    );
    assert_eq!(units.len(), 2);
    assert!(!units[0].sql().contains(['\n', '\r', '\t']));
    assert_eq!(units[0].placeholders(), 0);
    assert_eq!(units[1].placeholders(), 2);
}

//! Insert statement construction.
//!
//! Builds multi-row and single-row `INSERT` statements from pre-rendered
//! value tuples, and renders JSON values as SQL literals for those tuples.

use serde_json::Value;

/// `INSERT INTO table (c1, c2) VALUES (..), (..)` for one table and column shape.
///
/// `tuples` are parenthesized value literals, already escaped.
pub fn multi_row_insert<S: AsRef<str>>(table: &str, columns: &[String], tuples: &[S]) -> String {
    let values = tuples
        .iter()
        .map(|t| t.as_ref())
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES {}",
        table,
        columns.join(", "),
        values
    )
}

/// Single-row form of [`multi_row_insert`].
pub fn single_row_insert(table: &str, columns: &[String], tuple: &str) -> String {
    multi_row_insert(table, columns, &[tuple])
}

/// Renders a JSON value as a SQL literal.
///
/// Numbers and booleans are written as-is, strings are single-quoted with
/// embedded quotes doubled, `null` becomes `NULL`, and nested values are
/// stored as their JSON text.
pub fn sql_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => quote(s),
        nested => quote(&nested.to_string()),
    }
}

fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Parenthesized tuple of literals: `(a, b, c)`.
pub fn value_tuple(literals: &[String]) -> String {
    format!("({})", literals.join(", "))
}

/// Counts the top-level value tuples after `VALUES` in an insert statement.
///
/// Parentheses inside quoted strings are ignored. Returns 0 for statements
/// without a `VALUES` clause.
pub fn count_value_tuples(sql: &str) -> usize {
    let upper = sql.to_ascii_uppercase();
    let Some(start) = upper.find(" VALUES") else {
        return 0;
    };

    let mut count = 0;
    let mut depth = 0usize;
    let mut in_string = false;
    for c in sql[start..].chars() {
        match c {
            '\'' => in_string = !in_string,
            '(' if !in_string => {
                if depth == 0 {
                    count += 1;
                }
                depth += 1;
            }
            ')' if !in_string => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cols() -> Vec<String> {
        vec!["createtime".into(), "co2".into(), "pm25".into()]
    }

    #[test]
    fn test_multi_row_insert() {
        let sql = multi_row_insert("air", &cols(), &["(1, 400, 12)", "(2, 410, 15)"]);
        assert_eq!(
            sql,
            "INSERT INTO air (createtime, co2, pm25) VALUES (1, 400, 12), (2, 410, 15)"
        );
    }

    #[test]
    fn test_single_row_insert() {
        let sql = single_row_insert("air", &cols(), "(1, 400, 12)");
        assert_eq!(sql, "INSERT INTO air (createtime, co2, pm25) VALUES (1, 400, 12)");
    }

    #[test]
    fn test_sql_literals() {
        assert_eq!(sql_literal(&json!(null)), "NULL");
        assert_eq!(sql_literal(&json!(true)), "true");
        assert_eq!(sql_literal(&json!(412)), "412");
        assert_eq!(sql_literal(&json!(1.25)), "1.25");
        assert_eq!(sql_literal(&json!("it's")), "'it''s'");
        assert_eq!(sql_literal(&json!({"a": 1})), r#"'{"a":1}'"#);
    }

    #[test]
    fn test_count_value_tuples() {
        assert_eq!(count_value_tuples("INSERT INTO t (a) VALUES (1), (2), (3)"), 3);
        assert_eq!(count_value_tuples("insert into t values ('a(b', 1)"), 1);
        assert_eq!(count_value_tuples("INSERT INTO t VALUES (now(), 1)"), 1);
        assert_eq!(count_value_tuples("USE power"), 0);
    }
}

//! MySQL rendering of document statements.
//!
//! Attribute predicates use the JSON-path functions of MySQL 5.7+:
//! text compares against `JSON_UNQUOTE(JSON_EXTRACT(..))`, numbers and
//! booleans against the raw `JSON_EXTRACT(..)` value. A null condition
//! matches both a missing key and a stored JSON `null`.

use super::predicate::JsonPredicate;
use crate::storage::{DocumentUpdate, NewDocument, RowFilter};
use serde_json::Number;
use std::fmt;

pub const COLUMNS: &str = "id, identifier, model_name, attributions, ctime, utime, valid";

/// One positional `?` binding.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Text(String),
    Integer(i64),
    Unsigned(u64),
    Float(f64),
}

impl SqlParam {
    fn number(number: &Number) -> Self {
        if let Some(v) = number.as_i64() {
            Self::Integer(v)
        } else if let Some(v) = number.as_u64() {
            Self::Unsigned(v)
        } else {
            Self::Float(number.as_f64().unwrap_or_default())
        }
    }
}

impl fmt::Display for SqlParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(v) => write!(f, "'{}'", v),
            Self::Integer(v) => write!(f, "{}", v),
            Self::Unsigned(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
        }
    }
}

/// Rendered SQL text plus its bindings in order.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    pub sql: String,
    pub params: Vec<SqlParam>,
}

impl fmt::Display for SqlStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params: Vec<String> = self.params.iter().map(ToString::to_string).collect();
        write!(f, "{} [{}]", self.sql, params.join(", "))
    }
}

pub fn render_select(table: &str, filter: &RowFilter) -> SqlStatement {
    let mut params = vec![SqlParam::Text(filter.model_name().to_string())];
    let mut sql = format!(
        "SELECT {} FROM {} WHERE model_name = ? AND valid = 1",
        COLUMNS, table
    );

    if let Some(identifier) = filter.identifier() {
        sql.push_str(" AND identifier = ?");
        params.push(SqlParam::Text(identifier.to_string()));
    }
    if let Some(predicate) = filter.predicate() {
        sql.push_str(" AND ");
        render_predicate(predicate, &mut sql, &mut params);
    }
    if let Some(limit) = filter.limit() {
        sql.push_str(&format!(" LIMIT {}", limit));
    }

    SqlStatement { sql, params }
}

pub fn render_insert(table: &str, row: &NewDocument) -> SqlStatement {
    SqlStatement {
        sql: format!(
            "INSERT INTO {} (identifier, model_name, attributions, ctime, utime, valid) \
             VALUES (?, ?, ?, ?, ?, 1)",
            table
        ),
        params: vec![
            SqlParam::Text(row.identifier.clone()),
            SqlParam::Text(row.model_name.clone()),
            SqlParam::Text(row.attributions.clone()),
            SqlParam::Integer(row.ctime),
            SqlParam::Integer(row.ctime),
        ],
    }
}

pub fn render_update(table: &str, id: u64, update: &DocumentUpdate) -> SqlStatement {
    SqlStatement {
        sql: format!(
            "UPDATE {} SET attributions = ?, utime = ? WHERE id = ? AND valid = 1",
            table
        ),
        params: vec![
            SqlParam::Text(update.attributions.clone()),
            SqlParam::Integer(update.utime),
            SqlParam::Unsigned(id),
        ],
    }
}

pub fn render_invalidate(table: &str, id: u64, utime: i64) -> SqlStatement {
    SqlStatement {
        sql: format!(
            "UPDATE {} SET valid = 0, utime = ? WHERE id = ? AND valid = 1",
            table
        ),
        params: vec![SqlParam::Integer(utime), SqlParam::Unsigned(id)],
    }
}

fn render_predicate(predicate: &JsonPredicate, sql: &mut String, params: &mut Vec<SqlParam>) {
    match predicate {
        JsonPredicate::UnquotedEquals { path, value } => {
            sql.push_str("JSON_UNQUOTE(JSON_EXTRACT(attributions, ?)) = ?");
            params.push(SqlParam::Text(path.to_string()));
            params.push(SqlParam::Text(value.clone()));
        }
        JsonPredicate::NumberEquals { path, value } => {
            sql.push_str("JSON_EXTRACT(attributions, ?) = ?");
            params.push(SqlParam::Text(path.to_string()));
            params.push(SqlParam::number(value));
        }
        JsonPredicate::LiteralEquals { path, literal } => {
            sql.push_str("JSON_EXTRACT(attributions, ?) = CAST(? AS JSON)");
            params.push(SqlParam::Text(path.to_string()));
            params.push(SqlParam::Text(literal.clone()));
        }
        JsonPredicate::IsNull { path } => {
            // SQL NULL for a missing key, JSON type 'NULL' for a stored null
            sql.push_str(
                "(JSON_EXTRACT(attributions, ?) IS NULL \
                 OR JSON_TYPE(JSON_EXTRACT(attributions, ?)) = 'NULL')",
            );
            params.push(SqlParam::Text(path.to_string()));
            params.push(SqlParam::Text(path.to_string()));
        }
        JsonPredicate::And(parts) => render_group(parts, " AND ", sql, params),
        JsonPredicate::Or(parts) => render_group(parts, " OR ", sql, params),
    }
}

fn render_group(
    parts: &[JsonPredicate],
    joiner: &str,
    sql: &mut String,
    params: &mut Vec<SqlParam>,
) {
    sql.push('(');
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            sql.push_str(joiner);
        }
        render_predicate(part, sql, params);
    }
    sql.push(')');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{compile, Condition};

    #[test]
    fn test_identity_select() {
        let statement = render_select("t_model", &RowFilter::identity("Counter", "u1"));
        assert_eq!(
            statement.sql,
            "SELECT id, identifier, model_name, attributions, ctime, utime, valid FROM t_model \
             WHERE model_name = ? AND valid = 1 AND identifier = ? LIMIT 1"
        );
        assert_eq!(
            statement.params,
            vec![
                SqlParam::Text("Counter".to_string()),
                SqlParam::Text("u1".to_string())
            ]
        );
    }

    #[test]
    fn test_condition_select() {
        let predicate = compile(
            &Condition::new()
                .and("status", "active")
                .and("level", 3)
                .or([("tier", "gold")])
                .or([("tier", "platinum")]),
        )
        .unwrap();
        let statement = render_select("t_model", &RowFilter::matching("Member", predicate));

        assert_eq!(
            statement.sql,
            "SELECT id, identifier, model_name, attributions, ctime, utime, valid FROM t_model \
             WHERE model_name = ? AND valid = 1 AND (JSON_EXTRACT(attributions, ?) = ? \
             AND JSON_UNQUOTE(JSON_EXTRACT(attributions, ?)) = ? \
             AND (JSON_UNQUOTE(JSON_EXTRACT(attributions, ?)) = ? \
             OR JSON_UNQUOTE(JSON_EXTRACT(attributions, ?)) = ?))"
        );
        assert_eq!(statement.params.len(), 9);
        assert_eq!(statement.params[1], SqlParam::Text("$.level".to_string()));
        assert_eq!(statement.params[2], SqlParam::Integer(3));
    }

    #[test]
    fn test_null_and_boolean_rendering() {
        let predicate = compile(
            &Condition::new()
                .and("deleted", serde_json::Value::Null)
                .and("shared", false),
        )
        .unwrap();
        let statement = render_select("t_model", &RowFilter::matching("File", predicate));

        assert!(statement.sql.ends_with(
            "AND ((JSON_EXTRACT(attributions, ?) IS NULL \
             OR JSON_TYPE(JSON_EXTRACT(attributions, ?)) = 'NULL') \
             AND JSON_EXTRACT(attributions, ?) = CAST(? AS JSON))"
        ));
        assert_eq!(
            statement.params[1..],
            [
                SqlParam::Text("$.deleted".to_string()),
                SqlParam::Text("$.deleted".to_string()),
                SqlParam::Text("$.shared".to_string()),
                SqlParam::Text("false".to_string()),
            ]
        );
    }

    #[test]
    fn test_statement_display() {
        let statement = render_invalidate("t_model", 7, 100);
        assert_eq!(
            statement.to_string(),
            "UPDATE t_model SET valid = 0, utime = ? WHERE id = ? AND valid = 1 [100, 7]"
        );
    }
}

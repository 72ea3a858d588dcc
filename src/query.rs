//! Query Surface - read-only SQL over the loaded table
//!
//! Results are plain column names plus rows of JSON-friendly scalars, the
//! same shape for both storage strategies.

use crate::error::{Result, ScopeError};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlparser::ast::Statement;
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use std::fmt;
use tracing::{debug, warn};

lazy_static! {
    static ref SQL_FENCE: Regex = Regex::new(r"(?s)```sql\s*\n?(.*?)```").unwrap();
    static ref MUTATING_KEYWORD: Regex = Regex::new(
        r"(?i)\b(INSERT|UPDATE|DELETE|DROP|ALTER|CREATE|TRUNCATE|REPLACE|ATTACH|DETACH|PRAGMA|EXEC|EXECUTE|COPY)\b"
    )
    .unwrap();
}

/// One result cell; binary values arrive here already decoded as text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    Text(String),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => write!(f, "NULL"),
            CellValue::Boolean(b) => write!(f, "{}", b),
            CellValue::Integer(i) => write!(f, "{}", i),
            CellValue::Real(r) => write!(f, "{}", r),
            CellValue::Text(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl QueryResult {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Reject anything that is not a pure read query.
///
/// Parsed with `sqlparser` when possible; statements the generic dialect
/// can't parse fall back to a keyword check.
pub fn ensure_read_only(sql: &str) -> Result<()> {
    let trimmed = sql.trim();
    if trimmed.is_empty() {
        return Err(ScopeError::Query("SQL query is required".to_string()));
    }

    let dialect = GenericDialect {};
    let read_only = match Parser::parse_sql(&dialect, trimmed) {
        Ok(statements) => {
            !statements.is_empty()
                && statements
                    .iter()
                    .all(|stmt| matches!(stmt, Statement::Query(_)))
        }
        Err(e) => {
            debug!("SQL parsing failed: {}, using keyword fallback", e);
            is_read_only_heuristic(trimmed)
        }
    };

    if read_only {
        Ok(())
    } else {
        warn!("Rejected non read-only query: {}", trimmed);
        Err(ScopeError::Query(
            "only read-only SELECT queries are allowed".to_string(),
        ))
    }
}

fn is_read_only_heuristic(sql: &str) -> bool {
    let upper = sql.to_uppercase();
    (upper.starts_with("SELECT") || upper.starts_with("WITH")) && !MUTATING_KEYWORD.is_match(sql)
}

/// First ```sql fenced block in an assistant reply, trimmed
pub fn extract_sql_block(reply: &str) -> Option<String> {
    SQL_FENCE
        .captures(reply)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|sql| !sql.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_is_read_only() {
        assert!(ensure_read_only("SELECT * FROM tablename").is_ok());
        assert!(ensure_read_only("  select a, count(*) from tablename group by a  ").is_ok());
        assert!(ensure_read_only("WITH t AS (SELECT 1 AS x) SELECT x FROM t").is_ok());
    }

    #[test]
    fn test_mutations_are_rejected() {
        for sql in [
            "DROP TABLE tablename",
            "DELETE FROM tablename",
            "INSERT INTO tablename VALUES (1)",
            "UPDATE tablename SET a = 1",
            "SELECT 1; DROP TABLE tablename",
        ] {
            assert!(
                matches!(ensure_read_only(sql), Err(ScopeError::Query(_))),
                "accepted {}",
                sql
            );
        }
    }

    #[test]
    fn test_empty_query_is_rejected() {
        assert!(ensure_read_only("   ").is_err());
    }

    #[test]
    fn test_heuristic_allows_column_names_containing_keywords() {
        assert!(is_read_only_heuristic("SELECT created_at FROM tablename"));
        assert!(!is_read_only_heuristic("SELECT 1; delete from tablename"));
        assert!(!is_read_only_heuristic("PRAGMA table_info(tablename)"));
    }

    #[test]
    fn test_extract_sql_block() {
        let reply = "Here you go:\n```sql\nSELECT COUNT(*) FROM tablename;\n```\nDone.";
        assert_eq!(
            extract_sql_block(reply),
            Some("SELECT COUNT(*) FROM tablename;".to_string())
        );
        assert_eq!(extract_sql_block("no code here"), None);
    }

    #[test]
    fn test_cell_values_serialize_as_scalars() {
        let row = vec![
            CellValue::Null,
            CellValue::Integer(3),
            CellValue::Real(1.5),
            CellValue::Text("x".to_string()),
            CellValue::Boolean(true),
        ];
        assert_eq!(
            serde_json::to_string(&row).unwrap(),
            r#"[null,3,1.5,"x",true]"#
        );
    }
}

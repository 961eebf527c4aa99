//! Query transports used by the dialect adapters.
//!
//! A [`QueryExecutor`] runs catalog and data queries and applies batches of
//! comment statements. Rows come back as JSON values so adapters can read
//! them without knowing which transport produced them.

mod sqlx_executor;
mod worker_executor;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{EnrichError, EnrichResult};

pub use sqlx_executor::SqlxExecutor;
pub use worker_executor::WorkerExecutor;

/// One result row.
pub type Row = Vec<Value>;

#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Run a query with positional text parameters.
    ///
    /// Placeholders follow the backend convention (`$1`, `?`, `@p1`).
    async fn query(&self, sql: &str, params: &[&str]) -> EnrichResult<Vec<Row>>;

    /// Apply statements in one transaction, rolling back on the first failure.
    async fn execute_batch(&self, statements: &[String]) -> EnrichResult<()>;
}

/// Read a cell as text. NULL and missing cells are `None`.
pub fn cell_string(row: &Row, idx: usize) -> Option<String> {
    match row.get(idx)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Read a cell as an integer, accepting numbers and numeric strings.
pub fn cell_i64(row: &Row, idx: usize) -> EnrichResult<i64> {
    let value = row
        .get(idx)
        .ok_or_else(|| EnrichError::query(format!("result row has no column {idx}")))?;
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .ok_or_else(|| EnrichError::query(format!("number out of range: {n}"))),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| EnrichError::query(format!("expected an integer, got '{s}'"))),
        other => Err(EnrichError::query(format!("expected an integer, got {other}"))),
    }
}

/// First cell of the first row as an integer.
pub fn scalar_i64(rows: &[Row]) -> EnrichResult<i64> {
    let row = rows
        .first()
        .ok_or_else(|| EnrichError::query("scalar query returned no rows"))?;
    cell_i64(row, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cell_string() {
        let row = vec![json!("users"), json!(null), json!(42), json!(true)];
        assert_eq!(cell_string(&row, 0).as_deref(), Some("users"));
        assert_eq!(cell_string(&row, 1), None);
        assert_eq!(cell_string(&row, 2).as_deref(), Some("42"));
        assert_eq!(cell_string(&row, 3).as_deref(), Some("true"));
        assert_eq!(cell_string(&row, 9), None);
    }

    #[test]
    fn test_scalar_i64_accepts_strings() {
        assert_eq!(scalar_i64(&[vec![json!(12)]]).unwrap(), 12);
        assert_eq!(scalar_i64(&[vec![json!("7")]]).unwrap(), 7);
        assert!(scalar_i64(&[]).is_err());
        assert!(scalar_i64(&[vec![json!("abc")]]).is_err());
    }
}

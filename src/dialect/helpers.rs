//! Shared helper functions for dialect adapters.

use tracing::warn;

use crate::error::{EnrichError, EnrichResult};
use crate::executor::{cell_string, scalar_i64, QueryExecutor, Row};
use crate::metadata::{ForeignKeyReference, DISTINCT_UNAVAILABLE};

// =============================================================================
// Identifier Quoting
// =============================================================================

/// Quote identifier with double quotes (Postgres).
pub fn quote_double(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Quote identifier with backticks (MySQL).
pub fn quote_backtick(ident: &str) -> String {
    format!("`{}`", ident.replace('`', "``"))
}

/// Quote identifier with square brackets (SQL Server).
pub fn quote_bracket(ident: &str) -> String {
    format!("[{}]", ident.replace(']', "]]"))
}

// =============================================================================
// String Quoting
// =============================================================================

/// Quote string with single quotes (standard SQL).
pub fn quote_string_single(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Quote string with single quotes, also escaping backslashes (MySQL).
pub fn quote_string_mysql(s: &str) -> String {
    format!("'{}'", s.replace('\\', "\\\\").replace('\'', "''"))
}

/// Quote string with N prefix for Unicode (SQL Server).
pub fn quote_string_unicode(s: &str) -> String {
    format!("N'{}'", s.replace('\'', "''"))
}

/// Quote an example value with double quotes for SQL Server comment text.
pub fn quote_example_double(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

// =============================================================================
// Result Decoding
// =============================================================================

/// First column of each row as text, skipping NULLs.
pub fn first_column_strings(rows: &[Row]) -> Vec<String> {
    rows.iter().filter_map(|row| cell_string(row, 0)).collect()
}

/// Decode `(referenced_table, referenced_column, constraint_name)` rows.
pub fn foreign_keys_from_rows(rows: &[Row]) -> Vec<ForeignKeyReference> {
    let mut references: Vec<_> = rows
        .iter()
        .filter_map(|row| {
            Some(ForeignKeyReference {
                referenced_table: cell_string(row, 0)?,
                referenced_column: cell_string(row, 1)?,
                constraint_name: cell_string(row, 2).unwrap_or_default(),
            })
        })
        .collect();
    references.sort();
    references.dedup();
    references
}

// =============================================================================
// Statistics
// =============================================================================

/// Run a `COUNT(DISTINCT ...)` query, reporting [`DISTINCT_UNAVAILABLE`]
/// when the backend rejects it (e.g. for types without equality).
///
/// Connection and timeout failures still propagate.
pub async fn distinct_count_or_unavailable(
    executor: &dyn QueryExecutor,
    sql: &str,
    table: &str,
    column: &str,
) -> EnrichResult<i64> {
    let result = executor.query(sql, &[]).await;
    match result.and_then(|rows| scalar_i64(&rows)) {
        Err(EnrichError::QueryExecution(message)) => {
            warn!(table, column, error = %message, "distinct count unavailable");
            Ok(DISTINCT_UNAVAILABLE)
        }
        other => other,
    }
}

/// Run a sample-values query, reporting no examples when the backend
/// rejects it (e.g. spatial or binary types that cannot be cast to text).
///
/// Connection and timeout failures still propagate.
pub async fn examples_or_empty(
    executor: &dyn QueryExecutor,
    sql: &str,
    table: &str,
    column: &str,
) -> EnrichResult<Vec<String>> {
    match executor.query(sql, &[]).await {
        Ok(rows) => Ok(first_column_strings(&rows)),
        Err(EnrichError::QueryExecution(message)) => {
            warn!(table, column, error = %message, "examples unavailable");
            Ok(Vec::new())
        }
        Err(e) => Err(e),
    }
}

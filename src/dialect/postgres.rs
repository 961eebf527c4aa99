//! PostgreSQL adapter.
//!
//! Comments are stored with `COMMENT ON` and read back through
//! `col_description` / `obj_description`.

use std::sync::Arc;

use async_trait::async_trait;

use super::helpers::{
    distinct_count_or_unavailable, examples_or_empty, first_column_strings, foreign_keys_from_rows,
    quote_double, quote_string_single,
};
use super::DialectAdapter;
use crate::comment::QuoteStyle;
use crate::error::EnrichResult;
use crate::executor::{cell_string, scalar_i64, QueryExecutor};
use crate::metadata::{ColumnInfo, ColumnStats, ForeignKeyReference};

const DEFAULT_SCHEMA: &str = "public";

const LIST_TABLES_SQL: &str = "\
SELECT table_name::text
FROM information_schema.tables
WHERE table_schema = $1 AND table_type = 'BASE TABLE'
ORDER BY table_name";

const LIST_COLUMNS_SQL: &str = "\
SELECT column_name::text, data_type::text
FROM information_schema.columns
WHERE table_schema = $1 AND table_name = $2
ORDER BY ordinal_position";

const FOREIGN_KEYS_SQL: &str = "\
SELECT ccu.table_name::text, ccu.column_name::text, tc.constraint_name::text
FROM information_schema.table_constraints tc
JOIN information_schema.key_column_usage kcu
  ON tc.constraint_name = kcu.constraint_name AND tc.table_schema = kcu.table_schema
JOIN information_schema.constraint_column_usage ccu
  ON ccu.constraint_name = tc.constraint_name AND ccu.table_schema = tc.table_schema
WHERE tc.constraint_type = 'FOREIGN KEY'
  AND tc.table_schema = $1 AND kcu.table_name = $2 AND kcu.column_name = $3";

const COLUMN_COMMENT_SQL: &str = "\
SELECT col_description(c.oid, a.attnum)
FROM pg_catalog.pg_class c
JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
JOIN pg_catalog.pg_attribute a ON a.attrelid = c.oid
WHERE n.nspname = $1 AND c.relname = $2 AND a.attname = $3 AND NOT a.attisdropped";

const TABLE_COMMENT_SQL: &str = "\
SELECT obj_description(c.oid, 'pg_class')
FROM pg_catalog.pg_class c
JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
WHERE n.nspname = $1 AND c.relname = $2";

/// PostgreSQL dialect adapter.
pub struct PostgresAdapter {
    executor: Arc<dyn QueryExecutor>,
    schema: String,
    sample_size: usize,
}

impl PostgresAdapter {
    pub fn new(executor: Arc<dyn QueryExecutor>, schema: Option<String>, sample_size: usize) -> Self {
        Self {
            executor,
            schema: schema.unwrap_or_else(|| DEFAULT_SCHEMA.to_string()),
            sample_size,
        }
    }

    fn qualified(&self, table: &str) -> String {
        format!("{}.{}", quote_double(&self.schema), quote_double(table))
    }

    fn comment_literal(comment: &str) -> String {
        if comment.is_empty() {
            "NULL".to_string()
        } else {
            quote_string_single(comment)
        }
    }
}

impl QuoteStyle for PostgresAdapter {
    fn quote_identifier(&self, name: &str) -> String {
        quote_double(name)
    }
}

#[async_trait]
impl DialectAdapter for PostgresAdapter {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn list_tables(&self) -> EnrichResult<Vec<String>> {
        let rows = self.executor.query(LIST_TABLES_SQL, &[self.schema.as_str()]).await?;
        Ok(first_column_strings(&rows))
    }

    async fn list_columns(&self, table: &str) -> EnrichResult<Vec<ColumnInfo>> {
        let rows = self
            .executor
            .query(LIST_COLUMNS_SQL, &[self.schema.as_str(), table])
            .await?;
        Ok(rows
            .iter()
            .filter_map(|row| {
                Some(ColumnInfo::new(
                    cell_string(row, 0)?,
                    cell_string(row, 1).unwrap_or_default(),
                ))
            })
            .collect())
    }

    async fn column_stats(&self, table: &str, column: &str) -> EnrichResult<ColumnStats> {
        let from = self.qualified(table);
        let col = quote_double(column);

        let distinct_count = distinct_count_or_unavailable(
            self.executor.as_ref(),
            &format!("SELECT COUNT(DISTINCT {col}) FROM {from}"),
            table,
            column,
        )
        .await?;

        let rows = self
            .executor
            .query(&format!("SELECT COUNT(*) FROM {from} WHERE {col} IS NULL"), &[])
            .await?;
        let null_count = scalar_i64(&rows)?;

        let examples = examples_or_empty(
            self.executor.as_ref(),
            &format!(
                "SELECT DISTINCT CAST({col} AS TEXT) FROM {from} WHERE {col} IS NOT NULL LIMIT {}",
                self.sample_size
            ),
            table,
            column,
        )
        .await?;

        Ok(ColumnStats {
            distinct_count,
            null_count,
            examples,
        })
    }

    async fn foreign_keys(
        &self,
        table: &str,
        column: &str,
    ) -> EnrichResult<Vec<ForeignKeyReference>> {
        let rows = self
            .executor
            .query(FOREIGN_KEYS_SQL, &[self.schema.as_str(), table, column])
            .await?;
        Ok(foreign_keys_from_rows(&rows))
    }

    async fn stored_column_comment(
        &self,
        table: &str,
        column: &str,
    ) -> EnrichResult<Option<String>> {
        let rows = self
            .executor
            .query(COLUMN_COMMENT_SQL, &[self.schema.as_str(), table, column])
            .await?;
        Ok(rows.first().and_then(|row| cell_string(row, 0)))
    }

    async fn stored_table_comment(&self, table: &str) -> EnrichResult<Option<String>> {
        let rows = self
            .executor
            .query(TABLE_COMMENT_SQL, &[self.schema.as_str(), table])
            .await?;
        Ok(rows.first().and_then(|row| cell_string(row, 0)))
    }

    async fn column_comment_statement(
        &self,
        table: &str,
        column: &str,
        comment: &str,
        _exists: bool,
    ) -> EnrichResult<String> {
        Ok(format!(
            "COMMENT ON COLUMN {}.{} IS {};",
            self.qualified(table),
            quote_double(column),
            Self::comment_literal(comment)
        ))
    }

    async fn table_comment_statement(
        &self,
        table: &str,
        comment: &str,
        _exists: bool,
    ) -> EnrichResult<String> {
        Ok(format!(
            "COMMENT ON TABLE {} IS {};",
            self.qualified(table),
            Self::comment_literal(comment)
        ))
    }

    async fn execute_statements(&self, statements: &[String]) -> EnrichResult<()> {
        self.executor.execute_batch(statements).await
    }
}

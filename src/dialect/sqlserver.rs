//! SQL Server adapter.
//!
//! Comments live in the `MS_Description` extended property. Writing one
//! uses `sp_addextendedproperty` the first time and
//! `sp_updateextendedproperty` afterwards; clearing one drops the property.

use std::sync::Arc;

use async_trait::async_trait;

use super::helpers::{
    distinct_count_or_unavailable, examples_or_empty, first_column_strings, foreign_keys_from_rows,
    quote_bracket, quote_example_double, quote_string_unicode,
};
use super::DialectAdapter;
use crate::comment::QuoteStyle;
use crate::error::EnrichResult;
use crate::executor::{cell_string, scalar_i64, QueryExecutor};
use crate::metadata::{ColumnInfo, ColumnStats, ForeignKeyReference};

const DEFAULT_SCHEMA: &str = "dbo";

const LIST_TABLES_SQL: &str = "\
SELECT TABLE_NAME
FROM INFORMATION_SCHEMA.TABLES
WHERE TABLE_SCHEMA = @p1 AND TABLE_TYPE = 'BASE TABLE'
ORDER BY TABLE_NAME";

const LIST_COLUMNS_SQL: &str = "\
SELECT COLUMN_NAME, DATA_TYPE
FROM INFORMATION_SCHEMA.COLUMNS
WHERE TABLE_SCHEMA = @p1 AND TABLE_NAME = @p2
ORDER BY ORDINAL_POSITION";

const FOREIGN_KEYS_SQL: &str = "\
SELECT rt.name, rc.name, fk.name
FROM sys.foreign_keys fk
JOIN sys.foreign_key_columns fkc ON fkc.constraint_object_id = fk.object_id
JOIN sys.tables pt ON pt.object_id = fkc.parent_object_id
JOIN sys.schemas ps ON ps.schema_id = pt.schema_id
JOIN sys.columns pc ON pc.object_id = fkc.parent_object_id AND pc.column_id = fkc.parent_column_id
JOIN sys.tables rt ON rt.object_id = fkc.referenced_object_id
JOIN sys.columns rc ON rc.object_id = fkc.referenced_object_id AND rc.column_id = fkc.referenced_column_id
WHERE ps.name = @p1 AND pt.name = @p2 AND pc.name = @p3";

const COLUMN_COMMENT_SQL: &str = "\
SELECT CAST(value AS NVARCHAR(MAX))
FROM fn_listextendedproperty(N'MS_Description', N'SCHEMA', @p1, N'TABLE', @p2, N'COLUMN', @p3)";

const TABLE_COMMENT_SQL: &str = "\
SELECT CAST(value AS NVARCHAR(MAX))
FROM fn_listextendedproperty(N'MS_Description', N'SCHEMA', @p1, N'TABLE', @p2, NULL, NULL)";

/// SQL Server dialect adapter.
pub struct SqlServerAdapter {
    executor: Arc<dyn QueryExecutor>,
    schema: String,
    sample_size: usize,
}

impl SqlServerAdapter {
    pub fn new(executor: Arc<dyn QueryExecutor>, schema: Option<String>, sample_size: usize) -> Self {
        Self {
            executor,
            schema: schema.unwrap_or_else(|| DEFAULT_SCHEMA.to_string()),
            sample_size,
        }
    }

    fn qualified(&self, table: &str) -> String {
        format!("{}.{}", quote_bracket(&self.schema), quote_bracket(table))
    }

    /// `EXEC` statement for the description property of a table or column.
    fn property_statement(&self, table: &str, column: Option<&str>, comment: &str, exists: bool) -> String {
        let mut target = format!(
            "@level0type = N'SCHEMA', @level0name = {}, @level1type = N'TABLE', @level1name = {}",
            quote_string_unicode(&self.schema),
            quote_string_unicode(table)
        );
        if let Some(column) = column {
            target.push_str(&format!(
                ", @level2type = N'COLUMN', @level2name = {}",
                quote_string_unicode(column)
            ));
        }

        if comment.is_empty() {
            return format!("EXEC sp_dropextendedproperty @name = N'MS_Description', {target};");
        }

        let procedure = if exists {
            "sp_updateextendedproperty"
        } else {
            "sp_addextendedproperty"
        };
        format!(
            "EXEC {procedure} @name = N'MS_Description', @value = {}, {target};",
            quote_string_unicode(comment)
        )
    }
}

impl QuoteStyle for SqlServerAdapter {
    fn quote_identifier(&self, name: &str) -> String {
        quote_bracket(name)
    }

    fn quote_example(&self, value: &str) -> String {
        quote_example_double(value)
    }
}

#[async_trait]
impl DialectAdapter for SqlServerAdapter {
    fn name(&self) -> &'static str {
        "sqlserver"
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
        let col = quote_bracket(column);

        // text, ntext and image columns reject COUNT(DISTINCT).
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
                "SELECT DISTINCT TOP {} CAST({col} AS NVARCHAR(MAX)) FROM {from} WHERE {col} IS NOT NULL",
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
        exists: bool,
    ) -> EnrichResult<String> {
        Ok(self.property_statement(table, Some(column), comment, exists))
    }

    async fn table_comment_statement(
        &self,
        table: &str,
        comment: &str,
        exists: bool,
    ) -> EnrichResult<String> {
        Ok(self.property_statement(table, None, comment, exists))
    }

    async fn execute_statements(&self, statements: &[String]) -> EnrichResult<()> {
        self.executor.execute_batch(statements).await
    }
}

//! MySQL adapter.
//!
//! MySQL has no standalone column comment statement: the comment is part of
//! the column definition, so writing one re-declares the column with
//! `ALTER TABLE ... MODIFY COLUMN`. The definition is rebuilt from
//! `information_schema.COLUMNS` to keep type, character set, collation,
//! nullability, default and extra attributes intact.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::helpers::{
    distinct_count_or_unavailable, examples_or_empty, first_column_strings, foreign_keys_from_rows,
    quote_backtick, quote_string_mysql,
};
use super::DialectAdapter;
use crate::comment::QuoteStyle;
use crate::error::{EnrichError, EnrichResult};
use crate::executor::{cell_string, scalar_i64, QueryExecutor, Row};
use crate::metadata::{ColumnInfo, ColumnStats, ForeignKeyReference};

const LIST_TABLES_SQL: &str = "\
SELECT CAST(TABLE_NAME AS CHAR)
FROM information_schema.TABLES
WHERE TABLE_SCHEMA = DATABASE() AND TABLE_TYPE = 'BASE TABLE'
ORDER BY TABLE_NAME";

const LIST_COLUMNS_SQL: &str = "\
SELECT CAST(COLUMN_NAME AS CHAR), CAST(DATA_TYPE AS CHAR)
FROM information_schema.COLUMNS
WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?
ORDER BY ORDINAL_POSITION";

const COLUMN_DEFINITION_SQL: &str = "\
SELECT CAST(COLUMN_TYPE AS CHAR), CAST(IS_NULLABLE AS CHAR), CAST(COLUMN_DEFAULT AS CHAR),
       CAST(EXTRA AS CHAR), CAST(GENERATION_EXPRESSION AS CHAR),
       CAST(CHARACTER_SET_NAME AS CHAR), CAST(COLLATION_NAME AS CHAR), CAST(SRS_ID AS CHAR)
FROM information_schema.COLUMNS
WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? AND COLUMN_NAME = ?";

/// Same as [`COLUMN_DEFINITION_SQL`] for servers without `SRS_ID` (before 8.0).
const LEGACY_COLUMN_DEFINITION_SQL: &str = "\
SELECT CAST(COLUMN_TYPE AS CHAR), CAST(IS_NULLABLE AS CHAR), CAST(COLUMN_DEFAULT AS CHAR),
       CAST(EXTRA AS CHAR), CAST(GENERATION_EXPRESSION AS CHAR),
       CAST(CHARACTER_SET_NAME AS CHAR), CAST(COLLATION_NAME AS CHAR), NULL
FROM information_schema.COLUMNS
WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? AND COLUMN_NAME = ?";

const FOREIGN_KEYS_SQL: &str = "\
SELECT CAST(REFERENCED_TABLE_NAME AS CHAR), CAST(REFERENCED_COLUMN_NAME AS CHAR),
       CAST(CONSTRAINT_NAME AS CHAR)
FROM information_schema.KEY_COLUMN_USAGE
WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? AND COLUMN_NAME = ?
  AND REFERENCED_TABLE_NAME IS NOT NULL";

const COLUMN_COMMENT_SQL: &str = "\
SELECT CAST(COLUMN_COMMENT AS CHAR)
FROM information_schema.COLUMNS
WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? AND COLUMN_NAME = ?";

const TABLE_COMMENT_SQL: &str = "\
SELECT CAST(TABLE_COMMENT AS CHAR)
FROM information_schema.TABLES
WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?";

/// MySQL dialect adapter. Works on the connection's current database.
pub struct MySqlAdapter {
    executor: Arc<dyn QueryExecutor>,
    sample_size: usize,
}

impl MySqlAdapter {
    pub fn new(executor: Arc<dyn QueryExecutor>, sample_size: usize) -> Self {
        Self {
            executor,
            sample_size,
        }
    }

    async fn column_definition(&self, table: &str, column: &str) -> EnrichResult<ColumnDefinition> {
        let rows = match self.executor.query(COLUMN_DEFINITION_SQL, &[table, column]).await {
            Err(EnrichError::QueryExecution(message)) if message.contains("SRS_ID") => {
                debug!(error = %message, "reading column definition without SRS_ID");
                self.executor
                    .query(LEGACY_COLUMN_DEFINITION_SQL, &[table, column])
                    .await?
            }
            other => other?,
        };
        let row = rows.first().ok_or_else(|| {
            EnrichError::invalid_input(format!("column {table}.{column} does not exist"))
        })?;
        ColumnDefinition::from_row(row)
    }
}

/// The parts of a column definition that `MODIFY COLUMN` must repeat.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ColumnDefinition {
    column_type: String,
    nullable: bool,
    default: Option<String>,
    extra: String,
    generation_expression: String,
    character_set: Option<String>,
    collation: Option<String>,
    srid: Option<String>,
}

impl ColumnDefinition {
    fn from_row(row: &Row) -> EnrichResult<Self> {
        let column_type = cell_string(row, 0)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| EnrichError::query("column definition has no COLUMN_TYPE"))?;
        Ok(Self {
            column_type,
            nullable: cell_string(row, 1).is_some_and(|v| v.eq_ignore_ascii_case("YES")),
            default: cell_string(row, 2),
            extra: cell_string(row, 3).unwrap_or_default(),
            generation_expression: cell_string(row, 4).unwrap_or_default(),
            character_set: cell_string(row, 5).filter(|v| !v.is_empty()),
            collation: cell_string(row, 6).filter(|v| !v.is_empty()),
            srid: cell_string(row, 7).filter(|v| !v.is_empty()),
        })
    }

    fn render(&self) -> String {
        let extra = self.extra.to_lowercase();
        let mut parts = vec![self.column_type.clone()];

        if let Some(charset) = &self.character_set {
            parts.push(format!("CHARACTER SET {charset}"));
        }
        if let Some(collation) = &self.collation {
            parts.push(format!("COLLATE {collation}"));
        }
        if let Some(srid) = &self.srid {
            parts.push(format!("SRID {srid}"));
        }

        if !self.generation_expression.is_empty() {
            let storage = if extra.contains("stored generated") {
                "STORED"
            } else {
                "VIRTUAL"
            };
            parts.push(format!(
                "GENERATED ALWAYS AS ({}) {storage}",
                self.generation_expression
            ));
            if !self.nullable {
                parts.push("NOT NULL".to_string());
            }
            if is_invisible(&extra) {
                parts.push("INVISIBLE".to_string());
            }
            return parts.join(" ");
        }

        if !self.nullable {
            parts.push("NOT NULL".to_string());
        }

        if let Some(default) = &self.default {
            parts.push(format!("DEFAULT {}", self.render_default(default, &extra)));
        }

        if extra.contains("auto_increment") {
            parts.push("AUTO_INCREMENT".to_string());
        }
        if let Some(pos) = extra.find("on update ") {
            let rest = &self.extra[pos + "on update ".len()..];
            if let Some(value) = rest.split_whitespace().next() {
                parts.push(format!("ON UPDATE {value}"));
            }
        }
        if is_invisible(&extra) {
            parts.push("INVISIBLE".to_string());
        }

        parts.join(" ")
    }

    fn render_default(&self, default: &str, extra: &str) -> String {
        let upper = default.to_uppercase();
        if upper.starts_with("CURRENT_TIMESTAMP") || upper == "NULL" {
            default.to_string()
        } else if extra.contains("default_generated") {
            format!("({default})")
        } else {
            quote_string_mysql(default)
        }
    }
}

fn is_invisible(extra: &str) -> bool {
    extra.split_whitespace().any(|word| word == "invisible")
}

impl QuoteStyle for MySqlAdapter {
    fn quote_identifier(&self, name: &str) -> String {
        quote_backtick(name)
    }
}

#[async_trait]
impl DialectAdapter for MySqlAdapter {
    fn name(&self) -> &'static str {
        "mysql"
    }

    async fn list_tables(&self) -> EnrichResult<Vec<String>> {
        let rows = self.executor.query(LIST_TABLES_SQL, &[]).await?;
        Ok(first_column_strings(&rows))
    }

    async fn list_columns(&self, table: &str) -> EnrichResult<Vec<ColumnInfo>> {
        let rows = self.executor.query(LIST_COLUMNS_SQL, &[table]).await?;
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
        let from = quote_backtick(table);
        let col = quote_backtick(column);

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
                "SELECT DISTINCT CAST({col} AS CHAR) FROM {from} WHERE {col} IS NOT NULL LIMIT {}",
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
            .query(FOREIGN_KEYS_SQL, &[table, column])
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
            .query(COLUMN_COMMENT_SQL, &[table, column])
            .await?;
        Ok(rows
            .first()
            .and_then(|row| cell_string(row, 0))
            .filter(|c| !c.is_empty()))
    }

    async fn stored_table_comment(&self, table: &str) -> EnrichResult<Option<String>> {
        let rows = self.executor.query(TABLE_COMMENT_SQL, &[table]).await?;
        Ok(rows
            .first()
            .and_then(|row| cell_string(row, 0))
            .filter(|c| !c.is_empty()))
    }

    async fn column_comment_statement(
        &self,
        table: &str,
        column: &str,
        comment: &str,
        _exists: bool,
    ) -> EnrichResult<String> {
        let definition = self.column_definition(table, column).await?;
        Ok(format!(
            "ALTER TABLE {} MODIFY COLUMN {} {} COMMENT {};",
            quote_backtick(table),
            quote_backtick(column),
            definition.render(),
            quote_string_mysql(comment)
        ))
    }

    async fn table_comment_statement(
        &self,
        table: &str,
        comment: &str,
        _exists: bool,
    ) -> EnrichResult<String> {
        Ok(format!(
            "ALTER TABLE {} COMMENT = {};",
            quote_backtick(table),
            quote_string_mysql(comment)
        ))
    }

    async fn execute_statements(&self, statements: &[String]) -> EnrichResult<()> {
        // ALTER TABLE commits implicitly in MySQL.
        warn!(
            count = statements.len(),
            "MySQL DDL auto-commits; a failure part-way cannot roll back earlier statements"
        );
        self.executor.execute_batch(statements).await
    }
}

//! Backend-specific catalog queries and comment statements.
//!
//! Each backend implements [`DialectAdapter`]. The adapter is chosen once,
//! when the connection is opened ([`connect`]), and injected into the
//! orchestrator; shared code never branches on the backend name.
//!
//! Comment generation follows one strategy for every backend: read the
//! stored comment, merge the new metadata into it, and emit a write
//! statement only when the merged text differs from what is stored. An
//! empty string means "nothing to do".

mod helpers;
mod mysql;
mod postgres;
mod sqlserver;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::comment::{
    column_metadata_text, merge_comments, strip_tagged_region, table_metadata_text, EnrichmentSet,
    QuoteStyle,
};
use crate::config::{ConnectionTarget, Driver, Settings};
use crate::error::{EnrichError, EnrichResult};
use crate::executor::{QueryExecutor, SqlxExecutor, WorkerExecutor};
use crate::metadata::{
    require_name, ColumnInfo, ColumnStats, CommentData, ForeignKeyReference, TableCommentData,
};
use crate::worker::WorkerClient;

pub use helpers::{
    quote_backtick, quote_bracket, quote_double, quote_example_double, quote_string_mysql,
    quote_string_single, quote_string_unicode,
};
pub use mysql::MySqlAdapter;
pub use postgres::PostgresAdapter;
pub use sqlserver::SqlServerAdapter;

/// Default number of example values sampled per column.
pub const DEFAULT_SAMPLE_SIZE: usize = 3;

/// Catalog access and comment SQL generation for one backend.
#[async_trait]
pub trait DialectAdapter: QuoteStyle + Send + Sync {
    /// Backend name used in logs.
    fn name(&self) -> &'static str;

    // =========================================================================
    // Catalog
    // =========================================================================

    /// Base tables of the configured schema, sorted by name.
    async fn list_tables(&self) -> EnrichResult<Vec<String>>;

    /// Columns of `table` in ordinal order.
    async fn list_columns(&self, table: &str) -> EnrichResult<Vec<ColumnInfo>>;

    /// Distinct count, null count and sample values.
    ///
    /// A distinct count the backend refuses to compute is reported as
    /// [`DISTINCT_UNAVAILABLE`](crate::metadata::DISTINCT_UNAVAILABLE).
    async fn column_stats(&self, table: &str, column: &str) -> EnrichResult<ColumnStats>;

    async fn foreign_keys(
        &self,
        table: &str,
        column: &str,
    ) -> EnrichResult<Vec<ForeignKeyReference>>;

    // =========================================================================
    // Stored comments
    // =========================================================================

    /// The stored column comment, `None` when there is none.
    async fn stored_column_comment(&self, table: &str, column: &str)
        -> EnrichResult<Option<String>>;

    /// The stored table comment, `None` when there is none.
    async fn stored_table_comment(&self, table: &str) -> EnrichResult<Option<String>>;

    /// Statement that stores `comment` on a column.
    ///
    /// `exists` tells whether a comment is currently stored.
    async fn column_comment_statement(
        &self,
        table: &str,
        column: &str,
        comment: &str,
        exists: bool,
    ) -> EnrichResult<String>;

    /// Statement that stores `comment` on a table.
    async fn table_comment_statement(
        &self,
        table: &str,
        comment: &str,
        exists: bool,
    ) -> EnrichResult<String>;

    /// Apply statements in one transaction.
    async fn execute_statements(&self, statements: &[String]) -> EnrichResult<()>;

    // =========================================================================
    // Provided
    // =========================================================================

    /// The column comment, empty when none is stored.
    async fn column_comment(&self, table: &str, column: &str) -> EnrichResult<String> {
        require_name("table", table)?;
        require_name("column", column)?;
        Ok(self
            .stored_column_comment(table, column)
            .await?
            .unwrap_or_default())
    }

    /// The table comment, empty when none is stored.
    async fn table_comment(&self, table: &str) -> EnrichResult<String> {
        require_name("table", table)?;
        Ok(self.stored_table_comment(table).await?.unwrap_or_default())
    }

    /// Statement merging `data` into the stored column comment, or an empty
    /// string when the stored comment already matches.
    async fn generate_comment_sql(
        &self,
        data: &CommentData,
        selection: &EnrichmentSet,
    ) -> EnrichResult<String> {
        data.validate()?;
        let meta = &data.metadata;
        let text = column_metadata_text(meta, selection, self);
        let stored = self.stored_column_comment(&meta.table, &meta.column).await?;
        let merged = merge_comments(stored.as_deref().unwrap_or(""), &text, data.update_mode);

        match changed_comment(stored.as_deref(), merged) {
            Some(comment) => {
                self.column_comment_statement(&meta.table, &meta.column, &comment, stored.is_some())
                    .await
            }
            None => {
                debug!(table = %meta.table, column = %meta.column, "column comment unchanged");
                Ok(String::new())
            }
        }
    }

    /// Statement merging `data` into the stored table comment, or an empty
    /// string when the stored comment already matches.
    async fn generate_table_comment_sql(
        &self,
        data: &TableCommentData,
        selection: &EnrichmentSet,
    ) -> EnrichResult<String> {
        data.validate()?;
        let table = &data.metadata.table;
        let text = table_metadata_text(&data.metadata, selection);
        let stored = self.stored_table_comment(table).await?;
        let merged = merge_comments(stored.as_deref().unwrap_or(""), &text, data.update_mode);

        match changed_comment(stored.as_deref(), merged) {
            Some(comment) => {
                self.table_comment_statement(table, &comment, stored.is_some())
                    .await
            }
            None => Ok(String::new()),
        }
    }

    /// Statement removing the tagged region from a column comment, or an
    /// empty string when there is no region.
    async fn generate_delete_comment_sql(&self, table: &str, column: &str) -> EnrichResult<String> {
        require_name("table", table)?;
        require_name("column", column)?;
        let stored = self.stored_column_comment(table, column).await?;
        let stripped = strip_tagged_region(stored.as_deref().unwrap_or(""));

        match changed_comment(stored.as_deref(), stripped) {
            Some(comment) => {
                self.column_comment_statement(table, column, &comment, stored.is_some())
                    .await
            }
            None => Ok(String::new()),
        }
    }

    /// Statement removing the tagged region from a table comment, or an
    /// empty string when there is no region.
    async fn generate_delete_table_comment_sql(&self, table: &str) -> EnrichResult<String> {
        require_name("table", table)?;
        let stored = self.stored_table_comment(table).await?;
        let stripped = strip_tagged_region(stored.as_deref().unwrap_or(""));

        match changed_comment(stored.as_deref(), stripped) {
            Some(comment) => {
                self.table_comment_statement(table, &comment, stored.is_some())
                    .await
            }
            None => Ok(String::new()),
        }
    }
}

/// `Some(merged)` when writing `merged` would change the stored comment.
fn changed_comment(stored: Option<&str>, merged: String) -> Option<String> {
    if merged == stored.unwrap_or("").trim() {
        None
    } else {
        Some(merged)
    }
}

/// Adapter construction options.
#[derive(Debug, Clone)]
pub struct AdapterOptions {
    /// Schema to enrich; backend default when `None`.
    pub schema: Option<String>,
    pub sample_size: usize,
}

impl Default for AdapterOptions {
    fn default() -> Self {
        Self {
            schema: None,
            sample_size: DEFAULT_SAMPLE_SIZE,
        }
    }
}

/// Build the adapter for `driver` over an existing executor.
pub fn build_adapter(
    driver: Driver,
    executor: Arc<dyn QueryExecutor>,
    options: &AdapterOptions,
) -> Arc<dyn DialectAdapter> {
    match driver {
        Driver::Postgres => Arc::new(PostgresAdapter::new(
            executor,
            options.schema.clone(),
            options.sample_size,
        )),
        Driver::MySql => Arc::new(MySqlAdapter::new(executor, options.sample_size)),
        Driver::SqlServer => Arc::new(SqlServerAdapter::new(
            executor,
            options.schema.clone(),
            options.sample_size,
        )),
    }
}

/// Open a connection to `target` and build its adapter.
pub async fn connect(
    target: &ConnectionTarget,
    settings: &Settings,
) -> EnrichResult<Arc<dyn DialectAdapter>> {
    let executor: Arc<dyn QueryExecutor> = match target.driver {
        Driver::Postgres | Driver::MySql => Arc::new(
            SqlxExecutor::connect(
                &target.url,
                settings.pool.max_connections,
                Duration::from_secs(settings.pool.acquire_timeout_secs),
            )
            .await?,
        ),
        Driver::SqlServer => {
            let client = WorkerClient::spawn_with_settings(&settings.worker)
                .await
                .map_err(|e| EnrichError::Connection(e.to_string()))?;
            Arc::new(WorkerExecutor::new(
                Arc::new(client),
                target.driver.worker_name(),
                target.url.clone(),
            ))
        }
    };

    info!(driver = target.driver.as_str(), "connected");
    let options = AdapterOptions {
        schema: target.schema.clone(),
        sample_size: settings.enrichment.sample_size,
    };
    Ok(build_adapter(target.driver, executor, &options))
}

//! Metadata collection and comment orchestration.
//!
//! [`MetadataCollector`] drives three passes over the filtered schema, all
//! sharing one bounded fan-out walker:
//!
//! - **generate**: collect column statistics (plus optional LLM output),
//!   merge them into the stored comments and return the write statements
//! - **delete**: strip the generated region from every comment
//! - **retrieve**: read the stored comments back
//!
//! A pass either returns every result, sorted, or an aggregate error naming
//! every table/column that failed.

mod output;
mod walk;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::comment::{Enrichment, EnrichmentSet, UpdateMode};
use crate::dialect::DialectAdapter;
use crate::error::EnrichResult;
use crate::genai::{LlmClient, ObjectKind};
use crate::metadata::{
    require_name, ColumnInfo, ColumnMetadata, CommentData, CommentRecord, OrderedSql,
    TableCommentData, TableFilter, TableMetadata,
};
use crate::retry::{with_retry, RetryOptions};

pub use output::{format_comments_json, format_comments_text};
use walk::{walk, Outcome, Visitor};

/// Default number of concurrently running table/column tasks.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Options controlling a collector run.
#[derive(Debug, Clone)]
pub struct CollectorOptions {
    pub retry: RetryOptions,
    /// Upper bound on concurrent tasks; values below 1 act as 1.
    pub concurrency: usize,
    pub table_filter: TableFilter,
    pub enrichments: EnrichmentSet,
    pub update_mode: UpdateMode,
    /// Free text handed to the LLM for descriptions.
    pub additional_context: String,
}

impl Default for CollectorOptions {
    fn default() -> Self {
        Self {
            retry: RetryOptions::default(),
            concurrency: DEFAULT_CONCURRENCY,
            table_filter: TableFilter::all(),
            enrichments: EnrichmentSet::all(),
            update_mode: UpdateMode::Overwrite,
            additional_context: String::new(),
        }
    }
}

/// Collects metadata and produces comment SQL for one database.
///
/// Cheap to clone; clones share the adapter, LLM client and cancel token.
#[derive(Clone)]
pub struct MetadataCollector {
    dialect: Arc<dyn DialectAdapter>,
    llm: Option<Arc<dyn LlmClient>>,
    options: Arc<CollectorOptions>,
    cancel: CancelToken,
}

impl MetadataCollector {
    pub fn new(dialect: Arc<dyn DialectAdapter>, options: CollectorOptions) -> Self {
        Self {
            dialect,
            llm: None,
            options: Arc::new(options),
            cancel: CancelToken::new(),
        }
    }

    /// Attach an LLM collaborator for descriptions and PII handling.
    pub fn with_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = Some(llm);
        self
    }

    /// Share a cancel token with the caller.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn options(&self) -> &CollectorOptions {
        &self.options
    }

    fn requested(&self, kind: Enrichment) -> bool {
        self.options.enrichments.is_requested(kind)
    }

    fn context(&self) -> &str {
        self.options.additional_context.trim()
    }

    async fn retry<T, F, Fut>(&self, op: F) -> EnrichResult<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = EnrichResult<T>>,
    {
        with_retry(&self.cancel, &self.options.retry, op).await
    }

    // =========================================================================
    // Collection
    // =========================================================================

    /// Gather statistics, foreign keys and optional LLM output for a column.
    pub async fn collect_column_metadata(
        &self,
        table: &str,
        column: &ColumnInfo,
    ) -> EnrichResult<ColumnMetadata> {
        require_name("table", table)?;
        require_name("column", &column.name)?;

        let stats = self
            .retry(|| self.dialect.column_stats(table, &column.name))
            .await?;
        let mut metadata =
            ColumnMetadata::new(table, &column.name, &column.data_type).with_stats(stats);

        if self.requested(Enrichment::ForeignKeys) {
            match self
                .retry(|| self.dialect.foreign_keys(table, &column.name))
                .await
            {
                Ok(references) => metadata.foreign_keys = references,
                Err(err) => {
                    warn!(table, column = %column.name, error = %err, "foreign key lookup failed");
                }
            }
        }

        let Some(llm) = &self.llm else {
            return Ok(metadata);
        };

        if self.requested(Enrichment::Examples) && !metadata.examples.is_empty() {
            match llm
                .generate_synthetic_examples(
                    &column.name,
                    table,
                    &column.data_type,
                    &metadata.examples,
                )
                .await
            {
                Ok((examples, synthesized)) => {
                    if synthesized {
                        debug!(table, column = %column.name, "using synthetic examples");
                    }
                    metadata.examples = examples;
                }
                Err(err) => {
                    warn!(table, column = %column.name, error = %err, "PII check failed, keeping sampled examples");
                }
            }
        }

        if self.requested(Enrichment::Description) && !self.context().is_empty() {
            metadata.description = llm
                .generate_description(ObjectKind::Column, &column.name, table, self.context())
                .await?;
        }

        Ok(metadata)
    }

    /// Gather table-level metadata: an LLM description when one is
    /// configured, requested and there is context to draw from.
    pub async fn collect_table_metadata(&self, table: &str) -> EnrichResult<TableMetadata> {
        require_name("table", table)?;
        let mut metadata = TableMetadata::new(table);

        if let Some(llm) = &self.llm {
            if self.requested(Enrichment::Description) && !self.context().is_empty() {
                metadata.description = llm
                    .generate_description(ObjectKind::Table, table, "", self.context())
                    .await?;
            }
        }
        Ok(metadata)
    }

    /// Whether this run produces table-level comments at all.
    ///
    /// Without an LLM (or without context) the table text would always be
    /// empty, and merging empty text removes any generated region.
    fn writes_table_comments(&self) -> bool {
        self.llm.is_some() && self.requested(Enrichment::Description) && !self.context().is_empty()
    }

    // =========================================================================
    // Passes
    // =========================================================================

    /// Comment statements for every filtered table and column, sorted by
    /// table, table statement first, then column. Unchanged comments
    /// produce no statement.
    pub async fn generate_comment_sqls(&self) -> EnrichResult<Vec<OrderedSql>> {
        walk(self, GeneratePass).await
    }

    /// Statements removing the generated region from every filtered table
    /// and column comment that has one.
    pub async fn generate_delete_comment_sqls(&self) -> EnrichResult<Vec<OrderedSql>> {
        walk(self, DeletePass).await
    }

    /// Non-empty stored comments of every filtered table and column.
    pub async fn get_comments(&self) -> EnrichResult<Vec<CommentRecord>> {
        walk(self, RetrievePass).await
    }

    /// Execute statements through the adapter in one transaction.
    ///
    /// Not retried: a partially applied batch may not be safe to repeat.
    pub async fn apply(&self, statements: &[String]) -> EnrichResult<()> {
        if statements.is_empty() {
            info!("no statements to apply");
            return Ok(());
        }
        info!(count = statements.len(), dialect = self.dialect.name(), "applying statements");
        self.dialect.execute_statements(statements).await?;
        info!(count = statements.len(), "statements applied");
        Ok(())
    }

    /// Check the LLM credentials, if an LLM is configured.
    pub async fn validate_llm(&self) -> EnrichResult<()> {
        match &self.llm {
            Some(llm) => llm.validate_api_key().await,
            None => Ok(()),
        }
    }

    // =========================================================================
    // Listing
    // =========================================================================

    /// Tables selected by the filter. Filter entries naming tables that do
    /// not exist are logged and skipped.
    async fn filtered_tables(&self) -> EnrichResult<Vec<String>> {
        let tables = self.retry(|| self.dialect.list_tables()).await?;
        let filter = &self.options.table_filter;

        for wanted in filter.table_names() {
            if !tables.iter().any(|t| t == wanted) {
                warn!(table = wanted, "table in filter not found in database");
            }
        }

        Ok(tables
            .into_iter()
            .filter(|t| filter.includes_table(t))
            .collect())
    }

    /// Columns of `table` selected by the filter.
    async fn filtered_columns(&self, table: &str) -> EnrichResult<Vec<ColumnInfo>> {
        let columns = self.retry(|| self.dialect.list_columns(table)).await?;
        let filter = &self.options.table_filter;

        if let Some(wanted) = filter.column_names(table) {
            for name in wanted {
                if !columns.iter().any(|c| c.name == name) {
                    warn!(table, column = name, "column in filter not found in table");
                }
            }
        }

        Ok(columns
            .into_iter()
            .filter(|c| filter.includes_column(table, &c.name))
            .collect())
    }
}

fn non_empty<T>(sql: String, make: impl FnOnce(String) -> T) -> Option<T> {
    (!sql.is_empty()).then(|| make(sql))
}

struct GeneratePass;

#[async_trait]
impl Visitor for GeneratePass {
    type Output = OrderedSql;

    fn name(&self) -> &'static str {
        "generate"
    }

    async fn visit_table(&self, collector: &MetadataCollector, table: &str) -> Outcome<OrderedSql> {
        if !collector.writes_table_comments() {
            return Ok(None);
        }
        let metadata = collector.collect_table_metadata(table).await?;
        let data = TableCommentData::new(metadata, collector.options.update_mode);
        let sql = collector
            .retry(|| {
                collector
                    .dialect
                    .generate_table_comment_sql(&data, &collector.options.enrichments)
            })
            .await?;
        Ok(non_empty(sql, |sql| OrderedSql::table(table, sql)))
    }

    async fn visit_column(
        &self,
        collector: &MetadataCollector,
        table: &str,
        column: &ColumnInfo,
    ) -> Outcome<OrderedSql> {
        let metadata = collector.collect_column_metadata(table, column).await?;
        let data = CommentData::new(metadata, collector.options.update_mode);
        let sql = collector
            .retry(|| {
                collector
                    .dialect
                    .generate_comment_sql(&data, &collector.options.enrichments)
            })
            .await?;
        Ok(non_empty(sql, |sql| OrderedSql::column(table, &column.name, sql)))
    }
}

struct DeletePass;

#[async_trait]
impl Visitor for DeletePass {
    type Output = OrderedSql;

    fn name(&self) -> &'static str {
        "delete"
    }

    async fn visit_table(&self, collector: &MetadataCollector, table: &str) -> Outcome<OrderedSql> {
        let sql = collector
            .retry(|| collector.dialect.generate_delete_table_comment_sql(table))
            .await?;
        Ok(non_empty(sql, |sql| OrderedSql::table(table, sql)))
    }

    async fn visit_column(
        &self,
        collector: &MetadataCollector,
        table: &str,
        column: &ColumnInfo,
    ) -> Outcome<OrderedSql> {
        let sql = collector
            .retry(|| collector.dialect.generate_delete_comment_sql(table, &column.name))
            .await?;
        Ok(non_empty(sql, |sql| OrderedSql::column(table, &column.name, sql)))
    }
}

struct RetrievePass;

#[async_trait]
impl Visitor for RetrievePass {
    type Output = CommentRecord;

    fn name(&self) -> &'static str {
        "retrieve"
    }

    async fn visit_table(&self, collector: &MetadataCollector, table: &str) -> Outcome<CommentRecord> {
        let comment = collector
            .retry(|| collector.dialect.table_comment(table))
            .await?;
        Ok(non_empty(comment, |comment| CommentRecord {
            table: table.to_string(),
            column: None,
            comment,
        }))
    }

    async fn visit_column(
        &self,
        collector: &MetadataCollector,
        table: &str,
        column: &ColumnInfo,
    ) -> Outcome<CommentRecord> {
        let comment = collector
            .retry(|| collector.dialect.column_comment(table, &column.name))
            .await?;
        Ok(non_empty(comment, |comment| CommentRecord {
            table: table.to_string(),
            column: Some(column.name.clone()),
            comment,
        }))
    }
}

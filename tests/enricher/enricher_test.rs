// tests/enricher/enricher_test.rs
//! Orchestrator behaviour against an in-memory dialect adapter.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use db_enricher::cancel::CancelToken;
use db_enricher::comment::{EnrichmentSet, QuoteStyle, UpdateMode};
use db_enricher::dialect::DialectAdapter;
use db_enricher::enricher::{CollectorOptions, MetadataCollector};
use db_enricher::error::{EnrichError, EnrichResult};
use db_enricher::genai::{LlmClient, ObjectKind};
use db_enricher::metadata::{ColumnInfo, ColumnStats, CommentRecord, ForeignKeyReference, TableFilter};
use db_enricher::retry::RetryOptions;

// =============================================================================
// In-memory adapter
// =============================================================================

#[derive(Default)]
struct MemoryDialect {
    tables: BTreeMap<String, Vec<ColumnInfo>>,
    comments: Mutex<HashMap<(String, Option<String>), String>>,
    failing: HashSet<String>,
    flaky: Mutex<HashSet<String>>,
    stats_delay: Duration,
    column_delays: HashMap<String, Duration>,
    completed: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    stats_calls: AtomicUsize,
    applied: Mutex<Vec<String>>,
}

impl MemoryDialect {
    /// `schema` pairs a table with its comma-separated columns.
    fn new(schema: &[(&str, &str)]) -> Self {
        let tables = schema
            .iter()
            .map(|(table, columns)| {
                let columns = columns.split(',').map(|c| ColumnInfo::new(c, "text")).collect();
                (table.to_string(), columns)
            })
            .collect();
        Self {
            tables,
            ..Self::default()
        }
    }

    fn with_column_comment(self, table: &str, column: &str, comment: &str) -> Self {
        self.comments
            .lock()
            .unwrap()
            .insert((table.into(), Some(column.into())), comment.into());
        self
    }

    fn with_table_comment(self, table: &str, comment: &str) -> Self {
        self.comments
            .lock()
            .unwrap()
            .insert((table.into(), None), comment.into());
        self
    }

    fn failing_on(mut self, object: &str) -> Self {
        self.failing.insert(object.into());
        self
    }

    fn flaky_on(self, object: &str) -> Self {
        self.flaky.lock().unwrap().insert(object.into());
        self
    }

    fn with_stats_delay(mut self, delay: Duration) -> Self {
        self.stats_delay = delay;
        self
    }

    /// Overrides the stats delay for one `table.column`.
    fn with_column_delay(mut self, object: &str, delay: Duration) -> Self {
        self.column_delays.insert(object.into(), delay);
        self
    }

    fn stored(&self, table: &str, column: Option<&str>) -> Option<String> {
        self.comments
            .lock()
            .unwrap()
            .get(&(table.to_string(), column.map(String::from)))
            .cloned()
    }
}

impl QuoteStyle for MemoryDialect {
    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{name}\"")
    }
}

#[async_trait]
impl DialectAdapter for MemoryDialect {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn list_tables(&self) -> EnrichResult<Vec<String>> {
        Ok(self.tables.keys().cloned().collect())
    }

    async fn list_columns(&self, table: &str) -> EnrichResult<Vec<ColumnInfo>> {
        Ok(self.tables.get(table).cloned().unwrap_or_default())
    }

    async fn column_stats(&self, table: &str, column: &str) -> EnrichResult<ColumnStats> {
        let object = format!("{table}.{column}");
        self.stats_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(&object) {
            return Err(EnrichError::invalid_input(format!("cannot sample {object}")));
        }
        if self.flaky.lock().unwrap().remove(&object) {
            return Err(EnrichError::Connection("connection reset".into()));
        }

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        let delay = self.column_delays.get(&object).copied().unwrap_or(self.stats_delay);
        tokio::time::sleep(delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.completed.lock().unwrap().push(object);

        Ok(ColumnStats {
            distinct_count: 5,
            null_count: 0,
            examples: vec!["a".into(), "b".into()],
        })
    }

    async fn foreign_keys(&self, table: &str, column: &str) -> EnrichResult<Vec<ForeignKeyReference>> {
        if table == "orders" && column == "account_id" {
            return Ok(vec![ForeignKeyReference {
                referenced_table: "accounts".into(),
                referenced_column: "id".into(),
                constraint_name: "fk_orders_account".into(),
            }]);
        }
        Ok(Vec::new())
    }

    async fn stored_column_comment(&self, table: &str, column: &str) -> EnrichResult<Option<String>> {
        Ok(self.stored(table, Some(column)))
    }

    async fn stored_table_comment(&self, table: &str) -> EnrichResult<Option<String>> {
        Ok(self.stored(table, None))
    }

    async fn column_comment_statement(
        &self,
        table: &str,
        column: &str,
        comment: &str,
        _exists: bool,
    ) -> EnrichResult<String> {
        Ok(format!("COMMENT ON COLUMN {table}.{column} IS '{comment}';"))
    }

    async fn table_comment_statement(&self, table: &str, comment: &str, _exists: bool) -> EnrichResult<String> {
        Ok(format!("COMMENT ON TABLE {table} IS '{comment}';"))
    }

    async fn execute_statements(&self, statements: &[String]) -> EnrichResult<()> {
        self.applied.lock().unwrap().extend(statements.iter().cloned());
        Ok(())
    }
}

// =============================================================================
// Scripted LLM
// =============================================================================

#[derive(Default)]
struct ScriptedLlm {
    description_calls: AtomicUsize,
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn generate_description(
        &self,
        kind: ObjectKind,
        name: &str,
        _parent: &str,
        context: &str,
    ) -> EnrichResult<String> {
        self.description_calls.fetch_add(1, Ordering::SeqCst);
        if context.is_empty() {
            return Ok(String::new());
        }
        Ok(format!("The {name} {kind}"))
    }

    async fn generate_synthetic_examples(
        &self,
        column: &str,
        _table: &str,
        _data_type: &str,
        examples: &[String],
    ) -> EnrichResult<(Vec<String>, bool)> {
        if column == "email" {
            return Ok((vec!["jane@example.com".into()], true));
        }
        Ok((examples.to_vec(), false))
    }

    async fn validate_api_key(&self) -> EnrichResult<()> {
        Ok(())
    }
}

fn fast_retry() -> RetryOptions {
    RetryOptions {
        max_attempts: 3,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(5),
        multiplier: 2.0,
    }
}

fn options() -> CollectorOptions {
    CollectorOptions {
        retry: fast_retry(),
        ..CollectorOptions::default()
    }
}

fn build_collector(dialect: MemoryDialect, options: CollectorOptions) -> (MetadataCollector, Arc<MemoryDialect>) {
    let dialect = Arc::new(dialect);
    (MetadataCollector::new(dialect.clone(), options), dialect)
}

fn shop() -> MemoryDialect {
    MemoryDialect::new(&[
        ("orders", "status,account_id"),
        ("accounts", "name"),
    ])
}

// =============================================================================
// Generate
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_generate_sorted_by_table_then_column() {
    // Lexically earlier columns finish last.
    let dialect = shop()
        .with_column_delay("accounts.name", Duration::from_millis(300))
        .with_column_delay("orders.account_id", Duration::from_millis(200))
        .with_column_delay("orders.status", Duration::from_millis(100));
    let (collector, dialect) = build_collector(dialect, options());
    let statements = collector.generate_comment_sqls().await.unwrap();

    assert_eq!(
        *dialect.completed.lock().unwrap(),
        vec!["orders.status", "orders.account_id", "accounts.name"]
    );

    let targets: Vec<_> = statements
        .iter()
        .map(|s| (s.table.as_str(), s.column.as_deref()))
        .collect();
    assert_eq!(
        targets,
        vec![
            ("accounts", Some("name")),
            ("orders", Some("account_id")),
            ("orders", Some("status")),
        ]
    );
    assert_eq!(
        statements[0].sql,
        "COMMENT ON COLUMN accounts.name IS '<gemini>Examples: ['a', 'b'] | Distinct Values: 5 | Null Count: 0</gemini>';"
    );
    assert!(statements[1].sql.contains("Foreign Keys: [\"accounts\".\"id\"]"));
}

#[tokio::test]
async fn test_generate_respects_enrichment_selection_and_user_text() {
    let dialect = shop().with_column_comment("orders", "status", "Lifecycle state <gemini>Null Count: 9</gemini>");
    let options = CollectorOptions {
        enrichments: EnrichmentSet::parse("null_count").unwrap(),
        table_filter: TableFilter::parse("orders[status]").unwrap(),
        ..options()
    };
    let (collector, _) = build_collector(dialect, options);

    let statements = collector.generate_comment_sqls().await.unwrap();
    assert_eq!(statements.len(), 1);
    assert_eq!(
        statements[0].sql,
        "COMMENT ON COLUMN orders.status IS 'Lifecycle state <gemini>Null Count: 0</gemini>';"
    );
}

#[tokio::test]
async fn test_append_mode_keeps_previous_region_content() {
    let dialect = shop().with_column_comment("accounts", "name", "<gemini>Owner</gemini>");
    let options = CollectorOptions {
        enrichments: EnrichmentSet::parse("null_count").unwrap(),
        table_filter: TableFilter::parse("accounts").unwrap(),
        update_mode: UpdateMode::Append,
        ..options()
    };
    let (collector, _) = build_collector(dialect, options);

    let statements = collector.generate_comment_sqls().await.unwrap();
    assert_eq!(
        statements[0].sql,
        "COMMENT ON COLUMN accounts.name IS '<gemini>Owner | Null Count: 0</gemini>';"
    );
}

#[tokio::test]
async fn test_unchanged_comment_produces_no_statement() {
    let dialect = shop().with_column_comment("accounts", "name", "<gemini>Null Count: 0</gemini>");
    let options = CollectorOptions {
        enrichments: EnrichmentSet::parse("null_count").unwrap(),
        ..options()
    };
    let (collector, _) = build_collector(dialect, options);

    let statements = collector.generate_comment_sqls().await.unwrap();
    assert!(statements.iter().all(|s| s.table != "accounts"));
    assert_eq!(statements.len(), 2);
}

#[tokio::test]
async fn test_failing_column_yields_aggregate_error() {
    let dialect = shop().failing_on("orders.status").failing_on("accounts.name");
    let (collector, _) = build_collector(dialect, options());

    let err = collector.generate_comment_sqls().await.unwrap_err();
    let EnrichError::Aggregate(errors) = &err else {
        panic!("expected aggregate error, got {err:?}");
    };
    assert_eq!(errors.len(), 2);
    let messages: Vec<_> = errors.iter().map(|e| e.to_string()).collect();
    assert!(messages[0].starts_with("accounts.name: "));
    assert!(messages[1].starts_with("orders.status: "));
}

#[tokio::test]
async fn test_one_failure_discards_sibling_results() {
    let dialect = MemoryDialect::new(&[("events", "a,b,c,d,e")]).failing_on("events.c");
    let (collector, dialect) = build_collector(dialect, options());

    let err = collector.generate_comment_sqls().await.unwrap_err();
    let EnrichError::Aggregate(errors) = &err else {
        panic!("expected aggregate error, got {err:?}");
    };
    assert_eq!(errors.len(), 1);
    assert!(errors[0].to_string().starts_with("events.c: "));
    // Siblings still ran.
    assert_eq!(dialect.stats_calls.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn test_transient_stats_failure_is_retried() {
    let dialect = shop().flaky_on("accounts.name");
    let (collector, dialect) = build_collector(dialect, options());

    let statements = collector.generate_comment_sqls().await.unwrap();
    assert_eq!(statements.len(), 3);
    assert_eq!(dialect.stats_calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_filter_limits_tables_and_columns() {
    let options = CollectorOptions {
        table_filter: TableFilter::parse("orders[status],missing").unwrap(),
        ..options()
    };
    let (collector, dialect) = build_collector(shop(), options);

    let statements = collector.generate_comment_sqls().await.unwrap();
    assert_eq!(statements.len(), 1);
    assert_eq!(statements[0].column.as_deref(), Some("status"));
    assert_eq!(dialect.stats_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_concurrency_limit_is_respected() {
    let dialect = MemoryDialect::new(&[
        ("t1", "a,b,c"),
        ("t2", "a,b,c"),
        ("t3", "a,b,c"),
        ("t4", "a,b,c"),
    ])
    .with_stats_delay(Duration::from_millis(10));
    let options = CollectorOptions {
        concurrency: 2,
        ..options()
    };
    let (collector, dialect) = build_collector(dialect, options);

    let statements = collector.generate_comment_sqls().await.unwrap();
    assert_eq!(statements.len(), 12);
    let peak = dialect.max_in_flight.load(Ordering::SeqCst);
    assert!((1..=2).contains(&peak), "peak concurrency was {peak}");
}

#[tokio::test]
async fn test_cancelled_run_fails_fast() {
    let cancel = CancelToken::new();
    cancel.cancel();
    let (collector, dialect) = build_collector(shop(), options());
    let collector = collector.with_cancel(cancel);

    let err = collector.generate_comment_sqls().await.unwrap_err();
    assert!(err.is_cancelled(), "unexpected error: {err}");
    assert_eq!(dialect.stats_calls.load(Ordering::SeqCst), 0);
}

// =============================================================================
// LLM collaboration
// =============================================================================

#[tokio::test]
async fn test_table_comments_need_llm_and_context() {
    let llm = Arc::new(ScriptedLlm::default());

    // No context: columns only, no descriptions requested from the model.
    let (collector, _) = build_collector(shop(), options());
    let statements = collector
        .with_llm(llm.clone())
        .generate_comment_sqls()
        .await
        .unwrap();
    assert!(statements.iter().all(|s| !s.is_table_comment()));
    assert_eq!(llm.description_calls.load(Ordering::SeqCst), 0);

    let options = CollectorOptions {
        additional_context: "Orders placed through the web shop.".into(),
        ..options()
    };
    let (collector, _) = build_collector(shop(), options);
    let statements = collector
        .with_llm(llm.clone())
        .generate_comment_sqls()
        .await
        .unwrap();

    assert_eq!(statements[0].sql, "COMMENT ON TABLE accounts IS '<gemini>The accounts table</gemini>';");
    assert!(statements[0].is_table_comment());
    assert!(statements[1].sql.contains("<gemini>The name column | Examples:"));
    assert_eq!(statements.iter().filter(|s| s.is_table_comment()).count(), 2);
}

#[tokio::test]
async fn test_pii_examples_are_replaced() {
    let dialect = MemoryDialect::new(&[("users", "email")]);
    let options = CollectorOptions {
        enrichments: EnrichmentSet::parse("examples").unwrap(),
        ..options()
    };
    let (collector, _) = build_collector(dialect, options);
    let statements = collector
        .with_llm(Arc::new(ScriptedLlm::default()))
        .generate_comment_sqls()
        .await
        .unwrap();

    assert_eq!(
        statements[0].sql,
        "COMMENT ON COLUMN users.email IS '<gemini>Examples: ['jane@example.com']</gemini>';"
    );
}

// =============================================================================
// Delete and retrieve
// =============================================================================

#[tokio::test]
async fn test_delete_strips_only_tagged_regions() {
    let dialect = shop()
        .with_column_comment("orders", "status", "Lifecycle state <gemini>Null Count: 0</gemini>")
        .with_column_comment("accounts", "name", "Display name")
        .with_table_comment("orders", "<gemini>All orders</gemini>");
    let (collector, _) = build_collector(dialect, options());

    let statements = collector.generate_delete_comment_sqls().await.unwrap();
    let sql: Vec<_> = statements.iter().map(|s| s.sql.as_str()).collect();
    assert_eq!(
        sql,
        vec![
            "COMMENT ON TABLE orders IS '';",
            "COMMENT ON COLUMN orders.status IS 'Lifecycle state';",
        ]
    );
}

#[tokio::test]
async fn test_get_comments_omits_empty() {
    let dialect = shop()
        .with_column_comment("orders", "status", "Lifecycle state")
        .with_column_comment("orders", "account_id", "")
        .with_table_comment("orders", "All orders");
    let (collector, _) = build_collector(dialect, options());

    let records = collector.get_comments().await.unwrap();
    assert_eq!(
        records,
        vec![
            CommentRecord {
                table: "orders".into(),
                column: None,
                comment: "All orders".into(),
            },
            CommentRecord {
                table: "orders".into(),
                column: Some("status".into()),
                comment: "Lifecycle state".into(),
            },
        ]
    );
}

#[tokio::test]
async fn test_apply_passes_statements_through() {
    let (collector, dialect) = build_collector(shop(), options());
    collector.apply(&[]).await.unwrap();
    assert!(dialect.applied.lock().unwrap().is_empty());

    let statements = vec!["COMMENT ON TABLE orders IS 'x'".to_string()];
    collector.apply(&statements).await.unwrap();
    assert_eq!(*dialect.applied.lock().unwrap(), statements);
}

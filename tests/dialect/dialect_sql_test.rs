// tests/dialect/dialect_sql_test.rs
//! End-to-end statement generation for each backend over a fake catalog.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use db_enricher::config::Driver;
use db_enricher::dialect::{build_adapter, AdapterOptions, DialectAdapter};
use db_enricher::enricher::{CollectorOptions, MetadataCollector};
use db_enricher::error::{EnrichError, EnrichResult};
use db_enricher::executor::{QueryExecutor, Row};
use serde_json::json;
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

/// Executor answering catalog queries from substring rules.
#[derive(Default)]
struct FakeDatabase {
    rules: Vec<Rule>,
    queries: Mutex<Vec<(String, Vec<String>)>>,
    batches: Mutex<Vec<Vec<String>>>,
}

struct Rule {
    needle: &'static str,
    param: Option<&'static str>,
    reply: Result<Vec<Row>, &'static str>,
}

impl FakeDatabase {
    fn on(mut self, needle: &'static str, rows: Vec<Row>) -> Self {
        self.rules.push(Rule {
            needle,
            param: None,
            reply: Ok(rows),
        });
        self
    }

    /// Like [`on`](Self::on), but only when `param` is bound.
    fn on_param(mut self, needle: &'static str, param: &'static str, rows: Vec<Row>) -> Self {
        self.rules.push(Rule {
            needle,
            param: Some(param),
            reply: Ok(rows),
        });
        self
    }

    fn failing(mut self, needle: &'static str, message: &'static str) -> Self {
        self.rules.push(Rule {
            needle,
            param: None,
            reply: Err(message),
        });
        self
    }
}

#[async_trait]
impl QueryExecutor for FakeDatabase {
    async fn query(&self, sql: &str, params: &[&str]) -> EnrichResult<Vec<Row>> {
        self.queries.lock().unwrap().push((
            sql.to_string(),
            params.iter().map(|p| p.to_string()).collect(),
        ));
        let rule = self.rules.iter().find(|rule| {
            sql.contains(rule.needle) && rule.param.map_or(true, |p| params.contains(&p))
        });
        match rule.map(|r| &r.reply) {
            Some(Ok(rows)) => Ok(rows.clone()),
            Some(Err(message)) => Err(EnrichError::query(*message)),
            None => Ok(Vec::new()),
        }
    }

    async fn execute_batch(&self, statements: &[String]) -> EnrichResult<()> {
        self.batches.lock().unwrap().push(statements.to_vec());
        Ok(())
    }
}

fn adapter(driver: Driver, database: FakeDatabase, schema: Option<&str>) -> (Arc<dyn DialectAdapter>, Arc<FakeDatabase>) {
    let database = Arc::new(database);
    let options = AdapterOptions {
        schema: schema.map(String::from),
        sample_size: 2,
    };
    (build_adapter(driver, database.clone(), &options), database)
}

fn sql_of(statements: Vec<db_enricher::metadata::OrderedSql>) -> Vec<String> {
    statements.into_iter().map(|s| s.sql).collect()
}

fn assert_valid_postgres(sql: &str) {
    if let Err(e) = Parser::parse_sql(&PostgreSqlDialect {}, sql) {
        panic!("invalid SQL: {e}\nSQL: {sql}");
    }
}

// =============================================================================
// PostgreSQL
// =============================================================================

fn orders_in_postgres() -> FakeDatabase {
    FakeDatabase::default()
        .on_param("FOREIGN KEY", "note", vec![vec![json!("accounts"), json!("id"), json!("fk_note")]])
        .on("information_schema.tables", vec![vec![json!("orders")]])
        .on(
            "information_schema.columns",
            vec![vec![json!("note"), json!("text")], vec![json!("status"), json!("text")]],
        )
        .on("COUNT(DISTINCT", vec![vec![json!(3)]])
        .on("IS NULL", vec![vec![json!("1")]])
        .on("SELECT DISTINCT CAST", vec![vec![json!("open")], vec![json!("it's")]])
        .on_param("col_description", "status", vec![vec![json!("Order state <gemini>old</gemini>")]])
        .on("obj_description", vec![vec![json!("Orders <gemini>All orders</gemini>")]])
}

#[tokio::test]
async fn test_postgres_generate_statements() {
    let (dialect, database) = adapter(Driver::Postgres, orders_in_postgres(), None);
    let collector = MetadataCollector::new(dialect, CollectorOptions::default());

    let sql = sql_of(collector.generate_comment_sqls().await.unwrap());
    assert_eq!(
        sql,
        vec![
            r#"COMMENT ON COLUMN "public"."orders"."note" IS '<gemini>Examples: [''open'', ''it''''s''] | Distinct Values: 3 | Null Count: 1 | Foreign Keys: ["accounts"."id"]</gemini>';"#,
            r#"COMMENT ON COLUMN "public"."orders"."status" IS 'Order state <gemini>Examples: [''open'', ''it''''s''] | Distinct Values: 3 | Null Count: 1</gemini>';"#,
        ]
    );
    for statement in &sql {
        assert_valid_postgres(statement);
    }

    let queries = database.queries.lock().unwrap();
    assert!(queries
        .iter()
        .any(|(q, _)| q.contains(r#"LIMIT 2"#)));
    for (query, _) in queries.iter() {
        assert_valid_postgres(query);
    }
}

#[tokio::test]
async fn test_postgres_delete_and_apply() {
    let (dialect, database) = adapter(Driver::Postgres, orders_in_postgres(), None);
    let collector = MetadataCollector::new(dialect, CollectorOptions::default());

    let sql = sql_of(collector.generate_delete_comment_sqls().await.unwrap());
    assert_eq!(
        sql,
        vec![
            r#"COMMENT ON TABLE "public"."orders" IS 'Orders';"#,
            r#"COMMENT ON COLUMN "public"."orders"."status" IS 'Order state';"#,
        ]
    );
    for statement in &sql {
        assert_valid_postgres(statement);
    }

    collector.apply(&sql).await.unwrap();
    assert_eq!(*database.batches.lock().unwrap(), vec![sql]);
}

#[tokio::test]
async fn test_postgres_custom_schema_is_bound() {
    let (dialect, database) = adapter(Driver::Postgres, orders_in_postgres(), Some("sales"));
    assert_eq!(dialect.list_tables().await.unwrap(), vec!["orders"]);

    let queries = database.queries.lock().unwrap();
    assert_eq!(queries[0].1, vec!["sales"]);
}

#[tokio::test]
async fn test_postgres_region_only_comment_deletes_to_null() {
    let database = FakeDatabase::default()
        .on("col_description", vec![vec![json!("<gemini>Null Count: 1</gemini>")]]);
    let (dialect, _) = adapter(Driver::Postgres, database, None);

    let sql = dialect.generate_delete_comment_sql("orders", "status").await.unwrap();
    assert_eq!(sql, r#"COMMENT ON COLUMN "public"."orders"."status" IS NULL;"#);
    assert_valid_postgres(&sql);
}

// =============================================================================
// MySQL
// =============================================================================

#[tokio::test]
async fn test_mysql_generate_statements() {
    let database = FakeDatabase::default()
        .on("ORDER BY TABLE_NAME", vec![vec![json!("users")]])
        .on("ORDER BY ORDINAL_POSITION", vec![vec![json!("city"), json!("varchar")]])
        .on(
            "COLUMN_TYPE",
            vec![vec![json!("varchar(64)"), json!("YES"), json!("Oslo"), json!(""), json!("")]],
        )
        .failing("COUNT(DISTINCT", "Incorrect usage of DISTINCT")
        .on("IS NULL", vec![vec![json!(0)]])
        .on("SELECT DISTINCT CAST", vec![vec![json!("Oslo")], vec![json!("Bergen")]])
        .on("COLUMN_COMMENT", vec![vec![json!("")]]);
    let (dialect, database) = adapter(Driver::MySql, database, None);
    assert_eq!(dialect.name(), "mysql");
    let collector = MetadataCollector::new(dialect, CollectorOptions::default());

    let sql = sql_of(collector.generate_comment_sqls().await.unwrap());
    assert_eq!(
        sql,
        vec![
            "ALTER TABLE `users` MODIFY COLUMN `city` varchar(64) DEFAULT 'Oslo' \
             COMMENT '<gemini>Examples: [''Oslo'', ''Bergen''] | Null Count: 0</gemini>';"
        ]
    );

    collector.apply(&sql).await.unwrap();
    assert_eq!(database.batches.lock().unwrap().len(), 1);
}

// =============================================================================
// SQL Server
// =============================================================================

fn customers_in_sqlserver() -> FakeDatabase {
    FakeDatabase::default()
        .on("INFORMATION_SCHEMA.TABLES", vec![vec![json!("Customers")]])
        .on(
            "INFORMATION_SCHEMA.COLUMNS",
            vec![vec![json!("Name"), json!("nvarchar")], vec![json!("Notes"), json!("ntext")]],
        )
        .failing("COUNT(DISTINCT [Notes])", "The ntext data type cannot be selected as DISTINCT")
        .on("COUNT(DISTINCT", vec![vec![json!(2)]])
        .on("IS NULL", vec![vec![json!(0)]])
        .on("SELECT DISTINCT TOP 2", vec![vec![json!("Ann")], vec![json!("Bo")]])
        .on_param("N'COLUMN'", "Name", vec![vec![json!("Customer name <gemini>old</gemini>")]])
}

#[tokio::test]
async fn test_sqlserver_generate_statements() {
    let (dialect, _) = adapter(Driver::SqlServer, customers_in_sqlserver(), None);
    let collector = MetadataCollector::new(dialect, CollectorOptions::default());

    let sql = sql_of(collector.generate_comment_sqls().await.unwrap());
    assert_eq!(
        sql,
        vec![
            "EXEC sp_updateextendedproperty @name = N'MS_Description', \
             @value = N'Customer name <gemini>Examples: [\"Ann\", \"Bo\"] | Distinct Values: 2 | Null Count: 0</gemini>', \
             @level0type = N'SCHEMA', @level0name = N'dbo', @level1type = N'TABLE', @level1name = N'Customers', \
             @level2type = N'COLUMN', @level2name = N'Name';",
            "EXEC sp_addextendedproperty @name = N'MS_Description', \
             @value = N'<gemini>Examples: [\"Ann\", \"Bo\"] | Null Count: 0</gemini>', \
             @level0type = N'SCHEMA', @level0name = N'dbo', @level1type = N'TABLE', @level1name = N'Customers', \
             @level2type = N'COLUMN', @level2name = N'Notes';",
        ]
    );
}

#[tokio::test]
async fn test_sqlserver_delete_drops_emptied_property() {
    let database = FakeDatabase::default()
        .on("N'COLUMN'", vec![vec![json!("<gemini>Null Count: 0</gemini>")]]);
    let (dialect, _) = adapter(Driver::SqlServer, database, Some("sales"));

    let sql = dialect.generate_delete_comment_sql("Customers", "Name").await.unwrap();
    assert_eq!(
        sql,
        "EXEC sp_dropextendedproperty @name = N'MS_Description', \
         @level0type = N'SCHEMA', @level0name = N'sales', @level1type = N'TABLE', @level1name = N'Customers', \
         @level2type = N'COLUMN', @level2name = N'Name';"
    );
}

#[tokio::test]
async fn test_sqlserver_spatial_column_skips_examples() {
    let database = FakeDatabase::default()
        .on("INFORMATION_SCHEMA.TABLES", vec![vec![json!("Sites")]])
        .on(
            "INFORMATION_SCHEMA.COLUMNS",
            vec![vec![json!("Code"), json!("nvarchar")], vec![json!("Location"), json!("geography")]],
        )
        .failing(
            "[Location] AS NVARCHAR",
            "Explicit conversion from data type geography to nvarchar(max) is not allowed.",
        )
        .failing(
            "COUNT(DISTINCT [Location])",
            "The geography data type cannot be selected as DISTINCT because it is not comparable.",
        )
        .on("COUNT(DISTINCT", vec![vec![json!(2)]])
        .on("IS NULL", vec![vec![json!(0)]])
        .on("SELECT DISTINCT TOP 2", vec![vec![json!("A1")], vec![json!("B2")]]);
    let (dialect, database) = adapter(Driver::SqlServer, database, None);
    let collector = MetadataCollector::new(dialect, CollectorOptions::default());

    let sql = sql_of(collector.generate_comment_sqls().await.unwrap());
    assert_eq!(
        sql,
        vec![
            "EXEC sp_addextendedproperty @name = N'MS_Description', \
             @value = N'<gemini>Examples: [\"A1\", \"B2\"] | Distinct Values: 2 | Null Count: 0</gemini>', \
             @level0type = N'SCHEMA', @level0name = N'dbo', @level1type = N'TABLE', @level1name = N'Sites', \
             @level2type = N'COLUMN', @level2name = N'Code';",
            "EXEC sp_addextendedproperty @name = N'MS_Description', \
             @value = N'<gemini>Null Count: 0</gemini>', \
             @level0type = N'SCHEMA', @level0name = N'dbo', @level1type = N'TABLE', @level1name = N'Sites', \
             @level2type = N'COLUMN', @level2name = N'Location';",
        ]
    );

    // A rejected examples query is not retried.
    let queries = database.queries.lock().unwrap();
    let attempts = queries
        .iter()
        .filter(|(q, _)| q.contains("[Location] AS NVARCHAR"))
        .count();
    assert_eq!(attempts, 1);
}

//! Test utilities: a scripted query executor and SQL validation.

use std::sync::Mutex;

use async_trait::async_trait;
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

use crate::error::{EnrichError, EnrichResult};
use crate::executor::{QueryExecutor, Row};

/// Canned outcome for queries containing a given substring.
pub enum Reply {
    Rows(Vec<Row>),
    QueryError(&'static str),
    ConnectionError(&'static str),
}

/// Executor answering from a list of `(substring, reply)` rules.
///
/// The first rule whose substring appears in the SQL wins; unmatched
/// queries return no rows. Every query and batch is recorded.
#[derive(Default)]
pub struct ScriptedExecutor {
    rules: Vec<(String, Reply)>,
    pub queries: Mutex<Vec<(String, Vec<String>)>>,
    pub batches: Mutex<Vec<Vec<String>>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, needle: &str, reply: Reply) -> Self {
        self.rules.push((needle.to_string(), reply));
        self
    }

    pub fn recorded_sql(&self) -> Vec<String> {
        self.queries
            .lock()
            .unwrap()
            .iter()
            .map(|(sql, _)| sql.clone())
            .collect()
    }
}

#[async_trait]
impl QueryExecutor for ScriptedExecutor {
    async fn query(&self, sql: &str, params: &[&str]) -> EnrichResult<Vec<Row>> {
        self.queries.lock().unwrap().push((
            sql.to_string(),
            params.iter().map(|p| p.to_string()).collect(),
        ));
        for (needle, reply) in &self.rules {
            if sql.contains(needle.as_str()) {
                return match reply {
                    Reply::Rows(rows) => Ok(rows.clone()),
                    Reply::QueryError(msg) => Err(EnrichError::query(*msg)),
                    Reply::ConnectionError(msg) => Err(EnrichError::Connection(msg.to_string())),
                };
            }
        }
        Ok(Vec::new())
    }

    async fn execute_batch(&self, statements: &[String]) -> EnrichResult<()> {
        self.batches.lock().unwrap().push(statements.to_vec());
        Ok(())
    }
}

/// Validates that a statement parses as Postgres SQL.
pub fn validate_postgres_sql(sql: &str) -> Result<(), String> {
    Parser::parse_sql(&PostgreSqlDialect {}, sql)
        .map(|_| ())
        .map_err(|e| format!("invalid SQL: {e}\nSQL: {sql}"))
}

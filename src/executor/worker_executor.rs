//! Executor that forwards queries to the database worker.

use std::sync::Arc;

use async_trait::async_trait;

use super::{QueryExecutor, Row};
use crate::error::EnrichResult;
use crate::worker::protocol::{methods, ConnectionParams, ExecuteQueryParams, ExecuteQueryResponse};
use crate::worker::WorkerClient;

/// [`QueryExecutor`] backed by a [`WorkerClient`].
pub struct WorkerExecutor {
    client: Arc<WorkerClient>,
    connection: ConnectionParams,
}

impl WorkerExecutor {
    pub fn new(
        client: Arc<WorkerClient>,
        driver: impl Into<String>,
        connection_string: impl Into<String>,
    ) -> Self {
        Self {
            client,
            connection: ConnectionParams {
                driver: driver.into(),
                connection_string: connection_string.into(),
            },
        }
    }

    async fn execute(&self, sql: String, args: Vec<serde_json::Value>) -> EnrichResult<Vec<Row>> {
        let response: ExecuteQueryResponse = self
            .client
            .request(
                methods::EXECUTE_QUERY,
                ExecuteQueryParams {
                    connection: self.connection.clone(),
                    sql,
                    args,
                },
            )
            .await?;
        Ok(response.rows)
    }
}

/// Wrap statements in a single T-SQL batch that commits all of them or none.
///
/// `XACT_ABORT` dooms the transaction on any runtime error; the `CATCH`
/// block rolls it back and rethrows so the worker reports the failure.
fn transaction_script(statements: &[String]) -> String {
    let mut script = String::from("SET XACT_ABORT ON;\nBEGIN TRY\n    BEGIN TRANSACTION;\n");
    for statement in statements {
        let statement = statement.trim().trim_end_matches(';');
        script.push_str("    ");
        script.push_str(statement);
        script.push_str(";\n");
    }
    script.push_str(
        "    COMMIT TRANSACTION;\n\
         END TRY\n\
         BEGIN CATCH\n    \
         IF @@TRANCOUNT > 0 ROLLBACK TRANSACTION;\n    \
         THROW;\n\
         END CATCH;",
    );
    script
}

#[async_trait]
impl QueryExecutor for WorkerExecutor {
    async fn query(&self, sql: &str, params: &[&str]) -> EnrichResult<Vec<Row>> {
        let args = params.iter().map(|p| serde_json::Value::from(*p)).collect();
        self.execute(sql.to_string(), args).await
    }

    async fn execute_batch(&self, statements: &[String]) -> EnrichResult<()> {
        if statements.is_empty() {
            return Ok(());
        }
        self.execute(transaction_script(statements), Vec::new()).await?;
        tracing::debug!(count = statements.len(), "worker transaction committed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_script_wraps_statements() {
        let statements = vec![
            "EXEC sp_addextendedproperty @name = N'MS_Description', @value = N'a';".to_string(),
            "EXEC sp_dropextendedproperty @name = N'MS_Description'".to_string(),
        ];

        insta::assert_snapshot!(transaction_script(&statements), @r"
        SET XACT_ABORT ON;
        BEGIN TRY
            BEGIN TRANSACTION;
            EXEC sp_addextendedproperty @name = N'MS_Description', @value = N'a';
            EXEC sp_dropextendedproperty @name = N'MS_Description';
            COMMIT TRANSACTION;
        END TRY
        BEGIN CATCH
            IF @@TRANCOUNT > 0 ROLLBACK TRANSACTION;
            THROW;
        END CATCH;
        ");
    }

    /// Fake worker that logs each request line and answers with an empty
    /// result, or with a `QUERY_FAILED` error when the SQL mentions `boom`.
    #[cfg(unix)]
    fn fake_worker(dir: &std::path::Path) -> (std::path::PathBuf, std::path::PathBuf) {
        use std::os::unix::fs::PermissionsExt;

        let log = dir.join("requests.log");
        let script = dir.join("worker.sh");
        std::fs::write(
            &script,
            format!(
                r#"#!/bin/sh
while IFS= read -r line; do
  printf '%s\n' "$line" >> '{log}'
  id=$(printf '%s' "$line" | sed 's/^{{"id":"\([^"]*\)".*/\1/')
  case "$line" in
    *boom*) printf '{{"id":"%s","success":false,"error":{{"code":"QUERY_FAILED","message":"boom"}}}}\n' "$id" ;;
    *) printf '{{"id":"%s","success":true,"result":{{"rows":[]}}}}\n' "$id" ;;
  esac
done
"#,
                log = log.display()
            ),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        (script, log)
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_execute_batch_sends_one_transactional_query() {
        let dir = std::env::temp_dir().join(format!("db-enricher-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let (script, log) = fake_worker(&dir);

        let client = WorkerClient::spawn(&script, std::time::Duration::from_secs(5))
            .await
            .unwrap();
        let executor = WorkerExecutor::new(Arc::new(client), "mssql", "sqlserver://localhost");

        executor.execute_batch(&[]).await.unwrap();
        let statements = vec!["EXEC a;".to_string(), "EXEC b;".to_string()];
        executor.execute_batch(&statements).await.unwrap();

        let failed = executor.execute_batch(&["EXEC boom;".to_string()]).await;
        assert!(matches!(
            failed,
            Err(crate::error::EnrichError::QueryExecution(_))
        ));

        let lines = std::fs::read_to_string(&log).unwrap();
        let requests: Vec<serde_json::Value> = lines
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0]["method"], methods::EXECUTE_QUERY);
        assert_eq!(requests[0]["params"]["driver"], "mssql");
        assert_eq!(
            requests[0]["params"]["sql"],
            transaction_script(&statements).as_str()
        );

        std::fs::remove_dir_all(&dir).ok();
    }
}

//! sqlx-backed executor for Postgres and MySQL.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::any::{AnyPoolOptions, AnyRow};
use sqlx::{AnyPool, Row as _};
use tracing::{debug, warn};

use super::{QueryExecutor, Row};
use crate::error::{EnrichError, EnrichResult};

/// Executor over an sqlx `AnyPool`.
pub struct SqlxExecutor {
    pool: AnyPool,
}

impl SqlxExecutor {
    /// Connect to `url` (`postgres://` or `mysql://`).
    pub async fn connect(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> EnrichResult<Self> {
        sqlx::any::install_default_drivers();

        let pool = AnyPoolOptions::new()
            .max_connections(max_connections.max(1))
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await
            .map_err(|e| EnrichError::Connection(format!("failed to connect: {e}")))?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl QueryExecutor for SqlxExecutor {
    async fn query(&self, sql: &str, params: &[&str]) -> EnrichResult<Vec<Row>> {
        let mut query = sqlx::query(sql);
        for param in params {
            query = query.bind(*param);
        }
        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.iter().map(row_to_values).collect())
    }

    async fn execute_batch(&self, statements: &[String]) -> EnrichResult<()> {
        let mut tx = self.pool.begin().await?;

        for (idx, statement) in statements.iter().enumerate() {
            if let Err(e) = sqlx::query(statement).execute(&mut *tx).await {
                warn!(statement = idx + 1, error = %e, "statement failed, rolling back");
                if let Err(rollback) = tx.rollback().await {
                    warn!(error = %rollback, "rollback failed");
                }
                return Err(EnrichError::query(format!(
                    "statement {} of {} failed: {e}",
                    idx + 1,
                    statements.len()
                )));
            }
        }

        tx.commit().await?;
        debug!(count = statements.len(), "batch committed");
        Ok(())
    }
}

fn row_to_values(row: &AnyRow) -> Row {
    (0..row.columns().len())
        .map(|idx| decode_cell(row, idx))
        .collect()
}

/// Decode one cell, trying the value kinds the Any driver supports.
fn decode_cell(row: &AnyRow, idx: usize) -> Value {
    if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<i32>, _>(idx) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<i16>, _>(idx) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<bool>, _>(idx) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(idx) {
        return v
            .map(|bytes| Value::from(String::from_utf8_lossy(&bytes).into_owned()))
            .unwrap_or(Value::Null);
    }
    Value::Null
}

//! Bounded concurrent walk over the filtered tables and their columns.
//!
//! One task per table and, nested, one task per column, all spawned on
//! `JoinSet`s. A shared semaphore admits at most `concurrency` tasks into
//! their own database/LLM work at once. A table task releases its permit
//! before waiting on its column tasks, so nesting never deadlocks.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use super::MetadataCollector;
use crate::error::{EnrichError, EnrichResult};
use crate::metadata::ColumnInfo;

/// Result of visiting one object: `Ok(None)` means nothing to report.
pub(super) type Outcome<T> = EnrichResult<Option<T>>;

/// Per-object work performed during a walk.
#[async_trait]
pub(super) trait Visitor: Send + Sync + 'static {
    type Output: Ord + Send + 'static;

    /// Short name used in logs.
    fn name(&self) -> &'static str;

    async fn visit_table(
        &self,
        collector: &MetadataCollector,
        table: &str,
    ) -> Outcome<Self::Output>;

    async fn visit_column(
        &self,
        collector: &MetadataCollector,
        table: &str,
        column: &ColumnInfo,
    ) -> Outcome<Self::Output>;
}

/// Result and failure collectors shared by every task of a walk.
struct Sink<T> {
    results: Mutex<Vec<T>>,
    errors: Mutex<Vec<EnrichError>>,
}

impl<T> Default for Sink<T> {
    fn default() -> Self {
        Self {
            results: Mutex::new(Vec::new()),
            errors: Mutex::new(Vec::new()),
        }
    }
}

impl<T> Sink<T> {
    fn record(&self, object: &str, outcome: Outcome<T>) {
        match outcome {
            Ok(Some(value)) => self
                .results
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(value),
            Ok(None) => {}
            Err(err) => self.fail(object, err),
        }
    }

    fn fail(&self, object: &str, err: EnrichError) {
        warn!(object, error = %err, "object failed");
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(err.on_object(object));
    }

    fn take(&self) -> (Vec<T>, Vec<EnrichError>) {
        let results = std::mem::take(&mut *self.results.lock().unwrap_or_else(PoisonError::into_inner));
        let errors = std::mem::take(&mut *self.errors.lock().unwrap_or_else(PoisonError::into_inner));
        (results, errors)
    }
}

struct Shared<V: Visitor> {
    collector: MetadataCollector,
    visitor: V,
    permits: Semaphore,
    sink: Sink<V::Output>,
}

/// Walk every filtered table and column with `visitor`.
///
/// Returns the sorted outputs, or [`EnrichError::Aggregate`] with every
/// per-object failure when any object failed.
pub(super) async fn walk<V: Visitor>(
    collector: &MetadataCollector,
    visitor: V,
) -> EnrichResult<Vec<V::Output>> {
    let started = Instant::now();
    let tables = collector.filtered_tables().await?;
    let concurrency = collector.options.concurrency.max(1);
    info!(pass = visitor.name(), tables = tables.len(), concurrency, "starting walk");

    let shared = Arc::new(Shared {
        collector: collector.clone(),
        visitor,
        permits: Semaphore::new(concurrency),
        sink: Sink::default(),
    });

    let mut tasks = JoinSet::new();
    for table in tables {
        let shared = Arc::clone(&shared);
        tasks.spawn(async move { guarded(&shared.sink, &table, walk_table(&shared, &table)).await });
    }
    drain(&mut tasks, &shared.sink, "walk").await;

    let (mut results, errors) = shared.sink.take();
    let elapsed_ms = started.elapsed().as_millis() as u64;
    if !errors.is_empty() {
        warn!(pass = shared.visitor.name(), failures = errors.len(), elapsed_ms, "walk finished with failures");
        return Err(EnrichError::aggregate(errors));
    }

    results.sort();
    info!(pass = shared.visitor.name(), results = results.len(), elapsed_ms, "walk finished");
    Ok(results)
}

async fn walk_table<V: Visitor>(shared: &Arc<Shared<V>>, table: &str) {
    let columns = {
        let Ok(_permit) = shared.permits.acquire().await else {
            shared.sink.fail(table, EnrichError::cancelled("task admission closed"));
            return;
        };
        if shared.collector.cancel.is_cancelled() {
            shared.sink.fail(table, EnrichError::cancelled("skipped after cancellation"));
            return;
        }

        let outcome = shared.visitor.visit_table(&shared.collector, table).await;
        shared.sink.record(table, outcome);

        match shared.collector.filtered_columns(table).await {
            Ok(columns) => columns,
            Err(err) => {
                shared.sink.fail(table, err);
                return;
            }
        }
    };

    let mut tasks = JoinSet::new();
    for column in columns {
        let shared = Arc::clone(shared);
        let table = table.to_string();
        tasks.spawn(async move {
            let object = format!("{table}.{}", column.name);
            guarded(&shared.sink, &object, visit_column(&shared, &table, &column, &object)).await
        });
    }
    drain(&mut tasks, &shared.sink, table).await;
}

async fn visit_column<V: Visitor>(
    shared: &Shared<V>,
    table: &str,
    column: &ColumnInfo,
    object: &str,
) {
    let Ok(_permit) = shared.permits.acquire().await else {
        shared.sink.fail(object, EnrichError::cancelled("task admission closed"));
        return;
    };
    if shared.collector.cancel.is_cancelled() {
        shared.sink.fail(object, EnrichError::cancelled("skipped after cancellation"));
        return;
    }

    let outcome = shared.visitor.visit_column(&shared.collector, table, column).await;
    shared.sink.record(object, outcome);
}

/// Run `work`, recording a panic as a failure of `object`.
async fn guarded<T, F>(sink: &Sink<T>, object: &str, work: F)
where
    F: Future<Output = ()>,
{
    if AssertUnwindSafe(work).catch_unwind().await.is_err() {
        sink.fail(object, EnrichError::query("task panicked"));
    }
}

async fn drain<T>(tasks: &mut JoinSet<()>, sink: &Sink<T>, scope: &str) {
    while let Some(joined) = tasks.join_next().await {
        if let Err(err) = joined {
            sink.fail(scope, EnrichError::query(format!("task did not complete: {err}")));
        }
    }
}

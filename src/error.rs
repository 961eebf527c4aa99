//! Error types shared across the enrichment engine.

use std::io;

use thiserror::Error;

use crate::worker::WorkerError;

/// Result type for enrichment operations.
pub type EnrichResult<T> = Result<T, EnrichError>;

/// Errors produced while collecting metadata or generating comment SQL.
///
/// The first five variants form the classification used by the retry
/// wrapper; the remaining variants carry structure around them.
#[derive(Error, Debug)]
pub enum EnrichError {
    /// The database (or a remote service) could not be reached.
    #[error("connection error: {0}")]
    Connection(String),

    /// A query or remote call was rejected while executing.
    #[error("query execution error: {0}")]
    QueryExecution(String),

    /// Caller supplied input the engine cannot act on.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An operation did not complete in time.
    #[error("timeout: {0}")]
    Timeout(String),

    /// The surrounding operation was cancelled.
    #[error("operation cancelled: {0}")]
    Cancelled(String),

    /// Failure attributed to a single table or column.
    #[error("{object}: {source}")]
    Object {
        /// `table` or `table.column`.
        object: String,
        #[source]
        source: Box<EnrichError>,
    },

    /// Every failure recorded during a fan-out.
    #[error("{} operation(s) failed: {}", .0.len(), join_messages(.0))]
    Aggregate(Vec<EnrichError>),

    /// Reading or writing a local file failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

fn join_messages(errors: &[EnrichError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl EnrichError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn query(message: impl Into<String>) -> Self {
        Self::QueryExecution(message.into())
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::Cancelled(message.into())
    }

    /// Attach the table/column the failure happened on.
    pub fn on_object(self, object: impl Into<String>) -> Self {
        Self::Object {
            object: object.into(),
            source: Box::new(self),
        }
    }

    /// Check if the operation that produced this error may be retried.
    ///
    /// Connection, timeout and query-execution failures are transient;
    /// invalid input and cancellation are terminal.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(_) | Self::Timeout(_) | Self::QueryExecution(_) => true,
            Self::InvalidInput(_) | Self::Cancelled(_) | Self::Io(_) => false,
            Self::Object { source, .. } => source.is_retryable(),
            Self::Aggregate(_) => false,
        }
    }

    /// Check if this error (or the error it wraps) is a cancellation.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled(_) => true,
            Self::Object { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }

    /// Build an aggregate error with a stable ordering.
    pub fn aggregate(mut errors: Vec<EnrichError>) -> Self {
        errors.sort_by_cached_key(|e| e.to_string());
        Self::Aggregate(errors)
    }
}

impl From<sqlx::Error> for EnrichError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => Self::Timeout(err.to_string()),
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
            | sqlx::Error::Protocol(_) => Self::Connection(err.to_string()),
            sqlx::Error::Configuration(_) => Self::InvalidInput(err.to_string()),
            _ => Self::QueryExecution(err.to_string()),
        }
    }
}

impl From<WorkerError> for EnrichError {
    fn from(err: WorkerError) -> Self {
        match err {
            WorkerError::Timeout(_) => Self::Timeout(err.to_string()),
            WorkerError::SpawnFailed(_)
            | WorkerError::WriteFailed(_)
            | WorkerError::WorkerExited
            | WorkerError::ChannelClosed
            | WorkerError::ConnectionFailed(_) => Self::Connection(err.to_string()),
            WorkerError::InvalidRequest(_)
            | WorkerError::DriverNotFound(_)
            | WorkerError::MethodNotFound(_)
            | WorkerError::SerializeFailed(_) => Self::InvalidInput(err.to_string()),
            WorkerError::DeserializeFailed(_) | WorkerError::Remote { .. } => {
                Self::QueryExecution(err.to_string())
            }
        }
    }
}

impl From<reqwest::Error> for EnrichError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_decode() || err.is_status() {
            Self::QueryExecution(err.to_string())
        } else if err.is_builder() {
            Self::InvalidInput(err.to_string())
        } else {
            Self::Connection(err.to_string())
        }
    }
}

//! # db-enricher
//!
//! Enriches relational database schemas with generated documentation:
//! example values, distinct and null counts, foreign-key references and
//! optional LLM descriptions, stored as table and column comments.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                  CLI (src/bin/main.rs)                   │
//! │      add-comments, get-comments, delete-comments, ...    │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [enricher]
//! ┌─────────────────────────────────────────────────────────┐
//! │                  MetadataCollector                       │
//! │   bounded fan-out over tables/columns, retry, LLM        │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [dialect]
//! ┌─────────────────────────────────────────────────────────┐
//! │     DialectAdapter (Postgres, MySQL, SQL Server)         │
//! │   catalog queries + merged comment statements [comment]  │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [executor]
//! ┌─────────────────────────────────────────────────────────┐
//! │       sqlx AnyPool          │     worker process          │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Generated text lives between `<gemini>` and `</gemini>` inside each
//! comment; everything outside those markers belongs to the user and is
//! preserved by every merge and delete.

pub mod cancel;
pub mod comment;
pub mod config;
pub mod dialect;
pub mod enricher;
pub mod error;
pub mod executor;
pub mod files;
pub mod genai;
pub mod metadata;
pub mod retry;
pub mod worker;

#[cfg(test)]
mod test_utils;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::cancel::CancelToken;
    pub use crate::comment::{merge_comments, strip_tagged_region, EnrichmentSet, UpdateMode};
    pub use crate::config::{ConnectionTarget, Driver, Settings};
    pub use crate::dialect::{connect, DialectAdapter};
    pub use crate::enricher::{CollectorOptions, MetadataCollector};
    pub use crate::error::{EnrichError, EnrichResult};
    pub use crate::genai::{GeminiClient, LlmClient};
    pub use crate::metadata::{CommentRecord, OrderedSql, TableFilter};
    pub use crate::retry::RetryOptions;
}

pub use error::{EnrichError, EnrichResult};

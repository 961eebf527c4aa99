//! Generative-AI collaborator.
//!
//! The enrichment engine talks to an LLM only through [`LlmClient`]; it
//! works fully without one. [`GeminiClient`] is the production
//! implementation.

mod gemini;
pub mod prompt;

use std::fmt;

use async_trait::async_trait;

use crate::error::EnrichResult;

pub use gemini::GeminiClient;

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "gemini-1.5-pro-002";

/// Kind of schema object being described.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Table,
    Column,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Table => "table",
            ObjectKind::Column => "column",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Describe a table or column using only `context`.
    ///
    /// `parent` is the table for a column and empty for a table. An empty
    /// context yields an empty description without contacting the model.
    async fn generate_description(
        &self,
        kind: ObjectKind,
        name: &str,
        parent: &str,
        context: &str,
    ) -> EnrichResult<String>;

    /// Replace example values that look like PII with synthetic ones.
    ///
    /// Returns the values to publish and whether they were synthesized.
    async fn generate_synthetic_examples(
        &self,
        column: &str,
        table: &str,
        data_type: &str,
        examples: &[String],
    ) -> EnrichResult<(Vec<String>, bool)>;

    /// Check that the configured credentials are accepted.
    async fn validate_api_key(&self) -> EnrichResult<()>;
}

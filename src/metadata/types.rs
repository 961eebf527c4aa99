//! Metadata collected per table and column, and the values derived from it.

use serde::Serialize;

use crate::comment::UpdateMode;
use crate::error::{EnrichError, EnrichResult};

/// Sentinel distinct count meaning "could not be computed".
pub const DISTINCT_UNAVAILABLE: i64 = -1;

/// A column as listed by the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }
}

/// Statistics sampled from a column's data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnStats {
    /// Distinct values, or [`DISTINCT_UNAVAILABLE`].
    pub distinct_count: i64,
    pub null_count: i64,
    /// Non-null sample values rendered as text.
    pub examples: Vec<String>,
}

impl Default for ColumnStats {
    fn default() -> Self {
        Self {
            distinct_count: DISTINCT_UNAVAILABLE,
            null_count: 0,
            examples: Vec::new(),
        }
    }
}

/// A column referenced by a foreign key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ForeignKeyReference {
    pub referenced_table: String,
    pub referenced_column: String,
    pub constraint_name: String,
}

/// Everything collected for one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMetadata {
    pub table: String,
    pub column: String,
    pub data_type: String,
    pub examples: Vec<String>,
    pub distinct_count: i64,
    pub null_count: i64,
    pub description: String,
    pub foreign_keys: Vec<ForeignKeyReference>,
}

impl ColumnMetadata {
    /// Metadata with no statistics yet.
    pub fn new(
        table: impl Into<String>,
        column: impl Into<String>,
        data_type: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
            data_type: data_type.into(),
            examples: Vec::new(),
            distinct_count: DISTINCT_UNAVAILABLE,
            null_count: 0,
            description: String::new(),
            foreign_keys: Vec::new(),
        }
    }

    pub fn with_stats(mut self, stats: ColumnStats) -> Self {
        self.examples = stats.examples;
        self.distinct_count = stats.distinct_count;
        self.null_count = stats.null_count;
        self
    }

    /// `table.column`, used to tag errors and log lines.
    pub fn object_name(&self) -> String {
        format!("{}.{}", self.table, self.column)
    }
}

/// Everything collected for one table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableMetadata {
    pub table: String,
    pub description: String,
}

impl TableMetadata {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            description: String::new(),
        }
    }
}

/// Input to column comment generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentData {
    pub metadata: ColumnMetadata,
    pub update_mode: UpdateMode,
}

impl CommentData {
    pub fn new(metadata: ColumnMetadata, update_mode: UpdateMode) -> Self {
        Self {
            metadata,
            update_mode,
        }
    }

    pub fn validate(&self) -> EnrichResult<()> {
        require_name("table", &self.metadata.table)?;
        require_name("column", &self.metadata.column)
    }
}

/// Input to table comment generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableCommentData {
    pub metadata: TableMetadata,
    pub update_mode: UpdateMode,
}

impl TableCommentData {
    pub fn new(metadata: TableMetadata, update_mode: UpdateMode) -> Self {
        Self {
            metadata,
            update_mode,
        }
    }

    pub fn validate(&self) -> EnrichResult<()> {
        require_name("table", &self.metadata.table)
    }
}

/// Reject an empty table or column name.
pub fn require_name(kind: &str, value: &str) -> EnrichResult<()> {
    if value.trim().is_empty() {
        return Err(EnrichError::invalid_input(format!("{kind} name is empty")));
    }
    Ok(())
}

/// A generated statement with the object it targets.
///
/// Ordering is by table, then the table-level statement (no column) before
/// column statements, then column name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct OrderedSql {
    pub table: String,
    pub column: Option<String>,
    pub sql: String,
}

impl OrderedSql {
    pub fn table(table: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: None,
            sql: sql.into(),
        }
    }

    pub fn column(table: impl Into<String>, column: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: Some(column.into()),
            sql: sql.into(),
        }
    }

    pub fn is_table_comment(&self) -> bool {
        self.column.is_none()
    }
}

/// An existing comment read back from the database.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct CommentRecord {
    pub table: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    pub comment: String,
}

//! Rendering retrieved comments.

use std::fmt::Write;

use crate::error::{EnrichError, EnrichResult};
use crate::metadata::CommentRecord;

/// Plain-text listing, one block per record.
///
/// ```text
/// Table: orders
/// Comment: All orders
///
/// Table: orders, Column: id
/// Comment: Surrogate key
/// ```
pub fn format_comments_text(records: &[CommentRecord]) -> String {
    let mut out = String::new();
    for record in records {
        // Writing to a String cannot fail.
        let _ = match &record.column {
            Some(column) => writeln!(out, "Table: {}, Column: {column}", record.table),
            None => writeln!(out, "Table: {}", record.table),
        };
        let _ = writeln!(out, "Comment: {}\n", record.comment);
    }
    out
}

/// Pretty-printed JSON array of records.
pub fn format_comments_json(records: &[CommentRecord]) -> EnrichResult<String> {
    serde_json::to_string_pretty(records)
        .map_err(|e| EnrichError::invalid_input(format!("failed to serialize comments: {e}")))
}

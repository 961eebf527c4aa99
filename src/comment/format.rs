//! Rendering collected metadata as tagged-region text.
//!
//! Column text follows a fixed segment order:
//!
//! ```text
//! <description> | Examples: [...] | Distinct Values: N | Null Count: N | Foreign Keys: [...]
//! ```
//!
//! Only requested segments that carry a value are emitted.

use super::enrichment::{Enrichment, EnrichmentSet};
use crate::metadata::{ColumnMetadata, TableMetadata, DISTINCT_UNAVAILABLE};

/// Backend quoting rules used inside comment text.
pub trait QuoteStyle {
    /// Quote a table or column name.
    fn quote_identifier(&self, name: &str) -> String;

    /// Quote one example value for the `Examples` segment.
    fn quote_example(&self, value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }
}

/// Build the metadata text for a column. Returns an empty string when no
/// segment applies.
pub fn column_metadata_text(
    metadata: &ColumnMetadata,
    selection: &EnrichmentSet,
    style: &(impl QuoteStyle + ?Sized),
) -> String {
    let mut segments = Vec::new();

    if selection.is_requested(Enrichment::Description) {
        let description = metadata.description.trim();
        if !description.is_empty() {
            segments.push(description.to_string());
        }
    }

    if selection.is_requested(Enrichment::Examples) && !metadata.examples.is_empty() {
        let quoted: Vec<_> = metadata
            .examples
            .iter()
            .map(|v| style.quote_example(v))
            .collect();
        segments.push(format!("Examples: [{}]", quoted.join(", ")));
    }

    if selection.is_requested(Enrichment::DistinctValues)
        && metadata.distinct_count != DISTINCT_UNAVAILABLE
    {
        segments.push(format!("Distinct Values: {}", metadata.distinct_count));
    }

    if selection.is_requested(Enrichment::NullCount) {
        segments.push(format!("Null Count: {}", metadata.null_count));
    }

    if selection.is_requested(Enrichment::ForeignKeys) && !metadata.foreign_keys.is_empty() {
        let references: Vec<_> = metadata
            .foreign_keys
            .iter()
            .map(|fk| {
                format!(
                    "{}.{}",
                    style.quote_identifier(&fk.referenced_table),
                    style.quote_identifier(&fk.referenced_column)
                )
            })
            .collect();
        segments.push(format!("Foreign Keys: [{}]", references.join(", ")));
    }

    segments.join(" | ")
}

/// Build the metadata text for a table: its description, when requested.
pub fn table_metadata_text(metadata: &TableMetadata, selection: &EnrichmentSet) -> String {
    if !selection.is_requested(Enrichment::Description) {
        return String::new();
    }
    metadata.description.trim().to_string()
}

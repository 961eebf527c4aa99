//! Comment text: the tagged-region protocol, enrichment selection and
//! metadata formatting.

mod enrichment;
mod format;
mod merge;

pub use enrichment::{Enrichment, EnrichmentSet};
pub use format::{column_metadata_text, table_metadata_text, QuoteStyle};
pub use merge::{
    merge_comments, strip_tagged_region, tag, TaggedRegion, UpdateMode, END_TAG, START_TAG,
};

//! Schema metadata model and object selection.
//!
//! Types here are produced by a [`DialectAdapter`](crate::dialect::DialectAdapter)
//! while walking a schema and consumed once when a comment statement is
//! generated.

mod filter;
mod types;

pub use filter::TableFilter;
pub use types::*;

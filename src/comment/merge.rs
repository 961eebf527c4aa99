//! Merging generated metadata into user-authored comments.
//!
//! Generated text lives inside a single tagged region:
//!
//! ```text
//! User prose before <gemini>Examples: ['a'] | Null Count: 0</gemini> user prose after
//! ```
//!
//! The region is located with two byte indices: the first start marker and
//! the last end marker. Everything outside the region belongs to the user and
//! survives every merge. Comments whose user text itself contains a marker
//! substring have no defined merge result.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EnrichError;

/// Opening marker of the generated region.
pub const START_TAG: &str = "<gemini>";

/// Closing marker of the generated region.
pub const END_TAG: &str = "</gemini>";

/// How new metadata combines with an existing tagged region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateMode {
    /// Replace the region content.
    #[default]
    Overwrite,
    /// Join the old and new content with `" | "`.
    Append,
}

impl UpdateMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateMode::Overwrite => "overwrite",
            UpdateMode::Append => "append",
        }
    }
}

impl fmt::Display for UpdateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UpdateMode {
    type Err = EnrichError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "overwrite" => Ok(UpdateMode::Overwrite),
            "append" => Ok(UpdateMode::Append),
            other => Err(EnrichError::invalid_input(format!(
                "unknown update mode '{other}', expected 'overwrite' or 'append'"
            ))),
        }
    }
}

/// Byte span of a well-formed tagged region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaggedRegion {
    /// Index of the first byte of [`START_TAG`].
    pub start: usize,
    /// Index of the first byte of [`END_TAG`].
    pub end: usize,
}

impl TaggedRegion {
    /// Locate the region in `comment`.
    ///
    /// Returns `None` when either marker is missing or the last end marker
    /// does not follow the first start marker.
    pub fn find(comment: &str) -> Option<Self> {
        let start = comment.find(START_TAG)?;
        let end = comment.rfind(END_TAG)?;
        if end < start + START_TAG.len() {
            return None;
        }
        Some(Self { start, end })
    }

    pub fn content<'a>(&self, comment: &'a str) -> &'a str {
        &comment[self.start + START_TAG.len()..self.end]
    }

    pub fn prefix<'a>(&self, comment: &'a str) -> &'a str {
        &comment[..self.start]
    }

    pub fn suffix<'a>(&self, comment: &'a str) -> &'a str {
        &comment[self.end + END_TAG.len()..]
    }
}

/// Wrap `content` in the region markers.
pub fn tag(content: &str) -> String {
    format!("{START_TAG}{content}{END_TAG}")
}

/// Merge `new_metadata` into `existing` according to `mode`.
///
/// Empty metadata removes the tagged region regardless of `mode`.
pub fn merge_comments(existing: &str, new_metadata: &str, mode: UpdateMode) -> String {
    let existing = existing.trim();
    let new_metadata = new_metadata.trim();

    if new_metadata.is_empty() {
        return strip_tagged_region(existing);
    }

    let Some(region) = TaggedRegion::find(existing) else {
        return join_words(&[existing, &tag(new_metadata)]);
    };

    let content = match mode {
        UpdateMode::Overwrite => new_metadata.to_string(),
        UpdateMode::Append => {
            let current = region.content(existing).trim();
            if current.is_empty() {
                new_metadata.to_string()
            } else {
                format!("{current} | {new_metadata}")
            }
        }
    };

    join_words(&[
        region.prefix(existing).trim(),
        &tag(&content),
        region.suffix(existing).trim(),
    ])
}

/// Remove the tagged region, keeping the user text around it.
///
/// Comments without a well-formed region come back trimmed but otherwise
/// unchanged.
pub fn strip_tagged_region(existing: &str) -> String {
    let existing = existing.trim();
    match TaggedRegion::find(existing) {
        Some(region) => join_words(&[
            region.prefix(existing).trim(),
            region.suffix(existing).trim(),
        ]),
        None => existing.to_string(),
    }
}

fn join_words(parts: &[&str]) -> String {
    parts
        .iter()
        .filter(|p| !p.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
}

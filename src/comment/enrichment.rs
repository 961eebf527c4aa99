//! Enrichment kinds and the requested selection.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EnrichError;

/// One category of generated metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Enrichment {
    Examples,
    DistinctValues,
    NullCount,
    Description,
    ForeignKeys,
}

impl Enrichment {
    pub const ALL: [Enrichment; 5] = [
        Enrichment::Examples,
        Enrichment::DistinctValues,
        Enrichment::NullCount,
        Enrichment::Description,
        Enrichment::ForeignKeys,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Enrichment::Examples => "examples",
            Enrichment::DistinctValues => "distinct_values",
            Enrichment::NullCount => "null_count",
            Enrichment::Description => "description",
            Enrichment::ForeignKeys => "foreign_keys",
        }
    }
}

impl fmt::Display for Enrichment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Enrichment {
    type Err = EnrichError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        Enrichment::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| {
                EnrichError::invalid_input(format!(
                    "unknown enrichment '{}', expected one of: {}",
                    s.trim(),
                    Enrichment::ALL.map(|k| k.as_str()).join(", ")
                ))
            })
    }
}

/// The set of enrichments a run should produce.
///
/// An empty set means every enrichment is requested. Settings accept either
/// a comma-separated string or a list of kinds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "EnrichmentSelection", into = "BTreeSet<Enrichment>")]
pub struct EnrichmentSet(BTreeSet<Enrichment>);

#[derive(Deserialize)]
#[serde(untagged)]
enum EnrichmentSelection {
    Csv(String),
    List(BTreeSet<Enrichment>),
}

impl TryFrom<EnrichmentSelection> for EnrichmentSet {
    type Error = EnrichError;

    fn try_from(selection: EnrichmentSelection) -> Result<Self, Self::Error> {
        match selection {
            EnrichmentSelection::Csv(csv) => Self::parse(&csv),
            EnrichmentSelection::List(kinds) => Ok(Self(kinds)),
        }
    }
}

impl From<EnrichmentSet> for BTreeSet<Enrichment> {
    fn from(set: EnrichmentSet) -> Self {
        set.0
    }
}

impl EnrichmentSet {
    /// The empty selection, which requests everything.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn is_requested(&self, kind: Enrichment) -> bool {
        self.0.is_empty() || self.0.contains(&kind)
    }

    /// Parse a comma-separated list such as `examples,null_count`.
    ///
    /// Blank input yields the empty (request-everything) selection.
    pub fn parse(input: &str) -> Result<Self, EnrichError> {
        input
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse)
            .collect::<Result<BTreeSet<_>, _>>()
            .map(Self)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Enrichment> for EnrichmentSet {
    fn from_iter<I: IntoIterator<Item = Enrichment>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for EnrichmentSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("all");
        }
        let names: Vec<_> = self.0.iter().map(|k| k.as_str()).collect();
        f.write_str(&names.join(","))
    }
}

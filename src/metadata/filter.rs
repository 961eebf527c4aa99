//! Table and column selection parsed from `table1[col1,col2],table2`.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{EnrichError, EnrichResult};

/// Which tables (and optionally which of their columns) to process.
///
/// An empty filter selects every table; a table entry without columns
/// selects every column of that table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableFilter {
    tables: BTreeMap<String, Option<BTreeSet<String>>>,
}

impl TableFilter {
    /// A filter that selects everything.
    pub fn all() -> Self {
        Self::default()
    }

    /// Parse a filter expression.
    ///
    /// # Errors
    ///
    /// Returns [`EnrichError::InvalidInput`] for an unterminated or nested
    /// bracket, an empty table name, an empty column list, or text after a
    /// closing bracket.
    pub fn parse(input: &str) -> EnrichResult<Self> {
        let mut filter = Self::default();
        for entry in split_entries(input)? {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            let (table, columns) = parse_entry(entry)?;
            filter.insert(table, columns);
        }
        Ok(filter)
    }

    fn insert(&mut self, table: String, columns: Option<BTreeSet<String>>) {
        match self.tables.entry(table) {
            Entry::Vacant(slot) => {
                slot.insert(columns);
            }
            Entry::Occupied(mut slot) => match (slot.get_mut(), columns) {
                // A bare table entry wins over any column list.
                (existing, None) => *existing = None,
                (Some(existing), Some(columns)) => existing.extend(columns),
                (None, Some(_)) => {}
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn includes_table(&self, table: &str) -> bool {
        self.tables.is_empty() || self.tables.contains_key(table)
    }

    pub fn includes_column(&self, table: &str, column: &str) -> bool {
        if self.tables.is_empty() {
            return true;
        }
        match self.tables.get(table) {
            Some(None) => true,
            Some(Some(columns)) => columns.contains(column),
            None => false,
        }
    }

    /// Tables named by the filter.
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// Columns named for `table`, if the filter restricts them.
    pub fn column_names(&self, table: &str) -> Option<impl Iterator<Item = &str>> {
        self.tables
            .get(table)?
            .as_ref()
            .map(|columns| columns.iter().map(String::as_str))
    }
}

fn split_entries(input: &str) -> EnrichResult<Vec<&str>> {
    let mut entries = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;

    for (idx, ch) in input.char_indices() {
        match ch {
            '[' => {
                if depth > 0 {
                    return Err(EnrichError::invalid_input(format!(
                        "nested '[' in table filter at position {idx}"
                    )));
                }
                depth += 1;
            }
            ']' => {
                if depth == 0 {
                    return Err(EnrichError::invalid_input(format!(
                        "unexpected ']' in table filter at position {idx}"
                    )));
                }
                depth -= 1;
            }
            ',' if depth == 0 => {
                entries.push(&input[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }

    if depth > 0 {
        return Err(EnrichError::invalid_input(format!(
            "missing closing ']' in table filter '{}'",
            input.trim()
        )));
    }
    entries.push(&input[start..]);
    Ok(entries)
}

fn parse_entry(entry: &str) -> EnrichResult<(String, Option<BTreeSet<String>>)> {
    let Some(open) = entry.find('[') else {
        return Ok((entry.to_string(), None));
    };

    let table = entry[..open].trim();
    if table.is_empty() {
        return Err(EnrichError::invalid_input(format!(
            "missing table name before '[' in '{entry}'"
        )));
    }

    // split_entries guarantees a matching ']' exists.
    let close = entry.rfind(']').unwrap_or(entry.len());
    if !entry[close + 1..].trim().is_empty() {
        return Err(EnrichError::invalid_input(format!(
            "unexpected text after ']' in '{entry}'"
        )));
    }

    let columns: BTreeSet<String> = entry[open + 1..close]
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect();
    if columns.is_empty() {
        return Err(EnrichError::invalid_input(format!(
            "empty column list for table '{table}'"
        )));
    }

    Ok((table.to_string(), Some(columns)))
}

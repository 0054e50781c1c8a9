pub mod canonical;
pub mod columns;

use serde_json::Value;
use tracing::debug;

use crate::records::RawRecord;
use crate::table::FlatTable;
use canonical::canonicalize;
pub use columns::{ColumnSpec, SectionSpec, SECTIONS};

pub const TERM_COLUMN: &str = "term";
pub const SEARCH_QUERY_COLUMN: &str = "search_query";

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("cannot serialize `{section}` entry {entry_index} of record {record_index}")]
    Serialization {
        section: String,
        record_index: usize,
        entry_index: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Counters describing what happened to the entries of one section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractStats {
    pub records: usize,
    pub entries: usize,
    pub malformed: usize,
    pub duplicates: usize,
    pub rows: usize,
}

#[derive(Debug, Clone)]
pub struct SectionOutput {
    pub table: FlatTable,
    pub stats: ExtractStats,
}

/// Flatten `field` of every record into one table.
///
/// Returns `Ok(None)` when no record carries data for the section, so callers
/// can skip it instead of writing an empty artifact. The header is `term`,
/// then `columns` in order, then `search_query` if any record has one.
pub fn extract_section(
    records: &[RawRecord],
    field: &str,
    columns: &[ColumnSpec<'_>],
) -> Result<Option<SectionOutput>, ExtractError> {
    if !records.iter().any(|r| has_data(r.section(field))) {
        return Ok(None);
    }

    let with_search_query = records.iter().any(|r| r.search_query().is_some());
    let mut header = vec![TERM_COLUMN];
    header.extend(columns.iter().map(|c| c.name));
    if with_search_query {
        header.push(SEARCH_QUERY_COLUMN);
    }

    let mut table = FlatTable::new(header);
    let mut stats = ExtractStats {
        records: records.len(),
        ..Default::default()
    };

    for (record_index, record) in records.iter().enumerate() {
        let term = record.term.trim();
        if term.is_empty() {
            continue;
        }

        for (entry_index, entry) in expand_entries(record.section(field)).into_iter().enumerate() {
            stats.entries += 1;
            let serialization = |source: serde_json::Error| ExtractError::Serialization {
                section: field.to_string(),
                record_index,
                entry_index,
                source,
            };

            let fields = match entry {
                Value::Object(map) => Some(map),
                Value::Array(_) => None,
                _ => {
                    debug!(section = field, record_index, entry_index, "dropping scalar entry");
                    stats.malformed += 1;
                    continue;
                }
            };

            let mut row = Vec::with_capacity(columns.len() + 2);
            row.push(term.to_string());
            for column in columns {
                let cell = match fields.and_then(|f| columns::resolve(f, column.sources)) {
                    Some(value) => canonicalize(value).map_err(serialization)?,
                    None => String::new(),
                };
                row.push(cell);
            }
            if with_search_query {
                let cell = match record.search_query() {
                    Some(value) => canonicalize(value).map_err(serialization)?,
                    None => String::new(),
                };
                row.push(cell);
            }
            table.push_row(row);
        }
    }

    stats.duplicates = table.dedup();
    stats.rows = table.len();
    Ok(Some(SectionOutput { table, stats }))
}

/// Shorthand for one of the built-in sections.
pub fn extract_builtin(
    records: &[RawRecord],
    spec: &SectionSpec,
) -> Result<Option<SectionOutput>, ExtractError> {
    extract_section(records, spec.field, spec.columns)
}

/// Expand a sub-section value into its entries: a sequence yields its
/// non-null elements, any other non-null value yields itself, null or absent
/// yields nothing.
pub fn expand_entries(value: Option<&Value>) -> Vec<&Value> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.iter().filter(|v| !v.is_null()).collect(),
        Some(other) => vec![other],
    }
}

fn has_data(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Array(items)) => items.iter().any(|v| !v.is_null()),
        Some(Value::Object(map)) => !map.is_empty(),
        Some(_) => true,
    }
}

use anyhow::{bail, Context, Result};
use rayon::prelude::*;
use tracing::{error, info, warn};

use crate::extract::columns::RELATED_QUERIES;
use crate::extract::{extract_builtin, ExtractError, SectionOutput, SectionSpec, SECTIONS};
use crate::normalize::{normalize_related, Normalized};
use crate::records::RawRecord;
use crate::store::{TableStore, RELATED_QUERIES_CLEAN};

pub struct SectionResult {
    pub spec: SectionSpec,
    pub outcome: Result<Option<SectionOutput>, ExtractError>,
}

/// Everything one pass over the records produces, before persistence.
pub struct Flattened {
    pub sections: Vec<SectionResult>,
    pub related_clean: Option<Normalized>,
}

/// Extract every built-in section (in parallel) and normalize related queries.
pub fn flatten(records: &[RawRecord]) -> Flattened {
    let sections: Vec<SectionResult> = SECTIONS
        .par_iter()
        .map(|spec| SectionResult {
            spec: *spec,
            outcome: extract_builtin(records, spec),
        })
        .collect();

    let related_clean = sections
        .iter()
        .find(|s| s.spec.field == RELATED_QUERIES.field)
        .and_then(|s| s.outcome.as_ref().ok())
        .and_then(Option::as_ref)
        .map(|out| normalize_related(out.table.clone()));

    Flattened {
        sections,
        related_clean,
    }
}

#[derive(Debug, Default)]
pub struct ProcessCounts {
    pub records: usize,
    pub written: Vec<(&'static str, usize)>,
    pub skipped: Vec<&'static str>,
    pub failed: Vec<&'static str>,
    pub malformed: usize,
}

impl ProcessCounts {
    pub fn print(&self) {
        println!("Processed {} raw records.", self.records);
        for (table, rows) in &self.written {
            println!("  {:<24} {:>6} rows", table, rows);
        }
        if !self.skipped.is_empty() {
            println!("  skipped (no data): {}", self.skipped.join(", "));
        }
        if !self.failed.is_empty() {
            println!("  failed: {}", self.failed.join(", "));
        }
        if self.malformed > 0 {
            println!("  dropped {} malformed entries", self.malformed);
        }
    }
}

/// Write the flattened tables to `store`.
///
/// A section that failed to serialize is logged and left unwritten; with
/// `strict` the whole run aborts before anything is written.
pub fn persist(flattened: &Flattened, store: &dyn TableStore, strict: bool) -> Result<ProcessCounts> {
    if strict {
        if let Some(err) = flattened.sections.iter().find_map(|s| s.outcome.as_ref().err()) {
            bail!("extraction failed in strict mode: {}", err);
        }
    }

    let mut counts = ProcessCounts::default();
    for section in &flattened.sections {
        let table = section.spec.table;
        match &section.outcome {
            Ok(None) => {
                info!(section = section.spec.field, "no data, skipping");
                counts.skipped.push(table);
            }
            Ok(Some(out)) => {
                store
                    .write_table(table, &out.table)
                    .with_context(|| format!("failed to write {}", table))?;
                info!(
                    table,
                    records = out.stats.records,
                    entries = out.stats.entries,
                    rows = out.stats.rows,
                    malformed = out.stats.malformed,
                    duplicates = out.stats.duplicates,
                    "wrote section"
                );
                counts.malformed += out.stats.malformed;
                counts.written.push((table, out.table.len()));
            }
            Err(e) => {
                error!(table, error = %e, "extraction failed, section skipped");
                counts.failed.push(table);
            }
        }
    }

    match &flattened.related_clean {
        Some(clean) => {
            store
                .write_table(RELATED_QUERIES_CLEAN, &clean.table)
                .with_context(|| format!("failed to write {}", RELATED_QUERIES_CLEAN))?;
            info!(
                table = RELATED_QUERIES_CLEAN,
                rows = clean.table.len(),
                recovered = clean.stats.recovered,
                dropped_empty = clean.stats.dropped_empty,
                dropped_duplicate = clean.stats.dropped_duplicate,
                "wrote clean related queries"
            );
            counts.written.push((RELATED_QUERIES_CLEAN, clean.table.len()));
        }
        None => warn!("no related queries, clean table not written"),
    }

    Ok(counts)
}

/// Flatten and persist in one step.
pub fn process_records(records: &[RawRecord], store: &dyn TableStore, strict: bool) -> Result<ProcessCounts> {
    let flattened = flatten(records);
    let mut counts = persist(&flattened, store, strict)?;
    counts.records = records.len();
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::delimited::CsvStore;
    use serde_json::{json, Value};

    fn fixture() -> Vec<RawRecord> {
        let raw = std::fs::read_to_string("tests/fixtures/coffee.json").unwrap();
        let items: Vec<Value> = serde_json::from_str(&raw).unwrap();
        items
            .into_iter()
            .filter_map(|item| {
                let term = item["searchQuery"]["term"].as_str()?.to_string();
                RawRecord::from_item(&term, item, None)
            })
            .collect()
    }

    fn pairs(n: &Normalized) -> Vec<(String, String)> {
        (0..n.table.len())
            .map(|i| {
                (
                    n.table.value(i, "term").unwrap().to_string(),
                    n.table.value(i, "query").unwrap().to_string(),
                )
            })
            .collect()
    }

    #[test]
    fn end_to_end_coffee_record() {
        let records = vec![RawRecord::from_item(
            "coffee",
            json!({"relatedQueries": [
                {"query": "", "url": "https://x.com/search?q=espresso"},
                {"query": "Coffee  Shop ", "url": ""},
            ]}),
            None,
        )
        .unwrap()];
        let flattened = flatten(&records);
        let clean = flattened.related_clean.unwrap().table;
        assert_eq!(clean.columns(), &["term", "query", "url"]);
        assert_eq!(
            clean.rows(),
            &[
                vec!["coffee".to_string(), "espresso".into(), "https://x.com/search?q=espresso".into()],
                vec!["coffee".to_string(), "Coffee Shop".into(), String::new()],
            ]
        );
    }

    #[test]
    fn fixture_clean_edges() {
        let flattened = flatten(&fixture());
        let clean = flattened.related_clean.as_ref().unwrap();
        assert_eq!(
            pairs(clean),
            vec![
                ("coffee".to_string(), "coffee shop near me".to_string()),
                ("coffee".to_string(), "coffee beans".to_string()),
                ("coffee".to_string(), "Coffee Benefits".to_string()),
                ("matcha".to_string(), "matcha latte".to_string()),
            ]
        );
        assert_eq!(clean.stats.dropped_duplicate, 1);
        assert_eq!(clean.stats.dropped_empty, 1);
    }

    #[test]
    fn empty_section_is_skipped_while_others_are_written() {
        let records = vec![RawRecord::from_item(
            "coffee",
            json!({"organicResults": [{"title": "A", "url": "https://a"}], "peopleAlsoAsk": null}),
            None,
        )
        .unwrap()];
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::new(dir.path());
        let counts = process_records(&records, &store, true).unwrap();

        assert_eq!(counts.written, vec![("organic_results", 1)]);
        assert_eq!(counts.skipped, vec!["people_also_ask", "related_queries"]);
        assert!(counts.failed.is_empty());
        assert!(store.read_table("people_also_ask").unwrap().is_none());
        assert!(store.read_table(RELATED_QUERIES_CLEAN).unwrap().is_none());
    }

    fn failed_organic_section() -> Flattened {
        let records = fixture();
        let mut flattened = flatten(&records);
        flattened.sections[0].outcome = Err(ExtractError::Serialization {
            section: "organicResults".into(),
            record_index: 0,
            entry_index: 2,
            source: serde_json::from_str::<Value>("{").unwrap_err(),
        });
        flattened
    }

    #[test]
    fn serialization_failure_skips_only_that_section() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::new(dir.path());
        let counts = persist(&failed_organic_section(), &store, false).unwrap();
        assert_eq!(counts.failed, vec!["organic_results"]);
        assert!(store.read_table("organic_results").unwrap().is_none());
        assert!(store.read_table("people_also_ask").unwrap().is_some());
        assert!(store.read_table(RELATED_QUERIES_CLEAN).unwrap().is_some());
    }

    #[test]
    fn strict_mode_aborts_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::new(dir.path());
        let err = persist(&failed_organic_section(), &store, true).unwrap_err();
        assert!(err.to_string().contains("record 0"));
        assert!(store.read_table("people_also_ask").unwrap().is_none());
    }

    #[test]
    fn fixture_persists_all_four_tables() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::new(dir.path());
        let counts = process_records(&fixture(), &store, false).unwrap();
        let names: Vec<&str> = counts.written.iter().map(|(t, _)| *t).collect();
        assert_eq!(
            names,
            vec!["organic_results", "people_also_ask", "related_queries", RELATED_QUERIES_CLEAN]
        );
        assert_eq!(counts.malformed, 1);
        let organic = store.read_table("organic_results").unwrap().unwrap();
        assert_eq!(organic.columns(), &["term", "title", "url", "snippet", "search_query"]);
        assert_eq!(organic.len(), 3);
    }
}

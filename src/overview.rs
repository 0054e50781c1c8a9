use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::OnceLock;

use regex::Regex;

use crate::records::normalize_term;
use crate::table::FlatTable;

const MIN_WORD_CHARS: usize = 3;

/// Distinct normalized terms across `tables`, sorted.
pub fn available_terms(tables: &[&FlatTable]) -> Vec<String> {
    let mut terms = BTreeSet::new();
    for table in tables {
        let Some(idx) = table.column("term") else {
            continue;
        };
        for row in table.rows() {
            let term = normalize_term(&row[idx]);
            if !term.is_empty() {
                terms.insert(term);
            }
        }
    }
    terms.into_iter().collect()
}

/// Rows whose `term` matches any of `terms` (trimmed, case-insensitive).
/// An empty selection keeps every row; a table without `term` keeps none.
pub fn filter_by_terms(table: &FlatTable, terms: &[String]) -> FlatTable {
    if terms.is_empty() {
        return table.clone();
    }
    let mut out = FlatTable::new(table.columns().iter().cloned());
    let Some(idx) = table.column("term") else {
        return out;
    };
    let wanted: BTreeSet<String> = terms.iter().map(|t| normalize_term(t)).collect();
    for row in table.rows() {
        if wanted.contains(&normalize_term(&row[idx])) {
            out.push_row(row.clone());
        }
    }
    out
}

/// Most frequent words of `column`, ties broken alphabetically.
pub fn word_frequencies(table: &FlatTable, column: &str, limit: usize) -> Vec<(String, usize)> {
    static WORD: OnceLock<Regex> = OnceLock::new();
    let re = WORD.get_or_init(|| Regex::new(r"\w+").unwrap());

    let Some(idx) = table.column(column) else {
        return Vec::new();
    };
    let mut counts: HashMap<String, usize> = HashMap::new();
    for row in table.rows() {
        for m in re.find_iter(&row[idx]) {
            let word = m.as_str().to_lowercase();
            if word.chars().count() >= MIN_WORD_CHARS {
                *counts.entry(word).or_default() += 1;
            }
        }
    }
    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(limit);
    ranked
}

/// Term → related queries, in first-seen order per term.
pub fn related_edges(table: &FlatTable) -> BTreeMap<String, Vec<String>> {
    let mut edges: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let (Some(t), Some(q)) = (table.column("term"), table.column("query")) else {
        return edges;
    };
    for row in table.rows() {
        let queries = edges.entry(row[t].clone()).or_default();
        if !queries.contains(&row[q]) {
            queries.push(row[q].clone());
        }
    }
    edges
}

/// Print up to `limit` rows as a `|`-separated preview.
pub fn print_preview(title: &str, table: &FlatTable, limit: usize) {
    println!("\n--- {} ({} rows) ---", title, table.len());
    if table.is_empty() {
        println!("  (none)");
        return;
    }
    let header: Vec<String> = table.columns().iter().map(|c| truncate(c, 28)).collect();
    println!("{}", header.join(" | "));
    for row in table.rows().iter().take(limit) {
        let cells: Vec<String> = row.iter().map(|c| truncate(c, 28)).collect();
        println!("{}", cells.join(" | "));
    }
    if table.len() > limit {
        println!("  ... {} more", table.len() - limit);
    }
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

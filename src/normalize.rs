use url::Url;

use crate::table::FlatTable;

/// Base used to resolve scheme-less links such as `/search?q=...`.
const RELATIVE_BASE: &str = "https://relative.invalid/";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizeStats {
    pub input: usize,
    pub recovered: usize,
    pub dropped_empty: usize,
    pub dropped_duplicate: usize,
}

#[derive(Debug, Clone)]
pub struct Normalized {
    pub table: FlatTable,
    pub stats: NormalizeStats,
}

/// Clean a related-queries table into a (term, query) edge list.
///
/// Never fails: a row whose query cannot be recovered is dropped. Missing
/// `term`, `query` or `url` columns are added empty.
pub fn normalize_related(mut table: FlatTable) -> Normalized {
    let term = table.ensure_column("term");
    let query = table.ensure_column("query");
    let url = table.ensure_column("url");

    let mut stats = NormalizeStats {
        input: table.len(),
        ..Default::default()
    };

    for row in table.rows_mut() {
        if row[query].trim().is_empty() {
            let recovered = query_from_url(&row[url]);
            if !recovered.is_empty() {
                stats.recovered += 1;
            }
            row[query] = recovered;
        }
        row[query] = collapse_whitespace(&row[query]);
    }

    table.retain(|row| !row[query].is_empty());
    stats.dropped_empty = stats.input - table.len();
    stats.dropped_duplicate = table.dedup_on(&[term, query]);

    Normalized { table, stats }
}

/// Decoded, trimmed value of the first `q` parameter of `raw`, or "".
pub fn query_from_url(raw: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() {
        return String::new();
    }
    let parsed = match Url::parse(raw) {
        Ok(u) => u,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            match Url::parse(RELATIVE_BASE).and_then(|base| base.join(raw)) {
                Ok(u) => u,
                Err(_) => return String::new(),
            }
        }
        Err(_) => return String::new(),
    };
    parsed
        .query_pairs()
        .find(|(k, _)| k == "q")
        .map(|(_, v)| v.trim().to_string())
        .unwrap_or_default()
}

/// Collapse whitespace runs to one space and trim the ends.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

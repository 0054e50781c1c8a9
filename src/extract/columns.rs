use serde_json::{Map, Value};

/// An output column and the ordered source paths it may be read from.
///
/// Paths are tried left to right; the first one present in an entry wins,
/// even when it holds null. A dotted path (`siteLinks.url`) descends into nested
/// objects when no key with the literal dotted name exists.
#[derive(Debug, Clone, Copy)]
pub struct ColumnSpec<'a> {
    pub name: &'a str,
    pub sources: &'a [&'a str],
}

/// A sub-section of the acquired records and the table it flattens into.
#[derive(Debug, Clone, Copy)]
pub struct SectionSpec {
    pub field: &'static str,
    pub table: &'static str,
    pub columns: &'static [ColumnSpec<'static>],
}

pub const ORGANIC_RESULTS: SectionSpec = SectionSpec {
    field: "organicResults",
    table: "organic_results",
    columns: &[
        ColumnSpec { name: "title", sources: &["title"] },
        ColumnSpec { name: "url", sources: &["url", "link"] },
        ColumnSpec { name: "snippet", sources: &["snippet", "description"] },
    ],
};

pub const PEOPLE_ALSO_ASK: SectionSpec = SectionSpec {
    field: "peopleAlsoAsk",
    table: "people_also_ask",
    columns: &[
        ColumnSpec { name: "question", sources: &["question"] },
        ColumnSpec { name: "answer", sources: &["answer"] },
        ColumnSpec { name: "url", sources: &["link", "url"] },
    ],
};

pub const RELATED_QUERIES: SectionSpec = SectionSpec {
    field: "relatedQueries",
    table: "related_queries",
    columns: &[
        ColumnSpec { name: "query", sources: &["query", "title"] },
        ColumnSpec { name: "url", sources: &["url", "link"] },
    ],
};

/// Every built-in section, in the order tables are produced.
pub const SECTIONS: [SectionSpec; 3] = [ORGANIC_RESULTS, PEOPLE_ALSO_ASK, RELATED_QUERIES];

/// Value of the first candidate path present in `entry`.
pub fn resolve<'v>(entry: &'v Map<String, Value>, sources: &[&str]) -> Option<&'v Value> {
    sources.iter().find_map(|path| lookup(entry, path))
}

fn lookup<'v>(entry: &'v Map<String, Value>, path: &str) -> Option<&'v Value> {
    if let Some(v) = entry.get(path) {
        return Some(v);
    }
    let (head, rest) = path.split_once('.')?;
    lookup(entry.get(head)?.as_object()?, rest)
}

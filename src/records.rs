use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field of an acquired item describing the request that produced it.
pub const SEARCH_QUERY_FIELD: &str = "searchQuery";

/// One acquired item tagged with the search term that produced it.
///
/// Everything except `term` and `fetched_at` stays in `fields` untouched, so a
/// record round-trips through the raw audit artifact without loss.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub term: String,
    #[serde(rename = "fetchedAt", default, skip_serializing_if = "Option::is_none")]
    pub fetched_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl RawRecord {
    /// Tag an acquired item with its term. Returns `None` for items that are
    /// not JSON objects or for a blank term.
    pub fn from_item(term: &str, item: Value, fetched_at: Option<DateTime<Utc>>) -> Option<Self> {
        let term = term.trim();
        if term.is_empty() {
            return None;
        }
        let Value::Object(mut fields) = item else {
            return None;
        };
        fields.remove("term");
        fields.remove("fetchedAt");
        Some(RawRecord {
            term: term.to_string(),
            fetched_at,
            fields,
        })
    }

    pub fn section(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn search_query(&self) -> Option<&Value> {
        self.fields.get(SEARCH_QUERY_FIELD).filter(|v| !v.is_null())
    }
}

/// Matching form of a term: trimmed and lower-cased.
pub fn normalize_term(term: &str) -> String {
    term.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_item_trims_term_and_rejects_blank() {
        let r = RawRecord::from_item("  coffee ", json!({"a": 1}), None).unwrap();
        assert_eq!(r.term, "coffee");
        assert!(RawRecord::from_item("   ", json!({"a": 1}), None).is_none());
    }

    #[test]
    fn from_item_rejects_non_objects() {
        assert!(RawRecord::from_item("coffee", json!("text"), None).is_none());
        assert!(RawRecord::from_item("coffee", json!([1, 2]), None).is_none());
    }

    #[test]
    fn audit_line_round_trips() {
        let item = json!({
            "searchQuery": {"term": "coffee", "page": 1},
            "relatedQueries": [{"query": "espresso"}],
        });
        let fetched = "2024-05-01T12:00:00Z".parse().ok();
        let r = RawRecord::from_item("coffee", item, fetched).unwrap();
        let line = serde_json::to_string(&r).unwrap();
        let back: RawRecord = serde_json::from_str(&line).unwrap();
        assert_eq!(back, r);
        assert_eq!(back.search_query(), Some(&json!({"term": "coffee", "page": 1})));
    }

    #[test]
    fn normalize_term_lowercases_and_trims() {
        assert_eq!(normalize_term("  Coffee Shop "), "coffee shop");
    }
}

use std::path::{Path, PathBuf};

use tracing::debug;

use super::{check_name, Result, TableStore};
use crate::table::FlatTable;

/// One UTF-8 CSV file per table, header row first.
pub struct CsvStore {
    dir: PathBuf,
}

impl CsvStore {
    pub fn new(dir: &Path) -> Self {
        CsvStore {
            dir: dir.to_path_buf(),
        }
    }

    fn path(&self, name: &str) -> Result<PathBuf> {
        check_name(name)?;
        Ok(self.dir.join(format!("{}.csv", name)))
    }
}

impl TableStore for CsvStore {
    fn write_table(&self, name: &str, table: &FlatTable) -> Result<()> {
        let path = self.path(name)?;
        let mut writer = csv::Writer::from_path(&path)?;
        writer.write_record(table.columns())?;
        for row in table.rows() {
            writer.write_record(row)?;
        }
        writer.flush().map_err(csv::Error::from)?;
        debug!(table = name, rows = table.len(), path = %path.display(), "wrote csv");
        Ok(())
    }

    fn read_table(&self, name: &str) -> Result<Option<FlatTable>> {
        let path = self.path(name)?;
        if !path.exists() {
            return Ok(None);
        }
        let mut reader = csv::Reader::from_path(&path)?;
        let mut table = FlatTable::new(reader.headers()?.iter());
        for record in reader.records() {
            table.push_row(record?.iter().map(str::to_string).collect());
        }
        Ok(Some(table))
    }

    fn location(&self) -> String {
        self.dir.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_keeps_quotes_newlines_and_unicode() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::new(dir.path());
        let mut t = FlatTable::new(["term", "query", "url"]);
        t.push_row(vec!["café".into(), "say \"hi\", twice\nplease".into(), String::new()]);
        t.push_row(vec!["tea".into(), r#"{"a":1}"#.into(), "https://x".into()]);
        store.write_table("related_queries", &t).unwrap();

        let back = store.read_table("related_queries").unwrap().unwrap();
        assert_eq!(back, t);
    }

    #[test]
    fn empty_table_keeps_header() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::new(dir.path());
        store.write_table("people_also_ask", &FlatTable::new(["term", "question"])).unwrap();
        let raw = std::fs::read_to_string(dir.path().join("people_also_ask.csv")).unwrap();
        assert_eq!(raw, "term,question\n");
        let back = store.read_table("people_also_ask").unwrap().unwrap();
        assert_eq!(back.columns(), &["term", "question"]);
        assert!(back.is_empty());
    }

    #[test]
    fn missing_table_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::new(dir.path());
        assert!(store.read_table("organic_results").unwrap().is_none());
    }
}

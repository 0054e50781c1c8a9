use std::path::{Path, PathBuf};

use rusqlite::{params_from_iter, Connection, OptionalExtension};
use tracing::debug;

use super::{check_name, Result, TableStore};
use crate::table::FlatTable;

const DB_FILE: &str = "serp.sqlite";

/// All tables in a single SQLite file; every column is TEXT and every write
/// replaces the table.
pub struct SqliteStore {
    path: PathBuf,
    conn: Connection,
}

impl SqliteStore {
    pub fn open(dir: &Path) -> Result<Self> {
        let path = dir.join(DB_FILE);
        let conn = Connection::open(&path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Ok(SqliteStore { path, conn })
    }

    #[cfg(test)]
    fn in_memory() -> Result<Self> {
        Ok(SqliteStore {
            path: PathBuf::from(":memory:"),
            conn: Connection::open_in_memory()?,
        })
    }
}

fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

impl TableStore for SqliteStore {
    fn write_table(&self, name: &str, table: &FlatTable) -> Result<()> {
        check_name(name)?;
        let cols: Vec<String> = table.columns().iter().map(|c| quote(c)).collect();

        let tx = self.conn.unchecked_transaction()?;
        tx.execute_batch(&format!(
            "DROP TABLE IF EXISTS {name};
             CREATE TABLE {name} ({defs});",
            name = quote(name),
            defs = cols
                .iter()
                .map(|c| format!("{} TEXT NOT NULL", c))
                .collect::<Vec<_>>()
                .join(", "),
        ))?;
        {
            let placeholders: Vec<String> = (1..=cols.len()).map(|i| format!("?{}", i)).collect();
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO {} ({}) VALUES ({})",
                quote(name),
                cols.join(", "),
                placeholders.join(", "),
            ))?;
            for row in table.rows() {
                stmt.execute(params_from_iter(row.iter()))?;
            }
        }
        tx.commit()?;
        debug!(table = name, rows = table.len(), "wrote sqlite table");
        Ok(())
    }

    fn read_table(&self, name: &str) -> Result<Option<FlatTable>> {
        check_name(name)?;
        let exists = self
            .conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [name],
                |_| Ok(()),
            )
            .optional()?;
        if exists.is_none() {
            return Ok(None);
        }

        let mut stmt = self
            .conn
            .prepare(&format!("SELECT * FROM {} ORDER BY rowid", quote(name)))?;
        let width = stmt.column_count();
        let mut table = FlatTable::new(stmt.column_names());
        let rows = stmt
            .query_map([], |row| {
                (0..width)
                    .map(|i| row.get::<_, String>(i))
                    .collect::<rusqlite::Result<Vec<_>>>()
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        for row in rows {
            table.push_row(row);
        }
        Ok(Some(table))
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FlatTable {
        let mut t = FlatTable::new(["term", "title", "url", "snippet"]);
        t.push_row(vec!["coffee".into(), "A \"quoted\" title".into(), "https://a".into(), String::new()]);
        t.push_row(vec!["coffee".into(), "B".into(), "https://b".into(), "ç".into()]);
        t
    }

    #[test]
    fn round_trip_preserves_order_and_text() {
        let store = SqliteStore::in_memory().unwrap();
        store.write_table("organic_results", &sample()).unwrap();
        assert_eq!(store.read_table("organic_results").unwrap().unwrap(), sample());
    }

    #[test]
    fn rewrite_replaces_previous_contents() {
        let store = SqliteStore::in_memory().unwrap();
        store.write_table("organic_results", &sample()).unwrap();
        let mut smaller = FlatTable::new(["term", "query"]);
        smaller.push_row(vec!["tea".into(), "matcha".into()]);
        store.write_table("organic_results", &smaller).unwrap();
        assert_eq!(store.read_table("organic_results").unwrap().unwrap(), smaller);
    }

    #[test]
    fn missing_table_is_none() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(store.read_table("related_queries_clean").unwrap().is_none());
    }

    #[test]
    fn file_backed_store() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = SqliteStore::open(dir.path()).unwrap();
            store.write_table("related_queries", &sample()).unwrap();
        }
        let store = SqliteStore::open(dir.path()).unwrap();
        assert_eq!(store.read_table("related_queries").unwrap().unwrap().len(), 2);
    }
}

pub mod delimited;
pub mod sqlite;

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::settings::{Settings, StorageKind};
use crate::records::RawRecord;
use crate::table::FlatTable;

pub const RAW_ARTIFACT: &str = "raw_results.jsonl";
pub const RELATED_QUERIES_CLEAN: &str = "related_queries_clean";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error on {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("CSV error")]
    Csv(#[from] csv::Error),
    #[error("SQLite error")]
    Sqlite(#[from] rusqlite::Error),
    #[error("bad raw record at {path:?} line {line}")]
    RawLine {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid table name `{0}`")]
    TableName(String),
}

pub type Result<T, E = StoreError> = std::result::Result<T, E>;

/// Where flat tables are persisted and read back from.
pub trait TableStore {
    fn write_table(&self, name: &str, table: &FlatTable) -> Result<()>;

    /// `Ok(None)` when the table was never written.
    fn read_table(&self, name: &str) -> Result<Option<FlatTable>>;

    fn location(&self) -> String;
}

/// Open the store selected in `settings`, creating the output directory.
pub fn open(settings: &Settings) -> Result<Box<dyn TableStore>> {
    ensure_dir(&settings.output_dir)?;
    let store: Box<dyn TableStore> = match settings.storage {
        StorageKind::Csv => Box::new(delimited::CsvStore::new(&settings.output_dir)),
        StorageKind::Sqlite => Box::new(sqlite::SqliteStore::open(&settings.output_dir)?),
    };
    Ok(store)
}

pub fn raw_path(settings: &Settings) -> PathBuf {
    settings.output_dir.join(RAW_ARTIFACT)
}

/// Write records as JSON lines, replacing any previous artifact.
pub fn write_raw(path: &Path, records: &[RawRecord]) -> Result<()> {
    let io = |source: std::io::Error| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    let mut out = BufWriter::new(File::create(path).map_err(io)?);
    for record in records {
        serde_json::to_writer(&mut out, record).map_err(|e| io(e.into()))?;
        out.write_all(b"\n").map_err(io)?;
    }
    out.flush().map_err(io)
}

pub fn read_raw(path: &Path) -> Result<Vec<RawRecord>> {
    let io = |source: std::io::Error| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };
    let reader = BufReader::new(File::open(path).map_err(io)?);
    let mut records = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(io)?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line).map_err(|source| StoreError::RawLine {
            path: path.to_path_buf(),
            line: idx + 1,
            source,
        })?;
        records.push(record);
    }
    Ok(records)
}

fn ensure_dir(dir: &Path) -> Result<()> {
    if dir.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(dir).map_err(|source| StoreError::Io {
        path: dir.to_path_buf(),
        source,
    })
}

/// Table names double as file names and SQL identifiers.
fn check_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_lowercase() || c == '_')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StoreError::TableName(name.to_string()))
    }
}

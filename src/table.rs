use std::collections::HashSet;

/// A rectangular table of string cells with a named header.
///
/// Every row has exactly `columns().len()` cells; nested values never reach a
/// table, they are canonicalized to text before insertion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlatTable {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl FlatTable {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FlatTable {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> impl Iterator<Item = &mut Vec<String>> {
        self.rows.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Cell value by row index and column name.
    pub fn value(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self.column(column)?;
        self.rows.get(row).map(|r| r[idx].as_str())
    }

    /// Append a row, padding short rows with empty cells and cutting long ones.
    pub fn push_row(&mut self, mut row: Vec<String>) {
        row.resize(self.columns.len(), String::new());
        self.rows.push(row);
    }

    /// Return the index of `name`, appending it (filled with "") if missing.
    pub fn ensure_column(&mut self, name: &str) -> usize {
        if let Some(idx) = self.column(name) {
            return idx;
        }
        self.columns.push(name.to_string());
        for row in &mut self.rows {
            row.push(String::new());
        }
        self.columns.len() - 1
    }

    pub fn retain<F>(&mut self, keep: F)
    where
        F: FnMut(&Vec<String>) -> bool,
    {
        self.rows.retain(keep);
    }

    /// Drop rows identical in every column, keeping the first occurrence.
    /// Returns the number of rows removed.
    pub fn dedup(&mut self) -> usize {
        let all: Vec<usize> = (0..self.columns.len()).collect();
        self.dedup_on(&all)
    }

    /// Drop rows whose values in `key_columns` repeat an earlier row.
    pub fn dedup_on(&mut self, key_columns: &[usize]) -> usize {
        let before = self.rows.len();
        let mut seen = HashSet::new();
        self.rows.retain(|row| {
            let key: Vec<String> = key_columns.iter().map(|&i| row[i].clone()).collect();
            seen.insert(key)
        });
        before - self.rows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn push_row_pads_to_header_width() {
        let mut t = FlatTable::new(["term", "query", "url"]);
        t.push_row(row(&["coffee"]));
        assert_eq!(t.rows()[0], row(&["coffee", "", ""]));
    }

    #[test]
    fn ensure_column_backfills_existing_rows() {
        let mut t = FlatTable::new(["term"]);
        t.push_row(row(&["coffee"]));
        let idx = t.ensure_column("url");
        assert_eq!(idx, 1);
        assert_eq!(t.value(0, "url"), Some(""));
        assert_eq!(t.ensure_column("term"), 0);
    }

    #[test]
    fn dedup_keeps_first_occurrence_order() {
        let mut t = FlatTable::new(["term", "query"]);
        t.push_row(row(&["a", "x"]));
        t.push_row(row(&["a", "y"]));
        t.push_row(row(&["a", "x"]));
        t.push_row(row(&["b", "x"]));
        assert_eq!(t.dedup(), 1);
        assert_eq!(t.rows(), &[row(&["a", "x"]), row(&["a", "y"]), row(&["b", "x"])]);
    }

    #[test]
    fn dedup_on_key_does_not_merge_across_cell_boundaries() {
        let mut t = FlatTable::new(["term", "query"]);
        t.push_row(row(&["ab", "c"]));
        t.push_row(row(&["a", "bc"]));
        assert_eq!(t.dedup_on(&[0, 1]), 0);
        assert_eq!(t.len(), 2);
    }
}

//! Table detection over lines of cells.

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::TableError;

lazy_static! {
    static ref CELL_SEPARATOR: Regex = Regex::new(r"\s*\|\s*|\t+|\s{2,}").unwrap();
}

/// A table as the engine detected it: a header line followed by data lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineTable {
    /// Header cells first, then one entry per data row.
    pub lines: Vec<Vec<String>>,
}

impl EngineTable {
    pub fn new(lines: Vec<Vec<String>>) -> Self {
        Self { lines }
    }

    /// Structure the table into column names and row mappings.
    pub fn to_rows(&self) -> Result<(Vec<String>, Vec<BTreeMap<String, String>>), TableError> {
        let (header, data) = self.lines.split_first().ok_or(TableError::MissingHeader)?;
        if header.is_empty() {
            return Err(TableError::MissingHeader);
        }

        let mut columns: Vec<String> = Vec::with_capacity(header.len());
        for name in header {
            let name = name.trim().to_string();
            if columns.contains(&name) {
                return Err(TableError::DuplicateColumn(name));
            }
            columns.push(name);
        }

        let mut rows = Vec::with_capacity(data.len());
        for (i, cells) in data.iter().enumerate() {
            if cells.len() != columns.len() {
                return Err(TableError::RaggedRow {
                    row: i + 1,
                    expected: columns.len(),
                    found: cells.len(),
                });
            }
            let row = columns
                .iter()
                .cloned()
                .zip(cells.iter().map(|c| c.trim().to_string()))
                .collect();
            rows.push(row);
        }

        Ok((columns, rows))
    }
}

/// Split one text-layer line into cells on pipes, tabs, or runs of spaces.
pub fn split_text_line(line: &str) -> Vec<String> {
    let trimmed = line.trim().trim_matches('|');
    if trimmed.trim().is_empty() {
        return Vec::new();
    }
    CELL_SEPARATOR
        .split(trimmed.trim())
        .map(str::to_string)
        .collect()
}

/// Find tables among lines of cells.
///
/// A table is a run of consecutive lines sharing the same cell count
/// (at least `min_columns`) spanning at least `min_rows` lines.
pub fn detect_tables(lines: &[Vec<String>], min_rows: usize, min_columns: usize) -> Vec<EngineTable> {
    let min_rows = min_rows.max(1);
    let min_columns = min_columns.max(2);
    let mut tables = Vec::new();
    let mut start = 0;

    while start < lines.len() {
        let width = lines[start].len();
        let mut end = start + 1;
        while end < lines.len() && lines[end].len() == width {
            end += 1;
        }

        if width >= min_columns && end - start >= min_rows {
            tables.push(EngineTable::new(lines[start..end].to_vec()));
        }
        start = end;
    }

    tables
}

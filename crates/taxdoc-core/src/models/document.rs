//! Normalized representation of one parsed input document.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Result of normalizing one input file.
///
/// Immutable once produced; owned by whoever asked for the parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedDocument {
    text: String,
    tables: Vec<Table>,
    metadata: DocumentMetadata,
}

/// File-level facts about a normalized document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Original file name.
    pub filename: String,
    /// Number of pages (at least 1).
    pub page_count: u32,
}

/// A structured table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    /// Position of the table among everything the engine detected,
    /// including tables that failed to structure.
    pub index: usize,
    /// Column names in header order.
    pub columns: Vec<String>,
    /// Data rows, column name to cell text.
    pub rows: Vec<BTreeMap<String, String>>,
}

impl NormalizedDocument {
    pub(crate) fn new(text: String, tables: Vec<Table>, filename: String, page_count: u32) -> Self {
        Self {
            text,
            tables,
            metadata: DocumentMetadata {
                filename,
                page_count: page_count.max(1),
            },
        }
    }

    /// Primary text content; empty when nothing was recovered.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Tables that structured successfully, in detection order.
    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    pub fn metadata(&self) -> &DocumentMetadata {
        &self.metadata
    }

    /// Check if no text was recovered.
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

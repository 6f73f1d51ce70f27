//! In-memory collection of extracted records and its exports.

use std::io::Write;

use rust_decimal::Decimal;
use rust_xlsxwriter::{Format, Workbook, XlsxError};
use serde::Serialize;

use crate::amounts::parse_amount;
use crate::error::{Result, TaxdocError};
use crate::models::record::{DOCUMENT_TYPE_KEY, ExtractedRecord, SOURCE_FILE_KEY};

/// Worksheet holding the records in xlsx exports.
pub const XLSX_SHEET_NAME: &str = "Extracted";

/// Sum of one numeric column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnTotal {
    pub column: String,
    pub total: Decimal,
    /// Number of non-null values summed.
    pub count: usize,
}

/// Ordered collection of records for one session.
///
/// Appended to as documents finish; replaced wholesale when edited; never
/// persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedDataset {
    records: Vec<ExtractedRecord>,
}

impl ExtractedDataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: ExtractedRecord) {
        self.records.push(record);
    }

    /// Replace every record, e.g. after the user edited the grid.
    pub fn replace_all(&mut self, records: Vec<ExtractedRecord>) {
        self.records = records;
    }

    /// Replace every record from an edited JSON array.
    pub fn replace_from_json(&mut self, json: &str) -> Result<()> {
        let records: Vec<ExtractedRecord> = serde_json::from_str(json)
            .map_err(|e| TaxdocError::Export(format!("invalid record array: {}", e)))?;
        self.replace_all(records);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn records(&self) -> &[ExtractedRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Union of record columns in first-appearance order, metadata last.
    pub fn columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = Vec::new();
        let mut has_source = false;
        let mut has_type = false;

        for record in &self.records {
            for column in record.columns() {
                match column {
                    SOURCE_FILE_KEY => has_source = true,
                    DOCUMENT_TYPE_KEY => has_type = true,
                    _ if !columns.iter().any(|c| c == column) => columns.push(column.to_string()),
                    _ => {}
                }
            }
        }

        if has_source {
            columns.push(SOURCE_FILE_KEY.to_string());
        }
        if has_type {
            columns.push(DOCUMENT_TYPE_KEY.to_string());
        }
        columns
    }

    /// Totals of columns whose every non-empty value is an amount.
    pub fn summary(&self) -> Vec<ColumnTotal> {
        self.columns()
            .into_iter()
            .filter(|c| c != SOURCE_FILE_KEY && c != DOCUMENT_TYPE_KEY)
            .filter_map(|column| {
                let mut total = Decimal::ZERO;
                let mut count = 0;
                for record in &self.records {
                    let Some(cell) = record.cell(&column).filter(|v| !v.trim().is_empty()) else {
                        continue;
                    };
                    total += parse_amount(cell)?;
                    count += 1;
                }
                (count > 0).then_some(ColumnTotal {
                    column,
                    total,
                    count,
                })
            })
            .collect()
    }

    /// Pretty JSON array of records.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.records)
            .map_err(|e| TaxdocError::Export(e.to_string()))
    }

    /// Write the records as CSV with a header of [`columns`](Self::columns).
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let columns = self.columns();
        let mut csv = csv::Writer::from_writer(writer);

        csv.write_record(&columns)
            .map_err(|e| TaxdocError::Export(e.to_string()))?;
        for record in &self.records {
            csv.write_record(columns.iter().map(|c| record.cell(c).unwrap_or("")))
                .map_err(|e| TaxdocError::Export(e.to_string()))?;
        }
        csv.flush()?;
        Ok(())
    }

    /// Write the records as an xlsx workbook with the same header and cells
    /// as [`write_csv`](Self::write_csv).
    pub fn write_xlsx<W: Write>(&self, mut writer: W) -> Result<()> {
        let buffer = self.xlsx_workbook().map_err(|e| TaxdocError::Export(e.to_string()))?;
        writer.write_all(&buffer)?;
        writer.flush()?;
        Ok(())
    }

    fn xlsx_workbook(&self) -> std::result::Result<Vec<u8>, XlsxError> {
        let columns = self.columns();
        let header = Format::new().set_bold();

        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.set_name(XLSX_SHEET_NAME)?;

        for (col, name) in columns.iter().enumerate() {
            sheet.write_string_with_format(0, col as u16, name, &header)?;
        }
        for (row, record) in self.records.iter().enumerate() {
            for (col, name) in columns.iter().enumerate() {
                if let Some(cell) = record.cell(name) {
                    sheet.write_string(row as u32 + 1, col as u16, cell)?;
                }
            }
        }

        workbook.save_to_buffer()
    }
}

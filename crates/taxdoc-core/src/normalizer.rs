//! Document normalization: one file in, one [`NormalizedDocument`] out.

use std::path::Path;

use tracing::{debug, info};

use crate::error::{EngineError, ParseFailure};
use crate::layout::{EngineDocument, EngineOptions, InputFormat, LayoutEngine};
use crate::models::document::{NormalizedDocument, Table};

/// Converts input files into normalized text and tables using a layout engine.
pub struct DocumentNormalizer<E> {
    engine: E,
    options: EngineOptions,
}

impl<E: LayoutEngine> DocumentNormalizer<E> {
    pub fn new(engine: E, options: EngineOptions) -> Self {
        Self { engine, options }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Normalize a file, reporting it under its own file name.
    pub fn normalize(&self, path: &Path) -> Result<NormalizedDocument, ParseFailure> {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.normalize_named(path, &filename)
    }

    /// Normalize a file stored under a temporary name, reporting `filename`.
    pub fn normalize_named(
        &self,
        path: &Path,
        filename: &str,
    ) -> Result<NormalizedDocument, ParseFailure> {
        let fail = |source: EngineError| ParseFailure {
            filename: filename.to_string(),
            source,
        };

        let format = InputFormat::from_path(path).map_err(fail)?;
        let engine_doc = self
            .engine
            .convert(path, format, &self.options)
            .map_err(fail)?;

        let document = assemble(engine_doc, filename);
        info!(
            "Normalized {}: {} chars, {} tables, {} pages",
            filename,
            document.text().len(),
            document.tables().len(),
            document.metadata().page_count
        );
        Ok(document)
    }
}

fn assemble(engine_doc: EngineDocument, filename: &str) -> NormalizedDocument {
    let EngineDocument {
        flattened_text,
        text_items,
        tables,
        page_count,
    } = engine_doc;

    let ocr_text = text_items
        .iter()
        .map(|item| item.trim())
        .filter(|item| !item.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    let text = if !ocr_text.is_empty() {
        debug!("{}: using OCR text items", filename);
        ocr_text
    } else {
        debug!("{}: no OCR text items, using flattened view", filename);
        flattened_text.unwrap_or_default()
    };

    let mut structured = Vec::new();
    for (index, table) in tables.unwrap_or_default().into_iter().enumerate() {
        match table.to_rows() {
            Ok((columns, rows)) => structured.push(Table {
                index,
                columns,
                rows,
            }),
            Err(e) => debug!("{}: omitting table {}: {}", filename, index, e),
        }
    }

    NormalizedDocument::new(text, structured, filename.to_string(), page_count.unwrap_or(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{EngineTable, IMAGE_PLACEHOLDER};
    use pretty_assertions::assert_eq;

    struct FakeEngine(EngineDocument);

    impl LayoutEngine for FakeEngine {
        fn convert(
            &self,
            _path: &Path,
            _format: InputFormat,
            _options: &EngineOptions,
        ) -> Result<EngineDocument, EngineError> {
            Ok(self.0.clone())
        }
    }

    struct FailingEngine;

    impl LayoutEngine for FailingEngine {
        fn convert(
            &self,
            _path: &Path,
            _format: InputFormat,
            _options: &EngineOptions,
        ) -> Result<EngineDocument, EngineError> {
            Err(EngineError::Io(std::io::Error::other("corrupt")))
        }
    }

    fn table(lines: &[&[&str]]) -> EngineTable {
        EngineTable::new(
            lines
                .iter()
                .map(|l| l.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    fn normalize(doc: EngineDocument) -> NormalizedDocument {
        DocumentNormalizer::new(FakeEngine(doc), EngineOptions::default())
            .normalize(Path::new("/tmp/payslip.png"))
            .unwrap()
    }

    #[test]
    fn test_ocr_items_win_over_placeholder_view() {
        let doc = normalize(EngineDocument {
            flattened_text: Some(IMAGE_PLACEHOLDER.to_string()),
            text_items: vec!["ACME Ltd".to_string(), "Gross pay £2,500.00".to_string()],
            ..EngineDocument::default()
        });
        assert_eq!(doc.text(), "ACME Ltd\nGross pay £2,500.00");
    }

    #[test]
    fn test_flattened_view_when_no_ocr_items() {
        let doc = normalize(EngineDocument {
            flattened_text: Some("Form W-2 Wage and Tax Statement".to_string()),
            text_items: vec!["  ".to_string()],
            ..EngineDocument::default()
        });
        assert_eq!(doc.text(), "Form W-2 Wage and Tax Statement");
    }

    #[test]
    fn test_missing_everything_defaults() {
        let doc = normalize(EngineDocument::default());
        assert_eq!(doc.text(), "");
        assert!(doc.tables().is_empty());
        assert_eq!(doc.metadata().page_count, 1);
        assert_eq!(doc.metadata().filename, "payslip.png");
    }

    #[test]
    fn test_failing_table_is_omitted() {
        let doc = normalize(EngineDocument {
            tables: Some(vec![
                table(&[&["Item", "Amount"], &["Basic", "2,000.00"]]),
                table(&[&["Amount", "Amount"], &["1", "2"]]),
                table(&[&["Code", "Rate"], &["1257L", "20%"]]),
            ]),
            page_count: Some(2),
            ..EngineDocument::default()
        });

        let indexes: Vec<usize> = doc.tables().iter().map(|t| t.index).collect();
        assert_eq!(indexes, vec![0, 2]);
        assert_eq!(doc.tables()[1].rows[0].get("Code").map(String::as_str), Some("1257L"));
        assert_eq!(doc.metadata().page_count, 2);
    }

    #[test]
    fn test_engine_failure_names_the_file() {
        let normalizer = DocumentNormalizer::new(FailingEngine, EngineOptions::default());
        let err = normalizer
            .normalize_named(Path::new("/tmp/taxdoc-abc.pdf"), "w2.pdf")
            .unwrap_err();
        assert_eq!(err.filename, "w2.pdf");
        assert!(err.to_string().contains("w2.pdf"));
    }

    #[test]
    fn test_unsupported_extension() {
        let normalizer = DocumentNormalizer::new(FailingEngine, EngineOptions::default());
        let err = normalizer.normalize(Path::new("notes.docx")).unwrap_err();
        assert!(matches!(err.source, EngineError::UnsupportedFormat(_)));
    }
}

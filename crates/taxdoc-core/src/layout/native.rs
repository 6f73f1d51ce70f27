//! In-process layout engine built on lopdf, pdf-extract and pure-onnx-ocr.

use std::path::Path;

use image::DynamicImage;
use tracing::{debug, info, warn};

use super::table::{EngineTable, detect_tables, split_text_line};
use super::{EngineDocument, EngineOptions, IMAGE_PLACEHOLDER, InputFormat, LayoutEngine};
use crate::error::{EngineError, OcrError, PdfError};
use crate::models::config::EngineConfig;
use crate::ocr::{OcrEngine, OcrResult};
use crate::pdf::{PdfExtractor, PdfProcessor, PdfType};

/// Text-layer characters below which a PDF page set counts as having no text.
const MIN_TEXT_LAYER_CHARS: usize = 20;

/// Layout engine running entirely in this process.
pub struct NativeLayoutEngine {
    ocr: Option<OcrEngine>,
    line_tolerance_px: f32,
    min_table_rows: usize,
    min_table_columns: usize,
}

impl NativeLayoutEngine {
    /// Build the engine, loading OCR models only when OCR is enabled.
    pub fn new(config: &EngineConfig) -> Result<Self, OcrError> {
        let ocr = if config.ocr_enabled {
            Some(OcrEngine::from_config(config)?)
        } else {
            info!("OCR disabled; using text layers only");
            None
        };

        Ok(Self {
            ocr,
            line_tolerance_px: config.line_tolerance_px,
            min_table_rows: config.min_table_rows,
            min_table_columns: config.min_table_columns,
        })
    }

    fn ocr(&self, options: &EngineOptions) -> Result<Option<&OcrEngine>, OcrError> {
        if !options.ocr_enabled {
            return Ok(None);
        }
        self.ocr.as_ref().map(Some).ok_or(OcrError::NotInitialized)
    }

    fn ocr_tables(&self, result: &OcrResult) -> Vec<EngineTable> {
        detect_tables(
            &result.lines(self.line_tolerance_px),
            self.min_table_rows,
            self.min_table_columns,
        )
    }

    fn convert_image(
        &self,
        path: &Path,
        options: &EngineOptions,
    ) -> Result<EngineDocument, EngineError> {
        let image = image::open(path)?;

        let Some(ocr) = self.ocr(options)? else {
            return Ok(EngineDocument {
                flattened_text: Some(IMAGE_PLACEHOLDER.to_string()),
                tables: options.table_structure_enabled.then(Vec::new),
                ..EngineDocument::default()
            });
        };

        let result = ocr.process(&image)?;
        let tables = options
            .table_structure_enabled
            .then(|| self.ocr_tables(&result));

        Ok(EngineDocument {
            flattened_text: Some(result.reading_order_text(self.line_tolerance_px)),
            text_items: result.text_items(),
            tables,
            page_count: None,
        })
    }

    fn convert_pdf(
        &self,
        path: &Path,
        options: &EngineOptions,
    ) -> Result<EngineDocument, EngineError> {
        let data = std::fs::read(path)?;
        let mut pdf = PdfExtractor::new();
        pdf.load(&data)?;
        let page_count = pdf.page_count();

        let text_layer = match pdf.extract_text() {
            Ok(text) => text,
            Err(PdfError::TextExtraction(e)) => {
                warn!("No usable text layer in {}: {}", path.display(), e);
                String::new()
            }
            Err(e) => return Err(e.into()),
        };

        let mut page_images: Vec<(u32, Vec<DynamicImage>)> = Vec::new();
        for page in 1..=page_count {
            match pdf.extract_images(page) {
                Ok(images) if !images.is_empty() => page_images.push((page, images)),
                Ok(_) => {}
                Err(e) => debug!("Skipping images on page {}: {}", page, e),
            }
        }
        let image_count: usize = page_images.iter().map(|(_, imgs)| imgs.len()).sum();

        let pdf_type = PdfType::classify(text_layer.trim().len(), image_count, MIN_TEXT_LAYER_CHARS);
        debug!(
            "PDF {} classified as {:?} ({} pages, {} images)",
            path.display(),
            pdf_type,
            page_count,
            image_count
        );

        let flattened_text = match pdf_type {
            PdfType::Image => page_images
                .iter()
                .map(|_| IMAGE_PLACEHOLDER)
                .collect::<Vec<_>>()
                .join("\n\n"),
            _ => text_layer.clone(),
        };

        let mut tables = Vec::new();
        if options.table_structure_enabled {
            let lines: Vec<Vec<String>> = text_layer
                .lines()
                .map(split_text_line)
                .filter(|cells| !cells.is_empty())
                .collect();
            tables.extend(detect_tables(&lines, self.min_table_rows, self.min_table_columns));
        }

        let mut ocr_items = Vec::new();
        if pdf_type.needs_ocr() {
            if let Some(ocr) = self.ocr(options)? {
                for (page, images) in &page_images {
                    for image in images {
                        let result = ocr.process(image)?;
                        debug!("Page {}: {} OCR boxes", page, result.boxes.len());
                        ocr_items.extend(result.text_items());
                        if options.table_structure_enabled {
                            tables.extend(self.ocr_tables(&result));
                        }
                    }
                }
            }
        }

        Ok(EngineDocument {
            flattened_text: Some(flattened_text),
            text_items: pdf_text_items(&text_layer, ocr_items),
            tables: options.table_structure_enabled.then_some(tables),
            page_count: Some(page_count),
        })
    }
}

/// Text items of a PDF: text-layer lines in page order, then OCR fragments.
///
/// Empty when OCR produced nothing, so a plain text PDF keeps its flattened
/// layout.
fn pdf_text_items(text_layer: &str, ocr_items: Vec<String>) -> Vec<String> {
    if ocr_items.is_empty() {
        return Vec::new();
    }
    text_layer
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .chain(ocr_items)
        .collect()
}

impl LayoutEngine for NativeLayoutEngine {
    fn convert(
        &self,
        path: &Path,
        format: InputFormat,
        options: &EngineOptions,
    ) -> Result<EngineDocument, EngineError> {
        match format {
            InputFormat::Pdf => self.convert_pdf(path, options),
            InputFormat::Png | InputFormat::Jpeg | InputFormat::Tiff => {
                self.convert_image(path, options)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::DocumentNormalizer;
    use image::{ImageFormat, RgbImage};
    use lopdf::content::{Content, Operation};
    use lopdf::{Document, Stream, dictionary};
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    /// One page of a fixture PDF: text lines top to bottom, plus an optional image.
    struct FixturePage<'a> {
        lines: &'a [&'a str],
        image: bool,
    }

    fn write_pdf(dir: &Path, name: &str, pages: &[FixturePage]) -> PathBuf {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });

        let mut kids: Vec<lopdf::Object> = Vec::new();
        for page in pages {
            let mut operations = Vec::new();
            let mut xobjects = lopdf::Dictionary::new();

            if page.image {
                // Pixel bytes stay whitespace if read as a content stream.
                let pixels = vec![0x20u8; 4 * 4 * 3];
                let image_id = doc.add_object(Stream::new(
                    dictionary! {
                        "Type" => "XObject",
                        "Subtype" => "Image",
                        "Width" => 4,
                        "Height" => 4,
                        "ColorSpace" => "DeviceRGB",
                        "BitsPerComponent" => 8,
                    },
                    pixels,
                ));
                xobjects.set("Im1", image_id);
                operations.extend([
                    Operation::new("q", vec![]),
                    Operation::new(
                        "cm",
                        vec![80.into(), 0.into(), 0.into(), 80.into(), 450.into(), 720.into()],
                    ),
                    Operation::new("Do", vec!["Im1".into()]),
                    Operation::new("Q", vec![]),
                ]);
            }

            for (i, line) in page.lines.iter().enumerate() {
                let y = 700 - 24 * i as i64;
                operations.extend([
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![72.into(), y.into()]),
                    Operation::new("Tj", vec![lopdf::Object::string_literal(*line)]),
                    Operation::new("ET", vec![]),
                ]);
            }

            let content = Content { operations };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Resources" => dictionary! {
                    "Font" => dictionary! { "F1" => font_id },
                    "XObject" => xobjects,
                },
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            lopdf::Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let path = dir.join(name);
        doc.save(&path).unwrap();
        path
    }

    const PAYSLIP_LINES: &[&str] = &[
        "Employer: ACME Ltd",
        "Item | Amount",
        "Basic pay | 2,400.00",
        "Overtime | 100.00",
    ];

    fn text_only_engine() -> NativeLayoutEngine {
        let config = EngineConfig {
            ocr_enabled: false,
            ..EngineConfig::default()
        };
        NativeLayoutEngine::new(&config).unwrap()
    }

    fn text_only_options() -> EngineOptions {
        EngineOptions {
            ocr_enabled: false,
            table_structure_enabled: true,
        }
    }

    #[test]
    fn test_image_without_ocr_is_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.png");
        RgbImage::new(8, 8)
            .save_with_format(&path, ImageFormat::Png)
            .unwrap();

        let doc = text_only_engine()
            .convert(&path, InputFormat::Png, &text_only_options())
            .unwrap();
        assert_eq!(doc.flattened_text.as_deref(), Some(IMAGE_PLACEHOLDER));
        assert!(doc.text_items.is_empty());
        assert_eq!(doc.page_count, None);
    }

    #[test]
    fn test_ocr_requested_without_models() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.png");
        RgbImage::new(8, 8)
            .save_with_format(&path, ImageFormat::Png)
            .unwrap();

        let err = text_only_engine()
            .convert(&path, InputFormat::Png, &EngineOptions::default())
            .unwrap_err();
        assert!(matches!(err, EngineError::Ocr(OcrError::NotInitialized)));
    }

    #[test]
    fn test_corrupt_pdf_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"%PDF-1.4 truncated").unwrap();

        let err = text_only_engine()
            .convert(&path, InputFormat::Pdf, &text_only_options())
            .unwrap_err();
        assert!(matches!(err, EngineError::Pdf(_)));
    }

    #[test]
    fn test_corrupt_image_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"not a png").unwrap();

        let err = text_only_engine()
            .convert(&path, InputFormat::Png, &text_only_options())
            .unwrap_err();
        assert!(matches!(err, EngineError::Image(_)));
    }

    #[test]
    fn test_text_pdf_keeps_text_layer_and_page_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_pdf(
            dir.path(),
            "payslip.pdf",
            &[
                FixturePage { lines: PAYSLIP_LINES, image: false },
                FixturePage { lines: &["Net pay 2,012.50"], image: false },
            ],
        );

        let doc = text_only_engine()
            .convert(&path, InputFormat::Pdf, &text_only_options())
            .unwrap();
        let text = doc.flattened_text.unwrap();
        assert!(text.contains("Employer: ACME Ltd"), "text layer: {:?}", text);
        assert!(text.contains("Net pay 2,012.50"));
        assert!(doc.text_items.is_empty());
        assert_eq!(doc.page_count, Some(2));
    }

    #[test]
    fn test_text_pdf_tables_come_from_text_layer() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_pdf(
            dir.path(),
            "payslip.pdf",
            &[FixturePage { lines: PAYSLIP_LINES, image: false }],
        );

        let doc = text_only_engine()
            .convert(&path, InputFormat::Pdf, &text_only_options())
            .unwrap();
        let tables = doc.tables.unwrap();
        assert_eq!(tables.len(), 1);

        let (columns, rows) = tables[0].to_rows().unwrap();
        assert_eq!(columns, vec!["Item", "Amount"]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["Item"], "Basic pay");
        assert_eq!(rows[1]["Amount"], "100.00");
    }

    #[test]
    fn test_image_only_pdf_without_ocr_is_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_pdf(
            dir.path(),
            "scan.pdf",
            &[
                FixturePage { lines: &[], image: true },
                FixturePage { lines: &[], image: true },
            ],
        );

        let doc = text_only_engine()
            .convert(&path, InputFormat::Pdf, &text_only_options())
            .unwrap();
        assert_eq!(
            doc.flattened_text.as_deref(),
            Some(format!("{}\n\n{}", IMAGE_PLACEHOLDER, IMAGE_PLACEHOLDER).as_str())
        );
        assert!(doc.text_items.is_empty());
        assert_eq!(doc.page_count, Some(2));
    }

    #[test]
    fn test_hybrid_pdf_without_ocr_uses_text_layer() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_pdf(
            dir.path(),
            "logo.pdf",
            &[FixturePage { lines: PAYSLIP_LINES, image: true }],
        );

        let normalizer = DocumentNormalizer::new(text_only_engine(), text_only_options());
        let document = normalizer.normalize(&path).unwrap();
        assert!(document.text().contains("Employer: ACME Ltd"));
        assert!(!document.text().contains(IMAGE_PLACEHOLDER));
    }

    #[test]
    fn test_pdf_text_items_put_text_layer_before_ocr() {
        let items = pdf_text_items(
            "Employer: ACME Ltd\n\n  Gross pay 2,500.00  \n",
            vec!["ACME".to_string()],
        );
        assert_eq!(items, vec!["Employer: ACME Ltd", "Gross pay 2,500.00", "ACME"]);

        assert!(pdf_text_items("Employer: ACME Ltd", Vec::new()).is_empty());
    }

    #[test]
    fn test_hybrid_text_items_survive_normalization() {
        struct Hybrid;

        impl LayoutEngine for Hybrid {
            fn convert(
                &self,
                _path: &Path,
                _format: InputFormat,
                _options: &EngineOptions,
            ) -> Result<EngineDocument, EngineError> {
                let text_layer = "Employer: ACME Ltd\nGross pay 2,500.00\n";
                Ok(EngineDocument {
                    flattened_text: Some(text_layer.to_string()),
                    text_items: pdf_text_items(text_layer, vec!["ACME".to_string()]),
                    tables: None,
                    page_count: Some(1),
                })
            }
        }

        let document = DocumentNormalizer::new(Hybrid, EngineOptions::default())
            .normalize(Path::new("payslip.pdf"))
            .unwrap();
        assert_eq!(document.text(), "Employer: ACME Ltd\nGross pay 2,500.00\nACME");
    }
}

//! Layout/OCR engine boundary.
//!
//! An engine turns one file into a flattened text view, raw OCR text items
//! and candidate tables. Optional parts of its answer are defaulted by the
//! normalizer, not here.

mod native;
mod table;

pub use native::NativeLayoutEngine;
pub use table::{EngineTable, detect_tables, split_text_line};

use std::path::Path;

use crate::error::EngineError;
use crate::models::config::EngineConfig;

/// File extensions accepted as input.
pub const SUPPORTED_EXTENSIONS: [&str; 5] = ["pdf", "png", "jpg", "jpeg", "tiff"];

/// Marker a flattened view emits for an image-only region.
pub const IMAGE_PLACEHOLDER: &str = "<!-- image -->";

/// Format hint passed to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Pdf,
    Png,
    Jpeg,
    Tiff,
}

impl InputFormat {
    /// Detect the format from a file extension.
    pub fn from_path(path: &Path) -> Result<Self, EngineError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "pdf" => Ok(InputFormat::Pdf),
            "png" => Ok(InputFormat::Png),
            "jpg" | "jpeg" => Ok(InputFormat::Jpeg),
            "tiff" => Ok(InputFormat::Tiff),
            _ => Err(EngineError::UnsupportedFormat(path.display().to_string())),
        }
    }

    /// Whether a path has one of the accepted extensions.
    pub fn is_supported(path: &Path) -> bool {
        Self::from_path(path).is_ok()
    }
}

/// Options for one conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    pub ocr_enabled: bool,
    pub table_structure_enabled: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            ocr_enabled: true,
            table_structure_enabled: true,
        }
    }
}

impl From<&EngineConfig> for EngineOptions {
    fn from(config: &EngineConfig) -> Self {
        Self {
            ocr_enabled: config.ocr_enabled,
            table_structure_enabled: config.table_structure_enabled,
        }
    }
}

/// Everything an engine reports about one document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineDocument {
    /// Layout-flattened view of the whole document, if the engine has one.
    pub flattened_text: Option<String>,
    /// Raw OCR text fragments in detection order.
    pub text_items: Vec<String>,
    /// Candidate tables, if table structure detection ran.
    pub tables: Option<Vec<EngineTable>>,
    /// Page count, if the engine knows it.
    pub page_count: Option<u32>,
}

/// A layout/OCR engine.
pub trait LayoutEngine {
    /// Convert one file.
    fn convert(
        &self,
        path: &Path,
        format: InputFormat,
        options: &EngineOptions,
    ) -> Result<EngineDocument, EngineError>;
}

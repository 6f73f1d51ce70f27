//! Core library for tax document field extraction.
//!
//! This crate provides:
//! - Document normalization (PDF text layers, embedded page images, OCR, tables)
//! - Field extraction with a local language model (Ollama)
//! - The field schema registry for W-2, 1099 and UK payroll documents
//! - An in-memory result dataset with CSV/JSON export and column totals

pub mod amounts;
pub mod dataset;
pub mod error;
pub mod extract;
pub mod layout;
pub mod models;
pub mod normalizer;
pub mod ocr;
pub mod pdf;
pub mod pipeline;

pub use dataset::{ColumnTotal, ExtractedDataset};
pub use error::{EngineError, LlmError, ParseFailure, Result, TaxdocError};
pub use extract::{FieldExtractor, LanguageModel, OllamaClient};
pub use layout::{EngineOptions, InputFormat, LayoutEngine, NativeLayoutEngine, SUPPORTED_EXTENSIONS};
pub use models::config::TaxdocConfig;
pub use models::document::{NormalizedDocument, Table};
pub use models::record::{ExtractedRecord, FieldMap, FieldRequest};
pub use models::schema::DocumentType;
pub use normalizer::DocumentNormalizer;
pub use pipeline::{BatchFailure, BatchReport, Pipeline, RecordPolicy, Upload};

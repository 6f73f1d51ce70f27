//! Error types for the taxdoc-core library.

use thiserror::Error;

/// Main error type for the taxdoc library.
#[derive(Error, Debug)]
pub enum TaxdocError {
    /// A document could not be normalized.
    #[error(transparent)]
    Parse(#[from] ParseFailure),

    /// The language model could not be reached or rejected the request.
    #[error("language model error: {0}")]
    Llm(#[from] LlmError),

    /// The field request is unusable (e.g. no fields).
    #[error("invalid field request: {0}")]
    Request(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Writing an export failed.
    #[error("export error: {0}")]
    Export(String),
}

/// A document that the layout engine could not open or decode.
///
/// Fatal to that one document only; the batch continues.
#[derive(Error, Debug)]
#[error("failed to parse {filename}: {source}")]
pub struct ParseFailure {
    /// Name of the file as the caller knows it.
    pub filename: String,
    /// Underlying engine error.
    #[source]
    pub source: EngineError,
}

/// Errors raised by a layout/OCR engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// PDF processing error.
    #[error("PDF error: {0}")]
    Pdf(#[from] PdfError),

    /// OCR processing error.
    #[error("OCR error: {0}")]
    Ocr(#[from] OcrError),

    /// Image decoding error.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file extension is not one the engine accepts.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// Errors related to PDF processing.
#[derive(Error, Debug)]
pub enum PdfError {
    /// Failed to open/parse the PDF file.
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    /// Failed to extract text from PDF.
    #[error("failed to extract text: {0}")]
    TextExtraction(String),

    /// The PDF is encrypted and cannot be processed.
    #[error("PDF is encrypted")]
    Encrypted,

    /// The PDF is empty or has no pages.
    #[error("PDF has no pages")]
    NoPages,

    /// Invalid page number requested.
    #[error("invalid page number: {0}")]
    InvalidPage(u32),
}

/// Errors related to OCR processing.
#[derive(Error, Debug)]
pub enum OcrError {
    /// Failed to load OCR models.
    #[error("failed to load model: {0}")]
    ModelLoad(String),

    /// Text detection or recognition failed.
    #[error("text recognition failed: {0}")]
    Recognition(String),

    /// OCR was requested but no engine is configured.
    #[error("OCR engine not initialized")]
    NotInitialized,
}

/// A detected table that could not be turned into row mappings.
///
/// Never surfaced to callers; the table is omitted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    /// The table has no header row.
    #[error("table has no header row")]
    MissingHeader,

    /// Two header cells share a name.
    #[error("duplicate column name: {0}")]
    DuplicateColumn(String),

    /// A data row does not match the header width.
    #[error("row {row} has {found} cells, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },
}

/// Errors talking to the language model runtime.
#[derive(Error, Debug)]
pub enum LlmError {
    /// Failed to connect to the runtime.
    #[error("connection error: {0}")]
    Connection(String),

    /// The runtime returned a non-success status.
    #[error("API error: {0}")]
    Api(String),

    /// The runtime's envelope (not the model text) could not be decoded.
    #[error("unexpected response: {0}")]
    Response(String),

    /// The endpoint is not on this host and remote access is disabled.
    #[error("refusing non-local endpoint {0} (set llm.allow_remote to override)")]
    RemoteEndpoint(String),
}

/// Result type for the taxdoc library.
pub type Result<T> = std::result::Result<T, TaxdocError>;

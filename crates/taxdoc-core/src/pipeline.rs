//! Per-document pipeline: upload bytes, normalize, extract, collect.

use std::io::Write;
use std::path::Path;

use futures_util::StreamExt;
use futures_util::stream;
use tracing::{info, warn};

use crate::dataset::ExtractedDataset;
use crate::error::{Result, TaxdocError};
use crate::extract::{FieldExtractor, LanguageModel};
use crate::layout::LayoutEngine;
use crate::models::config::ExtractionConfig;
use crate::models::record::{ExtractedRecord, FieldMap, FieldRequest};
use crate::normalizer::DocumentNormalizer;

/// One input file as received from the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }

    /// Read a file from disk, keeping only its file name.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self { filename, bytes })
    }
}

/// Post-extraction normalization of a record's keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordPolicy {
    /// Give requested fields the model omitted an explicit null.
    pub backfill_missing: bool,
    /// Drop keys that were not requested.
    pub drop_unrequested: bool,
}

impl Default for RecordPolicy {
    fn default() -> Self {
        Self::from(&ExtractionConfig::default())
    }
}

impl From<&ExtractionConfig> for RecordPolicy {
    fn from(config: &ExtractionConfig) -> Self {
        Self {
            backfill_missing: config.backfill_missing,
            drop_unrequested: config.drop_unrequested,
        }
    }
}

impl RecordPolicy {
    /// Leaves the record untouched when both steps are off; reorders requested
    /// keys into request order otherwise. Error-shaped records are never changed.
    pub fn apply(&self, record: &mut ExtractedRecord, request: &FieldRequest, filename: &str) {
        if !self.backfill_missing && !self.drop_unrequested {
            return;
        }
        let Some(fields) = record.fields_mut() else {
            return;
        };

        let mut shaped = FieldMap::new();
        let mut missing = Vec::new();
        for name in request.field_names() {
            match fields.remove(name) {
                Some(value) => shaped.insert(name.clone(), value),
                None if self.backfill_missing => {
                    missing.push(name.as_str());
                    shaped.insert(name.clone(), None);
                }
                None => {}
            }
        }

        let extra: Vec<String> = fields.keys().map(str::to_string).collect();
        if self.drop_unrequested {
            if !extra.is_empty() {
                warn!("{}: dropping unrequested fields: {}", filename, extra.join(", "));
            }
        } else {
            for (key, value) in fields.iter() {
                shaped.insert(key, value.map(str::to_string));
            }
        }

        if !missing.is_empty() {
            warn!("{}: model omitted {}; set to null", filename, missing.join(", "));
        }

        *fields = shaped;
    }
}

/// Failure of one document in a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFailure {
    pub filename: String,
    pub error: String,
}

/// Outcome of a batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Records appended to the dataset.
    pub succeeded: usize,
    /// Appended records whose model answer could not be parsed.
    pub unparsed: usize,
    /// Documents that produced no record, in input order.
    pub failures: Vec<BatchFailure>,
}

/// Normalizer and extractor wired together with a record policy.
pub struct Pipeline<E, M> {
    normalizer: DocumentNormalizer<E>,
    extractor: FieldExtractor<M>,
    policy: RecordPolicy,
}

impl<E: LayoutEngine, M: LanguageModel> Pipeline<E, M> {
    pub fn new(
        normalizer: DocumentNormalizer<E>,
        extractor: FieldExtractor<M>,
        policy: RecordPolicy,
    ) -> Self {
        Self {
            normalizer,
            extractor,
            policy,
        }
    }

    pub fn extractor(&self) -> &FieldExtractor<M> {
        &self.extractor
    }

    /// Process one upload into a record tagged with its file name and type.
    ///
    /// The bytes are staged in a temporary file that is removed before this
    /// returns, whatever the outcome.
    pub async fn process(&self, upload: &Upload, request: &FieldRequest) -> Result<ExtractedRecord> {
        let suffix = Path::new(&upload.filename)
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();

        let document = {
            let mut staged = tempfile::Builder::new()
                .prefix("taxdoc-")
                .suffix(&suffix)
                .tempfile()?;
            staged.write_all(&upload.bytes)?;
            staged.flush()?;

            self.normalizer
                .normalize_named(staged.path(), &upload.filename)?
        };

        if document.is_empty() {
            warn!("{}: no text recovered", upload.filename);
        }

        let mut record = self.extractor.extract(document.text(), request).await?;
        self.policy.apply(&mut record, request, &upload.filename);

        Ok(record.with_source(upload.filename.clone(), request.document_type()))
    }

    /// Process uploads with up to `jobs` documents in flight.
    ///
    /// Records are appended in input order. A failed document is reported
    /// and skipped; it never stops the batch. `on_done` runs once per
    /// document as it completes.
    ///
    /// All documents are driven from the calling task. Normalization (OCR
    /// included) is synchronous and runs one document at a time; `jobs`
    /// overlaps the language model calls only.
    pub async fn run_batch<F>(
        &self,
        uploads: &[Upload],
        request: &FieldRequest,
        dataset: &mut ExtractedDataset,
        jobs: usize,
        mut on_done: F,
    ) -> BatchReport
    where
        F: FnMut(&str, std::result::Result<&ExtractedRecord, &TaxdocError>),
    {
        let mut report = BatchReport::default();
        let mut results = stream::iter(uploads)
            .map(|upload| async move { (upload, self.process(upload, request).await) })
            .buffered(jobs.max(1));

        while let Some((upload, result)) = results.next().await {
            on_done(&upload.filename, result.as_ref());
            match result {
                Ok(record) => {
                    if record.is_error() {
                        warn!("{}: model answer was not a JSON object", upload.filename);
                        report.unparsed += 1;
                    }
                    dataset.push(record);
                    report.succeeded += 1;
                }
                Err(e) => {
                    warn!("{}: {}", upload.filename, e);
                    report.failures.push(BatchFailure {
                        filename: upload.filename.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            "Batch complete: {} succeeded, {} failed",
            report.succeeded,
            report.failures.len()
        );
        report
    }
}

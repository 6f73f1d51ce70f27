//! Configuration structures for the extraction pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::TaxdocError;

/// Main configuration for the taxdoc pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TaxdocConfig {
    /// Layout/OCR engine configuration.
    pub engine: EngineConfig,

    /// Language model configuration.
    pub llm: LlmConfig,

    /// Post-extraction record handling.
    pub extraction: ExtractionConfig,

    /// Batch processing configuration.
    pub batch: BatchConfig,
}

/// Layout/OCR engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Run OCR on page images. Scanned payslips have no text layer, so this
    /// is on by default; turning it off gives the text-layer-only profile.
    pub ocr_enabled: bool,

    /// Detect tables and structure them into rows.
    pub table_structure_enabled: bool,

    /// Directory containing OCR model files.
    pub model_dir: PathBuf,

    /// Text detection model file name.
    pub detection_model: String,

    /// Text recognition model file name.
    pub recognition_model: String,

    /// Character dictionary file name.
    pub dictionary: String,

    /// Keep `[UNK]` tokens emitted by the recognizer instead of blanking them.
    pub keep_unk: bool,

    /// Vertical distance (pixels) under which two OCR boxes share a line.
    pub line_tolerance_px: f32,

    /// Minimum number of lines (header included) for a table.
    pub min_table_rows: usize,

    /// Minimum number of columns for a table.
    pub min_table_columns: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ocr_enabled: true,
            table_structure_enabled: true,
            model_dir: PathBuf::from("models"),
            detection_model: "det.onnx".to_string(),
            recognition_model: "latin_rec.onnx".to_string(),
            dictionary: "latin_dict.txt".to_string(),
            keep_unk: false,
            line_tolerance_px: 15.0,
            min_table_rows: 2,
            min_table_columns: 2,
        }
    }
}

impl EngineConfig {
    /// Full paths of the detection model, recognition model and dictionary.
    pub fn model_paths(&self) -> [PathBuf; 3] {
        [
            self.model_dir.join(&self.detection_model),
            self.model_dir.join(&self.recognition_model),
            self.model_dir.join(&self.dictionary),
        ]
    }
}

/// Language model runtime configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL of the Ollama API.
    pub endpoint: String,

    /// Model identifier.
    pub model: String,

    /// Request timeout in seconds.
    pub timeout_secs: u64,

    /// Sampling temperature. Left to the runtime when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Allow an endpoint that is not on this host.
    pub allow_remote: bool,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434".to_string(),
            model: "llama3.2".to_string(),
            timeout_secs: 300,
            temperature: None,
            allow_remote: false,
        }
    }
}

/// How extracted records are normalized before they join the dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Fill requested fields the model left out with an explicit null.
    pub backfill_missing: bool,

    /// Drop keys the model returned that were never requested.
    pub drop_unrequested: bool,

    /// Truncate document text sent to the model (0 = unlimited).
    pub max_text_chars: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            backfill_missing: true,
            drop_unrequested: true,
            max_text_chars: 0,
        }
    }
}

/// Batch processing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Documents in flight at once (1 = strictly sequential).
    pub jobs: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { jobs: 1 }
    }
}

impl TaxdocConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, TaxdocError> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| TaxdocError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }

    /// Apply environment variable overrides.
    ///
    /// Supported env vars:
    /// - `TAXDOC_LLM_ENDPOINT`: Ollama base URL
    /// - `TAXDOC_LLM_MODEL`: model identifier
    /// - `TAXDOC_MODEL_DIR`: OCR model directory
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(endpoint) = lookup("TAXDOC_LLM_ENDPOINT") {
            self.llm.endpoint = endpoint;
        }
        if let Some(model) = lookup("TAXDOC_LLM_MODEL") {
            self.llm.model = model;
        }
        if let Some(dir) = lookup("TAXDOC_MODEL_DIR") {
            self.engine.model_dir = PathBuf::from(dir);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TaxdocConfig::default();
        assert!(config.engine.ocr_enabled);
        assert!(config.engine.table_structure_enabled);
        assert_eq!(config.llm.endpoint, "http://localhost:11434");
        assert!(!config.llm.allow_remote);
        assert!(config.extraction.backfill_missing);
        assert_eq!(config.batch.jobs, 1);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: TaxdocConfig =
            serde_json::from_str(r#"{"llm": {"model": "qwen2.5"}}"#).unwrap();
        assert_eq!(config.llm.model, "qwen2.5");
        assert_eq!(config.llm.timeout_secs, 300);
        assert!(config.engine.ocr_enabled);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = TaxdocConfig::default();
        config.engine.ocr_enabled = false;
        config.llm.temperature = Some(0.1);
        config.save(&path).unwrap();

        let loaded = TaxdocConfig::from_file(&path).unwrap();
        assert!(!loaded.engine.ocr_enabled);
        assert_eq!(loaded.llm.temperature, Some(0.1));
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"batch": {"jobs": "many"}}"#).unwrap();

        let err = TaxdocConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, TaxdocError::Config(msg) if msg.contains("config.json")));
    }

    #[test]
    fn test_overrides() {
        let config = TaxdocConfig::default().with_overrides(|key| match key {
            "TAXDOC_LLM_MODEL" => Some("mistral".to_string()),
            "TAXDOC_MODEL_DIR" => Some("/opt/ocr".to_string()),
            _ => None,
        });
        assert_eq!(config.llm.model, "mistral");
        assert_eq!(config.engine.model_dir, PathBuf::from("/opt/ocr"));
        assert_eq!(config.llm.endpoint, "http://localhost:11434");
    }
}

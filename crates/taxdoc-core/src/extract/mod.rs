//! Field extraction with a language model.
//!
//! The extractor asks for exactly the requested fields and accepts only a
//! JSON object back. Anything else becomes an error-shaped record carrying
//! the raw response, so a misbehaving model never fails a document.

mod ollama;
mod prompt;

pub use ollama::{ChatRequest, LanguageModel, OllamaClient};
pub use prompt::build_extraction_prompt;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::LlmError;
use crate::models::record::{ExtractedRecord, FieldMap, FieldRequest, is_reserved_key, json_to_field};

/// Extracts requested fields from normalized document text.
pub struct FieldExtractor<M> {
    model: M,
    max_text_chars: usize,
}

impl<M: LanguageModel> FieldExtractor<M> {
    pub fn new(model: M) -> Self {
        Self {
            model,
            max_text_chars: 0,
        }
    }

    /// Truncate document text to this many bytes before prompting (0 = unlimited).
    pub fn with_max_text_chars(mut self, max_text_chars: usize) -> Self {
        self.max_text_chars = max_text_chars;
        self
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Extract the requested fields.
    ///
    /// Only transport failures are errors; an unusable answer is returned as
    /// an error-shaped record.
    pub async fn extract(
        &self,
        text: &str,
        request: &FieldRequest,
    ) -> Result<ExtractedRecord, LlmError> {
        let text = truncate_text(text, self.max_text_chars);
        let chat = ChatRequest {
            prompt: build_extraction_prompt(text, request),
            json_output: true,
        };

        debug!(
            "Extracting {} fields from {} document with {}",
            request.field_names().len(),
            request.document_type(),
            self.model.model_id()
        );
        let response = self.model.chat(&chat).await?;

        Ok(parse_response(&response, request))
    }
}

/// Turn a model answer into a record.
///
/// Requested fields come first in request order, followed by any other keys
/// the model returned. Missing fields are left missing.
pub fn parse_response(raw: &str, request: &FieldRequest) -> ExtractedRecord {
    let mut object = match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(object)) => object,
        Ok(other) => {
            warn!("Model answered with JSON {} instead of an object", json_kind(&other));
            return ExtractedRecord::unparsed(raw);
        }
        Err(e) => {
            warn!("Model answer is not JSON: {}", e);
            return ExtractedRecord::unparsed(raw);
        }
    };

    let mut fields = FieldMap::new();
    for name in request.field_names() {
        if let Some(value) = object.remove(name) {
            fields.insert(name.clone(), json_to_field(value));
        }
    }
    for (key, value) in object {
        if is_reserved_key(&key) {
            warn!("Dropping reserved key {} from model answer", key);
            continue;
        }
        fields.insert(key, json_to_field(value));
    }

    ExtractedRecord::from_fields(fields)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Truncate text to at most `max` bytes on a UTF-8 boundary (0 = unlimited).
fn truncate_text(text: &str, max: usize) -> &str {
    if max == 0 || text.len() <= max {
        return text;
    }
    let mut end = max;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

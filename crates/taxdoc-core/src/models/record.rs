//! Field requests and the records extracted for them.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

use crate::error::TaxdocError;
use crate::models::schema::DocumentType;

/// Message carried by a record whose model response was not a JSON object.
pub const PARSE_ERROR_MESSAGE: &str = "Failed to parse LLM response";

/// Reserved key holding the original file name.
pub const SOURCE_FILE_KEY: &str = "_source_file";

/// Reserved key holding the document type label.
pub const DOCUMENT_TYPE_KEY: &str = "_document_type";

const ERROR_KEY: &str = "error";
const RAW_KEY: &str = "raw";

/// Whether a key is owned by the record itself rather than by a field.
///
/// Covers the error-record keys and anything starting with `_`.
pub fn is_reserved_key(name: &str) -> bool {
    name.starts_with('_') || name == ERROR_KEY || name == RAW_KEY
}

/// The set of fields to extract from one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRequest {
    document_type: String,
    field_names: Vec<String>,
}

impl FieldRequest {
    /// Build a request. Names are trimmed, blanks dropped and duplicates
    /// removed keeping the first occurrence. At least one name must remain.
    pub fn new<I, S>(document_type: impl Into<String>, field_names: I) -> Result<Self, TaxdocError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut names: Vec<String> = Vec::new();
        for name in field_names {
            let name = name.as_ref().trim();
            if is_reserved_key(name) {
                return Err(TaxdocError::Request(format!(
                    "field name '{}' is reserved",
                    name
                )));
            }
            if !name.is_empty() && !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }

        if names.is_empty() {
            return Err(TaxdocError::Request("no fields to extract".to_string()));
        }

        Ok(Self {
            document_type: document_type.into(),
            field_names: names,
        })
    }

    /// Request the canonical fields of a document type plus any extras.
    pub fn for_type<I, S>(document_type: DocumentType, extra: I) -> Result<Self, TaxdocError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let defaults = document_type.default_fields().iter().map(|f| f.to_string());
        let extra = extra.into_iter().map(|f| f.as_ref().to_string());
        Self::new(document_type.label(), defaults.chain(extra))
    }

    pub fn document_type(&self) -> &str {
        &self.document_type
    }

    /// Requested names in presentation order.
    pub fn field_names(&self) -> &[String] {
        &self.field_names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.field_names.iter().any(|n| n == name)
    }
}

/// Ordered mapping from field name to value, `None` meaning "not present".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMap {
    entries: Vec<(String, Option<String>)>,
}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a field. `Some(None)` is an explicit null, `None` a missing key.
    pub fn get(&self, name: &str) -> Option<&Option<String>> {
        self.entries.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// Value of a field if present and non-null.
    pub fn value(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|v| v.as_deref())
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == name)
    }

    /// Insert or replace a field, keeping its original position on replace.
    pub fn insert(&mut self, name: impl Into<String>, value: Option<String>) {
        let name = name.into();
        match self.entries.iter_mut().find(|(k, _)| *k == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Option<String>> {
        let pos = self.entries.iter().position(|(k, _)| k == name)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.entries.retain(|(k, _)| keep(k));
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, Option<String>)> for FieldMap {
    fn from_iter<T: IntoIterator<Item = (String, Option<String>)>>(iter: T) -> Self {
        let mut map = FieldMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

/// Payload of an extracted record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordBody {
    /// The model answered with a JSON object.
    Fields(FieldMap),
    /// The model answer could not be parsed; `raw` is the exact text.
    Unparsed { error: String, raw: String },
}

/// Result of extracting fields from one document.
///
/// Serializes as one flat object: field keys (or `error`/`raw`) followed by
/// `_source_file` and `_document_type` when they have been attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedRecord {
    body: RecordBody,
    source_file: Option<String>,
    document_type: Option<String>,
}

impl ExtractedRecord {
    /// Record for a successfully parsed response.
    pub fn from_fields(fields: FieldMap) -> Self {
        Self {
            body: RecordBody::Fields(fields),
            source_file: None,
            document_type: None,
        }
    }

    /// Record for a response that was not a JSON object.
    pub fn unparsed(raw: impl Into<String>) -> Self {
        Self {
            body: RecordBody::Unparsed {
                error: PARSE_ERROR_MESSAGE.to_string(),
                raw: raw.into(),
            },
            source_file: None,
            document_type: None,
        }
    }

    /// Attach the reserved metadata keys.
    pub fn with_source(mut self, filename: impl Into<String>, document_type: impl Into<String>) -> Self {
        self.source_file = Some(filename.into());
        self.document_type = Some(document_type.into());
        self
    }

    pub fn body(&self) -> &RecordBody {
        &self.body
    }

    /// Field mapping, or `None` for an error-shaped record.
    pub fn fields(&self) -> Option<&FieldMap> {
        match &self.body {
            RecordBody::Fields(fields) => Some(fields),
            RecordBody::Unparsed { .. } => None,
        }
    }

    pub fn fields_mut(&mut self) -> Option<&mut FieldMap> {
        match &mut self.body {
            RecordBody::Fields(fields) => Some(fields),
            RecordBody::Unparsed { .. } => None,
        }
    }

    /// Error message of an error-shaped record.
    pub fn error(&self) -> Option<&str> {
        match &self.body {
            RecordBody::Unparsed { error, .. } => Some(error),
            RecordBody::Fields(_) => None,
        }
    }

    /// Unparsed model text of an error-shaped record.
    pub fn raw(&self) -> Option<&str> {
        match &self.body {
            RecordBody::Unparsed { raw, .. } => Some(raw),
            RecordBody::Fields(_) => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.body, RecordBody::Unparsed { .. })
    }

    pub fn source_file(&self) -> Option<&str> {
        self.source_file.as_deref()
    }

    pub fn document_type(&self) -> Option<&str> {
        self.document_type.as_deref()
    }

    /// Column names this record contributes, in output order.
    pub fn columns(&self) -> Vec<&str> {
        let mut columns: Vec<&str> = match &self.body {
            RecordBody::Fields(fields) => fields.keys().collect(),
            RecordBody::Unparsed { .. } => vec![ERROR_KEY, RAW_KEY],
        };
        if self.source_file.is_some() {
            columns.push(SOURCE_FILE_KEY);
        }
        if self.document_type.is_some() {
            columns.push(DOCUMENT_TYPE_KEY);
        }
        columns
    }

    /// Cell value for a column; `None` for null or absent.
    pub fn cell(&self, column: &str) -> Option<&str> {
        match column {
            SOURCE_FILE_KEY => return self.source_file(),
            DOCUMENT_TYPE_KEY => return self.document_type(),
            _ => {}
        }
        match &self.body {
            RecordBody::Fields(fields) => fields.value(column),
            RecordBody::Unparsed { error, raw } => match column {
                ERROR_KEY => Some(error),
                RAW_KEY => Some(raw),
                _ => None,
            },
        }
    }

    fn from_entries(entries: Vec<(String, Value)>) -> Self {
        let mut fields = FieldMap::new();
        let mut source_file = None;
        let mut document_type = None;
        let mut error = None;
        let mut raw = None;

        for (key, value) in entries {
            match key.as_str() {
                SOURCE_FILE_KEY => source_file = json_to_field(value),
                DOCUMENT_TYPE_KEY => document_type = json_to_field(value),
                ERROR_KEY => {
                    error = json_to_field(value.clone());
                    fields.insert(key, json_to_field(value));
                }
                RAW_KEY => {
                    raw = json_to_field(value.clone());
                    fields.insert(key, json_to_field(value));
                }
                _ => fields.insert(key, json_to_field(value)),
            }
        }

        let body = match error {
            Some(error) => RecordBody::Unparsed {
                error,
                raw: raw.unwrap_or_default(),
            },
            None => RecordBody::Fields(fields),
        };

        Self {
            body,
            source_file,
            document_type,
        }
    }
}

/// Convert a JSON value from a model answer into a field value.
///
/// Strings are kept verbatim and `null` stays null. Numbers and booleans
/// keep their JSON spelling; arrays and objects are kept as compact JSON.
pub fn json_to_field(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

impl Serialize for ExtractedRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        match &self.body {
            RecordBody::Fields(fields) => {
                for (key, value) in fields.iter() {
                    map.serialize_entry(key, &value)?;
                }
            }
            RecordBody::Unparsed { error, raw } => {
                map.serialize_entry(ERROR_KEY, error)?;
                map.serialize_entry(RAW_KEY, raw)?;
            }
        }
        if let Some(source_file) = &self.source_file {
            map.serialize_entry(SOURCE_FILE_KEY, source_file)?;
        }
        if let Some(document_type) = &self.document_type {
            map.serialize_entry(DOCUMENT_TYPE_KEY, document_type)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ExtractedRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RecordVisitor;

        impl<'de> Visitor<'de> for RecordVisitor {
            type Value = ExtractedRecord;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a flat record object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::new();
                while let Some((key, value)) = access.next_entry::<String, Value>()? {
                    entries.push((key, value));
                }
                Ok(ExtractedRecord::from_entries(entries))
            }
        }

        deserializer.deserialize_map(RecordVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_request_dedups_and_trims() {
        let request =
            FieldRequest::new("W-2", ["employer_name", " state ", "", "employer_name"]).unwrap();
        assert_eq!(request.field_names(), &["employer_name", "state"]);
        assert!(request.contains("state"));
    }

    #[test]
    fn test_request_requires_fields() {
        assert!(FieldRequest::new("Custom", Vec::<String>::new()).is_err());
        assert!(FieldRequest::new("Custom", ["  ", ""]).is_err());
        assert!(FieldRequest::for_type(DocumentType::Custom, Vec::<String>::new()).is_err());
    }

    #[test]
    fn test_request_rejects_reserved_names() {
        for name in ["error", "raw", "_source_file", "_document_type", "_notes"] {
            let err = FieldRequest::new("Custom", ["employer_name", name]).unwrap_err();
            assert!(matches!(err, TaxdocError::Request(msg) if msg.contains(name)));
        }
        assert!(FieldRequest::new("Custom", ["error_code", "raw_total"]).is_ok());
    }

    #[test]
    fn test_request_for_type_appends_extra() {
        let request = FieldRequest::for_type(DocumentType::Form1099Nec, ["box_7"]).unwrap();
        assert_eq!(request.document_type(), "1099-NEC");
        assert_eq!(request.field_names().first().map(String::as_str), Some("payer_name"));
        assert_eq!(request.field_names().last().map(String::as_str), Some("box_7"));
    }

    #[test]
    fn test_field_map_insert_keeps_position() {
        let mut map = FieldMap::new();
        map.insert("a", Some("1".to_string()));
        map.insert("b", None);
        map.insert("a", Some("2".to_string()));
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(map.value("a"), Some("2"));
        assert_eq!(map.get("b"), Some(&None));
        assert_eq!(map.get("c"), None);
    }

    #[test]
    fn test_serialize_flat_with_metadata_last() {
        let fields: FieldMap = vec![
            ("gross_pay".to_string(), Some("£2,500.00".to_string())),
            ("bonus".to_string(), None),
        ]
        .into_iter()
        .collect();
        let record = ExtractedRecord::from_fields(fields).with_source("slip.pdf", "UK-PAYE-Payslip");

        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(
            json,
            r#"{"gross_pay":"£2,500.00","bonus":null,"_source_file":"slip.pdf","_document_type":"UK-PAYE-Payslip"}"#
        );
    }

    #[test]
    fn test_serialize_error_shape() {
        let record = ExtractedRecord::unparsed("not json");
        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({"error": "Failed to parse LLM response", "raw": "not json"})
        );
    }

    #[test]
    fn test_deserialize_edited_record() {
        let record: ExtractedRecord = serde_json::from_value(json!({
            "payer_name": "ACME Bank",
            "interest_income": 12.5,
            "_source_file": "int.pdf",
            "_document_type": "1099-INT"
        }))
        .unwrap();

        let fields = record.fields().unwrap();
        assert_eq!(fields.value("payer_name"), Some("ACME Bank"));
        assert_eq!(fields.value("interest_income"), Some("12.5"));
        assert_eq!(record.source_file(), Some("int.pdf"));
        assert!(!fields.contains_key(SOURCE_FILE_KEY));
    }

    #[test]
    fn test_deserialize_error_record() {
        let record: ExtractedRecord = serde_json::from_value(json!({
            "error": "Failed to parse LLM response",
            "raw": "oops",
            "_source_file": "bad.png"
        }))
        .unwrap();
        assert!(record.is_error());
        assert_eq!(record.raw(), Some("oops"));
        assert_eq!(record.cell("error"), Some(PARSE_ERROR_MESSAGE));
    }
}

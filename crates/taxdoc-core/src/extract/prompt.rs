//! Extraction prompt.

use crate::models::record::FieldRequest;

/// Build the single user message sent to the model.
pub fn build_extraction_prompt(text: &str, request: &FieldRequest) -> String {
    let fields = request
        .field_names()
        .iter()
        .map(|name| format!("- {}", name))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You extract data from tax documents. The document below is a {doc_type}.

FIELDS TO EXTRACT:
{fields}

DOCUMENT TEXT:
{text}

RULES:
1. Only report a value that is explicitly written in the document text. If a field is not clearly present, its value MUST be null.
2. Never guess, infer, estimate or calculate a value. Do not add up amounts or derive totals that are not printed.
3. Copy every value exactly as written. Keep dates in their original format, keep currency symbols, thousands separators and decimal points, and keep the original capitalisation.
4. Answer with one JSON object whose keys are exactly the field names listed above, and nothing else."#,
        doc_type = request.document_type(),
        fields = fields,
        text = text,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_lists_each_field_on_its_own_line() {
        let request = FieldRequest::new("UK-P60", ["employee_name", "tax_code"]).unwrap();
        let prompt = build_extraction_prompt("P60 End of Year Certificate", &request);

        assert!(prompt.contains("The document below is a UK-P60."));
        assert!(prompt.contains("\n- employee_name\n- tax_code\n"));
        assert!(prompt.contains("P60 End of Year Certificate"));
        assert!(prompt.contains("MUST be null"));
        assert!(prompt.contains("derive totals"));
        assert!(prompt.contains("currency symbols"));
        assert!(prompt.contains("one JSON object"));
    }
}

//! Document extractor.
//!
//! Raw text extraction is delegated to an injected [`DocumentTextSource`]
//! collaborator; this extractor only finds structure in the decoded text:
//! table regions (contiguous lines sharing a column delimiter pattern),
//! form fields (`Label: value` lines), and a keyword-scored document type.
//! Confidence reflects the fraction of the document that yielded
//! recognized structure versus opaque text.

use crate::model::{ClassificationResult, ExtractionResult, ExtractorId, RawInput};
use crate::traits::{DocumentTextSource, Extractor};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};
use std::sync::Arc;

/// `Label: value` with a short, word-like label.
static FORM_FIELD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([A-Za-z][A-Za-z0-9 _/-]{0,40}?)\s*:\s+(.+?)\s*$").expect("static regex")
});

/// Three or more tokens separated by runs of two-plus spaces.
static SPACE_COLUMNS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\S.*(\s{2,}\S+){2,}\s*$").expect("static regex"));

/// Invoice reference following an "invoice number"-style introducer. The
/// captured token must contain a digit.
static INVOICE_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)invoice\s*(?:number|num|no|id|#)?\s*[:.]?\s*((?:[A-Za-z][A-Za-z-]*)?\d[A-Za-z0-9-]*)")
        .expect("static regex")
});

static INVOICE_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)date\s*[:.]?\s*(\d{4}-\d{2}-\d{2}|\d{1,2}[/-]\d{1,2}[/-]\d{2,4}|[A-Za-z]+\s+\d{1,2},?\s+\d{4})")
        .expect("static regex")
});

static INVOICE_TOTAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:total\s*(?:amount|sum)?|amount\s*due)\s*[:.]?\s*[$€£]?\s*(\d{1,3}(?:,\d{3})*(?:\.\d{2})?)")
        .expect("static regex")
});

static INVOICE_CURRENCY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)currency\s*[:.]?\s*([A-Za-z]{3})\b").expect("static regex"));

static CURRENCY_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(USD|EUR|GBP|JPY|CAD|AUD)\b").expect("static regex"));

/// Pulls the invoice-specific fields out of an invoice-typed document.
/// Only fields actually found are present in the returned map.
fn extract_invoice_data(text: &str) -> serde_json::Map<String, Value> {
    let mut data = serde_json::Map::new();

    if let Some(caps) = INVOICE_NUMBER.captures(text) {
        data.insert(
            "invoice_number".to_string(),
            Value::String(caps[1].to_string()),
        );
    }
    if let Some(caps) = INVOICE_DATE.captures(text) {
        data.insert("date".to_string(), Value::String(caps[1].to_string()));
    }
    if let Some(caps) = INVOICE_TOTAL.captures(text) {
        let cleaned = caps[1].replace(',', "");
        if let Ok(amount) = cleaned.parse::<f64>() {
            if let Some(number) = serde_json::Number::from_f64(amount) {
                data.insert("total_amount".to_string(), Value::Number(number));
            }
        }
    }

    let currency = INVOICE_CURRENCY
        .captures(text)
        .map(|caps| caps[1].to_uppercase())
        .or_else(|| CURRENCY_CODE.captures(text).map(|caps| caps[1].to_string()))
        .or_else(|| match text {
            t if t.contains('€') => Some("EUR".to_string()),
            t if t.contains('£') => Some("GBP".to_string()),
            t if t.contains('$') => Some("USD".to_string()),
            _ => None,
        });
    if let Some(code) = currency {
        data.insert("currency".to_string(), Value::String(code));
    }

    data
}

/// Keyword groups for document-type scoring. Order is the tie-break.
const DOCUMENT_TYPES: [(&str, &[&str]); 5] = [
    (
        "invoice",
        &["invoice", "bill", "receipt", "payment", "due date", "amount due"],
    ),
    (
        "contract",
        &["agreement", "contract", "terms", "conditions", "parties", "signed"],
    ),
    (
        "report",
        &["report", "analysis", "findings", "summary", "conclusion"],
    ),
    (
        "letter",
        &["dear", "sincerely", "regards", "to whom it may concern"],
    ),
    (
        "resume",
        &["experience", "skills", "education", "resume", "curriculum vitae"],
    ),
];

/// Column delimiter class a table region is built from. Regions never mix
/// classes; a pipe table followed by a tab table is two regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delimiter {
    Pipe,
    Tab,
    Spaces,
}

fn delimiter_of(line: &str) -> Option<Delimiter> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.matches('|').count() >= 2 {
        return Some(Delimiter::Pipe);
    }
    if trimmed.matches('\t').count() >= 1 {
        return Some(Delimiter::Tab);
    }
    if SPACE_COLUMNS.is_match(line) {
        return Some(Delimiter::Spaces);
    }
    None
}

fn split_row(line: &str, delimiter: Delimiter) -> Vec<String> {
    let cells: Vec<String> = match delimiter {
        Delimiter::Pipe => line.split('|').map(str::trim).map(String::from).collect(),
        Delimiter::Tab => line.split('\t').map(str::trim).map(String::from).collect(),
        Delimiter::Spaces => line
            .trim()
            .split("  ")
            .map(str::trim)
            .map(String::from)
            .collect(),
    };
    cells.into_iter().filter(|cell| !cell.is_empty()).collect()
}

/// Detected table regions plus the indices of the lines they cover.
fn detect_tables(lines: &[&str]) -> (Vec<Vec<Vec<String>>>, Vec<bool>) {
    let mut tables = Vec::new();
    let mut covered = vec![false; lines.len()];

    let mut index = 0usize;
    while index < lines.len() {
        let Some(delimiter) = delimiter_of(lines[index]) else {
            index += 1;
            continue;
        };

        let mut end = index + 1;
        while end < lines.len() && delimiter_of(lines[end]) == Some(delimiter) {
            end += 1;
        }

        // A region needs at least two consistent lines to count as a table.
        if end - index >= 2 {
            let rows: Vec<Vec<String>> = lines[index..end]
                .iter()
                .map(|line| split_row(line, delimiter))
                .collect();
            for flag in covered.iter_mut().take(end).skip(index) {
                *flag = true;
            }
            tables.push(rows);
        }
        index = end;
    }

    (tables, covered)
}

fn score_document_type(text_lower: &str) -> &'static str {
    let mut best: Option<(&'static str, usize)> = None;
    for (label, keywords) in DOCUMENT_TYPES {
        let count = keywords
            .iter()
            .filter(|keyword| text_lower.contains(*keyword))
            .count();
        match best {
            Some((_, best_count)) if count <= best_count => {}
            _ if count > 0 => best = Some((label, count)),
            _ => {}
        }
    }
    best.map(|(label, _)| label).unwrap_or("unknown")
}

/// Extractor for binary/opaque documents, behind a text-decode collaborator.
pub struct DocumentExtractor {
    text_source: Arc<dyn DocumentTextSource>,
}

impl DocumentExtractor {
    pub fn new(text_source: Arc<dyn DocumentTextSource>) -> Self {
        Self { text_source }
    }
}

#[async_trait]
impl Extractor for DocumentExtractor {
    fn extractor_id(&self) -> ExtractorId {
        ExtractorId::Document
    }

    async fn extract(
        &self,
        input: &RawInput,
        _classification: &ClassificationResult,
    ) -> ExtractionResult {
        let text = match self.text_source.extract_text(input.as_bytes()).await {
            Ok(text) => text,
            Err(err) => {
                // Capability failure degrades, never aborts.
                return ExtractionResult::empty(ExtractorId::Document)
                    .with_warning(format!("Text extraction failed: {err}"));
            }
        };

        let lines: Vec<&str> = text.lines().collect();
        let (tables, covered) = detect_tables(&lines);

        let mut form_fields = serde_json::Map::new();
        let mut structured_lines = 0usize;
        let mut non_empty_lines = 0usize;

        for (index, line) in lines.iter().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            non_empty_lines += 1;
            if covered[index] {
                structured_lines += 1;
                continue;
            }
            if let Some(caps) = FORM_FIELD.captures(line) {
                form_fields.insert(
                    caps[1].trim().to_ascii_lowercase(),
                    Value::String(caps[2].to_string()),
                );
                structured_lines += 1;
            }
        }

        let mut result = ExtractionResult::empty(ExtractorId::Document);
        let lower = text.to_ascii_lowercase();
        let document_type = score_document_type(&lower);
        result.fields.insert(
            "document_type".to_string(),
            Value::String(document_type.to_string()),
        );
        if document_type == "invoice" {
            result.fields.insert(
                "invoice_data".to_string(),
                Value::Object(extract_invoice_data(&text)),
            );
        }
        result
            .fields
            .insert("full_text".to_string(), Value::String(text.clone()));
        result
            .fields
            .insert("tables".to_string(), json!(tables));
        result
            .fields
            .insert("form_fields".to_string(), Value::Object(form_fields));

        result.confidence = if non_empty_lines > 0 {
            structured_lines as f64 / non_empty_lines as f64
        } else {
            result
                .warnings
                .push("Document yielded no text".to_string());
            0.0
        };
        result.raw_excerpt = Some(super::tabular::excerpt(&text));
        result
    }
}

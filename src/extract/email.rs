//! Message/email extractor.
//!
//! Splits the header block from the body at the first blank line, extracts
//! the canonical headers case-insensitively, normalizes the body text,
//! collects attachment markers without decoding them, and runs a
//! lightweight entity scan (money amounts, order references, dates) over
//! the body. Confidence is 1.0 minus a penalty per missing expected
//! header.

use crate::config::EmailPolicy;
use crate::model::{ClassificationResult, ExtractionResult, ExtractorId, RawInput};
use crate::traits::Extractor;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Map, Value};

static MARKUP_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("static regex"));

/// `From: Display Name <mailbox@host>` — display name and address.
static SENDER_WITH_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(.*?)\s*<([^>]+@[^>]+)>\s*$").expect("static regex"));

static BARE_ADDRESS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\w.+-]+@[\w.-]+\.[A-Za-z]{2,}").expect("static regex"));

/// MIME attachment marker; bodies are never decoded here.
static ATTACHMENT_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)content-disposition:\s*attachment;\s*filename="?([^";\r\n]+)"?"#)
        .expect("static regex")
});

static CONTENT_TYPE_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^content-type:\s*([\w.+-]+/[\w.+-]+)").expect("static regex"));

static MONEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:[$€£]\s?\d[\d,]*(?:\.\d{1,2})?)|(?:\d[\d,]*(?:\.\d{1,2})?\s?(?:USD|EUR|GBP|JPY|CAD|AUD))")
        .expect("static regex")
});

// The captured reference must contain a digit, so prose after the
// introducer ("in order to proceed") is never taken as a reference.
static ORDER_REF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:order|invoice|ref(?:erence)?)\s*(?:#|no\.?|number|id)?\s*:?\s*#?((?:[A-Za-z][A-Za-z-]*)?\d[A-Za-z0-9-]*)")
        .expect("static regex")
});

static BARE_REF: Lazy<Regex> = Lazy::new(|| Regex::new(r"#(\d{3,})").expect("static regex"));

static DATE_LITERAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:\d{4}-\d{2}-\d{2}|\d{1,2}[/-]\d{1,2}[/-]\d{2,4})\b").expect("static regex")
});

const HIGH_URGENCY: [&str; 6] = [
    "urgent",
    "asap",
    "immediately",
    "emergency",
    "critical",
    "important",
];

const MEDIUM_URGENCY: [&str; 5] = ["soon", "timely", "promptly", "attention", "priority"];

/// Extractor for message-framed input.
#[derive(Debug, Clone)]
pub struct EmailExtractor {
    policy: EmailPolicy,
}

impl EmailExtractor {
    pub fn new(policy: EmailPolicy) -> Self {
        Self { policy }
    }
}

/// Splits a message into its header block and body at the first blank
/// line. Without a blank line, leading `Key: value` lines count as headers
/// and the remainder is the body.
fn split_message(text: &str) -> (Vec<(String, String)>, String) {
    let mut headers = Vec::new();
    let mut body_lines: Vec<&str> = Vec::new();
    let mut in_headers = true;

    for line in text.lines() {
        if in_headers {
            if line.trim().is_empty() {
                in_headers = false;
                continue;
            }
            if let Some((key, value)) = line.split_once(':') {
                let key = key.trim();
                if !key.is_empty() && !key.contains(char::is_whitespace) {
                    headers.push((key.to_string(), value.trim().to_string()));
                    continue;
                }
            }
            // First non-header line ends the block.
            in_headers = false;
        }
        body_lines.push(line);
    }

    (headers, body_lines.join("\n"))
}

fn header_value<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

/// Splits `From:` content into a display name and address.
fn sender_parts(from: &str) -> (String, String) {
    if let Some(caps) = SENDER_WITH_NAME.captures(from) {
        let name = caps[1].trim().trim_matches('"').to_string();
        let address = caps[2].trim().to_string();
        let name = if name.is_empty() {
            address.split('@').next().unwrap_or_default().to_string()
        } else {
            name
        };
        return (name, address);
    }
    if let Some(m) = BARE_ADDRESS.find(from) {
        let address = m.as_str().to_string();
        let name = address.split('@').next().unwrap_or_default().to_string();
        return (name, address);
    }
    (from.trim().to_string(), String::new())
}

fn scan_urgency(text_lower: &str) -> &'static str {
    if HIGH_URGENCY.iter().any(|word| text_lower.contains(word)) {
        "high"
    } else if MEDIUM_URGENCY.iter().any(|word| text_lower.contains(word)) {
        "medium"
    } else {
        "low"
    }
}

/// Collects unique matches of `regex` (capture group 1 if present).
fn collect_matches(regex: &Regex, text: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for caps in regex.captures_iter(text) {
        let matched = caps
            .get(1)
            .unwrap_or_else(|| caps.get(0).expect("match exists"))
            .as_str()
            .trim()
            .to_string();
        if !matched.is_empty() && !seen.contains(&matched) {
            seen.push(matched);
        }
    }
    seen
}

fn scan_entities(body: &str) -> Value {
    let mut order_refs = collect_matches(&ORDER_REF, body);
    for bare in collect_matches(&BARE_REF, body) {
        if !order_refs.contains(&bare) {
            order_refs.push(bare);
        }
    }

    json!({
        "amounts": collect_matches(&MONEY, body),
        "order_refs": order_refs,
        "dates": collect_matches(&DATE_LITERAL, body),
    })
}

fn scan_attachments(text: &str) -> Vec<Value> {
    let mut attachments = Vec::new();
    let mut last_content_type: Option<String> = None;

    for line in text.lines() {
        if let Some(caps) = CONTENT_TYPE_LINE.captures(line.trim()) {
            last_content_type = Some(caps[1].to_string());
        }
        if let Some(caps) = ATTACHMENT_MARKER.captures(line) {
            attachments.push(json!({
                "filename": caps[1].trim(),
                "content_type": last_content_type
                    .as_deref()
                    .unwrap_or("application/octet-stream"),
            }));
        }
    }
    attachments
}

#[async_trait]
impl Extractor for EmailExtractor {
    fn extractor_id(&self) -> ExtractorId {
        ExtractorId::Email
    }

    async fn extract(
        &self,
        input: &RawInput,
        _classification: &ClassificationResult,
    ) -> ExtractionResult {
        let text = match input.as_text() {
            Some(t) => t,
            None => {
                return ExtractionResult::empty(ExtractorId::Email)
                    .with_warning("Input is not decodable text")
            }
        };

        let (headers, body) = split_message(text);
        let mut result = ExtractionResult::empty(ExtractorId::Email);

        let mut header_map = Map::new();
        let mut missing = 0usize;
        for expected in &self.policy.expected_headers {
            match header_value(&headers, expected) {
                Some(value) => {
                    header_map.insert(expected.clone(), Value::String(value.to_string()));
                }
                None => {
                    missing += 1;
                    result
                        .warnings
                        .push(format!("Missing expected header: {expected}"));
                }
            }
        }

        if let Some(from) = header_value(&headers, "From") {
            let (name, address) = sender_parts(from);
            result
                .fields
                .insert("sender_name".to_string(), Value::String(name));
            if !address.is_empty() {
                result
                    .fields
                    .insert("sender_email".to_string(), Value::String(address));
            }
        }

        let body_text = MARKUP_TAG.replace_all(&body, "").trim().to_string();
        let lower = text.to_ascii_lowercase();

        result
            .fields
            .insert("headers".to_string(), Value::Object(header_map));
        result
            .fields
            .insert("body_text".to_string(), Value::String(body_text));
        result
            .fields
            .insert("entities".to_string(), scan_entities(&body));
        result.fields.insert(
            "urgency".to_string(),
            Value::String(scan_urgency(&lower).to_string()),
        );

        let attachments = scan_attachments(text);
        if !attachments.is_empty() {
            result
                .fields
                .insert("attachments".to_string(), Value::Array(attachments));
        }

        result.confidence =
            (1.0 - self.policy.missing_header_penalty * missing as f64).clamp(0.0, 1.0);
        result.raw_excerpt = Some(super::tabular::excerpt(text));
        result
    }
}

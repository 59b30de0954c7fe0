//! Format detection stage.
//!
//! Ordered, short-circuiting structural checks: JSON parse first, then
//! email framing, then document signatures. JSON runs first so that a
//! header-looking block inside a JSON string value can never pre-empt a
//! successful full-document parse. Advisory only: no branch rejects the
//! input, the worst outcome is `Unknown` at confidence 0.0.

use crate::model::{Format, RawInput};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// A top-of-message header line: `Key: value` with an RFC-style key.
static HEADER_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9-]*:\s?\S.*$").expect("static regex"));

/// Filename extensions accepted as document evidence.
const DOCUMENT_EXTENSIONS: [&str; 4] = ["pdf", "doc", "docx", "txt"];

/// Format label plus the strength of the structural evidence behind it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FormatDetection {
    pub format: Format,
    pub confidence: f64,
}

/// Detects the input format from structural signals, in priority order.
pub fn detect_format(input: &RawInput) -> FormatDetection {
    if let Some(text) = input.as_text() {
        // 1. Well-formed top-level structured syntax.
        if parses_as_structure(text) {
            return FormatDetection {
                format: Format::Json,
                confidence: 1.0,
            };
        }

        // 2. Message framing: header block, blank line, body.
        if let Some(confidence) = email_evidence(text) {
            return FormatDetection {
                format: Format::Email,
                confidence,
            };
        }
    }

    // 3. Document signature or declared extension.
    if let Some(confidence) = document_evidence(input) {
        return FormatDetection {
            format: Format::Document,
            confidence,
        };
    }

    FormatDetection {
        format: Format::Unknown,
        confidence: 0.0,
    }
}

/// True when the text fully parses as a top-level object or array.
fn parses_as_structure(text: &str) -> bool {
    matches!(
        serde_json::from_str::<Value>(text),
        Ok(Value::Object(_)) | Ok(Value::Array(_))
    )
}

/// Email evidence tiers: 1.0 for full message framing (a clean `Key:
/// value` block followed by a blank line), 0.5 for bare `From:` /
/// `Subject:` markers without the framing.
fn email_evidence(text: &str) -> Option<f64> {
    let mut header_lines = 0usize;
    let mut framed = false;

    for line in text.lines() {
        if line.trim().is_empty() {
            framed = header_lines > 0;
            break;
        }
        if !HEADER_LINE.is_match(line) {
            // Not a clean header block; fall through to the weak tier.
            break;
        }
        header_lines += 1;
    }

    if framed {
        return Some(1.0);
    }

    let lower = text.to_ascii_lowercase();
    if lower.contains("from:") || lower.contains("subject:") {
        return Some(0.5);
    }

    None
}

/// Document evidence: magic bytes, declared extension, or MIME hint.
/// All signature-grade, so all scaled to 0.5.
fn document_evidence(input: &RawInput) -> Option<f64> {
    if input.as_bytes().starts_with(b"%PDF") {
        return Some(0.5);
    }

    if let Some(ext) = input.declared_extension() {
        if DOCUMENT_EXTENSIONS.contains(&ext.as_str()) {
            return Some(0.5);
        }
    }

    if let Some(mime) = input.mime_hint.as_deref() {
        if mime.eq_ignore_ascii_case("application/pdf") || mime.starts_with("text/") {
            return Some(0.5);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_object_full_confidence() {
        let input = RawInput::text(r#"{"customer_id": "C1", "order_total": 74.48}"#);
        let detection = detect_format(&input);
        assert_eq!(detection.format, Format::Json);
        assert_eq!(detection.confidence, 1.0);
    }

    #[test]
    fn test_json_array_full_confidence() {
        let input = RawInput::text(r#"[{"sku": "A"}, {"sku": "B"}]"#);
        assert_eq!(detect_format(&input).format, Format::Json);
    }

    #[test]
    fn test_json_scalar_is_not_structure() {
        // A bare string or number parses as JSON but is not a structure.
        assert_eq!(detect_format(&RawInput::text("42")).format, Format::Unknown);
        assert_eq!(
            detect_format(&RawInput::text("\"hello\"")).format,
            Format::Unknown
        );
    }

    #[test]
    fn test_email_framing_full_confidence() {
        let input = RawInput::text("From: a@x.com\nSubject: Order\n\nPlease confirm order #123");
        let detection = detect_format(&input);
        assert_eq!(detection.format, Format::Email);
        assert_eq!(detection.confidence, 1.0);
    }

    #[test]
    fn test_generic_header_block_counts_as_framing() {
        let input = RawInput::text("X-Ticket: 9912\nPriority: high\n\nescalation details");
        let detection = detect_format(&input);
        assert_eq!(detection.format, Format::Email);
        assert_eq!(detection.confidence, 1.0);
    }

    #[test]
    fn test_headers_without_blank_line_are_weak_evidence() {
        let input = RawInput::text("From: a@x.com\nSubject: hi");
        let detection = detect_format(&input);
        assert_eq!(detection.format, Format::Email);
        assert_eq!(detection.confidence, 0.5);
    }

    #[test]
    fn test_email_markers_without_framing_scaled() {
        let input = RawInput::text("Regarding the earlier note From: ops, please reply.");
        let detection = detect_format(&input);
        assert_eq!(detection.format, Format::Email);
        assert_eq!(detection.confidence, 0.5);
    }

    #[test]
    fn test_header_block_inside_json_string_stays_json() {
        let input = RawInput::text(r#"{"body": "From: a@x.com\nSubject: hi\n\nhello"}"#);
        let detection = detect_format(&input);
        assert_eq!(detection.format, Format::Json);
        assert_eq!(detection.confidence, 1.0);
    }

    #[test]
    fn test_pdf_magic_bytes() {
        let input = RawInput::binary(b"%PDF-1.7 rest-of-stream".to_vec());
        let detection = detect_format(&input);
        assert_eq!(detection.format, Format::Document);
        assert_eq!(detection.confidence, 0.5);
    }

    #[test]
    fn test_declared_extension_document() {
        let input = RawInput::binary(vec![0x01, 0x02, 0x03]).with_filename("contract.docx");
        assert_eq!(detect_format(&input).format, Format::Document);
    }

    #[test]
    fn test_unrecognized_blob_is_unknown() {
        let input = RawInput::binary(vec![0xde, 0xad, 0xbe, 0xef]);
        let detection = detect_format(&input);
        assert_eq!(detection.format, Format::Unknown);
        assert_eq!(detection.confidence, 0.0);
    }

    #[test]
    fn test_detection_is_deterministic() {
        let input = RawInput::text("From: a@x.com\n\nbody");
        let first = detect_format(&input);
        for _ in 0..10 {
            assert_eq!(detect_format(&input), first);
        }
    }
}

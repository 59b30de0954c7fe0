//! Core data model for the classification-and-routing pipeline.
//!
//! Every type that crosses a component boundary lives here:
//! - [`RawInput`]: the immutable upload as received from the caller
//! - [`ClassificationResult`]: format + intent + route, produced once per input
//! - [`ExtractionResult`]: normalized fields from exactly one extractor
//! - [`ConversationContext`] / [`ContextEntry`]: the append-only history
//! - [`ProcessedRecord`] / [`HistoryRecord`]: the boundary output shapes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ============================================================================
// Input
// ============================================================================

/// Content of an upload: decoded text or raw bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputBody {
    Text(String),
    Binary(Vec<u8>),
}

/// One upload as received from the caller. Immutable once constructed.
///
/// No format declaration is required; the classifier works from the body
/// itself, with `declared_filename` and `mime_hint` as secondary signals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawInput {
    pub body: InputBody,

    /// Filename supplied with the upload, if any (e.g., "report.pdf").
    pub declared_filename: Option<String>,

    /// MIME type hint supplied with the upload, if any.
    pub mime_hint: Option<String>,
}

impl RawInput {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            body: InputBody::Text(content.into()),
            declared_filename: None,
            mime_hint: None,
        }
    }

    pub fn binary(content: Vec<u8>) -> Self {
        Self {
            body: InputBody::Binary(content),
            declared_filename: None,
            mime_hint: None,
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.declared_filename = Some(filename.into());
        self
    }

    pub fn with_mime_hint(mut self, mime: impl Into<String>) -> Self {
        self.mime_hint = Some(mime.into());
        self
    }

    /// Returns the body as text when it is textual (or valid UTF-8 bytes).
    pub fn as_text(&self) -> Option<&str> {
        match &self.body {
            InputBody::Text(s) => Some(s),
            InputBody::Binary(b) => std::str::from_utf8(b).ok(),
        }
    }

    /// Returns the raw bytes of the body regardless of variant.
    pub fn as_bytes(&self) -> &[u8] {
        match &self.body {
            InputBody::Text(s) => s.as_bytes(),
            InputBody::Binary(b) => b,
        }
    }

    /// Lowercased extension of the declared filename, if one was supplied.
    pub fn declared_extension(&self) -> Option<String> {
        let name = self.declared_filename.as_deref()?;
        let (_, ext) = name.rsplit_once('.')?;
        if ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }
}

// ============================================================================
// Classification
// ============================================================================

/// Detected input format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Json,
    Email,
    Document,
    Unknown,
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Format::Json => "json",
            Format::Email => "email",
            Format::Document => "document",
            Format::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Tag identifying the extractor responsible for a route.
///
/// Route selection returns one of these tags; dispatch is a single lookup,
/// never a chain of type checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractorId {
    Tabular,
    Email,
    Document,
    Unsupported,
}

impl std::fmt::Display for ExtractorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ExtractorId::Tabular => "tabular",
            ExtractorId::Email => "email",
            ExtractorId::Document => "document",
            ExtractorId::Unsupported => "unsupported",
        };
        f.write_str(s)
    }
}

/// Outcome of the three classifier stages. Produced once per input and
/// never mutated afterwards.
///
/// `format_confidence` and `intent_confidence` are independent signals;
/// neither is ever blended into the other.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub format: Format,

    /// 1.0 for a fully successful structural parse, scaled down for
    /// signature/extension-only evidence, 0.0 for unknown.
    pub format_confidence: f64,

    /// Label of the winning intent rule (e.g., "invoice"), or the
    /// fallback label when nothing matched.
    pub intent: String,

    /// Winning cumulative weight normalized by the rule's total weight,
    /// clamped to [0, 1].
    pub intent_confidence: f64,

    /// Extractor selected for this format.
    pub route: ExtractorId,
}

// ============================================================================
// Extraction
// ============================================================================

/// Normalized output of exactly one extractor run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub extractor_id: ExtractorId,

    /// Extractor-specific fields, already normalized.
    pub fields: Map<String, Value>,

    /// Heuristic strength of the extraction in [0, 1]. Not a probability.
    pub confidence: f64,

    /// Per-field and per-capability degradations, in detection order.
    pub warnings: Vec<String>,

    /// Short excerpt of the decoded content, for audit trails.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_excerpt: Option<String>,
}

impl ExtractionResult {
    /// An empty result with zero confidence, used by degraded paths.
    pub fn empty(extractor_id: ExtractorId) -> Self {
        Self {
            extractor_id,
            fields: Map::new(),
            confidence: 0.0,
            warnings: Vec::new(),
            raw_excerpt: None,
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }
}

// ============================================================================
// Conversation context
// ============================================================================

/// One persisted (classification, extraction) pair within a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextEntry {
    pub entry_id: String,
    pub timestamp: DateTime<Utc>,
    pub classification: ClassificationResult,
    pub extraction: ExtractionResult,
}

/// Ordered history of one conversation. Owned exclusively by the context
/// store; grows monotonically — entries are never reordered or removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationContext {
    pub conversation_id: String,
    pub entries: Vec<ContextEntry>,
}

impl ConversationContext {
    /// Most recent entry, by arrival order.
    pub fn latest(&self) -> Option<&ContextEntry> {
        self.entries.last()
    }
}

// ============================================================================
// Boundary output
// ============================================================================

/// Combined per-input record returned to the caller.
///
/// `confidence_score` is the extraction confidence; the classification
/// confidences travel separately and are never blended into it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedRecord {
    pub format: Format,
    pub intent: String,
    pub extracted_data: Map<String, Value>,
    pub confidence_score: f64,
    pub conversation_id: String,
    pub warnings: Vec<String>,
}

/// Simplified history view: one line per entry, raw excerpts omitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub entry_id: String,
    pub timestamp: DateTime<Utc>,
    pub format: Format,
    pub intent: String,
    pub fields: Map<String, Value>,
    pub confidence_score: f64,
}

impl From<&ContextEntry> for HistoryRecord {
    fn from(entry: &ContextEntry) -> Self {
        Self {
            entry_id: entry.entry_id.clone(),
            timestamp: entry.timestamp,
            format: entry.classification.format,
            intent: entry.classification.intent.clone(),
            fields: entry.extraction.fields.clone(),
            confidence_score: entry.extraction.confidence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Format::Json).unwrap(), "\"json\"");
        assert_eq!(
            serde_json::to_string(&Format::Unknown).unwrap(),
            "\"unknown\""
        );
    }

    #[test]
    fn test_declared_extension() {
        let input = RawInput::binary(vec![0u8; 4]).with_filename("scan.PDF");
        assert_eq!(input.declared_extension().as_deref(), Some("pdf"));

        let no_ext = RawInput::text("hello").with_filename("README");
        assert_eq!(no_ext.declared_extension(), None);
    }

    #[test]
    fn test_as_text_decodes_utf8_bytes() {
        let input = RawInput::binary(b"plain bytes".to_vec());
        assert_eq!(input.as_text(), Some("plain bytes"));

        let binary = RawInput::binary(vec![0xff, 0xfe, 0x00]);
        assert_eq!(binary.as_text(), None);
    }

    #[test]
    fn test_extraction_result_roundtrip() {
        let mut result = ExtractionResult::empty(ExtractorId::Tabular);
        result
            .fields
            .insert("customer_id".into(), Value::String("C1".into()));
        let result = result.with_warning("Missing required field: shipping_zip");

        let json = serde_json::to_string(&result).unwrap();
        let back: ExtractionResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back.extractor_id, ExtractorId::Tabular);
        assert_eq!(back.warnings.len(), 1);
        // raw_excerpt is None and must be omitted entirely
        assert!(!json.contains("raw_excerpt"));
    }
}

//! Extraction contract and collaborator capability traits.
//!
//! [`Extractor`] is the single polymorphic capability every specialized
//! extractor implements; the orchestrator dispatches on the route tag and
//! never branches on concrete extractor types.

use crate::model::{ClassificationResult, ExtractionResult, ExtractorId, RawInput};
use async_trait::async_trait;
use thiserror::Error;

/// Failure of a collaborator capability (e.g., document text decoding).
///
/// These never abort a request: the owning extractor degrades the affected
/// field group to a warning with zero confidence.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Failed to decode content: {0}")]
    InvalidContent(String),
    #[error("Capability unavailable: {0}")]
    CapabilityUnavailable(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Uniform extraction contract.
///
/// Implementations are pure with respect to external state: they read the
/// input and its classification, return a result, and never touch the
/// context store. All degradations are reported as warnings on the result
/// rather than errors, so `extract` itself is infallible.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Returns the route tag this extractor serves.
    fn extractor_id(&self) -> ExtractorId;

    /// Extracts normalized fields from an already-classified input.
    async fn extract(
        &self,
        input: &RawInput,
        classification: &ClassificationResult,
    ) -> ExtractionResult;
}

/// Collaborator capability: raw text extraction from document bytes.
///
/// Real decoders (PDF, office formats) live outside this core and are
/// injected behind this trait; the document extractor only consumes the
/// decoded text.
#[async_trait]
pub trait DocumentTextSource: Send + Sync {
    async fn extract_text(&self, bytes: &[u8]) -> Result<String, ExtractError>;
}

/// Passthrough text source for documents that are already plain text.
///
/// Rejects non-UTF-8 bytes, which is exactly the degraded path the
/// document extractor must handle for undecodable binary input.
#[derive(Debug, Default)]
pub struct PlainTextSource;

#[async_trait]
impl DocumentTextSource for PlainTextSource {
    async fn extract_text(&self, bytes: &[u8]) -> Result<String, ExtractError> {
        String::from_utf8(bytes.to_vec())
            .map_err(|_| ExtractError::InvalidContent("document bytes are not UTF-8 text".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_plain_text_source_passthrough() {
        let source = PlainTextSource;
        let text = source.extract_text(b"Invoice #42").await.unwrap();
        assert_eq!(text, "Invoice #42");
    }

    #[tokio::test]
    async fn test_plain_text_source_rejects_binary() {
        let source = PlainTextSource;
        let err = source.extract_text(&[0xff, 0xfe, 0x00]).await.unwrap_err();
        assert!(matches!(err, ExtractError::InvalidContent(_)));
    }
}

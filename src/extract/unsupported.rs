//! No-op route for inputs no extractor accepts.
//!
//! Unrecognized format is not fatal: the result is empty fields, zero
//! confidence, and a warning naming the reason — never an error surfaced
//! to the caller.

use crate::model::{ClassificationResult, ExtractionResult, ExtractorId, RawInput};
use crate::traits::Extractor;
use async_trait::async_trait;

#[derive(Debug, Default, Clone)]
pub struct UnsupportedExtractor;

#[async_trait]
impl Extractor for UnsupportedExtractor {
    fn extractor_id(&self) -> ExtractorId {
        ExtractorId::Unsupported
    }

    async fn extract(
        &self,
        _input: &RawInput,
        classification: &ClassificationResult,
    ) -> ExtractionResult {
        ExtractionResult::empty(ExtractorId::Unsupported).with_warning(format!(
            "No extractor route matches format '{}'",
            classification.format
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Format;

    #[tokio::test]
    async fn test_unsupported_yields_warning_not_error() {
        let classification = ClassificationResult {
            format: Format::Unknown,
            format_confidence: 0.0,
            intent: "general".to_string(),
            intent_confidence: 0.0,
            route: ExtractorId::Unsupported,
        };
        let input = RawInput::binary(vec![0xde, 0xad]);
        let result = UnsupportedExtractor
            .extract(&input, &classification)
            .await;

        assert!(result.fields.is_empty());
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("unknown"));
    }
}

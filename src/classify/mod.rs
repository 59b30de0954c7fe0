//! Multi-stage classifier: format detection → intent analysis → route
//! selection.
//!
//! Each stage is advisory — it produces a label plus a confidence and
//! never rejects the input — so classification as a whole is infallible.

pub mod format;
pub mod intent;

use crate::config::PipelineConfig;
use crate::model::{ClassificationResult, ConversationContext, ExtractorId, Format, RawInput};
use tracing::debug;

pub use format::{detect_format, FormatDetection};
pub use intent::{analyze_intent, IntentAnalysis, IntentPattern, IntentRule};

/// Total mapping from detected format to the extractor that serves it.
/// Co-designed with the extractor set: every format has a route, UNKNOWN
/// falls back to the no-op unsupported route.
pub fn route_for(format: Format) -> ExtractorId {
    match format {
        Format::Json => ExtractorId::Tabular,
        Format::Email => ExtractorId::Email,
        Format::Document => ExtractorId::Document,
        Format::Unknown => ExtractorId::Unsupported,
    }
}

/// Deterministic format/intent classifier.
///
/// Stateless apart from its configuration; identical bytes always yield an
/// identical [`ClassificationResult`].
#[derive(Debug, Clone)]
pub struct Classifier {
    intent_rules: Vec<IntentRule>,
    fallback_intent: String,
    context_prior_bonus: f64,
}

impl Classifier {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            intent_rules: config.intent_rules.clone(),
            fallback_intent: config.fallback_intent.clone(),
            context_prior_bonus: config.context_prior_bonus,
        }
    }

    /// Runs the three stages over one input.
    ///
    /// When `context` is supplied, the most recent entry's intent acts as a
    /// weak prior during intent analysis.
    pub fn classify(
        &self,
        input: &RawInput,
        context: Option<&ConversationContext>,
    ) -> ClassificationResult {
        let detection = detect_format(input);

        let prior = context
            .and_then(|ctx| ctx.latest())
            .map(|entry| entry.classification.intent.as_str())
            .map(|label| (label, self.context_prior_bonus));

        let text = input.as_text().unwrap_or("");
        let analysis = analyze_intent(text, &self.intent_rules, &self.fallback_intent, prior);

        let route = route_for(detection.format);
        debug!(
            format = %detection.format,
            format_confidence = detection.confidence,
            intent = %analysis.intent,
            intent_confidence = analysis.confidence,
            route = %route,
            "classified input"
        );

        ClassificationResult {
            format: detection.format,
            format_confidence: detection.confidence,
            intent: analysis.intent,
            intent_confidence: analysis.confidence,
            route,
        }
    }
}

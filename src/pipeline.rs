//! Intake pipeline: the thin orchestration layer at the boundary of the
//! core.
//!
//! One call to [`IntakePipeline::process`] runs the full data flow:
//! classify → dispatch to the routed extractor → append to the context
//! store → return the combined record. The pipeline is `Send + Sync` and
//! can be shared across tasks; independent inputs process fully in
//! parallel, the context store being the only synchronized resource.

use crate::classify::Classifier;
use crate::config::PipelineConfig;
use crate::context::{ContextError, ContextStore};
use crate::extract::ExtractorSet;
use crate::model::{HistoryRecord, ProcessedRecord, RawInput};
use crate::traits::{DocumentTextSource, PlainTextSource};
use std::sync::Arc;
use tracing::{info, instrument};

pub struct IntakePipeline {
    classifier: Classifier,
    extractors: ExtractorSet,
    store: Arc<ContextStore>,
}

impl IntakePipeline {
    /// Builds a pipeline with the default configuration and the plain-text
    /// document source.
    pub fn new(store: Arc<ContextStore>) -> Self {
        Self::with_config(PipelineConfig::default(), Arc::new(PlainTextSource), store)
    }

    pub fn with_config(
        config: PipelineConfig,
        text_source: Arc<dyn DocumentTextSource>,
        store: Arc<ContextStore>,
    ) -> Self {
        Self {
            classifier: Classifier::new(&config),
            extractors: ExtractorSet::new(&config, text_source),
            store,
        }
    }

    pub fn store(&self) -> &Arc<ContextStore> {
        &self.store
    }

    /// Processes one input end to end.
    ///
    /// A missing conversation id is generated, so every record returns one.
    /// Prior history for the conversation, when any exists, enriches intent
    /// analysis; the result is always appended back to the store before it
    /// is returned. Never fails: degraded inputs come back as low-confidence
    /// records with warnings.
    #[instrument(skip(self, input), fields(filename = input.declared_filename.as_deref()))]
    pub async fn process(
        &self,
        input: RawInput,
        conversation_id: Option<String>,
    ) -> ProcessedRecord {
        let conversation_id =
            conversation_id.unwrap_or_else(ContextStore::generate_conversation_id);

        // Unknown id on the first turn of a conversation is the normal
        // case, not an error.
        let context = self.store.get(&conversation_id).ok();

        let classification = self.classifier.classify(&input, context.as_ref());
        info!(
            conversation_id,
            format = %classification.format,
            intent = %classification.intent,
            route = %classification.route,
            "input classified"
        );

        let extractor = self.extractors.get(classification.route);
        let extraction = extractor.extract(&input, &classification).await;
        info!(
            conversation_id,
            extractor = %extraction.extractor_id,
            confidence = extraction.confidence,
            warnings = extraction.warnings.len(),
            "extraction complete"
        );

        let record = ProcessedRecord {
            format: classification.format,
            intent: classification.intent.clone(),
            extracted_data: extraction.fields.clone(),
            confidence_score: extraction.confidence,
            conversation_id: conversation_id.clone(),
            warnings: extraction.warnings.clone(),
        };

        self.store.append(&conversation_id, classification, extraction);
        record
    }

    /// Simplified history view for one conversation, in arrival order.
    pub fn history(&self, conversation_id: &str) -> Result<Vec<HistoryRecord>, ContextError> {
        let context = self.store.get(conversation_id)?;
        Ok(context.entries.iter().map(HistoryRecord::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{FieldKind, FieldTemplate, TemplateField};
    use crate::model::Format;

    fn pipeline() -> IntakePipeline {
        IntakePipeline::new(Arc::new(ContextStore::new()))
    }

    fn pipeline_with_template(template: FieldTemplate) -> IntakePipeline {
        let config = PipelineConfig {
            tabular_template: template,
            ..PipelineConfig::default()
        };
        IntakePipeline::with_config(config, Arc::new(PlainTextSource), Arc::new(ContextStore::new()))
    }

    #[tokio::test]
    async fn test_structured_order_scenario() {
        let pipeline = pipeline_with_template(FieldTemplate {
            fields: vec![
                TemplateField::new("customer_id", FieldKind::String),
                TemplateField::new("order_total", FieldKind::Number),
                TemplateField::new("shipping_zip", FieldKind::String),
            ],
        });

        let input = RawInput::text(r#"{"customer_id":"C1","order_total":74.48}"#);
        let record = pipeline.process(input, None).await;

        assert_eq!(record.format, Format::Json);
        assert_eq!(record.extracted_data.get("customer_id").unwrap(), "C1");
        assert_eq!(
            record
                .extracted_data
                .get("order_total")
                .unwrap()
                .as_f64()
                .unwrap(),
            74.48
        );
        assert_eq!(record.warnings.len(), 1);
        assert!(record.warnings[0].contains("shipping_zip"));
        assert!((record.confidence_score - 2.0 / 3.0).abs() < 1e-9);
        assert!(!record.conversation_id.is_empty());
    }

    #[tokio::test]
    async fn test_email_scenario_end_to_end() {
        let pipeline = pipeline();
        let input = RawInput::text("From: a@x.com\nSubject: Order\n\nPlease confirm order #123");
        let record = pipeline.process(input, Some("conv-1".to_string())).await;

        assert_eq!(record.format, Format::Email);
        let headers = record
            .extracted_data
            .get("headers")
            .unwrap()
            .as_object()
            .unwrap();
        assert_eq!(headers.get("From").unwrap(), "a@x.com");
        assert_eq!(headers.get("Subject").unwrap(), "Order");

        let latest = pipeline.store().get_latest("conv-1").unwrap();
        assert_eq!(latest.classification.format, Format::Email);
    }

    #[tokio::test]
    async fn test_unknown_blob_never_errors() {
        let pipeline = pipeline();
        let input = RawInput::binary(vec![0x00, 0xff, 0x13, 0x37]);
        let record = pipeline.process(input, None).await;

        assert_eq!(record.format, Format::Unknown);
        assert_eq!(record.confidence_score, 0.0);
        assert!(record.extracted_data.is_empty());
        assert_eq!(record.warnings.len(), 1);
    }

    #[tokio::test]
    async fn test_multi_turn_conversation_accumulates() {
        let pipeline = pipeline();
        let conv = "conv-multi".to_string();

        pipeline
            .process(
                RawInput::text("From: a@x.com\nSubject: complaint\n\nthis is a complaint"),
                Some(conv.clone()),
            )
            .await;
        pipeline
            .process(
                RawInput::text(r#"{"customer_id": "C1", "note": "payment issue"}"#),
                Some(conv.clone()),
            )
            .await;

        let history = pipeline.history(&conv).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].format, Format::Email);
        assert_eq!(history[0].intent, "complaint");
        assert_eq!(history[1].format, Format::Json);
        // Second turn: "payment" (invoice 1.0) vs "issue" (complaint 1.0)
        // resolves to complaint through the conversation prior.
        assert_eq!(history[1].intent, "complaint");
    }

    #[tokio::test]
    async fn test_history_of_unknown_conversation() {
        let pipeline = pipeline();
        assert!(matches!(
            pipeline.history("never-seen"),
            Err(ContextError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_generated_conversation_ids_are_distinct() {
        let pipeline = pipeline();
        let first = pipeline.process(RawInput::text("{\"a\": 1}"), None).await;
        let second = pipeline.process(RawInput::text("{\"a\": 2}"), None).await;
        assert_ne!(first.conversation_id, second.conversation_id);

        // Each generated conversation holds exactly its own entry.
        assert_eq!(pipeline.history(&first.conversation_id).unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_independent_inputs_process_in_parallel() {
        let pipeline = Arc::new(pipeline());
        let mut handles = Vec::new();
        for index in 0..32 {
            let pipeline = Arc::clone(&pipeline);
            handles.push(tokio::spawn(async move {
                pipeline
                    .process(
                        RawInput::text(format!(r#"{{"order_id": "{index}"}}"#)),
                        Some(format!("conv-{}", index % 4)),
                    )
                    .await
            }));
        }
        for handle in handles {
            let record = handle.await.unwrap();
            assert_eq!(record.format, Format::Json);
        }
        for shard in 0..4 {
            assert_eq!(pipeline.history(&format!("conv-{shard}")).unwrap().len(), 8);
        }
    }
}

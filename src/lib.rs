pub mod classify;
pub mod config;
pub mod context;
pub mod extract;
pub mod model;
pub mod pipeline;
pub mod traits;

// Re-export common types for convenience
pub use classify::{Classifier, IntentPattern, IntentRule};
pub use config::{EmailPolicy, PipelineConfig};
pub use context::{ContextError, ContextStore, EntryId};
pub use extract::{
    DocumentExtractor, EmailExtractor, ExtractorSet, FieldKind, FieldTemplate, TabularExtractor,
    TemplateField, UnsupportedExtractor,
};
pub use model::{
    ClassificationResult, ContextEntry, ConversationContext, ExtractionResult, ExtractorId, Format,
    HistoryRecord, InputBody, ProcessedRecord, RawInput,
};
pub use pipeline::IntakePipeline;
pub use traits::{DocumentTextSource, ExtractError, Extractor, PlainTextSource};

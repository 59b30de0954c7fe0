//! Format extractors and the route dispatch table.
//!
//! All extractors implement the single [`Extractor`](crate::traits::Extractor)
//! contract; [`ExtractorSet`] maps a route tag to its extractor in one
//! lookup, so the orchestrator never branches on concrete types.

pub mod document;
pub mod email;
pub mod tabular;
pub mod unsupported;

use crate::config::PipelineConfig;
use crate::model::ExtractorId;
use crate::traits::{DocumentTextSource, Extractor};
use std::sync::Arc;

pub use document::DocumentExtractor;
pub use email::EmailExtractor;
pub use tabular::{FieldKind, FieldTemplate, TabularExtractor, TemplateField};
pub use unsupported::UnsupportedExtractor;

/// The fixed extractor set, one per route tag.
pub struct ExtractorSet {
    tabular: TabularExtractor,
    email: EmailExtractor,
    document: DocumentExtractor,
    unsupported: UnsupportedExtractor,
}

impl ExtractorSet {
    pub fn new(config: &PipelineConfig, text_source: Arc<dyn DocumentTextSource>) -> Self {
        Self {
            tabular: TabularExtractor::new(config.tabular_template.clone()),
            email: EmailExtractor::new(config.email.clone()),
            document: DocumentExtractor::new(text_source),
            unsupported: UnsupportedExtractor,
        }
    }

    /// Single-lookup dispatch from route tag to extractor.
    pub fn get(&self, route: ExtractorId) -> &dyn Extractor {
        match route {
            ExtractorId::Tabular => &self.tabular,
            ExtractorId::Email => &self.email,
            ExtractorId::Document => &self.document,
            ExtractorId::Unsupported => &self.unsupported,
        }
    }
}

//! Pipeline configuration.
//!
//! [`PipelineConfig`] bundles every tunable of the core: the ordered intent
//! rule table, the tabular field template, the email header policy, and the
//! conversation-continuity prior. Defaults carry the built-in rule set; all
//! parts are serde-deserializable so callers can load them from JSON.

use crate::classify::intent::{IntentPattern, IntentRule};
use crate::extract::tabular::{FieldKind, FieldTemplate, TemplateField};
use serde::{Deserialize, Serialize};

/// Policy for scoring message/email extractions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailPolicy {
    /// Headers the extractor expects to find, canonical capitalization.
    pub expected_headers: Vec<String>,

    /// Confidence penalty per missing expected header.
    pub missing_header_penalty: f64,
}

impl Default for EmailPolicy {
    fn default() -> Self {
        Self {
            expected_headers: vec![
                "From".to_string(),
                "To".to_string(),
                "Subject".to_string(),
                "Date".to_string(),
            ],
            missing_header_penalty: 0.2,
        }
    }
}

/// Full configuration of the classification-and-routing core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Ordered intent rules. Registration order is the tie-break: when two
    /// labels accumulate equal weight, the earlier rule wins. Must stay a
    /// list, never a map, to keep that reproducible.
    pub intent_rules: Vec<IntentRule>,

    /// Label reported when no rule scores above zero.
    pub fallback_intent: String,

    /// Additive weight bonus granted to the most recent conversation
    /// entry's intent, implementing continuity across related uploads.
    pub context_prior_bonus: f64,

    /// Field template the tabular extractor validates against.
    pub tabular_template: FieldTemplate,

    /// Header expectations for the email extractor.
    pub email: EmailPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            intent_rules: default_intent_rules(),
            fallback_intent: "general".to_string(),
            context_prior_bonus: 0.5,
            tabular_template: default_tabular_template(),
            email: EmailPolicy::default(),
        }
    }
}

/// Built-in intent rule table. Order matters: it is the tie-break.
fn default_intent_rules() -> Vec<IntentRule> {
    vec![
        IntentRule {
            label: "invoice".to_string(),
            patterns: vec![
                IntentPattern::new("invoice", 2.0),
                IntentPattern::new("bill", 1.0),
                IntentPattern::new("payment", 1.0),
                IntentPattern::new("receipt", 1.0),
            ],
        },
        IntentRule {
            label: "rfq".to_string(),
            patterns: vec![
                IntentPattern::new("rfq", 2.0),
                IntentPattern::new("quotation", 1.5),
                IntentPattern::new("quote", 1.5),
                IntentPattern::new("pricing", 1.0),
                IntentPattern::new("proposal", 1.0),
            ],
        },
        IntentRule {
            label: "complaint".to_string(),
            patterns: vec![
                IntentPattern::new("complaint", 2.0),
                IntentPattern::new("dissatisfied", 1.5),
                IntentPattern::new("unhappy", 1.5),
                IntentPattern::new("issue", 1.0),
                IntentPattern::new("problem", 1.0),
            ],
        },
        IntentRule {
            label: "regulation".to_string(),
            patterns: vec![
                IntentPattern::new("regulation", 2.0),
                IntentPattern::new("compliance", 1.5),
                IntentPattern::new("legal", 1.0),
                IntentPattern::new("policy", 1.0),
                IntentPattern::new("requirement", 1.0),
            ],
        },
    ]
}

/// Built-in order-schema template, with the alias keys the upstream
/// systems are known to send.
fn default_tabular_template() -> FieldTemplate {
    FieldTemplate {
        fields: vec![
            TemplateField::new("order_id", FieldKind::String).with_aliases(["id", "order_number"]),
            TemplateField::new("customer", FieldKind::String)
                .with_aliases(["customer_name", "name"]),
            TemplateField::new("items", FieldKind::Items).with_aliases([
                "products",
                "line_items",
                "order_items",
            ]),
            TemplateField::new("total_amount", FieldKind::Number).with_aliases(["amount", "total"]),
            TemplateField::new("currency", FieldKind::Currency).with_aliases(["currency_code"]),
            TemplateField::new("delivery_date", FieldKind::Date).with_aliases(["date"]),
        ],
    }
}

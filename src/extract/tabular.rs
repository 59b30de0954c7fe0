//! Tabular-data extractor: validates parsed structured input against a
//! configurable field template.
//!
//! Compatible values are extracted verbatim, numeric strings are coerced,
//! and every missing or incompatible template field becomes a warning —
//! never a failure. Kind-specific normalization runs after coercion:
//! currency codes are validated against the known set, dates are
//! normalized to ISO `YYYY-MM-DD`, and line-item lists are mapped to
//! `{sku, qty}` entries. Confidence is the fraction of required fields
//! that were populated.

use crate::model::{ClassificationResult, ExtractionResult, ExtractorId, RawInput};
use crate::traits::Extractor;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// Characters stripped before numeric coercion (currency symbols, commas,
/// stray whitespace).
static NON_NUMERIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\d.\-]").expect("static regex"));

const VALID_CURRENCIES: [&str; 6] = ["USD", "EUR", "GBP", "JPY", "CAD", "AUD"];

/// Date layouts accepted for normalization, tried in order.
const DATE_FORMATS: [&str; 8] = [
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%m-%d-%Y",
    "%d-%m-%Y",
    "%B %d, %Y",
    "%b %d, %Y",
];

/// Alias keys upstream systems use for line-item SKUs and quantities.
const SKU_KEYS: [&str; 3] = ["sku", "id", "product_id"];
const QTY_KEYS: [&str; 3] = ["qty", "quantity", "amount"];

/// Expected value kind for a template field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    String,
    Number,
    /// Nested object or array, kept verbatim.
    Object,
    /// Uppercased currency code, validated against the known set.
    Currency,
    /// Date normalized to ISO `YYYY-MM-DD` where a layout is recognized.
    Date,
    /// Line-item list normalized to `{sku, qty}` entries.
    Items,
}

/// One required field: canonical name, expected kind, and the alias keys
/// upstream systems are known to use for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateField {
    pub name: String,
    pub kind: FieldKind,
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl TemplateField {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            aliases: Vec::new(),
        }
    }

    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases = aliases.into_iter().map(Into::into).collect();
        self
    }
}

/// The set of required fields the extractor validates against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldTemplate {
    pub fields: Vec<TemplateField>,
}

/// Extractor for well-formed structured (JSON) input.
#[derive(Debug, Clone)]
pub struct TabularExtractor {
    template: FieldTemplate,
}

impl TabularExtractor {
    pub fn new(template: FieldTemplate) -> Self {
        Self { template }
    }

    /// Looks up a template field by canonical name, then by its aliases.
    fn lookup<'a>(&self, object: &'a Map<String, Value>, field: &TemplateField) -> Option<&'a Value> {
        if let Some(value) = object.get(&field.name) {
            return Some(value);
        }
        field.aliases.iter().find_map(|alias| object.get(alias))
    }

    /// Coerces `value` to the expected kind, or explains why it cannot be.
    /// A successful coercion may still carry warnings (unknown currency,
    /// incomplete line items) without losing the value.
    fn coerce(field: &TemplateField, value: &Value) -> Result<(Value, Vec<String>), String> {
        match field.kind {
            FieldKind::String => match value {
                Value::String(s) => Ok((Value::String(s.clone()), Vec::new())),
                Value::Number(n) => Ok((Value::String(n.to_string()), Vec::new())),
                Value::Bool(b) => Ok((Value::String(b.to_string()), Vec::new())),
                other => Err(format!(
                    "Incompatible value for field '{}': expected string, got {}",
                    field.name,
                    kind_name(other)
                )),
            },
            FieldKind::Number => match value {
                Value::Number(n) => Ok((Value::Number(n.clone()), Vec::new())),
                Value::String(s) => coerce_numeric_string(s)
                    .map(|v| (v, Vec::new()))
                    .ok_or_else(|| {
                        format!("Invalid numeric value for field '{}': {:?}", field.name, s)
                    }),
                other => Err(format!(
                    "Incompatible value for field '{}': expected number, got {}",
                    field.name,
                    kind_name(other)
                )),
            },
            FieldKind::Object => match value {
                Value::Object(_) | Value::Array(_) => Ok((value.clone(), Vec::new())),
                other => Err(format!(
                    "Incompatible value for field '{}': expected object, got {}",
                    field.name,
                    kind_name(other)
                )),
            },
            FieldKind::Currency => match value {
                Value::String(s) => {
                    let code = s.trim().to_uppercase();
                    let mut warnings = Vec::new();
                    if !VALID_CURRENCIES.contains(&code.as_str()) {
                        warnings.push(format!("Unknown currency: {code}"));
                    }
                    Ok((Value::String(code), warnings))
                }
                other => Err(format!(
                    "Incompatible value for field '{}': expected string, got {}",
                    field.name,
                    kind_name(other)
                )),
            },
            FieldKind::Date => match value {
                Value::String(s) => Ok((Value::String(normalize_date(s)), Vec::new())),
                Value::Number(n) => {
                    // Numbers are treated as Unix timestamps.
                    let normalized = n
                        .as_i64()
                        .and_then(|secs| DateTime::from_timestamp(secs, 0))
                        .map(|ts| ts.date_naive().format("%Y-%m-%d").to_string())
                        .unwrap_or_else(|| n.to_string());
                    Ok((Value::String(normalized), Vec::new()))
                }
                other => Err(format!(
                    "Incompatible value for field '{}': expected date, got {}",
                    field.name,
                    kind_name(other)
                )),
            },
            FieldKind::Items => match value {
                Value::Array(items) => {
                    let (normalized, warnings) = normalize_items(items);
                    Ok((Value::Array(normalized), warnings))
                }
                other => Err(format!(
                    "Incompatible value for field '{}': expected array, got {}",
                    field.name,
                    kind_name(other)
                )),
            },
        }
    }

    fn extract_object(&self, object: &Map<String, Value>) -> ExtractionResult {
        let mut result = ExtractionResult::empty(ExtractorId::Tabular);
        let mut populated = 0usize;

        for field in &self.template.fields {
            match self.lookup(object, field) {
                Some(value) => match Self::coerce(field, value) {
                    Ok((coerced, warnings)) => {
                        result.fields.insert(field.name.clone(), coerced);
                        result.warnings.extend(warnings);
                        populated += 1;
                    }
                    Err(warning) => result.warnings.push(warning),
                },
                None => result
                    .warnings
                    .push(format!("Missing required field: {}", field.name)),
            }
        }

        let required = self.template.fields.len();
        result.confidence = if required > 0 {
            populated as f64 / required as f64
        } else {
            0.0
        };
        result
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Strips currency symbols and separators, then parses as f64.
/// Integral values are kept integral so round numbers survive untouched.
fn coerce_numeric_string(s: &str) -> Option<Value> {
    let cleaned = NON_NUMERIC.replace_all(s, "");
    if cleaned.is_empty() {
        return None;
    }
    if let Ok(i) = cleaned.parse::<i64>() {
        return Some(Value::Number(i.into()));
    }
    let f = cleaned.parse::<f64>().ok()?;
    Number::from_f64(f).map(Value::Number)
}

/// Rewrites a date string to ISO `YYYY-MM-DD`. Strings that match none of
/// the known layouts pass through verbatim.
fn normalize_date(s: &str) -> String {
    let trimmed = s.trim();
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return date.format("%Y-%m-%d").to_string();
        }
    }
    trimmed.to_string()
}

/// Maps each line item to a `{sku, qty}` object. Items missing either key
/// are kept with a placeholder and reported as warnings.
fn normalize_items(items: &[Value]) -> (Vec<Value>, Vec<String>) {
    let mut normalized = Vec::with_capacity(items.len());
    let mut warnings = Vec::new();

    for item in items {
        let mut entry = Map::new();
        match item.as_object() {
            Some(object) => {
                match SKU_KEYS.iter().find_map(|key| object.get(*key)) {
                    Some(Value::String(s)) => {
                        entry.insert("sku".to_string(), Value::String(s.clone()));
                    }
                    Some(Value::Number(n)) => {
                        entry.insert("sku".to_string(), Value::String(n.to_string()));
                    }
                    _ => {
                        warnings.push(format!("Missing SKU in item: {item}"));
                        entry.insert("sku".to_string(), Value::Null);
                    }
                }
                match QTY_KEYS.iter().find_map(|key| object.get(*key)) {
                    Some(value) => match item_quantity(value) {
                        Some(qty) => {
                            entry.insert("qty".to_string(), Value::Number(qty.into()));
                        }
                        None => {
                            warnings.push(format!("Invalid quantity in item: {item}"));
                            entry.insert("qty".to_string(), Value::Number(0.into()));
                        }
                    },
                    None => {
                        warnings.push(format!("Missing quantity in item: {item}"));
                        entry.insert("qty".to_string(), Value::Number(0.into()));
                    }
                }
            }
            None => {
                warnings.push(format!("Missing SKU in item: {item}"));
                entry.insert("sku".to_string(), Value::Null);
                entry.insert("qty".to_string(), Value::Number(0.into()));
            }
        }
        normalized.push(Value::Object(entry));
    }

    (normalized, warnings)
}

fn item_quantity(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

#[async_trait]
impl Extractor for TabularExtractor {
    fn extractor_id(&self) -> ExtractorId {
        ExtractorId::Tabular
    }

    async fn extract(
        &self,
        input: &RawInput,
        _classification: &ClassificationResult,
    ) -> ExtractionResult {
        let text = match input.as_text() {
            Some(t) => t,
            None => {
                return ExtractionResult::empty(ExtractorId::Tabular)
                    .with_warning("Input is not decodable text")
            }
        };

        let mut result = match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(object)) => self.extract_object(&object),
            Ok(Value::Array(rows)) => {
                // Best effort for a top-level array: keep the rows, but the
                // template fields are all unmet.
                let mut result = ExtractionResult::empty(ExtractorId::Tabular)
                    .with_warning("Top-level value is an array, not an object; stored as rows");
                result.fields.insert("rows".to_string(), Value::Array(rows));
                result
            }
            Ok(other) => ExtractionResult::empty(ExtractorId::Tabular).with_warning(format!(
                "Top-level value is a {}, not an object",
                kind_name(&other)
            )),
            Err(err) => ExtractionResult::empty(ExtractorId::Tabular)
                .with_warning(format!("Structured parse failed: {err}")),
        };

        result.raw_excerpt = Some(excerpt(text));
        result
    }
}

/// First 300 characters of the decoded content, on a char boundary.
pub(crate) fn excerpt(text: &str) -> String {
    if text.chars().count() <= 300 {
        text.to_string()
    } else {
        let cut: String = text.chars().take(300).collect();
        format!("{cut}...")
    }
}

//! Core domain types for margin enrichment.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Item
// ---------------------------------------------------------------------------

/// One purchase line item from an event payload.
///
/// Only the attributes the enricher reads or writes are typed; everything
/// else in the payload object is kept in [`Item::extra`] and written back
/// untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Product identifier used as the document key. Numeric ids in the
    /// payload are normalized to their decimal string form.
    #[serde(
        default,
        deserialize_with = "deserialize_item_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub item_id: Option<String>,

    /// Units purchased. Treated as `1` when absent.
    #[serde(
        default,
        deserialize_with = "deserialize_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub quantity: Option<f64>,

    /// Per-unit discount. Treated as `0` when absent.
    #[serde(
        default,
        deserialize_with = "deserialize_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub discount: Option<f64>,

    /// Computed margin, absent until enrichment succeeds.
    #[serde(
        default,
        deserialize_with = "deserialize_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub margin: Option<f64>,

    /// All other payload attributes.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl Item {
    /// Create an item with the given identifier and no other attributes.
    pub fn with_id(item_id: impl Into<String>) -> Self {
        Self {
            item_id: Some(item_id.into()),
            ..Default::default()
        }
    }

    /// Set the quantity.
    pub fn quantity(mut self, quantity: f64) -> Self {
        self.quantity = Some(quantity);
        self
    }

    /// Set the discount.
    pub fn discount(mut self, discount: f64) -> Self {
        self.discount = Some(discount);
        self
    }

    /// The identifier usable as a lookup key, if any.
    ///
    /// Absent, empty and whitespace-only identifiers all count as missing.
    /// Any other identifier is returned verbatim, padding included.
    pub fn lookup_id(&self) -> Option<&str> {
        self.item_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
    }
}

fn deserialize_item_id<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(numeric_id(&n))),
        Some(other) => Err(serde::de::Error::custom(format!(
            "item_id must be a string or number, got {other}"
        ))),
    }
}

/// Render a numeric id the way it would print as a plain number: `1.0` and
/// `1` both become `"1"`, `2.5` stays `"2.5"`.
fn numeric_id(n: &serde_json::Number) -> String {
    if n.is_f64() {
        if let Some(f) = n.as_f64() {
            return f.to_string();
        }
    }
    n.to_string()
}

fn deserialize_number<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("expected a number, got {s:?}"))),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected a number, got {other}"
        ))),
    }
}

// ---------------------------------------------------------------------------
// ReferenceDocument
// ---------------------------------------------------------------------------

/// A reference record read from the document store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferenceDocument {
    /// Field name to plain JSON value.
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
}

impl ReferenceDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field insertion.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

// ---------------------------------------------------------------------------
// ValueCalculation
// ---------------------------------------------------------------------------

/// Formula used to derive a margin from a reference document.
///
/// Serialized as the camelCase names used in pipeline configuration.
/// Unknown names are kept as [`ValueCalculation::Unrecognized`] rather than
/// rejected; they compute a zero margin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ValueCalculation {
    /// `value * quantity`
    ValueQuantity,
    /// `(1 - return_rate) * value * quantity`
    ReturnRate,
    /// `(value - discount) * quantity`
    ValueWithDiscount,
    /// Any other configured name.
    Unrecognized(String),
}

impl ValueCalculation {
    pub fn as_str(&self) -> &str {
        match self {
            Self::ValueQuantity => "valueQuantity",
            Self::ReturnRate => "returnRate",
            Self::ValueWithDiscount => "valueWithDiscount",
            Self::Unrecognized(name) => name,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, Self::Unrecognized(_))
    }
}

impl Default for ValueCalculation {
    fn default() -> Self {
        Self::ValueQuantity
    }
}

impl From<String> for ValueCalculation {
    fn from(name: String) -> Self {
        match name.as_str() {
            "valueQuantity" => Self::ValueQuantity,
            "returnRate" => Self::ReturnRate,
            "valueWithDiscount" => Self::ValueWithDiscount,
            _ => Self::Unrecognized(name),
        }
    }
}

impl From<&str> for ValueCalculation {
    fn from(name: &str) -> Self {
        Self::from(name.to_string())
    }
}

impl From<ValueCalculation> for String {
    fn from(calc: ValueCalculation) -> Self {
        calc.as_str().to_string()
    }
}

impl std::fmt::Display for ValueCalculation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

//! Margin formulas.
//!
//! Pure functions of an item, its reference document and the batch config.
//! Nothing here validates the result: a missing or non-numeric source field
//! yields NaN, and callers decide what to do with a non-finite margin.

use serde_json::Value;

use marginkit_shared::{EnrichmentConfig, Item, ReferenceDocument, ValueCalculation};

/// Compute the margin for `item` using the formula selected in `config`.
///
/// Unrecognized formulas compute `0.0` regardless of document contents.
pub fn compute(item: &Item, doc: &ReferenceDocument, config: &EnrichmentConfig) -> f64 {
    let document_value = to_number(doc.field(&config.value_field));
    let quantity = item.quantity.unwrap_or(1.0);

    match &config.value_calculation {
        ValueCalculation::ValueQuantity => document_value * quantity,
        ValueCalculation::ReturnRate => {
            let return_rate = to_number(doc.field(&config.return_rate_field));
            (1.0 - return_rate) * document_value * quantity
        }
        ValueCalculation::ValueWithDiscount => {
            let discount = item.discount.unwrap_or(0.0);
            (document_value - discount) * quantity
        }
        ValueCalculation::Unrecognized(_) => 0.0,
    }
}

/// Numeric coercion of a document field.
///
/// | input | result |
/// |-------|--------|
/// | number | itself |
/// | string | trimmed decimal parse; `""` → 0; unparsable → NaN |
/// | bool | 1 / 0 |
/// | null | 0 |
/// | missing, array, object | NaN |
pub fn to_number(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(f64::NAN),
        Some(Value::String(s)) => {
            let s = s.trim();
            if s.is_empty() {
                0.0
            } else {
                parse_decimal(s)
            }
        }
        Some(Value::Bool(b)) => f64::from(u8::from(*b)),
        Some(Value::Null) => 0.0,
        Some(Value::Array(_)) | Some(Value::Object(_)) | None => f64::NAN,
    }
}

/// Parse a decimal literal, accepting `Infinity` but not Rust-only
/// spellings like `inf`.
fn parse_decimal(s: &str) -> f64 {
    match s {
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        _ if s.chars().any(|c| c.is_ascii_alphabetic() && !matches!(c, 'e' | 'E')) => f64::NAN,
        _ => s.parse::<f64>().unwrap_or(f64::NAN),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(calc: ValueCalculation) -> EnrichmentConfig {
        EnrichmentConfig {
            value_calculation: calc,
            ..Default::default()
        }
    }

    fn doc(value: Value) -> ReferenceDocument {
        ReferenceDocument::new().with_field("value", value)
    }

    #[test]
    fn value_quantity() {
        let item = Item::with_id("a").quantity(3.0);
        let margin = compute(&item, &doc(json!(10)), &config(ValueCalculation::ValueQuantity));
        assert_eq!(margin, 30.0);
    }

    #[test]
    fn return_rate() {
        let item = Item::with_id("a").quantity(2.0);
        let doc = doc(json!(100)).with_field("return_rate", 0.2);
        let margin = compute(&item, &doc, &config(ValueCalculation::ReturnRate));
        assert!((margin - 160.0).abs() < 1e-9);
    }

    #[test]
    fn value_with_discount() {
        let item = Item::with_id("a").quantity(4.0).discount(5.0);
        let margin = compute(
            &item,
            &doc(json!(50)),
            &config(ValueCalculation::ValueWithDiscount),
        );
        assert_eq!(margin, 180.0);
    }

    #[test]
    fn missing_quantity_defaults_to_one() {
        let item = Item::with_id("a");
        let margin = compute(&item, &doc(json!(12.5)), &config(ValueCalculation::ValueQuantity));
        assert_eq!(margin, 12.5);
    }

    #[test]
    fn missing_discount_defaults_to_zero() {
        let item = Item::with_id("a").quantity(2.0);
        let margin = compute(
            &item,
            &doc(json!(8)),
            &config(ValueCalculation::ValueWithDiscount),
        );
        assert_eq!(margin, 16.0);
    }

    #[test]
    fn unrecognized_formula_is_zero() {
        let item = Item::with_id("a").quantity(7.0);
        let calc = ValueCalculation::Unrecognized("markup".into());
        assert_eq!(compute(&item, &doc(json!(99)), &config(calc.clone())), 0.0);
        // even when the document would produce NaN
        assert_eq!(compute(&item, &ReferenceDocument::new(), &config(calc)), 0.0);
    }

    #[test]
    fn custom_field_names() {
        let cfg = EnrichmentConfig {
            value_field: "unit_cost".into(),
            return_rate_field: "rr".into(),
            value_calculation: ValueCalculation::ReturnRate,
            ..Default::default()
        };
        let doc = ReferenceDocument::new()
            .with_field("unit_cost", "20")
            .with_field("rr", "0.5");
        assert_eq!(compute(&Item::with_id("a"), &doc, &cfg), 10.0);
    }

    #[test]
    fn missing_value_field_is_nan() {
        let item = Item::with_id("a");
        let margin = compute(&item, &ReferenceDocument::new(), &config(ValueCalculation::ValueQuantity));
        assert!(margin.is_nan());
    }

    #[test]
    fn missing_return_rate_is_nan() {
        let item = Item::with_id("a");
        let margin = compute(&item, &doc(json!(10)), &config(ValueCalculation::ReturnRate));
        assert!(margin.is_nan());
    }

    #[test]
    fn compute_is_deterministic() {
        let item = Item::with_id("a").quantity(3.0).discount(1.5);
        let doc = doc(json!("9.75"));
        let cfg = config(ValueCalculation::ValueWithDiscount);
        assert_eq!(compute(&item, &doc, &cfg), compute(&item, &doc, &cfg));
    }

    #[test]
    fn numeric_coercion() {
        assert_eq!(to_number(Some(&json!(3))), 3.0);
        assert_eq!(to_number(Some(&json!(-0.5))), -0.5);
        assert_eq!(to_number(Some(&json!(" 42 "))), 42.0);
        assert_eq!(to_number(Some(&json!("1e3"))), 1000.0);
        assert_eq!(to_number(Some(&json!(""))), 0.0);
        assert_eq!(to_number(Some(&json!(true))), 1.0);
        assert_eq!(to_number(Some(&json!(false))), 0.0);
        assert_eq!(to_number(Some(&Value::Null)), 0.0);
        assert_eq!(to_number(Some(&json!("Infinity"))), f64::INFINITY);
        assert!(to_number(Some(&json!("abc"))).is_nan());
        assert!(to_number(Some(&json!("inf"))).is_nan());
        assert!(to_number(Some(&json!("NaN"))).is_nan());
        assert!(to_number(Some(&json!([1]))).is_nan());
        assert!(to_number(Some(&json!({"a": 1}))).is_nan());
        assert!(to_number(None).is_nan());
    }
}

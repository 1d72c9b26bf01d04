//! Price derivation arithmetic.
//!
//! Pure functions only: the engine hands in line items, the current USD
//! exchange rate and the configured store markup, and gets back one set of
//! derived cost/price figures per line. No rounding is applied here; display
//! rounding belongs to the consumers of the written rows.

use crate::document::LineItem;
use crate::error::SyncError;
use mysql_async::Value;

/// Multiplicative store markup, kept as a factor so derivation is a single
/// multiplication per line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StoreMarkup(f64);

impl StoreMarkup {
    /// Build the factor `1 + pct / 100` from a configured percentage.
    pub fn from_percent(pct: f64) -> Self {
        StoreMarkup(1.0 + pct / 100.0)
    }

    pub fn factor(self) -> f64 {
        self.0
    }
}

/// Derived figures for one line item, recomputed from scratch every cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedValues {
    pub operation_id: i64,
    pub good_id: i64,
    /// Vendor cost in local currency.
    pub cost_local: f64,
    /// Vendor cost in the rate currency (weight with vendor markup applied).
    pub cost_foreign: f64,
    /// Sale price in local currency.
    pub price_local: f64,
    /// Sale price in the rate currency.
    pub price_foreign: f64,
}

/// Read a weight value leniently.
///
/// The weight column is configurable and in some deployments holds free-form
/// article text, so anything that does not parse as a number falls back to
/// 1.0 rather than zeroing out the derived price. NULL and boolean-ish
/// sentinels take the same fallback.
pub fn weight_or_default(value: &Value) -> f64 {
    match value {
        Value::Int(n) => *n as f64,
        Value::UInt(n) => *n as f64,
        Value::Float(f) => f64::from(*f),
        Value::Double(d) => *d,
        Value::Bytes(bytes) => std::str::from_utf8(bytes)
            .ok()
            .and_then(|s| s.trim().parse::<f64>().ok())
            .unwrap_or(1.0),
        _ => 1.0,
    }
}

/// Read a value that must be numeric, failing the cycle otherwise.
pub fn numeric(value: &Value, column: &'static str) -> Result<f64, SyncError> {
    let parsed = match value {
        Value::Int(n) => Some(*n as f64),
        Value::UInt(n) => Some(*n as f64),
        Value::Float(f) => Some(f64::from(*f)),
        Value::Double(d) => Some(*d),
        Value::Bytes(bytes) => std::str::from_utf8(bytes)
            .ok()
            .and_then(|s| s.trim().parse::<f64>().ok()),
        _ => None,
    };

    parsed.ok_or_else(|| SyncError::NonNumeric {
        column,
        value: format!("{value:?}"),
    })
}

/// Derive cost and price figures for every line item of a document.
///
/// Deterministic and side-effect free; an empty input yields an empty output
/// and the downstream write becomes a no-op.
pub fn derive(
    line_items: &[LineItem],
    exchange_rate: f64,
    store_markup: StoreMarkup,
) -> Vec<DerivedValues> {
    line_items
        .iter()
        .map(|item| {
            let weight = weight_or_default(&item.raw_weight);
            // Multiplications instead of divisions, same as the price lists
            // downstream expect: markup percentages are scaled by 0.01.
            let cost_foreign = weight * (1.0 + item.vendor_markup_pct * 0.01);
            let cost_local = cost_foreign * exchange_rate;
            let price_foreign = cost_foreign * store_markup.factor();
            let price_local = price_foreign * exchange_rate;

            DerivedValues {
                operation_id: item.operation_id,
                good_id: item.good_id,
                cost_local,
                cost_foreign,
                price_local,
                price_foreign,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    fn line_item(raw_weight: Value, vendor_markup_pct: f64) -> LineItem {
        LineItem {
            operation_id: 11,
            good_id: 42,
            quantity: 1.0,
            raw_weight,
            vendor_markup_pct,
            good_name: "ring".to_string(),
        }
    }

    #[test]
    fn test_weight_passes_numeric_values_through() {
        assert_close(weight_or_default(&Value::Bytes(b"12.5".to_vec())), 12.5);
        assert_close(weight_or_default(&Value::Bytes(b" 7.25 ".to_vec())), 7.25);
        assert_close(weight_or_default(&Value::Int(3)), 3.0);
        assert_close(weight_or_default(&Value::UInt(8)), 8.0);
        assert_close(weight_or_default(&Value::Double(0.75)), 0.75);
    }

    #[test]
    fn test_weight_defaults_to_one_for_junk() {
        assert_close(weight_or_default(&Value::NULL), 1.0);
        assert_close(weight_or_default(&Value::Bytes(b"".to_vec())), 1.0);
        assert_close(weight_or_default(&Value::Bytes(b"ART-104".to_vec())), 1.0);
        assert_close(weight_or_default(&Value::Bytes(b"false".to_vec())), 1.0);
        assert_close(weight_or_default(&Value::Bytes(vec![0xff, 0xfe])), 1.0);
    }

    #[test]
    fn test_numeric_rejects_junk() {
        let err = numeric(&Value::Bytes(b"n/a".to_vec()), "vat_value").unwrap_err();
        assert!(matches!(err, SyncError::NonNumeric { column: "vat_value", .. }));

        let err = numeric(&Value::NULL, "vat_value").unwrap_err();
        assert!(matches!(err, SyncError::NonNumeric { .. }));
    }

    #[test]
    fn test_numeric_accepts_decimal_bytes() {
        assert_close(numeric(&Value::Bytes(b"5".to_vec()), "vat_value").unwrap(), 5.0);
        assert_close(numeric(&Value::Double(2.5), "vat_value").unwrap(), 2.5);
    }

    #[test]
    fn test_store_markup_factor() {
        assert_close(StoreMarkup::from_percent(5.0).factor(), 1.05);
        assert_close(StoreMarkup::from_percent(0.0).factor(), 1.0);
    }

    #[test]
    fn test_derivation_of_a_weighted_line() {
        // 12.5 g at 5% vendor markup, rate 90, 10% store markup.
        let items = vec![line_item(Value::Bytes(b"12.5".to_vec()), 5.0)];
        let derived = derive(&items, 90.0, StoreMarkup::from_percent(10.0));

        assert_eq!(derived.len(), 1);
        assert_close(derived[0].cost_foreign, 13.125);
        assert_close(derived[0].cost_local, 1181.25);
        assert_close(derived[0].price_foreign, 14.4375);
        assert_close(derived[0].price_local, 1299.375);
        assert_eq!(derived[0].operation_id, 11);
        assert_eq!(derived[0].good_id, 42);
    }

    #[test]
    fn test_derivation_with_sentinel_weight_uses_one() {
        let items = vec![line_item(Value::Bytes(b"false".to_vec()), 5.0)];
        let derived = derive(&items, 90.0, StoreMarkup::from_percent(10.0));

        // weight treated as 1.0
        assert_close(derived[0].cost_foreign, 1.05);
        assert_close(derived[0].cost_local, 94.5);
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let items = vec![
            line_item(Value::Bytes(b"2.5".to_vec()), 5.0),
            line_item(Value::NULL, 12.0),
        ];
        let first = derive(&items, 88.5, StoreMarkup::from_percent(7.5));
        let second = derive(&items, 88.5, StoreMarkup::from_percent(7.5));
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_line_items_derive_to_empty() {
        let derived = derive(&[], 90.0, StoreMarkup::from_percent(10.0));
        assert!(derived.is_empty());
    }
}

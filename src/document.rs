//! Reads that feed the derivation: document line items, the current
//! exchange rate, and the price type assigned to the document's object.

use crate::error::SyncError;
use crate::pricing;
use mysql_async::{prelude::*, Conn, Row, Value};

/// Currency whose exchange rate converts between foreign and local figures.
pub const RATE_CURRENCY: &str = "USD";

/// One goods movement within a purchase document. Read-only to the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct LineItem {
    pub operation_id: i64,
    pub good_id: i64,
    pub quantity: f64,
    /// Raw weight value from the configured goods column; may be anything,
    /// see [`pricing::weight_or_default`].
    pub raw_weight: Value,
    /// Vendor markup percentage for the good's category. Always numeric.
    pub vendor_markup_pct: f64,
    pub good_name: String,
}

/// Fetch the goods movements of one document.
///
/// `weight_column` is the configured `dir_goods` column holding per-good
/// weight data; it is validated at config load to be a bare identifier.
pub async fn fetch_line_items(
    conn: &mut Conn,
    document_id: i64,
    weight_column: &str,
) -> Result<Vec<LineItem>, SyncError> {
    let query = format!(
        "SELECT o.opr_id, o.opr_good, o.opr_quantity, g.{weight_column}, v.vat_value, g.gd_name
         FROM operations o
         LEFT JOIN dir_goods g ON o.opr_good = g.gd_id
         LEFT JOIN dir_vat v ON g.gd_vat = v.vat_id
         WHERE o.opr_type = 1 AND o.opr_document = ?"
    );

    let rows: Vec<Row> = conn
        .exec(query, (document_id,))
        .await
        .map_err(SyncError::from_query)?;

    let mut line_items = Vec::with_capacity(rows.len());
    for row in rows {
        let operation_id: i64 = row
            .get(0)
            .ok_or_else(|| SyncError::MissingData("operations row without opr_id".to_string()))?;
        let good_id: i64 = row
            .get(1)
            .ok_or_else(|| SyncError::MissingData("operations row without opr_good".to_string()))?;
        let quantity: f64 = row.get(2).unwrap_or(0.0);
        let raw_weight: Value = row.get(3).unwrap_or(Value::NULL);
        let vendor_markup: Value = row.get(4).unwrap_or(Value::NULL);
        let good_name: String = row.get(5).unwrap_or_default();

        let vendor_markup_pct = pricing::numeric(&vendor_markup, "vat_value")?;

        line_items.push(LineItem {
            operation_id,
            good_id,
            quantity,
            raw_weight,
            vendor_markup_pct,
            good_name,
        });
    }

    Ok(line_items)
}

/// Fetch the current exchange rate for [`RATE_CURRENCY`], fresh every cycle.
pub async fn fetch_exchange_rate(conn: &mut Conn) -> Result<f64, SyncError> {
    let rows: Vec<Row> = conn
        .exec(
            "SELECT cur_exchange_rate FROM dir_currency WHERE cur_code = ?",
            (RATE_CURRENCY,),
        )
        .await
        .map_err(SyncError::from_query)?;

    let Some(row) = rows.into_iter().next() else {
        return Err(SyncError::MissingData(format!(
            "no exchange rate for currency '{RATE_CURRENCY}'"
        )));
    };

    let rate: Value = row.get(0).unwrap_or(Value::NULL);
    pricing::numeric(&rate, "cur_exchange_rate")
}

/// Fetch the price type configured for the document's object, which selects
/// the price-list slot updated by the write-back.
pub async fn fetch_price_type(conn: &mut Conn, object_id: i64) -> Result<i64, SyncError> {
    let rows: Vec<Row> = conn
        .exec(
            "SELECT obj_price_type FROM dir_objects WHERE obj_id = ?",
            (object_id,),
        )
        .await
        .map_err(SyncError::from_query)?;

    rows.into_iter()
        .next()
        .and_then(|row| row.get(0))
        .ok_or_else(|| SyncError::MissingData(format!("no price type for object {object_id}")))
}

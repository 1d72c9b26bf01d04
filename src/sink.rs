//! Transactional write-back of derived values.
//!
//! Three statements run inside one transaction: per-operation cost
//! properties (update-only), price-list entries (keyed upsert), and average
//! costs per object and good (update-only). Either all three commit or none
//! do; an error drops the transaction un-committed and the driver rolls it
//! back. Every statement overwrites keyed rows, so replaying the same
//! derived values is idempotent.

use crate::error::SyncError;
use crate::pricing::DerivedValues;
use mysql_async::{prelude::*, Conn, TxOpts};
use tracing::debug;

const UPDATE_OPERATION_COSTS: &str = "UPDATE operations_additional_prop
     SET oap_cost = ?, oap_cost_cur = ?, oap_exchange_rate = ?, oap_price1 = ?, oap_price2 = ?
     WHERE oap_operation = ?";

const UPSERT_PRICES: &str = "INSERT INTO dir_prices (prc_type, prc_good, prc_value, prc_value_cur, prc_recalculate, prc_deleted)
     VALUES (?, ?, ?, ?, 1, 0)
     ON DUPLICATE KEY UPDATE
         prc_value = VALUES(prc_value),
         prc_value_cur = VALUES(prc_value_cur),
         prc_recalculate = 1";

const UPDATE_AVG_COSTS: &str = "UPDATE dir_avg_cost
     SET avgc_value = ?, avgc_value_cur = ?
     WHERE avgc_object = ? AND avgc_good = ?";

/// Parameters for one `operations_additional_prop` update.
fn operation_cost_params(
    exchange_rate: f64,
    derived: &DerivedValues,
) -> (f64, f64, f64, f64, f64, i64) {
    (
        derived.cost_local,
        derived.cost_foreign,
        exchange_rate,
        derived.price_local,
        derived.price_foreign,
        derived.operation_id,
    )
}

/// Parameters for one `dir_prices` upsert, keyed by (price type, good).
fn price_params(price_type_id: i64, derived: &DerivedValues) -> (i64, i64, f64, f64) {
    (
        price_type_id,
        derived.good_id,
        derived.price_local,
        derived.price_foreign,
    )
}

/// Parameters for one `dir_avg_cost` update, keyed by (object, good).
fn avg_cost_params(object_id: i64, derived: &DerivedValues) -> (f64, f64, i64, i64) {
    (
        derived.cost_local,
        derived.cost_foreign,
        object_id,
        derived.good_id,
    )
}

/// Apply the derived values for one document in a single transaction.
///
/// An empty `derived` slice is a successful no-op; no transaction is opened.
pub async fn write_back(
    conn: &mut Conn,
    document_id: i64,
    object_id: i64,
    price_type_id: i64,
    exchange_rate: f64,
    derived: &[DerivedValues],
) -> Result<(), SyncError> {
    if derived.is_empty() {
        debug!(document_id, "document has no line items, skipping write-back");
        return Ok(());
    }

    let mut tx = conn
        .start_transaction(TxOpts::default())
        .await
        .map_err(SyncError::Write)?;

    tx.exec_batch(
        UPDATE_OPERATION_COSTS,
        derived.iter().map(|d| operation_cost_params(exchange_rate, d)),
    )
    .await
    .map_err(SyncError::Write)?;

    tx.exec_batch(
        UPSERT_PRICES,
        derived.iter().map(|d| price_params(price_type_id, d)),
    )
    .await
    .map_err(SyncError::Write)?;

    tx.exec_batch(
        UPDATE_AVG_COSTS,
        derived.iter().map(|d| avg_cost_params(object_id, d)),
    )
    .await
    .map_err(SyncError::Write)?;

    tx.commit().await.map_err(SyncError::Write)?;

    debug!(
        document_id,
        rows = derived.len(),
        "write-back committed"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn derived() -> DerivedValues {
        DerivedValues {
            operation_id: 11,
            good_id: 42,
            cost_local: 1181.25,
            cost_foreign: 13.125,
            price_local: 1299.375,
            price_foreign: 14.4375,
        }
    }

    #[test]
    fn test_operation_cost_params_order_matches_statement() {
        let params = operation_cost_params(90.0, &derived());
        assert_eq!(params, (1181.25, 13.125, 90.0, 1299.375, 14.4375, 11));
    }

    #[test]
    fn test_price_params_are_keyed_by_type_and_good() {
        let params = price_params(5, &derived());
        assert_eq!(params, (5, 42, 1299.375, 14.4375));
    }

    #[test]
    fn test_avg_cost_params_are_keyed_by_object_and_good() {
        let params = avg_cost_params(3, &derived());
        assert_eq!(params, (1181.25, 13.125, 3, 42));
    }

    #[test]
    fn test_param_assembly_is_idempotent() {
        // Same derived values produce byte-identical parameter sets, so a
        // replayed write leaves the target rows unchanged.
        let d = derived();
        assert_eq!(operation_cost_params(90.0, &d), operation_cost_params(90.0, &d));
        assert_eq!(price_params(5, &d), price_params(5, &d));
        assert_eq!(avg_cost_params(3, &d), avg_cost_params(3, &d));
    }
}

//! Tracking-column setup on the documents table.
//!
//! Change detection orders by `pur_last_update`, a timestamp column that
//! auto-updates on every write to a purchase document. Stores provisioned
//! before this daemon existed don't have it, so it is added on startup.
//! Repeated runs are no-ops once the column exists.

use crate::error::SyncError;
use mysql_async::{prelude::*, Conn};
use tracing::{debug, info};

const TRACKING_COLUMN_EXISTS: &str = "SELECT COUNT(*)
     FROM INFORMATION_SCHEMA.COLUMNS
     WHERE TABLE_SCHEMA = ?
       AND TABLE_NAME = 'doc_purchases'
       AND COLUMN_NAME = 'pur_last_update'";

const ADD_TRACKING_COLUMN: &str = "ALTER TABLE doc_purchases
     ADD COLUMN pur_last_update TIMESTAMP DEFAULT CURRENT_TIMESTAMP
     ON UPDATE CURRENT_TIMESTAMP";

/// Ensure `doc_purchases.pur_last_update` exists.
///
/// Failure is reported to the caller but is not fatal to the daemon; later
/// detection queries will fail visibly if the column is genuinely missing.
pub async fn ensure_tracking_column(conn: &mut Conn, database: &str) -> Result<(), SyncError> {
    let count: Option<i64> = conn
        .exec_first(TRACKING_COLUMN_EXISTS, (database,))
        .await
        .map_err(SyncError::from_query)?;

    if count.unwrap_or(0) > 0 {
        debug!("tracking column pur_last_update already exists");
        return Ok(());
    }

    conn.query_drop(ADD_TRACKING_COLUMN)
        .await
        .map_err(SyncError::from_query)?;

    info!("added tracking column pur_last_update to doc_purchases");
    Ok(())
}

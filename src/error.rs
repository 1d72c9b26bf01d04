//! Error types for the price sync engine.
//!
//! Failures are kept separate from expected negative poll outcomes (see
//! [`crate::source::NoChange`]): a quiet source is not an error, a broken
//! session or a rolled-back write is.

use thiserror::Error;

/// Errors that can abort a sync cycle.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The MySQL session could not be established or was lost.
    #[error("can't connect to MySQL: {0}")]
    Connection(#[source] mysql_async::Error),

    /// A read query failed server-side outside the write-back transaction.
    #[error("MySQL query failed: {0}")]
    Query(#[source] mysql_async::Error),

    /// The write-back transaction failed; nothing was committed.
    #[error("price write-back failed: {0}")]
    Write(#[source] mysql_async::Error),

    /// A cycle was attempted without an established session.
    #[error("not connected to MySQL")]
    NotConnected,

    /// A column that must be numeric held something else.
    #[error("column '{column}' holds non-numeric value '{value}'")]
    NonNumeric {
        column: &'static str,
        value: String,
    },

    /// A row the derivation depends on is missing.
    #[error("{0}")]
    MissingData(String),
}

impl SyncError {
    /// Classify a driver error raised by a read query.
    ///
    /// Socket-level and driver-level failures mean the session is gone;
    /// everything else is a server-side query failure.
    pub fn from_query(e: mysql_async::Error) -> Self {
        match e {
            mysql_async::Error::Io(_) | mysql_async::Error::Driver(_) => SyncError::Connection(e),
            other => SyncError::Query(other),
        }
    }

    /// Whether the owned session must be re-established before the next cycle.
    pub fn invalidates_connection(&self) -> bool {
        matches!(
            self,
            SyncError::Connection(_) | SyncError::Query(_) | SyncError::NotConnected
        )
    }

    /// Data-shape failures the poll loop answers with an extended back-off
    /// instead of the regular interval.
    pub fn is_unexpected(&self) -> bool {
        matches!(
            self,
            SyncError::NonNumeric { .. } | SyncError::MissingData(_)
        )
    }
}

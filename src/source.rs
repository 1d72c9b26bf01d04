//! Change detection over the purchase documents table.
//!
//! The engine polls the single most recently touched document and compares
//! its tracking timestamp against a process-local watermark. Only a strictly
//! newer, performed document counts as work; everything else is an expected
//! negative outcome, not an error.
//!
//! Latest-wins policy: when several documents changed between two polls, only
//! the newest one is picked up and the rest are skipped. Restarting the
//! process resets the watermark, so the most recent document is reprocessed
//! once — the write-back is idempotent, so this is harmless.

use crate::error::SyncError;
use chrono::{DateTime, Utc};
use mysql_async::{prelude::*, Conn, Row};
use tracing::debug;

/// Most recently touched row of `doc_purchases`, as read by the detector.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentRow {
    /// Tracking timestamp as epoch seconds.
    pub updated_at: i64,
    pub document_id: i64,
    pub performed: bool,
    pub object_id: i64,
}

/// A detected unit of work: which document to recalculate, for which object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeInfo {
    pub document_id: i64,
    pub object_id: i64,
}

/// Expected negative poll outcomes. None of these advance the watermark.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoChange {
    /// The documents table is empty.
    NoData,
    /// The latest document exists but is not performed yet.
    NotPerformed,
    /// The latest document was already processed.
    Unchanged,
}

impl std::fmt::Display for NoChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NoChange::NoData => write!(f, "no purchase documents found"),
            NoChange::NotPerformed => write!(f, "latest document is not performed"),
            NoChange::Unchanged => write!(f, "latest document already processed"),
        }
    }
}

/// Outcome of one detection pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Detection {
    Changed(ChangeInfo),
    Skipped(NoChange),
}

/// Process-local high-water mark over the tracking timestamp.
///
/// Starts at zero so the newest document is always treated as unseen at
/// least once per process lifetime. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct Watermark {
    last_update: i64,
    advanced_at: Option<DateTime<Utc>>,
}

impl Watermark {
    pub fn new() -> Self {
        Watermark {
            last_update: 0,
            advanced_at: None,
        }
    }

    /// Epoch seconds of the last document accepted as a change.
    pub fn last_update(&self) -> i64 {
        self.last_update
    }

    /// Wall-clock moment the watermark last advanced, if it ever did.
    pub fn advanced_at(&self) -> Option<DateTime<Utc>> {
        self.advanced_at
    }

    fn advance(&mut self, updated_at: i64) {
        debug_assert!(updated_at > self.last_update);
        self.last_update = updated_at;
        self.advanced_at = Some(Utc::now());
    }
}

impl Default for Watermark {
    fn default() -> Self {
        Self::new()
    }
}

const LATEST_DOCUMENT: &str = "SELECT UNIX_TIMESTAMP(pur_last_update), pur_id, pur_performed, pur_object
     FROM doc_purchases
     ORDER BY pur_last_update DESC
     LIMIT 1";

/// Fetch the most recently touched purchase document, if any.
pub async fn latest_document(conn: &mut Conn) -> Result<Option<DocumentRow>, SyncError> {
    let rows: Vec<Row> = conn
        .query(LATEST_DOCUMENT)
        .await
        .map_err(SyncError::from_query)?;

    let Some(row) = rows.into_iter().next() else {
        return Ok(None);
    };

    let updated_at: i64 = row.get(0).unwrap_or(0);
    let document_id: i64 = row
        .get(1)
        .ok_or_else(|| SyncError::MissingData("doc_purchases row without pur_id".to_string()))?;
    let performed: bool = row.get(2).unwrap_or(false);
    let object_id: i64 = row
        .get(3)
        .ok_or_else(|| SyncError::MissingData("doc_purchases row without pur_object".to_string()))?;

    Ok(Some(DocumentRow {
        updated_at,
        document_id,
        performed,
        object_id,
    }))
}

/// Decide whether the latest document represents unseen work.
///
/// Advances the watermark only when it does; not-performed documents never
/// advance it, no matter how new they are.
pub fn evaluate(row: Option<DocumentRow>, watermark: &mut Watermark) -> Detection {
    let Some(row) = row else {
        return Detection::Skipped(NoChange::NoData);
    };

    if !row.performed {
        return Detection::Skipped(NoChange::NotPerformed);
    }

    if row.updated_at <= watermark.last_update() {
        return Detection::Skipped(NoChange::Unchanged);
    }

    watermark.advance(row.updated_at);
    debug!(
        document_id = row.document_id,
        updated_at = row.updated_at,
        "watermark advanced"
    );

    Detection::Changed(ChangeInfo {
        document_id: row.document_id,
        object_id: row.object_id,
    })
}

/// One full detection pass against the store.
pub async fn detect_change(
    conn: &mut Conn,
    watermark: &mut Watermark,
) -> Result<Detection, SyncError> {
    let row = latest_document(conn).await?;
    Ok(evaluate(row, watermark))
}

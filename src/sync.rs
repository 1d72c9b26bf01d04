//! Engine context and the supervising poll loop.
//!
//! All mutable state (configuration, the owned session, the watermark) lives
//! on one [`SyncEngine`] value, so tests can build isolated engines and the
//! daemon has no process-wide singletons.
//!
//! # Loop behavior
//!
//! The supervisor walks `Disconnected → Connecting → Connected → Polling`
//! and back. One tick either attempts a reconnect or runs one full
//! detect → derive → write cycle, then the loop sleeps for the configured
//! interval. Cycles are strictly sequential; a new one never starts before
//! the previous write-back committed or rolled back. Errors never terminate
//! the process: session-invalidating errors drop the connection and the next
//! tick reconnects, while unexpected data-shape errors are answered with an
//! extended back-off sleep.

use crate::change_tracking;
use crate::client::MySqlClient;
use crate::config::Config;
use crate::document;
use crate::error::SyncError;
use crate::pricing::{self, StoreMarkup};
use crate::sink;
use crate::source::{self, Detection, NoChange, Watermark};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Sleep applied after an unexpected cycle failure instead of the regular
/// poll interval.
const ERROR_BACKOFF: Duration = Duration::from_secs(60);

/// Supervisor states. `Connecting` and `Polling` are transient within one
/// tick; between ticks the loop rests in `Disconnected` or `Connected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Disconnected,
    Connecting,
    Connected,
    Polling,
}

/// Result of one completed sync cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Nothing to do this cycle.
    Skipped(NoChange),
    /// A document was recalculated and its values committed.
    Processed { document_id: i64, line_items: usize },
}

#[derive(Debug, PartialEq, Eq)]
enum TickOutcome {
    Normal,
    Backoff,
}

/// The price sync engine: configuration, session, watermark, and the loop
/// that drives them.
pub struct SyncEngine {
    config: Config,
    store_markup: StoreMarkup,
    client: MySqlClient,
    watermark: Watermark,
    state: SupervisorState,
    tracking_ensured: bool,
}

impl SyncEngine {
    pub fn new(config: Config) -> Self {
        let store_markup = config.store_markup();
        let client = MySqlClient::new(config.mysql_opts());
        SyncEngine {
            config,
            store_markup,
            client,
            watermark: Watermark::new(),
            state: SupervisorState::Disconnected,
            tracking_ensured: false,
        }
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    pub fn watermark(&self) -> &Watermark {
        &self.watermark
    }

    /// Run one full detect → derive → write cycle against the store.
    pub async fn run_cycle(&mut self) -> Result<CycleOutcome, SyncError> {
        let conn = self.client.conn()?;

        let detection = source::detect_change(conn, &mut self.watermark).await?;
        let info = match detection {
            Detection::Skipped(reason) => return Ok(CycleOutcome::Skipped(reason)),
            Detection::Changed(info) => info,
        };

        let line_items =
            document::fetch_line_items(conn, info.document_id, &self.config.weight_table_name)
                .await?;
        let exchange_rate = document::fetch_exchange_rate(conn).await?;
        let price_type_id = document::fetch_price_type(conn, info.object_id).await?;

        let derived = pricing::derive(&line_items, exchange_rate, self.store_markup);

        sink::write_back(
            conn,
            info.document_id,
            info.object_id,
            price_type_id,
            exchange_rate,
            &derived,
        )
        .await?;

        Ok(CycleOutcome::Processed {
            document_id: info.document_id,
            line_items: derived.len(),
        })
    }

    /// Drive the poll loop forever. The only way out is process termination.
    pub async fn run(mut self) -> anyhow::Result<()> {
        let interval = Duration::from_secs(self.config.check_time);
        info!(
            host = %self.config.host,
            database = %self.config.database,
            interval_secs = self.config.check_time,
            "starting price sync loop"
        );

        loop {
            let delay = match self.tick().await {
                TickOutcome::Normal => interval,
                TickOutcome::Backoff => ERROR_BACKOFF,
            };
            tokio::time::sleep(delay).await;
        }
    }

    /// One supervisor tick: reconnect when disconnected, otherwise run one
    /// cycle. Returns which sleep the loop should take.
    async fn tick(&mut self) -> TickOutcome {
        if !self.client.is_connected() {
            self.state = SupervisorState::Connecting;
            match self.client.connect().await {
                Ok(()) => {
                    info!("connected to MySQL at {}", self.config.host);
                    self.state = SupervisorState::Connected;
                    self.ensure_tracking().await;
                }
                Err(e) => {
                    warn!("{e}");
                    self.state = SupervisorState::Disconnected;
                }
            }
            return TickOutcome::Normal;
        }

        self.state = SupervisorState::Polling;
        let outcome = self.run_cycle().await;
        self.state = SupervisorState::Connected;

        match outcome {
            Ok(CycleOutcome::Skipped(reason)) => {
                info!("{reason}");
            }
            Ok(CycleOutcome::Processed {
                document_id,
                line_items,
            }) => {
                info!(document_id, line_items, "prices updated");
            }
            Err(e) => {
                if e.invalidates_connection() {
                    self.client.invalidate();
                    self.state = SupervisorState::Disconnected;
                }
                if e.is_unexpected() {
                    error!("unexpected cycle failure: {e}");
                    return TickOutcome::Backoff;
                }
                warn!("sync cycle failed: {e}");
            }
        }

        TickOutcome::Normal
    }

    /// Add the tracking column once, after the first successful connect.
    /// Failures are logged and swallowed; detection will surface a missing
    /// column on its own.
    async fn ensure_tracking(&mut self) {
        if self.tracking_ensured {
            return;
        }
        self.tracking_ensured = true;

        let Ok(conn) = self.client.conn() else {
            return;
        };
        match change_tracking::ensure_tracking_column(conn, &self.config.database).await {
            Ok(()) => debug!("tracking column checked"),
            Err(e) => warn!("couldn't ensure tracking column: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> SyncEngine {
        SyncEngine::new(Config::default())
    }

    #[test]
    fn test_new_engine_is_disconnected() {
        let engine = engine();
        assert_eq!(engine.state(), SupervisorState::Disconnected);
        assert_eq!(engine.watermark().last_update(), 0);
    }

    #[tokio::test]
    async fn test_cycle_without_session_reports_not_connected() {
        let mut engine = engine();
        let err = engine.run_cycle().await.unwrap_err();
        assert!(matches!(err, SyncError::NotConnected));
        assert!(err.invalidates_connection());
        // The failed cycle never touched the watermark.
        assert_eq!(engine.watermark().last_update(), 0);
    }

    #[test]
    fn test_skip_outcomes_render_for_the_log() {
        let outcome = CycleOutcome::Skipped(NoChange::Unchanged);
        match outcome {
            CycleOutcome::Skipped(reason) => {
                assert_eq!(reason.to_string(), "latest document already processed");
            }
            CycleOutcome::Processed { .. } => unreachable!(),
        }
    }
}

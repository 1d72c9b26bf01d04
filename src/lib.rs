//! gold-price-sync library
//!
//! A daemon that watches an EasyTrade MySQL store for newly finalized
//! purchase documents and recalculates derived price and cost figures for
//! the goods they move.
//!
//! # How it works
//!
//! - Change detection: the newest `doc_purchases` row is polled on a fixed
//!   interval and compared against a process-local watermark
//! - Derivation: per line item, vendor cost and sale price are computed in
//!   both currencies from the good's weight, its vendor markup and the
//!   current USD exchange rate
//! - Write-back: cost properties, price-list entries and average costs are
//!   committed together in one transaction, idempotently
//!
//! The poll loop survives connection loss, query failures and rolled-back
//! writes; it reconnects and retries on the next tick instead of exiting.

pub mod change_tracking;
pub mod client;
pub mod config;
pub mod document;
pub mod error;
pub mod pricing;
pub mod sink;
pub mod source;
pub mod sync;

pub use config::Config;
pub use error::SyncError;
pub use sync::{CycleOutcome, SupervisorState, SyncEngine};

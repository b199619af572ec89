//! Default monitor for the lending ledger
//!
//! Periodically scans active loans and submits `MarkDefault` for every loan
//! past its due date plus a grace period, signed with the oracle key stored
//! in the protocol registry.
//!
//! - [`DefaultMonitor`]: one detection cycle
//! - [`MonitorScheduler`]: interval loop with graceful shutdown
//! - [`ProtocolClient`]: ledger seam, [`LocalLedgerClient`] for an in-process ledger,
//!   [`RemoteLedgerClient`] for a `lending-node` owned by another process

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, missing_debug_implementations)]

pub mod client;
pub mod config;
pub mod error;
pub mod metrics;
pub mod monitor;
pub mod scheduler;

pub use client::{LocalLedgerClient, ProtocolClient, RemoteLedgerClient};
pub use config::{load_keypair, Config};
pub use error::{Error, Result};
pub use metrics::Metrics;
pub use monitor::{CycleReport, DefaultMonitor, OverdueLoan};
pub use scheduler::MonitorScheduler;

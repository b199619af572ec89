//! Sollend Lending Core
//!
//! Reputation-gated, collateral-free micro-lending ledger.
//!
//! # Architecture
//!
//! - **Signed instructions**: Every mutation is an Ed25519-signed instruction
//! - **Single Writer**: One actor task applies instructions in mailbox order
//! - **Atomic commits**: Every record a transition touches lands in one RocksDB batch
//! - **Pure scoring**: Credit score, tier, rate and limit are plain functions
//! - **Node API**: [`server`] exposes reads and signed submission over HTTP
//!
//! # Invariants
//!
//! - Escrow holds either nothing or exactly the loan amount
//! - `active_loans = total_loans - completed_loans - defaulted_loans`
//! - Loans only move forward; terminal states are immutable
//! - Registry counters never decrease

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod types;
pub mod scoring;
pub mod escrow;
pub mod reputation;
pub mod registry;
pub mod loan;
pub mod instruction;
pub mod events;
pub mod lifecycle;
pub mod storage;
pub mod actor;
pub mod ledger;
pub mod crypto;
pub mod clock;
pub mod error;
pub mod config;
pub mod metrics;
pub mod stats;
pub mod server;

// Re-exports
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, HttpConfig};
pub use crypto::{KeyPair, Signature};
pub use error::{Error, ErrorKind, Result};
pub use escrow::Escrow;
pub use events::{EventKind, LedgerEvent};
pub use instruction::{ConfigUpdate, Instruction, Receipt, SignedInstruction};
pub use ledger::Ledger;
pub use lifecycle::{Changeset, StateReader, Transition};
pub use loan::Loan;
pub use metrics::Metrics;
pub use registry::ProtocolRegistry;
pub use reputation::Reputation;
pub use server::{ErrorBody, ErrorDetail};
pub use stats::{ProtocolStats, StateCounts, TierDistribution};
pub use storage::Storage;
pub use types::{Amount, FeeBasis, Identity, LoanId, LoanKey, LoanState, Tier, Timestamp};

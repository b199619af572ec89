//! Append-only log of applied instructions

use crate::types::{Identity, LoanKey, Timestamp};
use serde::{Deserialize, Serialize};

/// What an applied instruction did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum EventKind {
    /// Registry created
    ConfigInitialized = 1,
    /// Registry changed
    ConfigUpdated = 2,
    /// Reputation created
    ReputationCreated = 3,
    /// Reputation unfrozen
    ReputationUnfrozen = 4,
    /// Balance credited
    FundsDeposited = 5,
    /// Loan requested
    LoanRequested = 10,
    /// Loan funded into escrow
    LoanFunded = 11,
    /// Escrow released to borrower
    LoanWithdrawn = 12,
    /// Loan repaid
    LoanRepaid = 13,
    /// Loan defaulted by the oracle
    LoanDefaulted = 14,
    /// Request cancelled
    LoanCancelled = 15,
}

/// One applied instruction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEvent {
    /// Position in the log (starts at 1)
    pub sequence: u64,
    /// What happened
    pub kind: EventKind,
    /// Who signed it
    pub signer: Identity,
    /// Loan involved, if any
    pub loan: Option<LoanKey>,
    /// Digest of the signed instruction
    pub digest: [u8; 32],
    /// Ledger time
    pub timestamp: Timestamp,
}

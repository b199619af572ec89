//! Error types for the lending ledger

use crate::types::{Amount, LoanState, Timestamp};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Requested principal is zero or otherwise unusable
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Requested term is outside the supported range
    #[error("Invalid duration: {0} seconds")]
    InvalidDuration(i64),

    /// Borrower ceiling above the protocol-wide ceiling
    #[error("Interest rate {rate} bps exceeds protocol ceiling {ceiling} bps")]
    RateExceedsProtocolCeiling {
        /// Requested rate
        rate: u16,
        /// Protocol ceiling
        ceiling: u16,
    },

    /// Lender rate above the borrower's ceiling
    #[error("Interest rate {rate} bps exceeds borrower ceiling {ceiling} bps")]
    RateExceedsBorrowerCeiling {
        /// Offered rate
        rate: u16,
        /// Borrower ceiling
        ceiling: u16,
    },

    /// Principal above the borrower's tier limit
    #[error("Amount {amount} exceeds borrow limit {limit} for current tier")]
    BorrowLimitExceeded {
        /// Requested principal
        amount: Amount,
        /// Tier limit
        limit: Amount,
    },

    /// Loan id already used by this borrower
    #[error("Duplicate loan id: {0}")]
    DuplicateLoanId(String),

    /// Reputation already created for this identity
    #[error("Reputation already exists: {0}")]
    ReputationExists(String),

    /// Protocol fee outside 0..=10000 bps
    #[error("Invalid protocol fee: {0} bps")]
    InvalidFee(u16),

    /// Escrow deposit does not match the loan amount
    #[error("Escrow amount mismatch: expected {expected}, got {actual}")]
    EscrowAmountMismatch {
        /// Loan amount
        expected: Amount,
        /// Offered deposit
        actual: Amount,
    },

    /// Payer balance too low for the transfer
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds {
        /// Amount the transition needs
        required: Amount,
        /// Payer balance
        available: Amount,
    },

    /// Malformed identity string
    #[error("Invalid identity: {0}")]
    InvalidIdentity(String),

    /// Signer is not allowed to perform the operation
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Submitted bytes do not decode to a signed instruction
    #[error("Malformed instruction: {0}")]
    MalformedInstruction(String),

    /// Signature verification failed
    #[error("Signature verification failed: {0}")]
    SignatureError(String),

    /// Loan is not in the state the transition requires
    #[error("Invalid state for loan {loan}: expected {expected}, found {actual}")]
    InvalidState {
        /// Loan key
        loan: String,
        /// Required state
        expected: LoanState,
        /// Current state
        actual: LoanState,
    },

    /// Escrow already holds the loan amount
    #[error("Escrow already funded for loan {0}")]
    EscrowAlreadyFunded(String),

    /// Escrow holds nothing to release
    #[error("Escrow not funded for loan {0}")]
    EscrowNotFunded(String),

    /// Escrow was already released
    #[error("Escrow already released for loan {0}")]
    AlreadyReleased(String),

    /// Same signed instruction submitted twice
    #[error("Duplicate instruction: {0}")]
    DuplicateInstruction(String),

    /// Default attempted before the due date passed
    #[error("Loan not yet overdue: due {due_date}, now {now}")]
    NotYetOverdue {
        /// Loan due date
        due_date: Timestamp,
        /// Ledger time
        now: Timestamp,
    },

    /// Registry already initialized
    #[error("Protocol already initialized")]
    AlreadyInitialized,

    /// Registry not initialized yet
    #[error("Protocol not initialized")]
    NotInitialized,

    /// Loan creation and funding are paused
    #[error("Protocol is paused")]
    ProtocolPaused,

    /// Borrower reputation frozen after a default
    #[error("Reputation frozen: {0}")]
    ReputationFrozen(String),

    /// Reputation not found
    #[error("Reputation not found: {0}")]
    ReputationNotFound(String),

    /// Loan not found
    #[error("Loan not found: {0}")]
    LoanNotFound(String),

    /// Counter or balance arithmetic overflowed
    #[error("Arithmetic overflow: {0}")]
    Overflow(String),

    /// Invariant violation (counter underflow, etc.)
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Concurrency error (actor mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Metrics registration error
    #[error("Metrics error: {0}")]
    Metrics(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error taxonomy used by callers to decide how to react
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad input; never retried
    Validation,
    /// Wrong signer; fatal to the request
    Authorization,
    /// Record is not in the required state; expected under concurrency
    StateConflict,
    /// Borrower frozen until an administrative unfreeze
    FrozenAccount,
    /// Ledger unreachable; recovered by retrying later
    Liveness,
    /// Storage or encoding failure
    Internal,
}

impl Error {
    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidAmount(_)
            | Error::InvalidDuration(_)
            | Error::RateExceedsProtocolCeiling { .. }
            | Error::RateExceedsBorrowerCeiling { .. }
            | Error::BorrowLimitExceeded { .. }
            | Error::DuplicateLoanId(_)
            | Error::ReputationExists(_)
            | Error::InvalidFee(_)
            | Error::EscrowAmountMismatch { .. }
            | Error::InsufficientFunds { .. }
            | Error::InvalidIdentity(_)
            | Error::MalformedInstruction(_)
            | Error::ReputationNotFound(_)
            | Error::LoanNotFound(_)
            | Error::Overflow(_) => ErrorKind::Validation,

            Error::Unauthorized(_) | Error::SignatureError(_) => ErrorKind::Authorization,

            Error::InvalidState { .. }
            | Error::EscrowAlreadyFunded(_)
            | Error::EscrowNotFunded(_)
            | Error::AlreadyReleased(_)
            | Error::DuplicateInstruction(_)
            | Error::NotYetOverdue { .. }
            | Error::AlreadyInitialized
            | Error::NotInitialized
            | Error::ProtocolPaused => ErrorKind::StateConflict,

            Error::ReputationFrozen(_) => ErrorKind::FrozenAccount,

            Error::Concurrency(_) | Error::Io(_) => ErrorKind::Liveness,

            Error::InvariantViolation(_)
            | Error::Storage(_)
            | Error::Serialization(_)
            | Error::Config(_)
            | Error::Metrics(_) => ErrorKind::Internal,
        }
    }

    /// Whether retrying the same request later can succeed
    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

impl ErrorKind {
    /// Only liveness failures clear up on their own
    pub fn is_retryable(self) -> bool {
        self == ErrorKind::Liveness
    }

    /// Wire name
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Authorization => "authorization",
            ErrorKind::StateConflict => "state_conflict",
            ErrorKind::FrozenAccount => "frozen_account",
            ErrorKind::Liveness => "liveness",
            ErrorKind::Internal => "internal",
        }
    }
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

impl From<prometheus::Error> for Error {
    fn from(err: prometheus::Error) -> Self {
        Error::Metrics(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(Error::ProtocolPaused.kind(), ErrorKind::StateConflict);
        assert_eq!(
            Error::Unauthorized("oracle".into()).kind(),
            ErrorKind::Authorization
        );
        assert_eq!(
            Error::ReputationFrozen("abc".into()).kind(),
            ErrorKind::FrozenAccount
        );
        assert_eq!(
            Error::InvalidState {
                loan: "x/1".into(),
                expected: LoanState::Requested,
                actual: LoanState::Funded,
            }
            .kind(),
            ErrorKind::StateConflict
        );
        assert_eq!(Error::InvalidDuration(0).kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_only_liveness_is_retryable() {
        assert!(Error::Concurrency("mailbox closed".into()).is_retryable());
        assert!(!Error::ProtocolPaused.is_retryable());
        assert!(!Error::Storage("disk".into()).is_retryable());
    }

    #[test]
    fn test_kind_wire_name_matches_serde() {
        for kind in [
            ErrorKind::Validation,
            ErrorKind::Authorization,
            ErrorKind::StateConflict,
            ErrorKind::FrozenAccount,
            ErrorKind::Liveness,
            ErrorKind::Internal,
        ] {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }
}

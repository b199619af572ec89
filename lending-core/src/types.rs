//! Core types for the lending ledger
//!
//! All types are designed for:
//! - Deterministic serialization (bincode)
//! - Memory safety (no unsafe code)
//! - Exact integer arithmetic (base units and basis points)

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Amount in base units of the lending asset
pub type Amount = u64;

/// Unix timestamp in seconds
pub type Timestamp = i64;

/// Caller-supplied loan identifier, unique per borrower
pub type LoanId = u64;

/// Participant identity (Ed25519 public key)
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Identity([u8; 32]);

impl Identity {
    /// Create from raw public key bytes
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// First 8 hex characters, for log lines
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({})", self.short())
    }
}

impl FromStr for Identity {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| crate::Error::InvalidIdentity(e.to_string()))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| crate::Error::InvalidIdentity(format!("expected 32 bytes: {}", s)))?;
        Ok(Self(bytes))
    }
}

/// Storage key of a loan: borrower + loan id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LoanKey {
    /// Borrower identity
    pub borrower: Identity,
    /// Loan id
    pub loan_id: LoanId,
}

impl LoanKey {
    /// Create new loan key
    pub fn new(borrower: Identity, loan_id: LoanId) -> Self {
        Self { borrower, loan_id }
    }

    /// Key bytes: borrower || loan_id (big-endian), so a borrower's loans sort together
    pub fn to_bytes(&self) -> [u8; 40] {
        let mut key = [0u8; 40];
        key[..32].copy_from_slice(self.borrower.as_bytes());
        key[32..].copy_from_slice(&self.loan_id.to_be_bytes());
        key
    }
}

impl fmt::Display for LoanKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.borrower.short(), self.loan_id)
    }
}

/// Credit tier (A best)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum Tier {
    /// Score >= 800
    A = 0,
    /// Score 600..=799
    B = 1,
    /// Score 400..=599
    C = 2,
    /// Score < 400
    D = 3,
}

impl Tier {
    /// All tiers, best first
    pub const ALL: [Tier; 4] = [Tier::A, Tier::B, Tier::C, Tier::D];

    /// Tier index as stored by clients (A = 0)
    pub fn index(&self) -> u8 {
        *self as u8
    }

    /// Letter code
    pub fn code(&self) -> &'static str {
        match self {
            Tier::A => "A",
            Tier::B => "B",
            Tier::C => "C",
            Tier::D => "D",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Loan lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum LoanState {
    /// Waiting for a lender
    Requested = 1,
    /// Funds held in escrow, not yet withdrawn
    Funded = 2,
    /// Borrower holds the funds; clock is running
    Active = 3,
    /// Repaid (terminal)
    Repaid = 4,
    /// Defaulted (terminal)
    Defaulted = 5,
    /// Request withdrawn before funding (terminal)
    Cancelled = 6,
}

impl LoanState {
    /// Check if state is terminal
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LoanState::Repaid | LoanState::Defaulted | LoanState::Cancelled
        )
    }

    /// Display name
    pub fn name(&self) -> &'static str {
        match self {
            LoanState::Requested => "Requested",
            LoanState::Funded => "Funded",
            LoanState::Active => "Active",
            LoanState::Repaid => "Repaid",
            LoanState::Defaulted => "Defaulted",
            LoanState::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for LoanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Base the protocol fee is taken from at repayment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FeeBasis {
    /// Fee is a cut of the interest only
    #[default]
    Interest,
    /// Fee is a cut of principal + interest
    TotalRepayment,
}

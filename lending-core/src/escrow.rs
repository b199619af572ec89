//! Per-loan escrow custody
//!
//! An escrow holds either nothing or exactly the loan amount. Release is
//! single use.

use crate::types::{Amount, LoanKey};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Escrow state of one loan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Escrow {
    /// No funds held
    #[default]
    Empty,
    /// Lender funds held
    Funded {
        /// Amount held (always the loan amount)
        amount: Amount,
    },
    /// Funds paid out to the borrower
    Released {
        /// Amount paid out
        amount: Amount,
    },
}

impl Escrow {
    /// Funds currently held
    pub fn balance(&self) -> Amount {
        match self {
            Escrow::Funded { amount } => *amount,
            Escrow::Empty | Escrow::Released { .. } => 0,
        }
    }

    /// Take custody of `amount` for a loan of `expected`
    pub fn deposit(&mut self, expected: Amount, amount: Amount, loan: &LoanKey) -> Result<()> {
        match self {
            Escrow::Empty => {}
            Escrow::Funded { .. } => return Err(Error::EscrowAlreadyFunded(loan.to_string())),
            Escrow::Released { .. } => return Err(Error::AlreadyReleased(loan.to_string())),
        }

        if amount != expected {
            return Err(Error::EscrowAmountMismatch {
                expected,
                actual: amount,
            });
        }

        *self = Escrow::Funded { amount };
        Ok(())
    }

    /// Pay out everything held
    pub fn release(&mut self, loan: &LoanKey) -> Result<Amount> {
        match *self {
            Escrow::Funded { amount } => {
                *self = Escrow::Released { amount };
                Ok(amount)
            }
            Escrow::Empty => Err(Error::EscrowNotFunded(loan.to_string())),
            Escrow::Released { .. } => Err(Error::AlreadyReleased(loan.to_string())),
        }
    }
}

//! Loan records and their state machine
//!
//! ```text
//! Requested ──fund──▶ Funded ──withdraw──▶ Active ──repay──▶ Repaid
//!     │                                       │
//!     └──cancel──▶ Cancelled                  └──default──▶ Defaulted
//! ```
//!
//! Terminal states accept no transition.

use crate::reputation::Reputation;
use crate::scoring::{self, MAX_INTEREST_RATE_BPS, MAX_LOAN_DURATION_SECS};
use crate::types::{Amount, Identity, LoanId, LoanKey, LoanState, Timestamp};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// One loan between a borrower and (eventually) a lender
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loan {
    /// Borrower identity
    pub borrower: Identity,
    /// Lender, set at funding
    pub lender: Option<Identity>,
    /// Borrower-chosen id
    pub loan_id: LoanId,
    /// Principal
    pub amount: Amount,
    /// Term, counted from withdrawal
    pub duration_seconds: i64,
    /// Highest rate the borrower accepts
    pub max_interest_rate_bps: u16,
    /// Rate suggested from the borrower's tier at request time
    pub suggested_interest_rate_bps: u16,
    /// Rate the lender funded at
    pub actual_interest_rate_bps: u16,
    /// Lifecycle state
    pub state: LoanState,
    /// Request time
    pub created_at: Timestamp,
    /// Funding time
    pub funded_at: Option<Timestamp>,
    /// Withdrawal time + term
    pub due_date: Option<Timestamp>,
    /// Repayment time
    pub repaid_at: Option<Timestamp>,
    /// Principal + interest paid by the borrower
    pub repaid_amount: Amount,
    /// Protocol cut of the repayment
    pub fee_paid: Amount,
}

impl Loan {
    /// Validate and build a new request
    pub fn request(
        reputation: &Reputation,
        loan_id: LoanId,
        amount: Amount,
        duration_seconds: i64,
        max_interest_rate_bps: u16,
        now: Timestamp,
    ) -> Result<Self> {
        reputation.ensure_can_borrow()?;

        if amount == 0 {
            return Err(Error::InvalidAmount("amount must be positive".to_string()));
        }
        if duration_seconds <= 0 || duration_seconds > MAX_LOAN_DURATION_SECS {
            return Err(Error::InvalidDuration(duration_seconds));
        }
        if max_interest_rate_bps > MAX_INTEREST_RATE_BPS {
            return Err(Error::RateExceedsProtocolCeiling {
                rate: max_interest_rate_bps,
                ceiling: MAX_INTEREST_RATE_BPS,
            });
        }
        let limit = reputation.borrow_limit();
        if amount > limit {
            return Err(Error::BorrowLimitExceeded { amount, limit });
        }

        Ok(Self {
            borrower: reputation.owner,
            lender: None,
            loan_id,
            amount,
            duration_seconds,
            max_interest_rate_bps,
            suggested_interest_rate_bps: reputation.suggested_rate_bps(),
            actual_interest_rate_bps: 0,
            state: LoanState::Requested,
            created_at: now,
            funded_at: None,
            due_date: None,
            repaid_at: None,
            repaid_amount: 0,
            fee_paid: 0,
        })
    }

    /// Storage key
    pub fn key(&self) -> LoanKey {
        LoanKey::new(self.borrower, self.loan_id)
    }

    /// Fail unless the loan is in `expected`
    pub fn ensure_state(&self, expected: LoanState) -> Result<()> {
        if self.state != expected {
            return Err(Error::InvalidState {
                loan: self.key().to_string(),
                expected,
                actual: self.state,
            });
        }
        Ok(())
    }

    /// Signer must be the borrower
    pub fn ensure_borrower(&self, signer: &Identity) -> Result<()> {
        if *signer != self.borrower {
            return Err(Error::Unauthorized(format!(
                "{} is not the borrower of loan {}",
                signer.short(),
                self.key()
            )));
        }
        Ok(())
    }

    /// Requested -> Funded
    pub fn fund(&mut self, lender: Identity, rate_bps: u16, now: Timestamp) -> Result<()> {
        if lender == self.borrower {
            return Err(Error::Unauthorized(format!(
                "borrower cannot fund own loan {}",
                self.key()
            )));
        }
        self.ensure_state(LoanState::Requested)?;
        if rate_bps > self.max_interest_rate_bps {
            return Err(Error::RateExceedsBorrowerCeiling {
                rate: rate_bps,
                ceiling: self.max_interest_rate_bps,
            });
        }

        self.lender = Some(lender);
        self.actual_interest_rate_bps = rate_bps;
        self.funded_at = Some(now);
        self.state = LoanState::Funded;
        Ok(())
    }

    /// Funded -> Active; starts the repayment clock
    pub fn activate(&mut self, now: Timestamp) -> Result<()> {
        self.ensure_state(LoanState::Funded)?;
        let due = now
            .checked_add(self.duration_seconds)
            .ok_or_else(|| Error::Overflow("due_date".to_string()))?;
        self.due_date = Some(due);
        self.state = LoanState::Active;
        Ok(())
    }

    /// Interest at the funded rate
    pub fn interest(&self) -> Result<Amount> {
        scoring::interest(self.amount, self.actual_interest_rate_bps)
    }

    /// Principal + interest
    pub fn total_due(&self) -> Result<Amount> {
        self.amount
            .checked_add(self.interest()?)
            .ok_or_else(|| Error::Overflow("total due".to_string()))
    }

    /// Paid at `now` counts as on time
    pub fn is_on_time(&self, now: Timestamp) -> bool {
        self.due_date.map_or(true, |due| now <= due)
    }

    /// Active and past `due_date + grace`
    pub fn is_overdue(&self, now: Timestamp, grace_secs: i64) -> bool {
        self.state == LoanState::Active
            && self
                .due_date
                .map_or(false, |due| now > due.saturating_add(grace_secs))
    }

    /// Whole days past the due date (0 if not yet due)
    pub fn days_overdue(&self, now: Timestamp) -> i64 {
        self.due_date
            .map_or(0, |due| (now - due).max(0) / 86_400)
    }

    /// Active -> Repaid
    pub fn settle(&mut self, repaid: Amount, fee: Amount, now: Timestamp) -> Result<()> {
        self.ensure_state(LoanState::Active)?;
        self.repaid_at = Some(now);
        self.repaid_amount = repaid;
        self.fee_paid = fee;
        self.state = LoanState::Repaid;
        Ok(())
    }

    /// Active -> Defaulted; only once the due date has passed
    pub fn mark_defaulted(&mut self, now: Timestamp) -> Result<()> {
        self.ensure_state(LoanState::Active)?;
        let due_date = self.due_date.ok_or_else(|| {
            Error::InvariantViolation(format!("active loan {} has no due date", self.key()))
        })?;
        if now <= due_date {
            return Err(Error::NotYetOverdue { due_date, now });
        }
        self.state = LoanState::Defaulted;
        Ok(())
    }

    /// Requested -> Cancelled
    pub fn cancel(&mut self) -> Result<()> {
        self.ensure_state(LoanState::Requested)?;
        self.state = LoanState::Cancelled;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: i64 = 86_400;

    fn borrower() -> Reputation {
        Reputation::new(Identity::from_bytes([4u8; 32]), 0)
    }

    fn lender() -> Identity {
        Identity::from_bytes([5u8; 32])
    }

    fn requested() -> Loan {
        Loan::request(&borrower(), 1, 10_000_000, 30 * DAY, 1500, 100).unwrap()
    }

    #[test]
    fn test_request_uses_tier_rate() {
        let loan = requested();
        assert_eq!(loan.state, LoanState::Requested);
        assert_eq!(loan.suggested_interest_rate_bps, 1200);
        assert_eq!(loan.lender, None);
        assert_eq!(loan.due_date, None);
    }

    #[test]
    fn test_request_validation() {
        let rep = borrower();
        assert!(matches!(
            Loan::request(&rep, 1, 0, DAY, 100, 0),
            Err(Error::InvalidAmount(_))
        ));
        assert!(matches!(
            Loan::request(&rep, 1, 1, 0, 100, 0),
            Err(Error::InvalidDuration(0))
        ));
        assert!(matches!(
            Loan::request(&rep, 1, 1, MAX_LOAN_DURATION_SECS + 1, 100, 0),
            Err(Error::InvalidDuration(_))
        ));
        assert!(matches!(
            Loan::request(&rep, 1, 1, DAY, 5001, 0),
            Err(Error::RateExceedsProtocolCeiling { rate: 5001, .. })
        ));
        assert!(matches!(
            Loan::request(&rep, 1, rep.borrow_limit() + 1, DAY, 100, 0),
            Err(Error::BorrowLimitExceeded { .. })
        ));
    }

    #[test]
    fn test_frozen_borrower_cannot_request() {
        let mut rep = borrower();
        rep.is_frozen = true;
        assert!(matches!(
            Loan::request(&rep, 1, 1, DAY, 100, 0),
            Err(Error::ReputationFrozen(_))
        ));
    }

    #[test]
    fn test_fund_rate_ceiling_leaves_loan_untouched() {
        let mut loan = requested();
        let before = loan.clone();
        assert!(matches!(
            loan.fund(lender(), 1501, 200),
            Err(Error::RateExceedsBorrowerCeiling { .. })
        ));
        assert_eq!(loan, before);
    }

    #[test]
    fn test_self_funding_rejected() {
        let mut loan = requested();
        let borrower = loan.borrower;
        assert!(matches!(loan.fund(borrower, 100, 200), Err(Error::Unauthorized(_))));
    }

    #[test]
    fn test_full_path() {
        let mut loan = requested();
        loan.fund(lender(), 1000, 200).unwrap();
        assert_eq!(loan.funded_at, Some(200));

        loan.activate(300).unwrap();
        assert_eq!(loan.due_date, Some(300 + 30 * DAY));
        assert_eq!(loan.interest().unwrap(), 1_000_000);
        assert_eq!(loan.total_due().unwrap(), 11_000_000);
        assert!(loan.is_on_time(300 + 30 * DAY));
        assert!(!loan.is_on_time(301 + 30 * DAY));

        loan.settle(11_000_000, 10_000, 400).unwrap();
        assert_eq!(loan.state, LoanState::Repaid);
        assert!(loan.state.is_terminal());
        assert!(matches!(
            loan.mark_defaulted(i64::MAX),
            Err(Error::InvalidState { .. })
        ));
    }

    #[test]
    fn test_default_requires_overdue() {
        let mut loan = requested();
        loan.fund(lender(), 1000, 0).unwrap();
        loan.activate(0).unwrap();
        let due = loan.due_date.unwrap();

        assert!(matches!(
            loan.mark_defaulted(due),
            Err(Error::NotYetOverdue { .. })
        ));
        assert_eq!(loan.state, LoanState::Active);

        assert!(!loan.is_overdue(due + 10, 3600));
        assert!(loan.is_overdue(due + 3601, 3600));
        assert_eq!(loan.days_overdue(due + 2 * DAY + 5), 2);

        loan.mark_defaulted(due + 1).unwrap();
        assert_eq!(loan.state, LoanState::Defaulted);
    }

    #[test]
    fn test_cancel_only_from_requested() {
        let mut loan = requested();
        loan.cancel().unwrap();
        assert_eq!(loan.state, LoanState::Cancelled);
        assert!(loan.cancel().is_err());
        assert!(loan.fund(lender(), 100, 0).is_err());
    }
}

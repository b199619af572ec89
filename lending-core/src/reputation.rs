//! Borrower reputation records

use crate::scoring::{self, INITIAL_CREDIT_SCORE};
use crate::types::{Amount, Identity, Tier, Timestamp};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Credit history of one borrower
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reputation {
    /// Borrower identity
    pub owner: Identity,
    /// Score in 0..=1000
    pub credit_score: u16,
    /// Tier derived from the score
    pub credit_tier: Tier,
    /// Loans that reached funding
    pub total_loans: u32,
    /// Funded loans not yet repaid or defaulted
    pub active_loans: u32,
    /// Repaid loans
    pub completed_loans: u32,
    /// Defaulted loans
    pub defaulted_loans: u32,
    /// Repayments made by the due date
    pub on_time_payments: u32,
    /// Repayments made after the due date
    pub late_payments: u32,
    /// Principal withdrawn over all loans
    pub total_borrowed: Amount,
    /// Principal plus interest repaid over all loans
    pub total_repaid: Amount,
    /// Frozen borrowers cannot open loans
    pub is_frozen: bool,
    /// Creation time
    pub created_at: Timestamp,
    /// Last mutation time
    pub last_updated: Timestamp,
}

impl Reputation {
    /// Fresh reputation at the initial score
    pub fn new(owner: Identity, now: Timestamp) -> Self {
        Self {
            owner,
            credit_score: INITIAL_CREDIT_SCORE,
            credit_tier: scoring::tier_of(INITIAL_CREDIT_SCORE),
            total_loans: 0,
            active_loans: 0,
            completed_loans: 0,
            defaulted_loans: 0,
            on_time_payments: 0,
            late_payments: 0,
            total_borrowed: 0,
            total_repaid: 0,
            is_frozen: false,
            created_at: now,
            last_updated: now,
        }
    }

    /// Reject frozen borrowers
    pub fn ensure_can_borrow(&self) -> Result<()> {
        if self.is_frozen {
            return Err(Error::ReputationFrozen(self.owner.to_string()));
        }
        Ok(())
    }

    /// Current principal limit
    pub fn borrow_limit(&self) -> Amount {
        scoring::max_borrow_limit(self.credit_tier)
    }

    /// Current rate suggestion
    pub fn suggested_rate_bps(&self) -> u16 {
        scoring::suggested_rate_bps(self.credit_tier)
    }

    /// A loan of this borrower got funded
    pub fn record_funding(&mut self, now: Timestamp) -> Result<()> {
        self.total_loans = increment(self.total_loans, "total_loans")?;
        self.active_loans = increment(self.active_loans, "active_loans")?;
        self.last_updated = now;
        Ok(())
    }

    /// A loan of `principal` was repaid in full with `repaid`
    pub fn record_repayment(
        &mut self,
        principal: Amount,
        repaid: Amount,
        on_time: bool,
        now: Timestamp,
    ) -> Result<()> {
        self.active_loans = decrement(self.active_loans, "active_loans")?;
        self.completed_loans = increment(self.completed_loans, "completed_loans")?;
        if on_time {
            self.on_time_payments = increment(self.on_time_payments, "on_time_payments")?;
        } else {
            self.late_payments = increment(self.late_payments, "late_payments")?;
        }
        self.total_borrowed = self
            .total_borrowed
            .checked_add(principal)
            .ok_or_else(|| Error::Overflow("total_borrowed".to_string()))?;
        self.total_repaid = self
            .total_repaid
            .checked_add(repaid)
            .ok_or_else(|| Error::Overflow("total_repaid".to_string()))?;
        self.set_score(scoring::on_repayment(self.credit_score, on_time));
        self.last_updated = now;
        Ok(())
    }

    /// A loan was forced into default; freezes the borrower
    pub fn record_default(&mut self, now: Timestamp) -> Result<()> {
        self.active_loans = decrement(self.active_loans, "active_loans")?;
        self.defaulted_loans = increment(self.defaulted_loans, "defaulted_loans")?;
        self.is_frozen = true;
        self.set_score(scoring::on_default(self.credit_score));
        self.last_updated = now;
        Ok(())
    }

    /// Administrative unfreeze
    pub fn unfreeze(&mut self, now: Timestamp) {
        self.is_frozen = false;
        self.last_updated = now;
    }

    /// `active = total - completed - defaulted`
    pub fn counters_consistent(&self) -> bool {
        self.total_loans
            .checked_sub(self.completed_loans)
            .and_then(|n| n.checked_sub(self.defaulted_loans))
            == Some(self.active_loans)
    }

    fn set_score(&mut self, score: u16) {
        self.credit_score = score;
        self.credit_tier = scoring::tier_of(score);
    }
}

fn increment(value: u32, field: &str) -> Result<u32> {
    value
        .checked_add(1)
        .ok_or_else(|| Error::Overflow(field.to_string()))
}

fn decrement(value: u32, field: &str) -> Result<u32> {
    value
        .checked_sub(1)
        .ok_or_else(|| Error::InvariantViolation(format!("{} underflow", field)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reputation() -> Reputation {
        Reputation::new(Identity::from_bytes([9u8; 32]), 1_000)
    }

    #[test]
    fn test_new_reputation() {
        let rep = reputation();
        assert_eq!(rep.credit_score, 500);
        assert_eq!(rep.credit_tier, Tier::C);
        assert!(!rep.is_frozen);
        assert!(rep.counters_consistent());
        assert!(rep.ensure_can_borrow().is_ok());
    }

    #[test]
    fn test_repayment_updates_counters() {
        let mut rep = reputation();
        rep.record_funding(1_100).unwrap();
        rep.record_repayment(100, 110, true, 1_300).unwrap();

        assert_eq!(rep.total_loans, 1);
        assert_eq!(rep.active_loans, 0);
        assert_eq!(rep.completed_loans, 1);
        assert_eq!(rep.on_time_payments, 1);
        assert_eq!(rep.total_borrowed, 100);
        assert_eq!(rep.total_repaid, 110);
        assert_eq!(rep.credit_score, 550);
        assert_eq!(rep.last_updated, 1_300);
        assert!(rep.counters_consistent());
    }

    #[test]
    fn test_late_repayment() {
        let mut rep = reputation();
        rep.record_funding(0).unwrap();
        rep.record_repayment(1, 1, false, 0).unwrap();
        assert_eq!(rep.late_payments, 1);
        assert_eq!(rep.on_time_payments, 0);
        assert_eq!(rep.credit_score, 510);
    }

    #[test]
    fn test_default_freezes() {
        let mut rep = reputation();
        rep.record_funding(0).unwrap();
        rep.record_default(10).unwrap();

        assert!(rep.is_frozen);
        assert_eq!(rep.defaulted_loans, 1);
        assert_eq!(rep.credit_score, 250);
        assert_eq!(rep.credit_tier, Tier::D);
        assert_eq!(rep.total_borrowed, 0);
        assert!(matches!(rep.ensure_can_borrow(), Err(Error::ReputationFrozen(_))));
        assert!(rep.counters_consistent());

        rep.unfreeze(20);
        assert!(rep.ensure_can_borrow().is_ok());
    }

    #[test]
    fn test_active_underflow_is_invariant_violation() {
        let mut rep = reputation();
        assert!(matches!(
            rep.record_default(0),
            Err(Error::InvariantViolation(_))
        ));
    }
}

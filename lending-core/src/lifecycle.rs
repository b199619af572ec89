//! Instruction application
//!
//! `apply` reads the records an instruction touches, mutates copies of them
//! and returns the full [`Changeset`]. Nothing is written here; the caller
//! commits the changeset atomically or drops it on error, so a failed
//! instruction never leaves partial state behind.

use crate::escrow::Escrow;
use crate::events::EventKind;
use crate::instruction::Instruction;
use crate::loan::Loan;
use crate::registry::ProtocolRegistry;
use crate::reputation::Reputation;
use crate::types::{Amount, Identity, LoanKey, LoanState, Timestamp};
use crate::{Error, Result};
use std::collections::BTreeMap;

/// Read access to committed state
pub trait StateReader {
    /// Registry, if initialized
    fn registry(&self) -> Result<Option<ProtocolRegistry>>;

    /// Reputation of `owner`
    fn reputation(&self, owner: &Identity) -> Result<Option<Reputation>>;

    /// Loan by key
    fn loan(&self, key: &LoanKey) -> Result<Option<Loan>>;

    /// Escrow of a loan (`Empty` when never funded)
    fn escrow(&self, key: &LoanKey) -> Result<Escrow>;

    /// Spendable balance (0 when never credited)
    fn balance(&self, owner: &Identity) -> Result<Amount>;
}

/// Every record an instruction writes
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Changeset {
    /// Updated registry
    pub registry: Option<ProtocolRegistry>,
    /// Updated reputations
    pub reputations: Vec<Reputation>,
    /// Updated loans
    pub loans: Vec<Loan>,
    /// Updated escrows
    pub escrows: Vec<(LoanKey, Escrow)>,
    /// New balances
    pub balances: BTreeMap<Identity, Amount>,
}

impl Changeset {
    fn current_balance<S: StateReader + ?Sized>(
        &self,
        state: &S,
        who: &Identity,
    ) -> Result<Amount> {
        match self.balances.get(who) {
            Some(balance) => Ok(*balance),
            None => state.balance(who),
        }
    }

    fn credit<S: StateReader + ?Sized>(
        &mut self,
        state: &S,
        who: Identity,
        amount: Amount,
    ) -> Result<()> {
        let balance = self
            .current_balance(state, &who)?
            .checked_add(amount)
            .ok_or_else(|| Error::Overflow(format!("balance of {}", who.short())))?;
        self.balances.insert(who, balance);
        Ok(())
    }

    fn debit<S: StateReader + ?Sized>(
        &mut self,
        state: &S,
        who: Identity,
        amount: Amount,
    ) -> Result<()> {
        let available = self.current_balance(state, &who)?;
        let balance = available
            .checked_sub(amount)
            .ok_or(Error::InsufficientFunds {
                required: amount,
                available,
            })?;
        self.balances.insert(who, balance);
        Ok(())
    }
}

/// Outcome of a successfully applied instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// Records to write
    pub changes: Changeset,
    /// Event to append
    pub kind: EventKind,
    /// Loan involved, if any
    pub loan: Option<LoanKey>,
}

impl Transition {
    fn new(changes: Changeset, kind: EventKind, loan: Option<LoanKey>) -> Self {
        Self { changes, kind, loan }
    }
}

/// Apply `instruction` signed by `signer` at `now` against `state`
pub fn apply<S: StateReader + ?Sized>(
    state: &S,
    signer: &Identity,
    instruction: &Instruction,
    now: Timestamp,
) -> Result<Transition> {
    if let Instruction::InitializeConfig {
        oracle_authority,
        protocol_fee_bps,
        fee_basis,
    } = instruction
    {
        if state.registry()?.is_some() {
            return Err(Error::AlreadyInitialized);
        }
        let registry = ProtocolRegistry::initialize(
            *signer,
            *oracle_authority,
            *protocol_fee_bps,
            *fee_basis,
            now,
        )?;
        let changes = Changeset {
            registry: Some(registry),
            ..Default::default()
        };
        return Ok(Transition::new(changes, EventKind::ConfigInitialized, None));
    }

    let mut registry = state.registry()?.ok_or(Error::NotInitialized)?;
    let mut changes = Changeset::default();
    let loan_key = instruction.loan_key(signer);

    let kind = match instruction {
        Instruction::InitializeConfig { .. } => return Err(Error::AlreadyInitialized),

        Instruction::UpdateConfig(update) => {
            registry.apply_update(signer, update)?;
            changes.registry = Some(registry);
            EventKind::ConfigUpdated
        }

        Instruction::CreateReputation => {
            if state.reputation(signer)?.is_some() {
                return Err(Error::ReputationExists(signer.to_string()));
            }
            changes.reputations.push(Reputation::new(*signer, now));
            EventKind::ReputationCreated
        }

        Instruction::UnfreezeReputation { owner } => {
            registry.ensure_authority(signer)?;
            let mut reputation = load_reputation(state, owner)?;
            reputation.unfreeze(now);
            changes.reputations.push(reputation);
            EventKind::ReputationUnfrozen
        }

        Instruction::Deposit { owner, amount } => {
            registry.ensure_authority(signer)?;
            if *amount == 0 {
                return Err(Error::InvalidAmount("deposit must be positive".to_string()));
            }
            changes.credit(state, *owner, *amount)?;
            EventKind::FundsDeposited
        }

        Instruction::CreateLoanRequest {
            loan_id,
            amount,
            duration_seconds,
            max_interest_rate_bps,
        } => {
            registry.ensure_active()?;
            let reputation = load_reputation(state, signer)?;
            let loan = Loan::request(
                &reputation,
                *loan_id,
                *amount,
                *duration_seconds,
                *max_interest_rate_bps,
                now,
            )?;
            if state.loan(&loan.key())?.is_some() {
                return Err(Error::DuplicateLoanId(loan.key().to_string()));
            }
            changes.loans.push(loan);
            EventKind::LoanRequested
        }

        Instruction::FundLoan {
            borrower,
            loan_id,
            interest_rate_bps,
        } => {
            registry.ensure_active()?;
            let key = LoanKey::new(*borrower, *loan_id);
            let mut loan = load_loan(state, &key)?;
            loan.fund(*signer, *interest_rate_bps, now)?;

            changes.debit(state, *signer, loan.amount)?;
            let mut escrow = state.escrow(&key)?;
            escrow.deposit(loan.amount, loan.amount, &key)?;

            let mut reputation = load_reputation(state, borrower)?;
            reputation.record_funding(now)?;
            registry.record_loan_issued(loan.amount)?;

            changes.escrows.push((key, escrow));
            changes.reputations.push(reputation);
            changes.registry = Some(registry);
            changes.loans.push(loan);
            EventKind::LoanFunded
        }

        Instruction::WithdrawLoan { loan_id } => {
            let key = LoanKey::new(*signer, *loan_id);
            let mut loan = load_loan(state, &key)?;
            loan.ensure_borrower(signer)?;
            loan.activate(now)?;

            let mut escrow = state.escrow(&key)?;
            let released = escrow.release(&key)?;
            changes.credit(state, loan.borrower, released)?;

            changes.escrows.push((key, escrow));
            changes.loans.push(loan);
            EventKind::LoanWithdrawn
        }

        Instruction::RepayLoan { loan_id } => {
            let key = LoanKey::new(*signer, *loan_id);
            let mut loan = load_loan(state, &key)?;
            loan.ensure_borrower(signer)?;
            loan.ensure_state(LoanState::Active)?;

            let lender = loan.lender.ok_or_else(|| {
                Error::InvariantViolation(format!("active loan {} has no lender", key))
            })?;
            let interest = loan.interest()?;
            let total = loan.total_due()?;
            let fee = registry.fee_for(loan.amount, interest)?;
            let to_lender = total.checked_sub(fee).ok_or_else(|| {
                Error::InvariantViolation(format!("fee {} exceeds repayment {}", fee, total))
            })?;

            changes.debit(state, *signer, total)?;
            changes.credit(state, lender, to_lender)?;
            registry.collect_fee(fee)?;

            let on_time = loan.is_on_time(now);
            let mut reputation = load_reputation(state, signer)?;
            reputation.record_repayment(loan.amount, total, on_time, now)?;
            loan.settle(total, fee, now)?;

            changes.reputations.push(reputation);
            changes.registry = Some(registry);
            changes.loans.push(loan);
            EventKind::LoanRepaid
        }

        Instruction::MarkDefault { borrower, loan_id } => {
            registry.ensure_oracle(signer)?;
            let key = LoanKey::new(*borrower, *loan_id);
            let mut loan = load_loan(state, &key)?;
            loan.mark_defaulted(now)?;

            let mut reputation = load_reputation(state, borrower)?;
            reputation.record_default(now)?;
            registry.record_default()?;

            changes.reputations.push(reputation);
            changes.registry = Some(registry);
            changes.loans.push(loan);
            EventKind::LoanDefaulted
        }

        Instruction::CancelLoanRequest { loan_id } => {
            let key = LoanKey::new(*signer, *loan_id);
            let mut loan = load_loan(state, &key)?;
            loan.ensure_borrower(signer)?;
            loan.cancel()?;
            changes.loans.push(loan);
            EventKind::LoanCancelled
        }
    };

    Ok(Transition::new(changes, kind, loan_key))
}

fn load_reputation<S: StateReader + ?Sized>(state: &S, owner: &Identity) -> Result<Reputation> {
    state
        .reputation(owner)?
        .ok_or_else(|| Error::ReputationNotFound(owner.to_string()))
}

fn load_loan<S: StateReader + ?Sized>(state: &S, key: &LoanKey) -> Result<Loan> {
    state
        .loan(key)?
        .ok_or_else(|| Error::LoanNotFound(key.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::ConfigUpdate;
    use crate::types::FeeBasis;
    use std::collections::HashMap;

    const DAY: i64 = 86_400;

    #[derive(Default)]
    struct MemoryState {
        registry: Option<ProtocolRegistry>,
        reputations: HashMap<Identity, Reputation>,
        loans: HashMap<LoanKey, Loan>,
        escrows: HashMap<LoanKey, Escrow>,
        balances: HashMap<Identity, Amount>,
    }

    impl StateReader for MemoryState {
        fn registry(&self) -> Result<Option<ProtocolRegistry>> {
            Ok(self.registry.clone())
        }

        fn reputation(&self, owner: &Identity) -> Result<Option<Reputation>> {
            Ok(self.reputations.get(owner).cloned())
        }

        fn loan(&self, key: &LoanKey) -> Result<Option<Loan>> {
            Ok(self.loans.get(key).cloned())
        }

        fn escrow(&self, key: &LoanKey) -> Result<Escrow> {
            Ok(self.escrows.get(key).copied().unwrap_or_default())
        }

        fn balance(&self, owner: &Identity) -> Result<Amount> {
            Ok(self.balances.get(owner).copied().unwrap_or(0))
        }
    }

    impl MemoryState {
        fn run(
            &mut self,
            signer: Identity,
            instruction: Instruction,
            now: Timestamp,
        ) -> Result<Transition> {
            let transition = apply(&*self, &signer, &instruction, now)?;
            let changes = transition.changes.clone();
            if let Some(registry) = changes.registry {
                self.registry = Some(registry);
            }
            for reputation in changes.reputations {
                self.reputations.insert(reputation.owner, reputation);
            }
            for loan in changes.loans {
                self.loans.insert(loan.key(), loan);
            }
            self.escrows.extend(changes.escrows);
            self.balances.extend(changes.balances);
            Ok(transition)
        }
    }

    struct Fixture {
        state: MemoryState,
        authority: Identity,
        oracle: Identity,
        borrower: Identity,
        lender: Identity,
    }

    fn fixture(fee_bps: u16, fee_basis: FeeBasis) -> Fixture {
        let authority = Identity::from_bytes([1u8; 32]);
        let oracle = Identity::from_bytes([2u8; 32]);
        let borrower = Identity::from_bytes([3u8; 32]);
        let lender = Identity::from_bytes([4u8; 32]);

        let mut state = MemoryState::default();
        state
            .run(
                authority,
                Instruction::InitializeConfig {
                    oracle_authority: oracle,
                    protocol_fee_bps: fee_bps,
                    fee_basis,
                },
                0,
            )
            .unwrap();
        state.run(borrower, Instruction::CreateReputation, 0).unwrap();
        state
            .run(
                authority,
                Instruction::Deposit {
                    owner: lender,
                    amount: 100_000_000,
                },
                0,
            )
            .unwrap();
        state
            .run(
                authority,
                Instruction::Deposit {
                    owner: borrower,
                    amount: 5_000_000,
                },
                0,
            )
            .unwrap();

        Fixture {
            state,
            authority,
            oracle,
            borrower,
            lender,
        }
    }

    fn request(f: &mut Fixture, loan_id: u64, amount: Amount, duration: i64) {
        f.state
            .run(
                f.borrower,
                Instruction::CreateLoanRequest {
                    loan_id,
                    amount,
                    duration_seconds: duration,
                    max_interest_rate_bps: 1500,
                },
                10,
            )
            .unwrap();
    }

    fn fund(f: &mut Fixture, loan_id: u64, rate: u16) -> Result<Transition> {
        let borrower = f.borrower;
        f.state.run(
            f.lender,
            Instruction::FundLoan {
                borrower,
                loan_id,
                interest_rate_bps: rate,
            },
            20,
        )
    }

    fn active_loan(f: &mut Fixture, loan_id: u64, amount: Amount, duration: i64) {
        request(f, loan_id, amount, duration);
        fund(f, loan_id, 1000).unwrap();
        f.state
            .run(f.borrower, Instruction::WithdrawLoan { loan_id }, 30)
            .unwrap();
    }

    #[test]
    fn test_initialize_once() {
        let mut f = fixture(100, FeeBasis::Interest);
        let err = f
            .state
            .run(
                f.authority,
                Instruction::InitializeConfig {
                    oracle_authority: f.oracle,
                    protocol_fee_bps: 0,
                    fee_basis: FeeBasis::Interest,
                },
                1,
            )
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyInitialized));
    }

    #[test]
    fn test_uninitialized_rejects_everything() {
        let mut state = MemoryState::default();
        let err = state
            .run(Identity::from_bytes([9u8; 32]), Instruction::CreateReputation, 0)
            .unwrap_err();
        assert!(matches!(err, Error::NotInitialized));
    }

    #[test]
    fn test_duplicate_reputation() {
        let mut f = fixture(0, FeeBasis::Interest);
        let err = f
            .state
            .run(f.borrower, Instruction::CreateReputation, 1)
            .unwrap_err();
        assert!(matches!(err, Error::ReputationExists(_)));
    }

    #[test]
    fn test_request_and_duplicate_id() {
        let mut f = fixture(0, FeeBasis::Interest);
        request(&mut f, 1, 10_000_000, 30 * DAY);

        let key = LoanKey::new(f.borrower, 1);
        let loan = f.state.loans.get(&key).unwrap();
        assert_eq!(loan.state, LoanState::Requested);
        assert_eq!(loan.suggested_interest_rate_bps, 1200);

        // No counters touched by a request
        assert_eq!(f.state.reputations[&f.borrower].total_loans, 0);

        let err = f
            .state
            .run(
                f.borrower,
                Instruction::CreateLoanRequest {
                    loan_id: 1,
                    amount: 1,
                    duration_seconds: DAY,
                    max_interest_rate_bps: 100,
                },
                11,
            )
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateLoanId(_)));
    }

    #[test]
    fn test_request_without_reputation() {
        let mut f = fixture(0, FeeBasis::Interest);
        let err = f
            .state
            .run(
                f.lender,
                Instruction::CreateLoanRequest {
                    loan_id: 1,
                    amount: 1,
                    duration_seconds: DAY,
                    max_interest_rate_bps: 100,
                },
                11,
            )
            .unwrap_err();
        assert!(matches!(err, Error::ReputationNotFound(_)));
    }

    #[test]
    fn test_fund_moves_money_into_escrow() {
        let mut f = fixture(0, FeeBasis::Interest);
        request(&mut f, 1, 10_000_000, 30 * DAY);
        let transition = fund(&mut f, 1, 1000).unwrap();
        assert_eq!(transition.kind, EventKind::LoanFunded);

        let key = LoanKey::new(f.borrower, 1);
        assert_eq!(f.state.escrows[&key], Escrow::Funded { amount: 10_000_000 });
        assert_eq!(f.state.balances[&f.lender], 90_000_000);
        assert_eq!(f.state.loans[&key].lender, Some(f.lender));

        let rep = &f.state.reputations[&f.borrower];
        assert_eq!(rep.total_loans, 1);
        assert_eq!(rep.active_loans, 1);

        let registry = f.state.registry.as_ref().unwrap();
        assert_eq!(registry.total_loans_issued, 1);
        assert_eq!(registry.total_volume, 10_000_000);
    }

    #[test]
    fn test_second_fund_sees_funded() {
        let mut f = fixture(0, FeeBasis::Interest);
        request(&mut f, 1, 10_000_000, 30 * DAY);
        fund(&mut f, 1, 1000).unwrap();
        let err = fund(&mut f, 1, 1000).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidState {
                actual: LoanState::Funded,
                ..
            }
        ));
    }

    #[test]
    fn test_deposit_requires_authority() {
        let mut f = fixture(0, FeeBasis::Interest);
        let before = f.state.balances[&f.lender];

        let err = f
            .state
            .run(
                f.lender,
                Instruction::Deposit {
                    owner: f.lender,
                    amount: 1_000,
                },
                1,
            )
            .unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));
        assert_eq!(f.state.balances[&f.lender], before);

        f.state
            .run(
                f.authority,
                Instruction::Deposit {
                    owner: f.lender,
                    amount: 1_000,
                },
                1,
            )
            .unwrap();
        assert_eq!(f.state.balances[&f.lender], before + 1_000);
        assert!(!f.state.balances.contains_key(&f.authority));

        let err = f
            .state
            .run(
                f.authority,
                Instruction::Deposit {
                    owner: f.lender,
                    amount: 0,
                },
                2,
            )
            .unwrap_err();
        assert!(matches!(err, Error::InvalidAmount(_)));
    }

    #[test]
    fn test_fund_without_balance() {
        let mut f = fixture(0, FeeBasis::Interest);
        request(&mut f, 1, 10_000_000, 30 * DAY);
        f.state.balances.insert(f.lender, 5);

        let err = fund(&mut f, 1, 1000).unwrap_err();
        assert!(matches!(err, Error::InsufficientFunds { required: 10_000_000, available: 5 }));
        assert_eq!(f.state.loans[&LoanKey::new(f.borrower, 1)].state, LoanState::Requested);
    }

    #[test]
    fn test_paused_blocks_request_and_fund() {
        let mut f = fixture(0, FeeBasis::Interest);
        request(&mut f, 1, 10_000_000, 30 * DAY);
        f.state
            .run(
                f.authority,
                Instruction::UpdateConfig(ConfigUpdate {
                    new_paused: Some(true),
                    ..Default::default()
                }),
                15,
            )
            .unwrap();

        assert!(matches!(fund(&mut f, 1, 1000), Err(Error::ProtocolPaused)));
        let err = f
            .state
            .run(
                f.borrower,
                Instruction::CreateLoanRequest {
                    loan_id: 2,
                    amount: 1,
                    duration_seconds: DAY,
                    max_interest_rate_bps: 100,
                },
                16,
            )
            .unwrap_err();
        assert!(matches!(err, Error::ProtocolPaused));
    }

    #[test]
    fn test_withdraw_sets_due_date() {
        let mut f = fixture(0, FeeBasis::Interest);
        active_loan(&mut f, 1, 10_000_000, 30 * DAY);

        let key = LoanKey::new(f.borrower, 1);
        let loan = &f.state.loans[&key];
        assert_eq!(loan.state, LoanState::Active);
        assert_eq!(loan.due_date, Some(30 + 30 * DAY));
        assert!(matches!(f.state.escrows[&key], Escrow::Released { .. }));
        assert_eq!(f.state.balances[&f.borrower], 15_000_000);
        // Reputation untouched until settlement
        assert_eq!(f.state.reputations[&f.borrower].total_borrowed, 0);
    }

    #[test]
    fn test_repay_on_time_with_interest_fee() {
        let mut f = fixture(100, FeeBasis::Interest);
        active_loan(&mut f, 1, 10_000_000, 30 * DAY);

        let borrower_before = f.state.balances[&f.borrower];
        let lender_before = f.state.balances[&f.lender];
        f.state
            .run(f.borrower, Instruction::RepayLoan { loan_id: 1 }, 40)
            .unwrap();

        let key = LoanKey::new(f.borrower, 1);
        let loan = &f.state.loans[&key];
        assert_eq!(loan.state, LoanState::Repaid);
        assert_eq!(loan.repaid_amount, 11_000_000);
        assert_eq!(loan.fee_paid, 10_000);

        let rep = &f.state.reputations[&f.borrower];
        assert_eq!(rep.credit_score, 550);
        assert_eq!(rep.completed_loans, 1);
        assert_eq!(rep.active_loans, 0);
        assert_eq!(rep.on_time_payments, 1);
        assert_eq!(rep.total_borrowed, 10_000_000);
        assert_eq!(rep.total_repaid, 11_000_000);
        assert!(rep.counters_consistent());

        let outlay = borrower_before - f.state.balances[&f.borrower];
        let lender_gain = f.state.balances[&f.lender] - lender_before;
        let treasury = f.state.registry.as_ref().unwrap().treasury_balance;
        assert_eq!(outlay, 11_000_000);
        assert_eq!(lender_gain + treasury, outlay);
    }

    #[test]
    fn test_repay_with_total_repayment_fee() {
        let mut f = fixture(100, FeeBasis::TotalRepayment);
        active_loan(&mut f, 1, 10_000_000, 30 * DAY);
        f.state
            .run(f.borrower, Instruction::RepayLoan { loan_id: 1 }, 40)
            .unwrap();
        let loan = &f.state.loans[&LoanKey::new(f.borrower, 1)];
        assert_eq!(loan.fee_paid, 110_000);
        assert_eq!(f.state.registry.as_ref().unwrap().treasury_balance, 110_000);
    }

    #[test]
    fn test_late_repayment() {
        let mut f = fixture(0, FeeBasis::Interest);
        active_loan(&mut f, 1, 1_000_000, DAY);
        f.state
            .run(f.borrower, Instruction::RepayLoan { loan_id: 1 }, 30 + DAY + 1)
            .unwrap();
        let rep = &f.state.reputations[&f.borrower];
        assert_eq!(rep.late_payments, 1);
        assert_eq!(rep.credit_score, 510);
    }

    #[test]
    fn test_default_requires_oracle_and_overdue() {
        let mut f = fixture(0, FeeBasis::Interest);
        active_loan(&mut f, 1, 1_000_000, 5);

        let default = Instruction::MarkDefault {
            borrower: f.borrower,
            loan_id: 1,
        };

        let err = f.state.run(f.lender, default.clone(), 100).unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));

        let err = f.state.run(f.oracle, default.clone(), 35).unwrap_err();
        assert!(matches!(err, Error::NotYetOverdue { due_date: 35, now: 35 }));
        assert_eq!(f.state.loans[&LoanKey::new(f.borrower, 1)].state, LoanState::Active);

        f.state.run(f.oracle, default.clone(), 36).unwrap();
        let rep = &f.state.reputations[&f.borrower];
        assert!(rep.is_frozen);
        assert_eq!(rep.defaulted_loans, 1);
        assert_eq!(rep.credit_score, 250);
        assert_eq!(rep.total_borrowed, 0);
        assert_eq!(rep.total_repaid, 0);
        assert_eq!(f.state.registry.as_ref().unwrap().total_defaults, 1);

        // Terminal
        let err = f.state.run(f.oracle, default, 100).unwrap_err();
        assert!(matches!(err, Error::InvalidState { .. }));
    }

    #[test]
    fn test_unfreeze_restores_borrowing() {
        let mut f = fixture(0, FeeBasis::Interest);
        active_loan(&mut f, 1, 1_000_000, 5);
        f.state
            .run(
                f.oracle,
                Instruction::MarkDefault {
                    borrower: f.borrower,
                    loan_id: 1,
                },
                100,
            )
            .unwrap();

        let unfreeze = Instruction::UnfreezeReputation { owner: f.borrower };
        assert!(matches!(
            f.state.run(f.oracle, unfreeze.clone(), 101),
            Err(Error::Unauthorized(_))
        ));
        f.state.run(f.authority, unfreeze, 102).unwrap();
        assert!(!f.state.reputations[&f.borrower].is_frozen);
    }

    #[test]
    fn test_cancel_request() {
        let mut f = fixture(0, FeeBasis::Interest);
        request(&mut f, 1, 1_000_000, DAY);
        f.state
            .run(f.borrower, Instruction::CancelLoanRequest { loan_id: 1 }, 12)
            .unwrap();

        let key = LoanKey::new(f.borrower, 1);
        assert_eq!(f.state.loans[&key].state, LoanState::Cancelled);
        assert!(matches!(fund(&mut f, 1, 1000), Err(Error::InvalidState { .. })));
        assert!(f.state.reputations[&f.borrower].counters_consistent());
    }

    #[test]
    fn test_failed_instruction_produces_no_changes() {
        let mut f = fixture(0, FeeBasis::Interest);
        request(&mut f, 1, 10_000_000, 30 * DAY);
        let before_loans = f.state.loans.clone();
        let before_balances = f.state.balances.clone();

        assert!(fund(&mut f, 1, 1600).is_err());
        assert_eq!(f.state.loans, before_loans);
        assert_eq!(f.state.balances, before_balances);
    }
}

//! Main ledger orchestration layer
//!
//! This module ties together storage, crypto, and actor components
//! into a high-level API for the lending protocol.
//!
//! # Example
//!
//! ```no_run
//! use lending_core::{Config, FeeBasis, KeyPair, Ledger};
//!
//! #[tokio::main]
//! async fn main() -> lending_core::Result<()> {
//!     let ledger = Ledger::open(Config::default()).await?;
//!     let authority = KeyPair::generate();
//!     let oracle = KeyPair::generate();
//!
//!     ledger
//!         .initialize_config(&authority, oracle.identity(), 100, FeeBasis::Interest)
//!         .await?;
//!
//!     let borrower = KeyPair::generate();
//!     ledger.create_reputation(&borrower).await?;
//!     ledger
//!         .create_loan_request(&borrower, 1, 10_000_000, 30 * 86_400, 1_500)
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

use crate::{
    actor::{spawn_ledger_actor, LedgerHandle},
    clock::{Clock, SystemClock},
    crypto::KeyPair,
    escrow::Escrow,
    events::LedgerEvent,
    instruction::{ConfigUpdate, Instruction, Receipt, SignedInstruction},
    lifecycle::StateReader,
    loan::Loan,
    metrics::Metrics,
    registry::ProtocolRegistry,
    reputation::Reputation,
    stats::ProtocolStats,
    types::{Amount, FeeBasis, Identity, LoanId, LoanKey, LoanState, Timestamp},
    Config, Error, Result, Storage,
};
use std::sync::Arc;

/// Main ledger interface
#[derive(Debug)]
pub struct Ledger {
    /// Actor handle for writes
    handle: LedgerHandle,

    /// Direct storage access (for reads)
    storage: Arc<Storage>,

    /// Ledger time source
    clock: Arc<dyn Clock>,

    /// Metrics
    metrics: Metrics,

    /// Configuration
    config: Config,
}

impl Ledger {
    /// Open ledger with configuration, using wall-clock time
    pub async fn open(config: Config) -> Result<Self> {
        Self::open_with_clock(config, Arc::new(SystemClock)).await
    }

    /// Open ledger with an explicit time source
    pub async fn open_with_clock(config: Config, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;

        // Open storage
        let storage = Arc::new(Storage::open(&config)?);
        let metrics = Metrics::new()?;

        // Spawn actor
        let handle = spawn_ledger_actor(
            storage.clone(),
            clock.clone(),
            metrics.clone(),
            config.mailbox_capacity,
        )?;

        tracing::info!(
            service = %config.service_name,
            version = %config.service_version,
            last_sequence = storage.last_sequence()?,
            "Ledger opened"
        );

        Ok(Self {
            handle,
            storage,
            clock,
            metrics,
            config,
        })
    }

    /// Submit an already signed instruction
    pub async fn submit(&self, instruction: SignedInstruction) -> Result<Receipt> {
        self.handle.submit(instruction).await
    }

    /// Sign `instruction` with `keypair` under a fresh nonce and submit it
    pub async fn execute(&self, keypair: &KeyPair, instruction: Instruction) -> Result<Receipt> {
        let signed = SignedInstruction::sign(keypair, rand::random::<u64>(), instruction)?;
        self.submit(signed).await
    }

    // Instructions

    /// Create the registry; `authority` becomes the administrator
    pub async fn initialize_config(
        &self,
        authority: &KeyPair,
        oracle_authority: Identity,
        protocol_fee_bps: u16,
        fee_basis: FeeBasis,
    ) -> Result<Receipt> {
        self.execute(
            authority,
            Instruction::InitializeConfig {
                oracle_authority,
                protocol_fee_bps,
                fee_basis,
            },
        )
        .await
    }

    /// Change configuration
    pub async fn update_config(
        &self,
        authority: &KeyPair,
        update: ConfigUpdate,
    ) -> Result<Receipt> {
        self.execute(authority, Instruction::UpdateConfig(update)).await
    }

    /// Pause or resume loan creation and funding
    pub async fn set_paused(&self, authority: &KeyPair, paused: bool) -> Result<Receipt> {
        self.update_config(
            authority,
            ConfigUpdate {
                new_paused: Some(paused),
                ..Default::default()
            },
        )
        .await
    }

    /// Create the signer's reputation
    pub async fn create_reputation(&self, owner: &KeyPair) -> Result<Receipt> {
        self.execute(owner, Instruction::CreateReputation).await
    }

    /// Clear a borrower's frozen flag
    pub async fn unfreeze_reputation(
        &self,
        authority: &KeyPair,
        owner: Identity,
    ) -> Result<Receipt> {
        self.execute(authority, Instruction::UnfreezeReputation { owner }).await
    }

    /// Credit `owner` with funds confirmed outside the ledger
    pub async fn deposit(
        &self,
        authority: &KeyPair,
        owner: Identity,
        amount: Amount,
    ) -> Result<Receipt> {
        self.execute(authority, Instruction::Deposit { owner, amount }).await
    }

    /// Open a loan request
    pub async fn create_loan_request(
        &self,
        borrower: &KeyPair,
        loan_id: LoanId,
        amount: Amount,
        duration_seconds: i64,
        max_interest_rate_bps: u16,
    ) -> Result<Receipt> {
        self.execute(
            borrower,
            Instruction::CreateLoanRequest {
                loan_id,
                amount,
                duration_seconds,
                max_interest_rate_bps,
            },
        )
        .await
    }

    /// Fund a request into escrow
    pub async fn fund_loan(
        &self,
        lender: &KeyPair,
        borrower: Identity,
        loan_id: LoanId,
        interest_rate_bps: u16,
    ) -> Result<Receipt> {
        self.execute(
            lender,
            Instruction::FundLoan {
                borrower,
                loan_id,
                interest_rate_bps,
            },
        )
        .await
    }

    /// Take funded principal out of escrow
    pub async fn withdraw_loan(&self, borrower: &KeyPair, loan_id: LoanId) -> Result<Receipt> {
        self.execute(borrower, Instruction::WithdrawLoan { loan_id }).await
    }

    /// Repay principal + interest
    pub async fn repay_loan(&self, borrower: &KeyPair, loan_id: LoanId) -> Result<Receipt> {
        self.execute(borrower, Instruction::RepayLoan { loan_id }).await
    }

    /// Force an overdue loan into default
    pub async fn mark_default(
        &self,
        oracle: &KeyPair,
        borrower: Identity,
        loan_id: LoanId,
    ) -> Result<Receipt> {
        self.execute(oracle, Instruction::MarkDefault { borrower, loan_id }).await
    }

    /// Withdraw an unfunded request
    pub async fn cancel_loan_request(
        &self,
        borrower: &KeyPair,
        loan_id: LoanId,
    ) -> Result<Receipt> {
        self.execute(borrower, Instruction::CancelLoanRequest { loan_id }).await
    }

    // Reads

    /// Protocol registry
    pub fn registry(&self) -> Result<ProtocolRegistry> {
        self.storage.registry()?.ok_or(Error::NotInitialized)
    }

    /// Reputation of `owner`
    pub fn reputation(&self, owner: &Identity) -> Result<Reputation> {
        self.storage
            .reputation(owner)?
            .ok_or_else(|| Error::ReputationNotFound(owner.to_string()))
    }

    /// Loan by borrower and id
    pub fn loan(&self, borrower: &Identity, loan_id: LoanId) -> Result<Loan> {
        let key = LoanKey::new(*borrower, loan_id);
        self.storage
            .loan(&key)?
            .ok_or_else(|| Error::LoanNotFound(key.to_string()))
    }

    /// Escrow of a loan
    pub fn escrow(&self, borrower: &Identity, loan_id: LoanId) -> Result<Escrow> {
        self.storage.escrow(&LoanKey::new(*borrower, loan_id))
    }

    /// Spendable balance
    pub fn balance(&self, owner: &Identity) -> Result<Amount> {
        self.storage.balance(owner)
    }

    /// All loans
    pub fn loans(&self) -> Result<Vec<Loan>> {
        self.storage.loans()
    }

    /// Loans in `state`
    pub fn loans_in_state(&self, state: LoanState) -> Result<Vec<Loan>> {
        Ok(self
            .storage
            .loans()?
            .into_iter()
            .filter(|loan| loan.state == state)
            .collect())
    }

    /// Loans of one borrower
    pub fn loans_of(&self, borrower: &Identity) -> Result<Vec<Loan>> {
        self.storage.loans_of(borrower)
    }

    /// All reputations
    pub fn reputations(&self) -> Result<Vec<Reputation>> {
        self.storage.reputations()
    }

    /// Event log page
    pub fn events(&self, from: u64, limit: usize) -> Result<Vec<LedgerEvent>> {
        self.storage.events(from, limit)
    }

    /// Aggregate protocol view
    pub fn stats(&self) -> Result<ProtocolStats> {
        let registry = self.registry()?;
        let reputations = self.storage.reputations()?;
        let loans = self.storage.loans()?;
        Ok(ProtocolStats::collect(&registry, &reputations, &loans))
    }

    /// Ledger time
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Metrics collector
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Shutdown ledger
    pub async fn shutdown(&self) -> Result<()> {
        self.handle.shutdown().await
    }
}

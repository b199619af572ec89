//! Signed instructions: the only way to mutate the ledger

use crate::crypto::{self, KeyPair, Signature};
use crate::types::{Amount, FeeBasis, Identity, LoanId, LoanKey, Timestamp};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Administrative changes; `None` leaves the field as is
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigUpdate {
    /// Replace the oracle identity
    pub new_oracle: Option<Identity>,
    /// Replace the protocol fee
    pub new_fee_bps: Option<u16>,
    /// Pause or resume
    pub new_paused: Option<bool>,
    /// Replace the fee basis
    pub new_fee_basis: Option<FeeBasis>,
}

/// Ledger operation; the signer is always the acting party
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    /// Create the registry; signer becomes the authority
    InitializeConfig {
        /// Oracle identity
        oracle_authority: Identity,
        /// Protocol fee
        protocol_fee_bps: u16,
        /// Fee basis
        fee_basis: FeeBasis,
    },
    /// Authority-only configuration change
    UpdateConfig(ConfigUpdate),
    /// Create the signer's reputation
    CreateReputation,
    /// Authority clears a borrower's frozen flag
    UnfreezeReputation {
        /// Borrower to unfreeze
        owner: Identity,
    },
    /// Authority credits funds confirmed outside the ledger
    Deposit {
        /// Credited identity
        owner: Identity,
        /// Amount credited
        amount: Amount,
    },
    /// Borrower opens a request
    CreateLoanRequest {
        /// Borrower-chosen id
        loan_id: LoanId,
        /// Principal
        amount: Amount,
        /// Term in seconds
        duration_seconds: i64,
        /// Highest acceptable rate
        max_interest_rate_bps: u16,
    },
    /// Lender funds a request into escrow
    FundLoan {
        /// Borrower
        borrower: Identity,
        /// Loan id
        loan_id: LoanId,
        /// Offered rate
        interest_rate_bps: u16,
    },
    /// Borrower takes the funds out of escrow
    WithdrawLoan {
        /// Loan id
        loan_id: LoanId,
    },
    /// Borrower repays principal + interest
    RepayLoan {
        /// Loan id
        loan_id: LoanId,
    },
    /// Oracle forces an overdue loan into default
    MarkDefault {
        /// Borrower
        borrower: Identity,
        /// Loan id
        loan_id: LoanId,
    },
    /// Borrower withdraws an unfunded request
    CancelLoanRequest {
        /// Loan id
        loan_id: LoanId,
    },
}

impl Instruction {
    /// Name used in logs and metric labels
    pub fn name(&self) -> &'static str {
        match self {
            Instruction::InitializeConfig { .. } => "initialize_config",
            Instruction::UpdateConfig(_) => "update_config",
            Instruction::CreateReputation => "create_reputation",
            Instruction::UnfreezeReputation { .. } => "unfreeze_reputation",
            Instruction::Deposit { .. } => "deposit",
            Instruction::CreateLoanRequest { .. } => "create_loan_request",
            Instruction::FundLoan { .. } => "fund_loan",
            Instruction::WithdrawLoan { .. } => "withdraw_loan",
            Instruction::RepayLoan { .. } => "repay_loan",
            Instruction::MarkDefault { .. } => "mark_default",
            Instruction::CancelLoanRequest { .. } => "cancel_loan_request",
        }
    }

    /// Loan this instruction targets, if any
    pub fn loan_key(&self, signer: &Identity) -> Option<LoanKey> {
        match self {
            Instruction::CreateLoanRequest { loan_id, .. }
            | Instruction::WithdrawLoan { loan_id }
            | Instruction::RepayLoan { loan_id }
            | Instruction::CancelLoanRequest { loan_id } => Some(LoanKey::new(*signer, *loan_id)),
            Instruction::FundLoan {
                borrower, loan_id, ..
            }
            | Instruction::MarkDefault { borrower, loan_id } => {
                Some(LoanKey::new(*borrower, *loan_id))
            }
            _ => None,
        }
    }
}

/// Instruction plus the signer's Ed25519 signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedInstruction {
    /// Acting identity
    pub signer: Identity,
    /// Client-chosen value making each signed message unique
    pub nonce: u64,
    /// Operation
    pub instruction: Instruction,
    /// Signature over `(signer, nonce, instruction)`
    pub signature: Signature,
}

impl SignedInstruction {
    /// Sign `instruction` with `keypair`
    pub fn sign(keypair: &KeyPair, nonce: u64, instruction: Instruction) -> Result<Self> {
        let signer = keypair.identity();
        let message = signing_bytes(&signer, nonce, &instruction)?;
        Ok(Self {
            signer,
            nonce,
            signature: keypair.sign(&message),
            instruction,
        })
    }

    /// Check the signature against the signer
    pub fn verify(&self) -> Result<()> {
        let message = signing_bytes(&self.signer, self.nonce, &self.instruction)?;
        crypto::verify_signature(&message, &self.signature, &self.signer)
    }

    /// Wire encoding used by the node API
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Decode bytes produced by [`SignedInstruction::to_bytes`]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| Error::MalformedInstruction(e.to_string()))
    }

    /// SHA-256 of the signed message; identifies the submission
    pub fn digest(&self) -> Result<[u8; 32]> {
        let message = signing_bytes(&self.signer, self.nonce, &self.instruction)?;
        Ok(crypto::sha256(&message))
    }
}

fn signing_bytes(signer: &Identity, nonce: u64, instruction: &Instruction) -> Result<Vec<u8>> {
    Ok(bincode::serialize(&(signer, nonce, instruction))?)
}

/// Proof that an instruction was applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// Event sequence number
    pub sequence: u64,
    /// Instruction digest
    pub digest: [u8; 32],
    /// Ledger time of application
    pub applied_at: Timestamp,
}

//! Protocol-wide configuration and aggregate counters

use crate::instruction::ConfigUpdate;
use crate::scoring::{self, BPS_DENOMINATOR};
use crate::types::{Amount, FeeBasis, Identity, Timestamp};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Singleton protocol record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolRegistry {
    /// Administrator
    pub authority: Identity,
    /// Identity allowed to force defaults
    pub oracle_authority: Identity,
    /// Fee taken from each repayment (0..=10000)
    pub protocol_fee_bps: u16,
    /// What the fee is computed on
    pub fee_basis: FeeBasis,
    /// Loans that reached funding
    pub total_loans_issued: u64,
    /// Principal funded over all loans
    pub total_volume: Amount,
    /// Loans forced into default
    pub total_defaults: u64,
    /// Accumulated protocol fees
    pub treasury_balance: Amount,
    /// Blocks loan creation and funding
    pub is_paused: bool,
    /// Initialization time
    pub created_at: Timestamp,
}

impl ProtocolRegistry {
    /// Build the registry; the signer becomes the authority
    pub fn initialize(
        authority: Identity,
        oracle_authority: Identity,
        protocol_fee_bps: u16,
        fee_basis: FeeBasis,
        now: Timestamp,
    ) -> Result<Self> {
        validate_fee(protocol_fee_bps)?;
        Ok(Self {
            authority,
            oracle_authority,
            protocol_fee_bps,
            fee_basis,
            total_loans_issued: 0,
            total_volume: 0,
            total_defaults: 0,
            treasury_balance: 0,
            is_paused: false,
            created_at: now,
        })
    }

    /// Apply an administrative update
    pub fn apply_update(&mut self, signer: &Identity, update: &ConfigUpdate) -> Result<()> {
        self.ensure_authority(signer)?;
        if let Some(fee) = update.new_fee_bps {
            validate_fee(fee)?;
        }

        if let Some(oracle) = update.new_oracle {
            self.oracle_authority = oracle;
        }
        if let Some(fee) = update.new_fee_bps {
            self.protocol_fee_bps = fee;
        }
        if let Some(paused) = update.new_paused {
            self.is_paused = paused;
        }
        if let Some(basis) = update.new_fee_basis {
            self.fee_basis = basis;
        }
        Ok(())
    }

    /// Signer must be the authority
    pub fn ensure_authority(&self, signer: &Identity) -> Result<()> {
        if *signer != self.authority {
            return Err(Error::Unauthorized(format!(
                "{} is not the protocol authority",
                signer.short()
            )));
        }
        Ok(())
    }

    /// Signer must be the oracle
    pub fn ensure_oracle(&self, signer: &Identity) -> Result<()> {
        if *signer != self.oracle_authority {
            return Err(Error::Unauthorized(format!(
                "{} is not the oracle authority",
                signer.short()
            )));
        }
        Ok(())
    }

    /// Reject when paused
    pub fn ensure_active(&self) -> Result<()> {
        if self.is_paused {
            return Err(Error::ProtocolPaused);
        }
        Ok(())
    }

    /// Count a funded loan
    pub fn record_loan_issued(&mut self, amount: Amount) -> Result<()> {
        self.total_loans_issued = self
            .total_loans_issued
            .checked_add(1)
            .ok_or_else(|| Error::Overflow("total_loans_issued".to_string()))?;
        self.total_volume = self
            .total_volume
            .checked_add(amount)
            .ok_or_else(|| Error::Overflow("total_volume".to_string()))?;
        Ok(())
    }

    /// Count a default
    pub fn record_default(&mut self) -> Result<()> {
        self.total_defaults = self
            .total_defaults
            .checked_add(1)
            .ok_or_else(|| Error::Overflow("total_defaults".to_string()))?;
        Ok(())
    }

    /// Credit a fee to the treasury
    pub fn collect_fee(&mut self, fee: Amount) -> Result<()> {
        self.treasury_balance = self
            .treasury_balance
            .checked_add(fee)
            .ok_or_else(|| Error::Overflow("treasury_balance".to_string()))?;
        Ok(())
    }

    /// Fee owed on a repayment of `amount` + `interest`
    pub fn fee_for(&self, amount: Amount, interest: Amount) -> Result<Amount> {
        scoring::protocol_fee(amount, interest, self.protocol_fee_bps, self.fee_basis)
    }
}

fn validate_fee(fee_bps: u16) -> Result<()> {
    if fee_bps as u64 > BPS_DENOMINATOR {
        return Err(Error::InvalidFee(fee_bps));
    }
    Ok(())
}

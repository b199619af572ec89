//! Aggregate protocol statistics

use crate::loan::Loan;
use crate::registry::ProtocolRegistry;
use crate::reputation::Reputation;
use crate::types::{Amount, LoanState, Tier};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Loans per lifecycle state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateCounts {
    /// Waiting for a lender
    pub requested: usize,
    /// Funded, pending withdrawal
    pub funded: usize,
    /// Withdrawn, not yet settled
    pub active: usize,
    /// Repaid
    pub repaid: usize,
    /// Defaulted
    pub defaulted: usize,
    /// Cancelled
    pub cancelled: usize,
}

/// Reputations per tier
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierDistribution {
    /// Tier A
    pub a: usize,
    /// Tier B
    pub b: usize,
    /// Tier C
    pub c: usize,
    /// Tier D
    pub d: usize,
}

/// Snapshot of the whole protocol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolStats {
    /// Paused flag
    pub is_paused: bool,
    /// Protocol fee
    pub protocol_fee_bps: u16,
    /// Loans that reached funding
    pub total_loans_issued: u64,
    /// Principal funded
    pub total_volume: Amount,
    /// Defaults
    pub total_defaults: u64,
    /// Fees collected
    pub treasury_balance: Amount,
    /// `total_defaults / total_loans_issued`, percent, 2 dp (None before any loan)
    pub default_rate_percent: Option<Decimal>,
    /// Reputations on record
    pub borrowers: usize,
    /// Mean credit score, 2 dp (None without borrowers)
    pub average_credit_score: Option<Decimal>,
    /// Frozen reputations
    pub frozen_accounts: usize,
    /// Reputations per tier
    pub tiers: TierDistribution,
    /// Loans per state
    pub loans: StateCounts,
}

impl ProtocolStats {
    /// Build from the registry and full record scans
    pub fn collect(
        registry: &ProtocolRegistry,
        reputations: &[Reputation],
        loans: &[Loan],
    ) -> Self {
        let default_rate_percent = (registry.total_loans_issued > 0).then(|| {
            (Decimal::from(registry.total_defaults) * Decimal::ONE_HUNDRED
                / Decimal::from(registry.total_loans_issued))
            .round_dp(2)
        });

        let average_credit_score = (!reputations.is_empty()).then(|| {
            let total: u64 = reputations.iter().map(|r| r.credit_score as u64).sum();
            (Decimal::from(total) / Decimal::from(reputations.len() as u64)).round_dp(2)
        });

        let mut tiers = TierDistribution::default();
        for reputation in reputations {
            match reputation.credit_tier {
                Tier::A => tiers.a += 1,
                Tier::B => tiers.b += 1,
                Tier::C => tiers.c += 1,
                Tier::D => tiers.d += 1,
            }
        }

        let mut states = StateCounts::default();
        for loan in loans {
            match loan.state {
                LoanState::Requested => states.requested += 1,
                LoanState::Funded => states.funded += 1,
                LoanState::Active => states.active += 1,
                LoanState::Repaid => states.repaid += 1,
                LoanState::Defaulted => states.defaulted += 1,
                LoanState::Cancelled => states.cancelled += 1,
            }
        }

        Self {
            is_paused: registry.is_paused,
            protocol_fee_bps: registry.protocol_fee_bps,
            total_loans_issued: registry.total_loans_issued,
            total_volume: registry.total_volume,
            total_defaults: registry.total_defaults,
            treasury_balance: registry.treasury_balance,
            default_rate_percent,
            borrowers: reputations.len(),
            average_credit_score,
            frozen_accounts: reputations.iter().filter(|r| r.is_frozen).count(),
            tiers,
            loans: states,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FeeBasis, Identity};
    use std::str::FromStr;

    #[test]
    fn test_empty_protocol() {
        let id = Identity::from_bytes([1u8; 32]);
        let registry = ProtocolRegistry::initialize(id, id, 0, FeeBasis::Interest, 0).unwrap();
        let stats = ProtocolStats::collect(&registry, &[], &[]);
        assert_eq!(stats.default_rate_percent, None);
        assert_eq!(stats.average_credit_score, None);
        assert_eq!(stats.borrowers, 0);
    }

    #[test]
    fn test_rates_and_distribution() {
        let id = Identity::from_bytes([1u8; 32]);
        let mut registry = ProtocolRegistry::initialize(id, id, 0, FeeBasis::Interest, 0).unwrap();
        registry.total_loans_issued = 3;
        registry.total_defaults = 1;

        let mut frozen = Reputation::new(Identity::from_bytes([2u8; 32]), 0);
        frozen.credit_score = 250;
        frozen.credit_tier = Tier::D;
        frozen.is_frozen = true;
        let mut good = Reputation::new(Identity::from_bytes([3u8; 32]), 0);
        good.credit_score = 851;
        good.credit_tier = Tier::A;

        let stats = ProtocolStats::collect(&registry, &[frozen, good], &[]);
        assert_eq!(stats.default_rate_percent, Some(Decimal::from_str("33.33").unwrap()));
        assert_eq!(stats.average_credit_score, Some(Decimal::from_str("550.50").unwrap()));
        assert_eq!(stats.frozen_accounts, 1);
        assert_eq!(stats.tiers, TierDistribution { a: 1, b: 0, c: 0, d: 1 });
    }
}

//! Credit scoring engine
//!
//! Pure functions over a borrower's history: score, tier, suggested rate and
//! borrowing limit. No I/O, no clock.

use crate::types::{Amount, FeeBasis, Tier};
use crate::{Error, Result};

/// Score assigned to a fresh reputation
pub const INITIAL_CREDIT_SCORE: u16 = 500;

/// Upper bound of the score
pub const MAX_CREDIT_SCORE: u16 = 1000;

/// Score gained by an on-time repayment
pub const ON_TIME_REPAYMENT_BONUS: u16 = 50;

/// Score gained by a late repayment
pub const LATE_REPAYMENT_BONUS: u16 = 10;

/// Score lost on default
pub const DEFAULT_PENALTY: u16 = 250;

/// Basis point denominator
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Rate every tier premium sits on
pub const BASE_RATE_BPS: u16 = 500;

/// Protocol-wide ceiling on any loan rate (50%)
pub const MAX_INTEREST_RATE_BPS: u16 = 5_000;

/// Longest loan term accepted (365 days)
pub const MAX_LOAN_DURATION_SECS: i64 = 365 * 24 * 60 * 60;

/// Map a score to its tier
pub fn tier_of(score: u16) -> Tier {
    match score {
        800.. => Tier::A,
        600..=799 => Tier::B,
        400..=599 => Tier::C,
        _ => Tier::D,
    }
}

/// Rate suggested to lenders for a borrower of this tier
pub fn suggested_rate_bps(tier: Tier) -> u16 {
    let premium = match tier {
        Tier::A => 0,
        Tier::B => 300,
        Tier::C => 700,
        Tier::D => 1_300,
    };
    BASE_RATE_BPS + premium
}

/// Largest principal a borrower of this tier may request (base units)
pub fn max_borrow_limit(tier: Tier) -> Amount {
    match tier {
        Tier::A => 50_000_000_000,
        Tier::B => 20_000_000_000,
        Tier::C => 10_000_000_000,
        Tier::D => 2_000_000_000,
    }
}

/// New score after a repayment
pub fn on_repayment(score: u16, on_time: bool) -> u16 {
    let bonus = if on_time {
        ON_TIME_REPAYMENT_BONUS
    } else {
        LATE_REPAYMENT_BONUS
    };
    score.saturating_add(bonus).min(MAX_CREDIT_SCORE)
}

/// New score after a default
pub fn on_default(score: u16) -> u16 {
    score.saturating_sub(DEFAULT_PENALTY)
}

/// Simple interest over the whole term, rounded down
pub fn interest(amount: Amount, rate_bps: u16) -> Result<Amount> {
    apply_bps(amount, rate_bps)
}

/// Protocol cut of a repayment
pub fn protocol_fee(
    amount: Amount,
    interest: Amount,
    fee_bps: u16,
    basis: FeeBasis,
) -> Result<Amount> {
    let base = match basis {
        FeeBasis::Interest => interest,
        FeeBasis::TotalRepayment => amount
            .checked_add(interest)
            .ok_or_else(|| Error::Overflow("amount + interest".to_string()))?,
    };
    apply_bps(base, fee_bps)
}

fn apply_bps(value: Amount, bps: u16) -> Result<Amount> {
    let scaled = value as u128 * bps as u128 / BPS_DENOMINATOR as u128;
    Amount::try_from(scaled).map_err(|_| Error::Overflow(format!("{} * {} bps", value, bps)))
}

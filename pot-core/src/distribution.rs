//! Pot Distribution
//!
//! One whole coin stays in the wallet to cover transfer fees. The rest is
//! split 70/5/15/10 between winners, the fund, referrers and maintenance.
//! Every share is floored; rounding dust is left in the wallet.

use serde::{Deserialize, Serialize};

use crate::ATOMIC_UNITS_PER_COIN;

/// Amount held back for fees
pub const FEE_RESERVE: u64 = ATOMIC_UNITS_PER_COIN;

pub const WINNER_PERCENT: u64 = 70;
pub const FUND_PERCENT: u64 = 5;
pub const REFERRAL_PERCENT: u64 = 15;
pub const MAINTENANCE_PERCENT: u64 = 10;

/// Payout shares in atomic units
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shares {
    pub winner: u64,
    pub fund: u64,
    pub referrals: u64,
    pub maintenance: u64,
}

impl Shares {
    /// Split a pooled balance
    pub fn from_balance(balance: u64) -> Self {
        if balance <= FEE_RESERVE {
            return Self::default();
        }
        let pool = balance - FEE_RESERVE;
        Self {
            winner: percent_of(pool, WINNER_PERCENT),
            fund: percent_of(pool, FUND_PERCENT),
            referrals: percent_of(pool, REFERRAL_PERCENT),
            maintenance: percent_of(pool, MAINTENANCE_PERCENT),
        }
    }

    pub fn total(&self) -> u64 {
        self.winner + self.fund + self.referrals + self.maintenance
    }
}

/// ⌊amount × percent / 100⌋
pub fn percent_of(amount: u64, percent: u64) -> u64 {
    (amount as u128 * percent as u128 / 100) as u64
}

/// ⌊total × part / whole⌋, zero when `whole` is zero
pub fn pro_rata(total: u64, part: u64, whole: u64) -> u64 {
    if whole == 0 {
        return 0;
    }
    (total as u128 * part as u128 / whole as u128) as u64
}

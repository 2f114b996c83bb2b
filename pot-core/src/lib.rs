//! Pot Core - Monthly Pot Domain
//!
//! This crate holds the pure, I/O-free pieces of the monthly pot:
//!
//! - **Types**: accounts, entries, winner records
//! - **Pricing**: converting credited amounts into entries at the running
//!   entry price, and deriving that price from a USD quote
//! - **Scoring**: entry signing and hash-alignment scoring against the
//!   anchor block hash
//! - **Distribution**: splitting the pooled balance into payout shares
//! - **Calendar**: month keys and timer deadlines (all UTC)
//!
//! # Draw Verification
//!
//! Every draw can be reproduced from public data alone:
//!
//! ```rust
//! use pot_core::scoring::score_entries;
//!
//! let sign_key = "90a7e39da756fdb53c55c4e00ff05a70db9083b9f8cfca7354582f756b9d9edf";
//! let block = "6666666666ec1464d3a02ead5e18644030007a0fc664c0a964d30408821a8bb0";
//! let board = score_entries(14, sign_key, block);
//! assert_eq!(board.winners(), &[5]);
//! ```

pub mod calendar;
pub mod distribution;
pub mod error;
pub mod pricing;
pub mod scoring;
pub mod types;

pub use distribution::Shares;
pub use error::{CoreError, CoreResult};
pub use pricing::{entries_from_amount, PriceStamp};
pub use scoring::{hash_match_align, score_entries, sign_entry, Scoreboard};
pub use types::*;

/// Atomic units in one whole coin
pub const ATOMIC_UNITS_PER_COIN: u64 = 1_000_000_000_000;

/// Signing key of the very first cycle; later cycles use the previous anchor block hash
pub const GENESIS_SIGN_KEY: &str =
    "90a7e39da756fdb53c55c4e00ff05a70db9083b9f8cfca7354582f756b9d9edf";

/// Format atomic units as a decimal coin amount (12 fractional digits)
pub fn format_coins(atomic: u64) -> String {
    format!(
        "{}.{:012}",
        atomic / ATOMIC_UNITS_PER_COIN,
        atomic % ATOMIC_UNITS_PER_COIN
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_coins() {
        assert_eq!(format_coins(0), "0.000000000000");
        assert_eq!(format_coins(1_500_000_000_000), "1.500000000000");
        assert_eq!(format_coins(42), "0.000000000042");
    }
}

//! Entry Pricing
//!
//! An entry costs a fixed USD amount; the price in atomic units is
//! refreshed at most once per day and stored with its date stamp.

use chrono::NaiveDate;
use std::fmt;

use crate::error::{CoreError, CoreResult};

/// Entry price in USD cents
pub const ENTRY_PRICE_USD_CENTS: u64 = 250;

/// Scale of USD quotes (8 decimal places)
pub const USD_QUOTE_SCALE: u64 = 100_000_000;

/// Split an accumulated amount into whole entries and the remainder.
///
/// A zero price yields no entries and keeps the full amount.
pub fn entries_from_amount(amount: u64, price: u64) -> (u64, u64) {
    if price == 0 {
        return (0, amount);
    }
    (amount / price, amount % price)
}

/// Entry price in atomic units from a coin/USD quote scaled by 1e8
pub fn entry_price_from_usd(coin_usd_scaled: u64) -> CoreResult<u64> {
    if coin_usd_scaled == 0 {
        return Err(CoreError::InvalidPrice("zero USD quote".to_string()));
    }
    // cents * 1e12 / 100 * 1e8 / quote
    let numerator = ENTRY_PRICE_USD_CENTS as u128
        * crate::ATOMIC_UNITS_PER_COIN as u128
        * (USD_QUOTE_SCALE / 100) as u128;
    let price = numerator / coin_usd_scaled as u128;
    if price == 0 {
        return Err(CoreError::InvalidPrice(format!(
            "quote {} yields a zero entry price",
            coin_usd_scaled
        )));
    }
    u64::try_from(price).map_err(|_| CoreError::InvalidPrice(format!("price overflow for quote {}", coin_usd_scaled)))
}

/// Date-stamped price as persisted under `current_price`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceStamp {
    pub date: NaiveDate,
    pub price: u64,
}

impl PriceStamp {
    pub fn new(date: NaiveDate, price: u64) -> Self {
        Self { date, price }
    }

    /// Parse `YYYY-MM-DD:<units>`
    pub fn parse(raw: &str) -> CoreResult<Self> {
        let (date, price) = raw
            .split_once(':')
            .ok_or_else(|| CoreError::InvalidPriceStamp(raw.to_string()))?;
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map_err(|e| CoreError::InvalidPriceStamp(format!("{}: {}", raw, e)))?;
        let price = price
            .parse::<u64>()
            .map_err(|e| CoreError::InvalidPriceStamp(format!("{}: {}", raw, e)))?;
        Ok(Self { date, price })
    }

    pub fn is_current(&self, today: NaiveDate) -> bool {
        self.date == today
    }
}

impl fmt::Display for PriceStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.date.format("%Y-%m-%d"), self.price)
    }
}
